use std::sync::Mutex;

use uuid::Uuid;

use quill_types::models::Category;

use crate::api::ApiClient;
use crate::error::Result;

/// Categories are fetched once and then served from memory.
pub struct CategoryList {
    api: ApiClient,
    loaded: Mutex<Option<Vec<Category>>>,
}

impl CategoryList {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            loaded: Mutex::new(None),
        }
    }

    pub async fn load(&self) -> Result<Vec<Category>> {
        if let Some(categories) = self.cached() {
            return Ok(categories);
        }

        let categories = self.api.list_categories().await?;
        *self.loaded.lock().unwrap_or_else(|p| p.into_inner()) = Some(categories.clone());
        Ok(categories)
    }

    /// Create a category and append it to the loaded list.
    pub async fn create(&self, name: &str) -> Result<Category> {
        let category = self.api.create_category(name).await?;
        if let Some(list) = self.loaded.lock().unwrap_or_else(|p| p.into_inner()).as_mut() {
            list.push(category.clone());
        }
        Ok(category)
    }

    pub fn cached(&self) -> Option<Vec<Category>> {
        self.loaded.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn name_for(&self, id: Uuid) -> Option<String> {
        self.loaded
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()?
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.clone())
    }
}
