//! The post list as the user sees it.
//!
//! Writes are applied locally before the server answers and reconciled when
//! it does. A create inserts a pending placeholder at the head, which is then
//! either swapped in place for the server record or removed, leaving the list
//! exactly as it was before the submit. List fetches carry a generation number
//! and only the newest one may replace the list.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use quill_types::api::{CreatePostRequest, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, PostQuery, UpdatePostRequest};
use quill_types::models::Post;

use crate::api::PostsApi;
use crate::error::Result;
use crate::notice::Notifier;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub post: Post,
    /// Local change the server has not confirmed yet.
    pub pending: bool,
}

impl FeedItem {
    fn confirmed(post: Post) -> Self {
        Self { post, pending: false }
    }
}

struct FeedState {
    items: Vec<FeedItem>,
    query: PostQuery,
    generation: u64,
}

pub struct PostFeed<A> {
    api: A,
    notices: Notifier,
    state: Mutex<FeedState>,
}

impl<A: PostsApi> PostFeed<A> {
    pub fn new(api: A, notices: Notifier) -> Self {
        Self {
            api,
            notices,
            state: Mutex::new(FeedState {
                items: Vec::new(),
                query: PostQuery::page(DEFAULT_PAGE, DEFAULT_PAGE_SIZE),
                generation: 0,
            }),
        }
    }

    pub fn items(&self) -> Vec<FeedItem> {
        self.lock().items.clone()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.lock().items.iter().map(|i| i.post.clone()).collect()
    }

    pub fn query(&self) -> PostQuery {
        self.lock().query.clone()
    }

    /// Fetch the current page and replace the list with it.
    ///
    /// Returns `Ok(false)` when a newer fetch started while this one was in
    /// flight; its response, success or failure, is then ignored.
    pub async fn refresh(&self) -> Result<bool> {
        let (generation, query) = {
            let mut state = self.lock();
            state.generation += 1;
            (state.generation, state.query.clone())
        };

        let result = self.api.list_posts(&query).await;

        let mut state = self.lock();
        if state.generation != generation {
            debug!("Dropping stale post list (generation {} < {})", generation, state.generation);
            return Ok(false);
        }
        match result {
            Ok(posts) => {
                state.items = posts.into_iter().map(FeedItem::confirmed).collect();
                Ok(true)
            }
            Err(e) => {
                warn!("Loading posts failed: {}", e);
                self.notices.error("Failed to load posts");
                Err(e)
            }
        }
    }

    pub async fn set_page(&self, page: u32) -> Result<bool> {
        self.lock().query.page = Some(page);
        self.refresh().await
    }

    /// Change the title filter and go back to the first page.
    pub async fn search(&self, q: &str) -> Result<bool> {
        {
            let mut state = self.lock();
            state.query.q = Some(q.to_string()).filter(|q| !q.trim().is_empty());
            state.query.page = Some(DEFAULT_PAGE);
        }
        self.refresh().await
    }

    pub async fn create(&self, req: CreatePostRequest) -> Result<Post> {
        let temp_id = Uuid::new_v4();
        let now = Utc::now();
        let placeholder = Post {
            id: temp_id,
            title: req.title.clone(),
            content: req.content.clone(),
            category_id: Uuid::parse_str(&req.category).unwrap_or_default(),
            category: None,
            image_url: req.image_url.clone(),
            created_at: now,
            updated_at: now,
        };
        self.lock().items.insert(
            0,
            FeedItem {
                post: placeholder,
                pending: true,
            },
        );

        match self.api.create_post(&req).await {
            Ok(post) => {
                let mut state = self.lock();
                if let Some(item) = state.items.iter_mut().find(|i| i.post.id == temp_id) {
                    *item = FeedItem::confirmed(post.clone());
                }
                info!("Post {} confirmed", post.id);
                Ok(post)
            }
            Err(e) => {
                self.lock().items.retain(|i| i.post.id != temp_id);
                warn!("Create post failed: {}", e);
                self.notices.error("Failed to create post");
                Err(e)
            }
        }
    }

    pub async fn update(&self, id: Uuid, patch: UpdatePostRequest) -> Result<Post> {
        let previous = {
            let mut state = self.lock();
            let mut previous = None;
            if let Some(item) = state.items.iter_mut().find(|i| i.post.id == id) {
                previous = Some(item.post.clone());
                apply_patch(&mut item.post, &patch);
                item.pending = true;
            }
            previous
        };

        match self.api.update_post(&id.to_string(), &patch).await {
            Ok(post) => {
                let mut state = self.lock();
                if let Some(item) = state.items.iter_mut().find(|i| i.post.id == id) {
                    *item = FeedItem::confirmed(post.clone());
                }
                Ok(post)
            }
            Err(e) => {
                if let Some(previous) = previous {
                    let mut state = self.lock();
                    if let Some(item) = state.items.iter_mut().find(|i| i.post.id == id) {
                        *item = FeedItem::confirmed(previous);
                    }
                }
                warn!("Update of post {} failed: {}", id, e);
                self.notices.error("Failed to update post");
                Err(e)
            }
        }
    }

    /// Removed locally only once the server confirms.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        match self.api.delete_post(&id.to_string()).await {
            Ok(()) => {
                self.lock().items.retain(|i| i.post.id != id);
                Ok(())
            }
            Err(e) => {
                warn!("Delete of post {} failed: {}", id, e);
                self.notices.error("Failed to delete post");
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, FeedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn apply_patch(post: &mut Post, patch: &UpdatePostRequest) {
    if let Some(title) = &patch.title {
        post.title = title.clone();
    }
    if let Some(content) = &patch.content {
        post.content = content.clone();
    }
    if let Some(category) = patch.category.as_deref().and_then(|c| Uuid::parse_str(c).ok()) {
        if category != post.category_id {
            post.category_id = category;
            post.category = None;
        }
    }
    if let Some(image_url) = &patch.image_url {
        post.image_url = Some(image_url.clone());
    }
    post.updated_at = Utc::now();
}
