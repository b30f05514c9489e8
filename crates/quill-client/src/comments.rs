use std::sync::{Mutex, MutexGuard};

use tracing::warn;
use uuid::Uuid;

use quill_types::models::Comment;

use crate::api::ApiClient;
use crate::error::Result;
use crate::notice::Notifier;

/// Comments under one post, newest first.
pub struct CommentThread {
    api: ApiClient,
    notices: Notifier,
    post_id: Uuid,
    comments: Mutex<Vec<Comment>>,
}

impl CommentThread {
    pub fn new(api: ApiClient, notices: Notifier, post_id: Uuid) -> Self {
        Self {
            api,
            notices,
            post_id,
            comments: Mutex::new(Vec::new()),
        }
    }

    pub fn post_id(&self) -> Uuid {
        self.post_id
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.lock().clone()
    }

    pub async fn load(&self) -> Result<()> {
        let mut comments = self.api.list_comments(&self.post_id.to_string()).await?;
        comments.reverse();
        *self.lock() = comments;
        Ok(())
    }

    /// Post a comment and show it once the server has stored it.
    /// Blank text is ignored without a request.
    pub async fn add(&self, text: &str) -> Result<Option<Comment>> {
        if text.trim().is_empty() {
            return Ok(None);
        }

        match self.api.create_comment(&self.post_id.to_string(), text).await {
            Ok(comment) => {
                self.lock().insert(0, comment.clone());
                Ok(Some(comment))
            }
            Err(e) => {
                warn!("Comment on {} failed: {}", self.post_id, e);
                self.notices.error("Failed to add comment");
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Comment>> {
        self.comments.lock().unwrap_or_else(|p| p.into_inner())
    }
}
