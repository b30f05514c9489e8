//! Client-side state for the blog: a typed HTTP client plus controllers that
//! keep the signed-in session, the post feed, categories and comment threads
//! in sync with the server.

pub mod api;
pub mod auth;
pub mod categories;
pub mod comments;
pub mod error;
pub mod feed;
pub mod notice;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

pub use crate::api::{ApiClient, AuthApi, PostsApi};
pub use crate::error::{ClientError, Result};
pub use crate::notice::{Notice, NoticeLevel, NoticeReceiver, Notifier};

use crate::auth::AuthController;
use crate::categories::CategoryList;
use crate::comments::CommentThread;
use crate::feed::PostFeed;
use crate::session::Session;

/// Everything a frontend needs, wired to one server and one session file.
pub struct BlogClient {
    pub api: ApiClient,
    pub session: Arc<Session>,
    pub auth: AuthController<ApiClient>,
    pub feed: PostFeed<ApiClient>,
    pub categories: CategoryList,
    notices: Notifier,
}

impl BlogClient {
    /// Restore the session stored at `session_path` and point every
    /// controller at `base_url`. Notices arrive on the returned receiver.
    pub fn new(base_url: &str, session_path: impl Into<PathBuf>) -> Result<(Self, NoticeReceiver)> {
        let (notices, rx) = Notifier::channel();
        let api = ApiClient::new(base_url);
        let session = Arc::new(Session::load(session_path)?);

        let client = Self {
            auth: AuthController::new(api.clone(), session.clone(), notices.clone()),
            feed: PostFeed::new(api.clone(), notices.clone()),
            categories: CategoryList::new(api.clone()),
            api,
            session,
            notices,
        };
        Ok((client, rx))
    }

    pub fn thread(&self, post_id: Uuid) -> CommentThread {
        CommentThread::new(self.api.clone(), self.notices.clone(), post_id)
    }

    /// Upload an image for a post form and return its URL.
    pub async fn upload_image(&self, file_name: &str, data: Vec<u8>) -> Result<String> {
        self.api.upload_image(file_name, data).await.inspect_err(|e| {
            warn!("Image upload failed: {}", e);
            self.notices.error("Image upload failed");
        })
    }
}
