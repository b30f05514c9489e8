use std::future::Future;
use std::sync::{Arc, RwLock};

use reqwest::{Client, RequestBuilder, Response, multipart};
use serde::de::DeserializeOwned;
use tracing::debug;

use quill_types::api::{
    AuthResponse, CreateCategoryRequest, CreateCommentRequest, CreatePostRequest, ErrorBody,
    HealthResponse, LoginRequest, MeResponse, PostQuery, RegisterRequest, UpdatePostRequest,
    UploadResponse,
};
use quill_types::models::{Category, Comment, Post};

use crate::error::{ClientError, Result};

/// Credential calls used by [`crate::auth::AuthController`].
pub trait AuthApi: Send + Sync {
    fn register(&self, req: &RegisterRequest) -> impl Future<Output = Result<AuthResponse>> + Send;

    fn login(&self, req: &LoginRequest) -> impl Future<Output = Result<AuthResponse>> + Send;

    /// Install or drop the bearer token sent on later requests.
    fn set_token(&self, token: Option<String>);
}

/// Post calls used by [`crate::feed::PostFeed`].
pub trait PostsApi: Send + Sync {
    fn list_posts(&self, query: &PostQuery) -> impl Future<Output = Result<Vec<Post>>> + Send;

    fn create_post(&self, req: &CreatePostRequest) -> impl Future<Output = Result<Post>> + Send;

    fn update_post(
        &self,
        id: &str,
        req: &UpdatePostRequest,
    ) -> impl Future<Output = Result<Post>> + Send;

    fn delete_post(&self, id: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Typed HTTP client for the blog API. Clones share the connection pool and
/// the bearer token.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(Inner {
                http: Client::new(),
                base_url,
                token: RwLock::new(None),
            }),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    pub fn token(&self) -> Option<String> {
        self.inner
            .token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = check(self.authorized(req).send().await?).await?;
        Ok(resp.json().await?)
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<()> {
        check(self.authorized(req).send().await?).await?;
        Ok(())
    }

    // -- Auth --

    pub async fn me(&self) -> Result<MeResponse> {
        self.send(self.inner.http.get(self.url("/api/auth/me"))).await
    }

    // -- Posts --

    pub async fn get_post(&self, id: &str) -> Result<Post> {
        self.send(self.inner.http.get(self.url(&format!("/api/posts/{}", id))))
            .await
    }

    // -- Categories --

    pub async fn list_categories(&self) -> Result<Vec<Category>> {
        self.send(self.inner.http.get(self.url("/api/categories")))
            .await
    }

    pub async fn create_category(&self, name: &str) -> Result<Category> {
        let req = CreateCategoryRequest { name: name.to_string() };
        self.send(self.inner.http.post(self.url("/api/categories")).json(&req))
            .await
    }

    // -- Comments --

    pub async fn list_comments(&self, post_id: &str) -> Result<Vec<Comment>> {
        self.send(self.inner.http.get(self.url(&format!("/api/comments/{}", post_id))))
            .await
    }

    pub async fn create_comment(&self, post_id: &str, text: &str) -> Result<Comment> {
        let req = CreateCommentRequest {
            post_id: post_id.to_string(),
            username: None,
            text: text.to_string(),
        };
        self.send(self.inner.http.post(self.url("/api/comments")).json(&req))
            .await
    }

    // -- Uploads --

    /// Upload an image and return its public URL, relative to the server root.
    pub async fn upload_image(&self, file_name: &str, data: Vec<u8>) -> Result<String> {
        let part = multipart::Part::bytes(data).file_name(file_name.to_string());
        let form = multipart::Form::new().part("image", part);
        let resp: UploadResponse = self
            .send(self.inner.http.post(self.url("/api/upload")).multipart(form))
            .await?;
        Ok(resp.url)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.send(self.inner.http.get(self.url("/health"))).await
    }
}

impl AuthApi for ApiClient {
    async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse> {
        self.send(self.inner.http.post(self.url("/api/auth/register")).json(req))
            .await
    }

    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse> {
        self.send(self.inner.http.post(self.url("/api/auth/login")).json(req))
            .await
    }

    fn set_token(&self, token: Option<String>) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }
}

impl PostsApi for ApiClient {
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        self.send(self.inner.http.get(self.url("/api/posts")).query(query))
            .await
    }

    async fn create_post(&self, req: &CreatePostRequest) -> Result<Post> {
        self.send(self.inner.http.post(self.url("/api/posts")).json(req))
            .await
    }

    async fn update_post(&self, id: &str, req: &UpdatePostRequest) -> Result<Post> {
        self.send(self.inner.http.put(self.url(&format!("/api/posts/{}", id))).json(req))
            .await
    }

    async fn delete_post(&self, id: &str) -> Result<()> {
        self.send_empty(self.inner.http.delete(self.url(&format!("/api/posts/{}", id))))
            .await
    }
}

/// Turn a non-2xx response into [`ClientError::Api`], taking the message
/// from the `{message}` body when there is one.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let fallback = status.canonical_reason().unwrap_or("Request failed").to_string();
    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => fallback,
    };
    debug!("API error {}: {}", status, message);

    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
