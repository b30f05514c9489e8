pub mod auth;
pub mod categories;
pub mod comments;
mod convert;
pub mod error;
pub mod middleware;
pub mod posts;
pub mod token;
pub mod uploads;
mod validate;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::error;

use quill_db::Database;
use quill_types::api::HealthResponse;

use crate::error::ApiError;
use crate::middleware::require_auth;
use crate::token::TokenService;
use crate::uploads::UploadStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenService,
    pub uploads: UploadStore,
}

impl AppStateInner {
    pub fn new(db: Database, tokens: TokenService, uploads: UploadStore) -> AppState {
        Arc::new(Self { db, tokens, uploads })
    }
}

/// Run a blocking repository call off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> quill_db::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Upstream(e.to_string())
        })?
        .map_err(ApiError::from)
}

/// Full HTTP surface: `/api/*`, `/uploads/*` and `/health`.
pub fn router(state: AppState, max_body_bytes: usize) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/posts", get(posts::list_posts))
        .route("/api/posts/{id}", get(posts::get_post))
        .route(
            "/api/categories",
            get(categories::list_categories).post(categories::create_category),
        )
        .route("/api/comments/{post_id}", get(comments::list_comments))
        .route("/api/upload", post(uploads::upload_image))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/posts", post(posts::create_post))
        .route("/api/posts/{id}", put(posts::update_post).delete(posts::delete_post))
        .route("/api/comments", post(comments::create_comment))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), require_auth));

    let uploads = ServeDir::new(state.uploads.dir());

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").into(),
    })
}
