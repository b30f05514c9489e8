use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use quill_types::api::CreateCommentRequest;
use quill_types::models::Comment;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::{AppState, convert, validate, with_db};

/// GET /api/comments/{post_id}: an unknown post simply has no comments.
pub async fn list_comments(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> ApiResult<Json<Vec<Comment>>> {
    let rows = with_db(&state, move |db| db.list_comments(&post_id)).await?;
    Ok(Json(rows.into_iter().map(convert::comment).collect()))
}

/// POST /api/comments: the author is always the authenticated user.
/// The post reference is not checked for existence.
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    let post_id = validate::id("postId", &req.post_id)?.to_string();
    validate::required("text", &req.text)?;

    if let Some(claimed) = req.username.as_deref() {
        if claimed != user.username {
            warn!("{} tried to comment as '{}'", user.username, claimed);
            return Err(ApiError::validation("username does not match the signed-in user"));
        }
    }

    let id = Uuid::new_v4().to_string();
    let username = user.username.clone();
    let row = with_db(&state, move |db| db.create_comment(&id, &post_id, &username, &req.text)).await?;

    info!("Comment {} on post {} by {}", row.id, row.post_id, user.username);
    Ok((StatusCode::CREATED, Json(convert::comment(row))))
}
