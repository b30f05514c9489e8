use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use quill_db::models::{NewPost, PostChanges, PostRow};
use quill_types::api::{CreatePostRequest, DEFAULT_PAGE, DEFAULT_PAGE_SIZE, PostQuery, UpdatePostRequest};
use quill_types::models::{Post, PostCategory};

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::{AppState, convert, validate, with_db};

/// GET /api/posts?page&limit&q
pub async fn list_posts(
    State(state): State<AppState>,
    query: Result<Query<PostQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<Post>>> {
    let Query(query) = query?;
    let page = validate::positive("page", query.page.unwrap_or(DEFAULT_PAGE))?;
    let limit = validate::positive("limit", query.limit.unwrap_or(DEFAULT_PAGE_SIZE))?;
    let search = query.search().map(str::to_string);

    let rows = with_db(&state, move |db| db.list_posts(search.as_deref(), page, limit)).await?;
    Ok(Json(resolve(&state, rows).await?))
}

/// GET /api/posts/{id}
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Post>> {
    let row = with_db(&state, move |db| db.get_post(&id))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;
    Ok(Json(resolve_one(&state, row).await?))
}

/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    validate::required("title", &req.title)?;
    validate::required("content", &req.content)?;
    let category_id = validate::id("category", &req.category)?.to_string();

    let id = Uuid::new_v4().to_string();
    let row = with_db(&state, move |db| {
        db.create_post(&NewPost {
            id: &id,
            title: &req.title,
            content: &req.content,
            category_id: &category_id,
            image_url: req.image_url.as_deref(),
        })
    })
    .await?;

    info!("Post {} created by {}", row.id, user.username);
    Ok((StatusCode::CREATED, Json(resolve_one(&state, row).await?)))
}

/// PUT /api/posts/{id}
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
    payload: Result<Json<UpdatePostRequest>, JsonRejection>,
) -> ApiResult<Json<Post>> {
    let Json(req) = payload?;
    if req.is_empty() {
        return Err(ApiError::validation("No fields to update"));
    }
    validate::non_empty_if_present("title", req.title.as_deref())?;
    validate::non_empty_if_present("content", req.content.as_deref())?;
    let category_id = req
        .category
        .as_deref()
        .map(|c| validate::id("category", c))
        .transpose()?
        .map(|c| c.to_string());

    let changes = PostChanges {
        title: req.title,
        content: req.content,
        category_id,
        image_url: req.image_url,
    };
    let row = with_db(&state, move |db| db.update_post(&id, &changes))
        .await?
        .ok_or(ApiError::NotFound("Post"))?;

    info!("Post {} updated by {}", row.id, user.username);
    Ok(Json(resolve_one(&state, row).await?))
}

/// DELETE /api/posts/{id}
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Extension(user): Extension<AuthUser>,
) -> ApiResult<StatusCode> {
    let post_id = id.clone();
    let deleted = with_db(&state, move |db| db.delete_post(&post_id)).await?;
    if !deleted {
        return Err(ApiError::NotFound("Post"));
    }

    info!("Post {} deleted by {}", id, user.username);
    Ok(StatusCode::NO_CONTENT)
}

/// Attach each post's current category. A reference to a category that no
/// longer exists resolves to `None`.
async fn resolve(state: &AppState, rows: Vec<PostRow>) -> ApiResult<Vec<Post>> {
    let mut ids: Vec<String> = rows.iter().map(|r| r.category_id.clone()).collect();
    ids.sort();
    ids.dedup();

    let categories = with_db(state, move |db| db.get_categories_by_ids(&ids)).await?;
    let by_id: HashMap<String, PostCategory> = categories
        .into_iter()
        .map(|row| {
            let id = row.id.clone();
            (id, PostCategory::from(&convert::category(row)))
        })
        .collect();

    Ok(rows
        .into_iter()
        .map(|row| {
            let category = by_id.get(&row.category_id).cloned();
            convert::post(row, category)
        })
        .collect())
}

async fn resolve_one(state: &AppState, row: PostRow) -> ApiResult<Post> {
    resolve(state, vec![row])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Upstream("post vanished during resolution".into()))
}
