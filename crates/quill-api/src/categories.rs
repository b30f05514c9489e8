use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use quill_types::api::CreateCategoryRequest;
use quill_types::models::Category;

use crate::error::ApiResult;
use crate::{AppState, convert, validate, with_db};

pub async fn list_categories(State(state): State<AppState>) -> ApiResult<Json<Vec<Category>>> {
    let rows = with_db(&state, |db| db.list_categories()).await?;
    Ok(Json(rows.into_iter().map(convert::category).collect()))
}

/// Names are not required to be unique.
pub async fn create_category(
    State(state): State<AppState>,
    payload: Result<Json<CreateCategoryRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(req) = payload?;
    validate::required("name", &req.name)?;

    let id = Uuid::new_v4().to_string();
    let name = req.name.trim().to_string();
    let row = with_db(&state, move |db| db.create_category(&id, &name)).await?;

    info!("Category '{}' created", row.name);
    Ok((StatusCode::CREATED, Json(convert::category(row))))
}
