use std::path::{Path, PathBuf};

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
    response::IntoResponse,
};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use uuid::Uuid;

use quill_types::api::UploadResponse;

use crate::AppState;
use crate::error::{ApiError, ApiResult};

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// URL prefix under which stored images are served.
pub const PUBLIC_PREFIX: &str = "/uploads";

/// Flat directory of uploaded images, each stored as `{uuid}.{ext}`.
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub async fn new(dir: PathBuf) -> std::io::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Upload directory: {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` under a fresh name and return that name.
    pub async fn save(&self, original_name: Option<&str>, data: &[u8]) -> std::io::Result<String> {
        let name = match original_name.and_then(safe_extension) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };

        let path = self.dir.join(&name);
        let mut file = fs::File::create(&path).await?;
        file.write_all(data).await?;
        file.flush().await?;

        Ok(name)
    }

    pub fn public_url(name: &str) -> String {
        format!("{}/{}", PUBLIC_PREFIX, name)
    }
}

/// Lowercased extension of `file_name` if it is short and alphanumeric.
fn safe_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// POST /api/upload: multipart form with an `image` field.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<impl IntoResponse> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let original_name = field.file_name().map(str::to_string);
        let data = field.bytes().await?;
        if data.is_empty() {
            return Err(ApiError::validation("No file uploaded"));
        }

        let name = state
            .uploads
            .save(original_name.as_deref(), &data)
            .await
            .map_err(|e| {
                error!("Failed to store upload: {}", e);
                ApiError::Upstream(e.to_string())
            })?;

        info!("Stored upload {} ({} bytes)", name, data.len());
        return Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                url: UploadStore::public_url(&name),
            }),
        ));
    }

    Err(ApiError::validation("No file uploaded"))
}
