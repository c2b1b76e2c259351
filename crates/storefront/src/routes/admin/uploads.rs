//! Standalone image upload for the product editor.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use tracing::instrument;

use rigshop_core::Permission;

use crate::error::{AppError, Result};
use crate::middleware::{RequireStaff, require_permission};
use crate::services::images::{StoredImage, UploadError};
use crate::state::AppState;

/// Store the first file part (`file` or `image`) and return its URL.
#[instrument(skip_all, fields(by = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireStaff(user): RequireStaff,
    multipart: std::result::Result<Multipart, axum::extract::multipart::MultipartRejection>,
) -> Result<(StatusCode, Json<StoredImage>)> {
    require_permission(user.role, Permission::ManageProducts)?;
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;

    while let Some(field) = multipart.next_field().await? {
        if !matches!(field.name(), Some("file" | "image")) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_owned();
        let bytes = field.bytes().await?;
        let stored = state.images().save(&file_name, &bytes).await?;
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(UploadError::Empty.into())
}
