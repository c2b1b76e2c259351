//! Serves uploaded product images.

use axum::{
    extract::State,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::IntoResponse,
};

use crate::error::Result;
use crate::extract::ApiPath;
use crate::state::AppState;

/// `GET /api/images/{filename}`
pub async fn show(
    State(state): State<AppState>,
    ApiPath(filename): ApiPath<String>,
) -> Result<impl IntoResponse> {
    let (bytes, mime) = state.images().read(&filename).await?;
    Ok((
        [
            (CONTENT_TYPE, mime),
            (CACHE_CONTROL, "public, max-age=31536000"),
            (
                axum::http::HeaderName::from_static("cross-origin-resource-policy"),
                "cross-origin",
            ),
        ],
        bytes,
    ))
}
