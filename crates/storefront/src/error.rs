//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server errors to Sentry
//! before responding to the client. All route handlers return
//! `Result<T, AppError>`; every error body is `{"error": "<message>"}`.

use axum::{
    Json,
    extract::multipart::MultipartError,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use rigshop_core::builder::CatalogError;

use crate::db::RepositoryError;
use crate::models::ValidationError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::checkout::CheckoutError;
use crate::services::images::UploadError;

const INTERNAL_MESSAGE: &str = "Internal server error";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Storage operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Unknown builder slot or component.
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but lacking a permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn internal() -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE.to_string())
}

fn repository_status(err: &RepositoryError) -> (StatusCode, String) {
    match err {
        RepositoryError::NotFound => (StatusCode::NOT_FOUND, "Not found".to_string()),
        RepositoryError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
        _ => internal(),
    }
}

impl AppError {
    /// Status code and the message shown to the client.
    ///
    /// Internal failures get a generic message; details only go to logs.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Self::Repository(err) => repository_status(err),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => {
                    (StatusCode::UNAUTHORIZED, "Invalid credentials".to_string())
                }
                AuthError::InvalidToken | AuthError::UserNotFound => (
                    StatusCode::UNAUTHORIZED,
                    "Authentication required".to_string(),
                ),
                AuthError::UserAlreadyExists => (
                    StatusCode::CONFLICT,
                    "An account with this email already exists".to_string(),
                ),
                AuthError::WeakPassword(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
                AuthError::InvalidEmail(_) => {
                    (StatusCode::BAD_REQUEST, "Invalid email address".to_string())
                }
                AuthError::MissingField(_) => (StatusCode::BAD_REQUEST, err.to_string()),
                AuthError::Repository(inner) => repository_status(inner),
                AuthError::TokenEncoding(_) | AuthError::PasswordHash => internal(),
            },
            Self::Cart(err) => match err {
                CartError::ProductNotFound(_) | CartError::ItemNotInCart => {
                    (StatusCode::NOT_FOUND, err.to_string())
                }
                CartError::OutOfStock(_) => (StatusCode::CONFLICT, err.to_string()),
                CartError::InvalidQuantity | CartError::BuildNotReady(_) => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                CartError::Repository(inner) => repository_status(inner),
            },
            Self::Checkout(err) => match err {
                CheckoutError::InvalidShipping(_) | CheckoutError::EmptyCart => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                CheckoutError::Unavailable(_) => (StatusCode::CONFLICT, err.to_string()),
                CheckoutError::Repository(inner) => repository_status(inner),
            },
            Self::Upload(err) => match err {
                UploadError::Empty | UploadError::InvalidType | UploadError::InvalidName => {
                    (StatusCode::BAD_REQUEST, err.to_string())
                }
                UploadError::TooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, err.to_string()),
                UploadError::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
                UploadError::Io(_) => internal(),
            },
            Self::Catalog(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            Self::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            Self::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests".to_string(),
            ),
            Self::Internal(_) => internal(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::BadRequest(err.body_text())
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
///
/// Call this on logout to stop associating errors with the user.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a user action.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added product", Some(&[("product_id", "12")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rigshop_core::ProductId;

    use super::*;

    fn status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    async fn body(err: AppError) -> serde_json::Value {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(status(AppError::NotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status(AppError::Unauthorized("x".into())), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AppError::Forbidden("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(status(AppError::BadRequest("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(AppError::Conflict("x".into())), StatusCode::CONFLICT);
        assert_eq!(
            status(AppError::PayloadTooLarge("x".into())),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(status(AppError::RateLimited), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            status(AppError::Internal("x".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_domain_error_status_codes() {
        assert_eq!(status(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::UserAlreadyExists), StatusCode::CONFLICT);
        assert_eq!(status(AuthError::MissingField("name")), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(CartError::ProductNotFound(ProductId::new(3))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(CartError::InvalidQuantity), StatusCode::BAD_REQUEST);
        assert_eq!(status(CheckoutError::EmptyCart), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(CheckoutError::Unavailable("gone".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(UploadError::TooLarge { limit: 1 }),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(status(UploadError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status(RepositoryError::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(RepositoryError::Conflict("last admin".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(RepositoryError::DataCorruption("bad row".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(AuthError::Repository(RepositoryError::Conflict("dup".into()))),
            StatusCode::CONFLICT
        );
    }

    #[tokio::test]
    async fn test_error_body_is_json() {
        let value = body(AppError::Conflict("email taken".into())).await;
        assert_eq!(value, json!({ "error": "email taken" }));
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let value = body(AppError::Repository(RepositoryError::DataCorruption(
            "users.json: expected value at line 1".into(),
        )))
        .await;
        assert_eq!(value, json!({ "error": "Internal server error" }));
    }
}
