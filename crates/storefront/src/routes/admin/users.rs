//! Account management. Admins only.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;

use rigshop_core::{Email, UserId, UserRole};

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::RequireAdmin;
use crate::models::{User, UserUpdate};
use crate::services::auth::{AuthError, AuthService, hash_password, validate_password};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<UserRole>,
    pub password: Option<String>,
}

impl UpdateUserRequest {
    /// Validate the sent fields and hash a new password.
    ///
    /// # Errors
    ///
    /// Returns `AppError` for a blank name, a malformed email or a weak
    /// password.
    pub fn into_update(self) -> Result<UserUpdate> {
        let name = match self.name {
            Some(name) if name.trim().is_empty() => {
                return Err(AuthError::MissingField("name").into());
            }
            Some(name) => Some(name.trim().to_owned()),
            None => None,
        };
        let email = self
            .email
            .map(|e| Email::parse(&e))
            .transpose()
            .map_err(AuthError::from)?;
        let password_hash = match self.password {
            Some(password) => {
                validate_password(&password)?;
                Some(hash_password(&password)?)
            }
            None => None,
        };

        Ok(UserUpdate {
            name,
            email,
            role: self.role,
            password_hash,
        })
    }
}

#[instrument(skip_all)]
pub async fn index(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
) -> Result<Json<Vec<User>>> {
    Ok(Json(state.store().list_users().await?))
}

#[instrument(skip(state, admin, request), fields(by = %admin.id, role = %request.role))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.store())
        .create_account(&request.email, &request.name, &request.password, request.role)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(state, admin, request), fields(by = %admin.id))]
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
    ApiJson(request): ApiJson<UpdateUserRequest>,
) -> Result<Json<User>> {
    let update = request.into_update()?;
    let user = state
        .store()
        .update_user(id, update)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => AppError::NotFound(format!("user {id} not found")),
            other => other.into(),
        })?;
    tracing::info!(user_id = %user.id, role = %user.role, "User updated");
    Ok(Json(user))
}

#[instrument(skip(state, admin), fields(by = %admin.id))]
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ApiPath(id): ApiPath<UserId>,
) -> Result<Json<Value>> {
    if id == admin.id {
        return Err(AppError::BadRequest(
            "You cannot delete your own account".to_string(),
        ));
    }
    if !state.store().delete_user(id).await? {
        return Err(AppError::NotFound(format!("user {id} not found")));
    }
    tracing::info!(user_id = %id, "User deleted");
    Ok(Json(json!({ "success": true })))
}
