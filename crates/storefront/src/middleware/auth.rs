//! Authentication extractors.
//!
//! Clients authenticate with `Authorization: Bearer <token>`.
//! [`RequireAuth`] and [`OptionalAuth`] trust the token's claims.
//! [`RequireAccount`] and the staff extractors re-read the account from the
//! store, so a deleted account or a changed role takes effect before the
//! token expires.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use serde::Serialize;

use rigshop_core::{Permission, UserId, UserRole};

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::services::auth::{AuthError, Claims, bearer_token};
use crate::state::AppState;

/// The caller as described by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    pub role: UserRole,
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Verify the bearer token of a request, if one was sent.
fn verified_claims(parts: &Parts, state: &AppState) -> Option<Result<Claims, AuthError>> {
    let header = parts.headers.get(AUTHORIZATION)?;
    let token = header.to_str().ok().and_then(bearer_token);
    Some(token.map_or(Err(AuthError::InvalidToken), |t| state.tokens().verify(t)))
}

/// Reject unless `role` grants `permission`.
///
/// # Errors
///
/// Returns `AppError::Forbidden` when the permission is missing.
pub fn require_permission(role: UserRole, permission: Permission) -> Result<(), AppError> {
    if role.has_permission(permission) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Insufficient permissions".to_string()))
    }
}

/// Extractor that requires a valid bearer token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let claims = match verified_claims(parts, state) {
            Some(Ok(claims)) => claims,
            Some(Err(_)) | None => {
                return Err(AppError::Unauthorized("Authentication required".to_string()));
            }
        };

        set_sentry_user(&claims.sub, Some(&claims.email));
        Ok(Self(claims.into()))
    }
}

/// Extractor for the caller when signed in.
///
/// A missing, malformed or expired token is treated as a guest.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = verified_claims(parts, state)
            .and_then(Result::ok)
            .map(AuthUser::from);
        Ok(Self(user))
    }
}

/// Extractor for a caller whose account still exists, as stored now.
///
/// Used where acting on a deleted account would write orphaned data.
#[derive(Debug, Clone)]
pub struct RequireAccount(pub User);

impl FromRequestParts<AppState> for RequireAccount {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireAuth(auth) = RequireAuth::from_request_parts(parts, state).await?;
        let user = state
            .store()
            .get_user(auth.id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;
        Ok(Self(user))
    }
}

/// Extractor for back-office staff: managers and admins.
#[derive(Debug, Clone)]
pub struct RequireStaff(pub User);

impl FromRequestParts<AppState> for RequireStaff {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireAccount(user) = RequireAccount::from_request_parts(parts, state).await?;
        require_permission(user.role, Permission::AccessAdmin)?;
        Ok(Self(user))
    }
}

/// Extractor for account management: admins only.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub User);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let RequireAccount(user) = RequireAccount::from_request_parts(parts, state).await?;
        require_permission(user.role, Permission::ManageUsers)?;
        Ok(Self(user))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        routing::get,
    };
    use rigshop_core::Email;
    use tower::ServiceExt;

    use super::*;
    use crate::models::{NewUser, UserUpdate};

    fn app(state: AppState) -> Router {
        Router::new()
            .route("/me", get(|RequireAuth(user): RequireAuth| async move { user.email }))
            .route(
                "/maybe",
                get(|OptionalAuth(user): OptionalAuth| async move {
                    user.map_or_else(|| "guest".to_owned(), |u| u.email)
                }),
            )
            .route("/account", get(|RequireAccount(user): RequireAccount| async move { user.name }))
            .route("/staff", get(|RequireStaff(user): RequireStaff| async move { user.name }))
            .route("/admin", get(|RequireAdmin(user): RequireAdmin| async move { user.name }))
            .with_state(state)
    }

    async fn call(app: &Router, path: &str, token: Option<&str>) -> StatusCode {
        let mut request = Request::builder().uri(path);
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        app.clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    async fn account(state: &AppState, email: &str, role: UserRole) -> (User, String) {
        let user = state
            .store()
            .create_user(NewUser {
                email: Email::parse(email).unwrap(),
                name: email.to_owned(),
                role,
                password_hash: "unused".to_owned(),
            })
            .await
            .unwrap();
        let token = state.tokens().issue(&user).unwrap();
        (user, token)
    }

    #[test]
    fn test_require_permission() {
        assert!(require_permission(UserRole::Manager, Permission::ManageProducts).is_ok());
        assert!(matches!(
            require_permission(UserRole::Manager, Permission::ManageUsers),
            Err(AppError::Forbidden(_))
        ));
        assert!(require_permission(UserRole::User, Permission::PlaceOrders).is_ok());
    }

    #[tokio::test]
    async fn test_bearer_extractors() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        let (_, token) = account(&state, "shopper@example.com", UserRole::User).await;
        let app = app(state);

        assert_eq!(call(&app, "/me", Some(&token)).await, StatusCode::OK);
        assert_eq!(call(&app, "/me", None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(call(&app, "/me", Some("forged")).await, StatusCode::UNAUTHORIZED);
        assert_eq!(call(&app, "/maybe", Some("forged")).await, StatusCode::OK);
        assert_eq!(call(&app, "/staff", Some(&token)).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_staff_extractors_reread_the_account() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::for_tests(dir.path()).await;
        let (_, admin_token) = account(&state, "root@example.com", UserRole::Admin).await;
        let (manager, manager_token) =
            account(&state, "boss@example.com", UserRole::Manager).await;
        let app = app(state.clone());

        assert_eq!(call(&app, "/staff", Some(&manager_token)).await, StatusCode::OK);
        assert_eq!(call(&app, "/admin", Some(&manager_token)).await, StatusCode::FORBIDDEN);
        assert_eq!(call(&app, "/admin", Some(&admin_token)).await, StatusCode::OK);

        state
            .store()
            .update_user(
                manager.id,
                UserUpdate {
                    role: Some(UserRole::User),
                    ..UserUpdate::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(call(&app, "/staff", Some(&manager_token)).await, StatusCode::FORBIDDEN);

        assert_eq!(call(&app, "/account", Some(&manager_token)).await, StatusCode::OK);
        state.store().delete_user(manager.id).await.unwrap();
        assert_eq!(
            call(&app, "/staff", Some(&manager_token)).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            call(&app, "/account", Some(&manager_token)).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
