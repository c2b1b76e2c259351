//! Account management.

use rigshop_core::UserRole;
use rigshop_storefront::services::auth::AuthService;

use super::{CommandError, open_configured_store};

/// Create an account with the given role.
///
/// # Errors
///
/// Returns `CommandError::InvalidRole` for an unknown role, or an account
/// error for a bad email, weak password or duplicate address.
pub async fn create(email: &str, name: &str, password: &str, role: &str) -> Result<(), CommandError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| CommandError::InvalidRole(role.to_owned()))?;

    let store = open_configured_store().await?;
    let user = AuthService::new(store.as_ref())
        .create_account(email, name, password, role)
        .await?;

    tracing::info!(
        "User created successfully! ID: {}, Email: {}, Role: {}",
        user.id,
        user.email,
        user.role
    );
    Ok(())
}
