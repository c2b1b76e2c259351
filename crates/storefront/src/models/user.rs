//! User domain types.
//!
//! `User` is what leaves the storage layer by default. The password hash is
//! only handed out by `UserRepository::get_user_credentials`, so it cannot
//! end up in a response by accident.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rigshop_core::{Email, UserId, UserRole};

/// A shop account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for creating an account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: Email,
    pub name: String,
    pub role: UserRole,
    pub password_hash: String,
}

/// A partial account update.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub role: Option<UserRole>,
    pub password_hash: Option<String>,
}

impl UserUpdate {
    /// Whether applying this update could take admin rights away.
    #[must_use]
    pub fn demotes(&self, current: UserRole) -> bool {
        current == UserRole::Admin && self.role.is_some_and(|r| r != UserRole::Admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demotes() {
        let to_manager = UserUpdate {
            role: Some(UserRole::Manager),
            ..UserUpdate::default()
        };
        assert!(to_manager.demotes(UserRole::Admin));
        assert!(!to_manager.demotes(UserRole::User));

        let rename = UserUpdate {
            name: Some("New Name".to_owned()),
            ..UserUpdate::default()
        };
        assert!(!rename.demotes(UserRole::Admin));
    }
}
