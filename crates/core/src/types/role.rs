//! User roles and the permissions they grant.

use serde::{Deserialize, Serialize};

/// Account role.
///
/// Roles are ordered by privilege: `User < Manager < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// A shopper.
    #[default]
    User,
    /// Runs the catalog and fulfils orders.
    Manager,
    /// Full access, including account management.
    Admin,
}

/// Something a role may be allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    ViewProducts,
    PlaceOrders,
    ViewOwnOrders,
    ManageProducts,
    ManageOrders,
    ManageUsers,
    AccessAdmin,
}

impl UserRole {
    /// Whether this role grants `permission`.
    #[must_use]
    pub const fn has_permission(self, permission: Permission) -> bool {
        match permission {
            Permission::ViewProducts | Permission::PlaceOrders | Permission::ViewOwnOrders => true,
            Permission::ManageProducts | Permission::ManageOrders | Permission::AccessAdmin => {
                matches!(self, Self::Manager | Self::Admin)
            }
            Permission::ManageUsers => matches!(self, Self::Admin),
        }
    }

    /// Resolve the role of a stored account record.
    ///
    /// Records written before roles existed only carry an `is_admin` flag.
    #[must_use]
    pub fn from_legacy(role: Option<Self>, is_admin: Option<bool>) -> Self {
        role.unwrap_or(if is_admin == Some(true) {
            Self::Admin
        } else {
            Self::User
        })
    }

    /// The wire name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Manager => "manager",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "manager" => Ok(Self::Manager),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid user role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_table() {
        use Permission::*;

        for role in [UserRole::User, UserRole::Manager, UserRole::Admin] {
            assert!(role.has_permission(ViewProducts));
            assert!(role.has_permission(PlaceOrders));
            assert!(role.has_permission(ViewOwnOrders));
        }

        for permission in [ManageProducts, ManageOrders, AccessAdmin] {
            assert!(!UserRole::User.has_permission(permission));
            assert!(UserRole::Manager.has_permission(permission));
            assert!(UserRole::Admin.has_permission(permission));
        }

        assert!(!UserRole::User.has_permission(ManageUsers));
        assert!(!UserRole::Manager.has_permission(ManageUsers));
        assert!(UserRole::Admin.has_permission(ManageUsers));
    }

    #[test]
    fn test_legacy_fallback() {
        assert_eq!(UserRole::from_legacy(None, Some(true)), UserRole::Admin);
        assert_eq!(UserRole::from_legacy(None, Some(false)), UserRole::User);
        assert_eq!(UserRole::from_legacy(None, None), UserRole::User);
        assert_eq!(
            UserRole::from_legacy(Some(UserRole::Manager), Some(true)),
            UserRole::Manager
        );
    }

    #[test]
    fn test_roundtrip_str() {
        for role in [UserRole::User, UserRole::Manager, UserRole::Admin] {
            assert_eq!(role.to_string().parse::<UserRole>().unwrap(), role);
        }
        assert!("super_admin".parse::<UserRole>().is_err());
    }
}
