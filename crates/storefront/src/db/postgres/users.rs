//! User queries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

use rigshop_core::{Email, UserId, UserRole};

use super::{PgStore, count, unique_violation};
use crate::db::{RepositoryError, UserCredentials, UserRepository};
use crate::models::{NewUser, User, UserUpdate};

const USER_COLUMNS: &str = "id, email, name, role, created_at, updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    email: String,
    name: String,
    role: UserRole,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            name: row.name,
            role: row.role,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Fail with `Conflict` unless another admin besides `id` remains.
///
/// Locks every admin row so two concurrent demotions cannot both pass.
async fn ensure_other_admin(
    conn: &mut PgConnection,
    id: UserId,
    message: &str,
) -> Result<(), RepositoryError> {
    let admins: Vec<i32> =
        sqlx::query_scalar("SELECT id FROM users WHERE role = 'admin' ORDER BY id FOR UPDATE")
            .fetch_all(conn)
            .await?;

    if admins.iter().any(|&admin| admin != id.as_i32()) {
        Ok(())
    } else {
        Err(RepositoryError::Conflict(message.to_owned()))
    }
}

async fn lock_role(
    conn: &mut PgConnection,
    id: UserId,
) -> Result<Option<UserRole>, RepositoryError> {
    let role = sqlx::query_scalar("SELECT role FROM users WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(role)
}

// =============================================================================
// Repository
// =============================================================================

#[async_trait]
impl UserRepository for PgStore {
    async fn list_users(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn get_user_credentials(
        &self,
        email: &Email,
    ) -> Result<Option<UserCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, CredentialsRow>(&format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(UserCredentials {
                user: r.user.try_into()?,
                password_hash: r.password_hash,
            })
        })
        .transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            INSERT INTO users (email, name, role, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(user.email.as_str())
        .bind(&user.name)
        .bind(user.role)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| unique_violation(e, "email already exists"))?;

        row.try_into()
    }

    async fn update_user(&self, id: UserId, update: UserUpdate) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = lock_role(&mut tx, id)
            .await?
            .ok_or(RepositoryError::NotFound)?;
        if update.demotes(current) {
            ensure_other_admin(&mut tx, id, "cannot demote the last admin").await?;
        }

        let row = sqlx::query_as::<_, UserRow>(&format!(
            r"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                role = COALESCE($4, role),
                password_hash = COALESCE($5, password_hash),
                updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "
        ))
        .bind(id)
        .bind(update.name.as_deref())
        .bind(update.email.as_ref().map(Email::as_str))
        .bind(update.role)
        .bind(update.password_hash.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "email already exists"))?;

        tx.commit().await?;
        row.try_into()
    }

    async fn delete_user(&self, id: UserId) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let Some(role) = lock_role(&mut tx, id).await? else {
            return Ok(false);
        };
        if role == UserRole::Admin {
            ensure_other_admin(&mut tx, id, "cannot delete the last admin").await?;
        }

        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_users_by_role(&self) -> Result<BTreeMap<UserRole, u64>, RepositoryError> {
        let rows = sqlx::query_as::<_, (UserRole, i64)>(
            "SELECT role, COUNT(*) FROM users GROUP BY role",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(r, n)| (r, count(n))).collect())
    }
}
