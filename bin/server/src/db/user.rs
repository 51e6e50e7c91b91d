//! User store backed by the `users` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use latchkey_core::{Result, UserId};
use latchkey_identity::{Role, StoreError, User, UserStore, WriteOutcome};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

use super::{query_error, write_outcome};

const USER_COLUMNS: &str = "id, external_id, thumbnail, first_name, last_name, email, \
     password_hash, role, blocked, verified, created_at, updated_at";

/// Row type for user queries.
#[derive(FromRow)]
struct UserRow {
    id: String,
    external_id: Option<String>,
    thumbnail: Option<String>,
    first_name: String,
    last_name: Option<String>,
    email: String,
    password_hash: Option<String>,
    role: String,
    blocked: bool,
    verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn try_into_user(self) -> std::result::Result<User, StoreError> {
        let id = UserId::from_str(&self.id).map_err(|e| StoreError::Decode {
            record: "user".to_string(),
            reason: format!("invalid user id '{}': {e}", self.id),
        })?;
        let role = Role::from_str(&self.role).map_err(|reason| StoreError::Decode {
            record: "user".to_string(),
            reason,
        })?;

        Ok(User::with_all_fields(
            id,
            self.external_id,
            self.thumbnail,
            self.first_name,
            self.last_name,
            self.email,
            self.password_hash,
            role,
            self.blocked,
            self.verified,
            self.created_at,
            self.updated_at,
        ))
    }
}

/// User store backed by PostgreSQL.
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    /// Creates a new user store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_one(&self, filter: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}");
        let row: Option<UserRow> = sqlx::query_as(&sql)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(query_error)?;

        match row {
            Some(r) => Ok(Some(r.try_into_user()?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        self.find_one("id = $1", &id.to_string()).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email = $1", email).await
    }

    async fn find_active_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<Option<User>, StoreError> {
        self.find_one("external_id = $1 AND NOT blocked", external_id)
            .await
    }

    async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("email = $1 AND NOT blocked", email).await
    }

    async fn insert(&self, user: &User) -> Result<WriteOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, external_id, thumbnail, first_name, last_name, email,
                               password_hash, role, blocked, verified, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.external_id())
        .bind(user.thumbnail())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.role().as_str())
        .bind(user.is_blocked())
        .bind(user.is_verified())
        .bind(user.created_at())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await;

        write_outcome(result)
    }

    async fn update(&self, user: &User) -> Result<WriteOutcome, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET external_id = $2, thumbnail = $3, first_name = $4, last_name = $5,
                email = $6, password_hash = $7, role = $8, blocked = $9, verified = $10,
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(user.id().to_string())
        .bind(user.external_id())
        .bind(user.thumbnail())
        .bind(user.first_name())
        .bind(user.last_name())
        .bind(user.email())
        .bind(user.password_hash())
        .bind(user.role().as_str())
        .bind(user.is_blocked())
        .bind(user.is_verified())
        .bind(user.updated_at())
        .execute(&self.pool)
        .await;

        write_outcome(result)
    }
}
