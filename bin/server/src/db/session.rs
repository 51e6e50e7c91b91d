//! Session store backed by the `sessions` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use latchkey_core::{Result, SessionId};
use latchkey_identity::{Principal, Session, SessionStore, StoreError};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

use super::query_error;

/// Row type for session queries.
#[derive(FromRow)]
struct SessionRow {
    id: String,
    principal: Option<serde_json::Value>,
    flash_error: Option<String>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl SessionRow {
    fn try_into_session(self) -> std::result::Result<Session, StoreError> {
        let id = SessionId::from_str(&self.id).map_err(|e| StoreError::Decode {
            record: "session".to_string(),
            reason: format!("invalid session id '{}': {e}", self.id),
        })?;
        let principal = self
            .principal
            .map(serde_json::from_value::<Principal>)
            .transpose()
            .map_err(|e| StoreError::Decode {
                record: "session".to_string(),
                reason: format!("invalid principal: {e}"),
            })?;

        Ok(Session::with_all_fields(
            id,
            principal,
            self.flash_error,
            self.created_at,
            self.expires_at,
        ))
    }
}

/// Session store backed by PostgreSQL.
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    /// Creates a new session store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn load(&self, id: SessionId) -> Result<Option<Session>, StoreError> {
        let row: Option<SessionRow> = sqlx::query_as(
            r#"
            SELECT id, principal, flash_error, created_at, expires_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        match row {
            Some(r) => Ok(Some(r.try_into_session()?)),
            None => Ok(None),
        }
    }

    async fn save(&self, session: &Session) -> Result<(), StoreError> {
        let principal = session
            .principal()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| StoreError::Query {
                details: format!("failed to encode principal: {e}"),
            })?;

        sqlx::query(
            r#"
            INSERT INTO sessions (id, principal, flash_error, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
            SET principal = EXCLUDED.principal,
                flash_error = EXCLUDED.flash_error,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(session.id().to_string())
        .bind(principal)
        .bind(session.flash_error())
        .bind(session.created_at())
        .bind(session.expires_at())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn delete(&self, id: SessionId) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM sessions
            WHERE expires_at <= NOW()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(result.rows_affected())
    }
}
