//! PostgreSQL stores for users and sessions.
//!
//! Uniqueness of emails and external ids is enforced by unique indexes;
//! violations surface as `WriteOutcome::Conflict`.

pub mod session;
pub mod user;

pub use session::PgSessionStore;
pub use user::PgUserStore;

use latchkey_identity::{StoreError, WriteOutcome};
use sqlx::postgres::PgQueryResult;

/// Wraps a driver error for the identity crate.
fn query_error(err: sqlx::Error) -> StoreError {
    StoreError::Query {
        details: err.to_string(),
    }
}

/// Maps the result of an insert or update, turning unique violations into
/// `WriteOutcome::Conflict`.
fn write_outcome(
    result: Result<PgQueryResult, sqlx::Error>,
) -> latchkey_core::Result<WriteOutcome, StoreError> {
    match result {
        Ok(_) => Ok(WriteOutcome::Applied),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            Ok(WriteOutcome::Conflict)
        }
        Err(e) => Err(query_error(e).into()),
    }
}
