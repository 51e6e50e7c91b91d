//! Error types for the identity crate.
//!
//! Two kinds of failure leave this crate:
//! - `StoreError`: the user or session store could not be reached or returned
//!   unreadable data. Carried as `Report<StoreError>` and treated as fatal by
//!   callers.
//! - `LinkFailure`: an expected outcome of resolving an external profile
//!   (the account exists, is missing, is blocked or is linked elsewhere). These are values, not
//!   errors, and are shown to the user once.

use std::fmt;

/// Errors from user and session storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store rejected or failed a query.
    Query { details: String },
    /// A stored record could not be decoded into a domain type.
    Decode { record: String, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Query { details } => write!(f, "store query failed: {details}"),
            Self::Decode { record, reason } => {
                write!(f, "failed to decode stored {record}: {reason}")
            }
        }
    }
}

impl std::error::Error for StoreError {}

/// Reasons an external profile could not be turned into an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkFailure {
    /// Signup for an email whose account already has an external identity.
    AlreadyExists,
    /// Login found no account, or only a blocked one.
    ///
    /// Blocked and missing accounts are indistinguishable.
    NotFoundOrBlocked,
    /// Another signup for the same email or identity won the race.
    ConcurrentSignupConflict,
    /// Login matched an account by email that is linked to a different
    /// external identity. The existing link is left untouched.
    LinkedToOtherIdentity,
    /// The provider asserted an identity without any verified email address.
    MissingEmail,
}

impl LinkFailure {
    /// Returns the message shown to the user on the next page view.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::AlreadyExists => "user already exists, please log in",
            Self::NotFoundOrBlocked => "user does not exist or is blocked, please sign up",
            Self::ConcurrentSignupConflict => {
                "an account for this email is already being created, please log in"
            }
            Self::LinkedToOtherIdentity => {
                "this account is linked to a different Google account"
            }
            Self::MissingEmail => "your account did not share a verified email address",
        }
    }
}

impl fmt::Display for LinkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
