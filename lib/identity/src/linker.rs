//! Reconciles external profiles with local accounts.
//!
//! The linker decides, for a signup or login attempt, which local account
//! the provider's profile belongs to, creating or linking accounts where the
//! flow allows it. Expected refusals come back as `LinkOutcome::Rejected`;
//! only store failures are errors.

use latchkey_core::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::{LinkFailure, StoreError};
use crate::profile::{ExternalProfile, FlowIntent};
use crate::store::{UserStore, WriteOutcome};
use crate::user::User;

/// How an authenticated user was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkDisposition {
    /// A new account was created.
    Created,
    /// An existing account was linked to the external identity.
    Linked,
    /// The account was already linked; nothing changed.
    Existing,
}

impl fmt::Display for LinkDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Linked => "linked",
            Self::Existing => "existing",
        })
    }
}

/// Result of resolving an external profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The profile resolved to a usable account.
    Authenticated {
        user: Box<User>,
        disposition: LinkDisposition,
    },
    /// The flow refused the profile.
    Rejected(LinkFailure),
}

impl LinkOutcome {
    fn authenticated(user: User, disposition: LinkDisposition) -> Self {
        Self::Authenticated {
            user: Box::new(user),
            disposition,
        }
    }
}

/// Resolves external profiles against the user store.
#[derive(Clone)]
pub struct IdentityLinker {
    users: Arc<dyn UserStore>,
}

impl IdentityLinker {
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// Resolves `profile` according to the flow that started the attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if the user store fails.
    #[instrument(skip_all, fields(intent = %intent))]
    pub async fn resolve(
        &self,
        intent: FlowIntent,
        profile: &ExternalProfile,
    ) -> Result<LinkOutcome, StoreError> {
        let Some(email) = profile.primary_email() else {
            debug!("profile carries no email");
            return Ok(LinkOutcome::Rejected(LinkFailure::MissingEmail));
        };

        let outcome = match intent {
            FlowIntent::Signup => self.signup(profile, email).await?,
            FlowIntent::Login => self.login(profile, email).await?,
        };

        match &outcome {
            LinkOutcome::Authenticated { user, disposition } => {
                info!(user_id = %user.id(), disposition = %disposition, "external identity resolved");
            }
            LinkOutcome::Rejected(failure) => {
                debug!(reason = ?failure, "external identity rejected");
            }
        }

        Ok(outcome)
    }

    async fn signup(
        &self,
        profile: &ExternalProfile,
        email: &str,
    ) -> Result<LinkOutcome, StoreError> {
        match self.users.find_by_email(email).await? {
            Some(existing) if existing.is_linked() => {
                Ok(LinkOutcome::Rejected(LinkFailure::AlreadyExists))
            }
            Some(mut existing) => {
                existing.link_for_signup(profile);
                match self.users.update(&existing).await? {
                    WriteOutcome::Applied => {
                        Ok(LinkOutcome::authenticated(existing, LinkDisposition::Linked))
                    }
                    WriteOutcome::Conflict => {
                        Ok(LinkOutcome::Rejected(LinkFailure::ConcurrentSignupConflict))
                    }
                }
            }
            None => {
                let user = User::from_profile(profile, email.to_string());
                match self.users.insert(&user).await? {
                    WriteOutcome::Applied => {
                        Ok(LinkOutcome::authenticated(user, LinkDisposition::Created))
                    }
                    WriteOutcome::Conflict => {
                        Ok(LinkOutcome::Rejected(LinkFailure::ConcurrentSignupConflict))
                    }
                }
            }
        }
    }

    async fn login(
        &self,
        profile: &ExternalProfile,
        email: &str,
    ) -> Result<LinkOutcome, StoreError> {
        if let Some(user) = self
            .users
            .find_active_by_external_id(&profile.external_id)
            .await?
        {
            return Ok(LinkOutcome::authenticated(user, LinkDisposition::Existing));
        }

        let Some(mut user) = self.users.find_active_by_email(email).await? else {
            return Ok(LinkOutcome::Rejected(LinkFailure::NotFoundOrBlocked));
        };

        if user.is_linked() {
            info!(user_id = %user.id(), "email matches an account linked to another identity");
            return Ok(LinkOutcome::Rejected(LinkFailure::LinkedToOtherIdentity));
        }

        user.link_for_login(profile);
        match self.users.update(&user).await? {
            WriteOutcome::Applied => Ok(LinkOutcome::authenticated(user, LinkDisposition::Linked)),
            // The identity belongs to another (blocked) account; say no more than that.
            WriteOutcome::Conflict => Ok(LinkOutcome::Rejected(LinkFailure::NotFoundOrBlocked)),
        }
    }
}
