//! User domain type.
//!
//! A `User` is one local account. Accounts are matched to the external
//! identity provider by `external_id` once linked, and by email before that.

use chrono::{DateTime, Utc};
use latchkey_core::UserId;
use serde::{Deserialize, Serialize};

use crate::profile::ExternalProfile;
use crate::role::Role;

/// A local account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Internal account ID.
    id: UserId,
    /// Identifier assigned by the external identity provider, once linked.
    external_id: Option<String>,
    /// Profile picture URL.
    thumbnail: Option<String>,
    /// First name; empty when unknown.
    first_name: String,
    last_name: Option<String>,
    /// Primary, human-facing identifier.
    email: String,
    /// Password hash for accounts created outside the identity provider.
    password_hash: Option<String>,
    role: Role,
    /// Blocked accounts are invisible to login.
    blocked: bool,
    /// Set whenever the identity provider has vouched for the email.
    verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl User {
    /// Creates an unlinked, unverified account.
    #[must_use]
    pub fn new(email: String, first_name: String) -> Self {
        let now = Utc::now();
        Self {
            id: UserId::new(),
            external_id: None,
            thumbnail: None,
            first_name,
            last_name: None,
            email,
            password_hash: None,
            role: Role::default(),
            blocked: false,
            verified: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Creates a verified account from an external profile asserting `email`.
    #[must_use]
    pub fn from_profile(profile: &ExternalProfile, email: String) -> Self {
        let (first_name, last_name) = profile.name_parts();
        let mut user = Self::new(email, first_name);
        user.last_name = last_name;
        user.external_id = Some(profile.external_id.clone());
        user.thumbnail = profile.primary_photo().map(str::to_string);
        user.verified = true;
        user
    }

    /// Creates a user with all fields specified.
    ///
    /// Use this when reconstituting a user from storage.
    #[must_use]
    #[expect(clippy::too_many_arguments)]
    pub fn with_all_fields(
        id: UserId,
        external_id: Option<String>,
        thumbnail: Option<String>,
        first_name: String,
        last_name: Option<String>,
        email: String,
        password_hash: Option<String>,
        role: Role,
        blocked: bool,
        verified: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            external_id,
            thumbnail,
            first_name,
            last_name,
            email,
            password_hash,
            role,
            blocked,
            verified,
            created_at,
            updated_at,
        }
    }

    #[must_use]
    pub fn id(&self) -> UserId {
        self.id
    }

    #[must_use]
    pub fn external_id(&self) -> Option<&str> {
        self.external_id.as_deref()
    }

    /// Returns true once an external identity has been attached.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.external_id.is_some()
    }

    #[must_use]
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    #[must_use]
    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    #[must_use]
    pub fn password_hash(&self) -> Option<&str> {
        self.password_hash.as_deref()
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    #[must_use]
    pub fn is_verified(&self) -> bool {
        self.verified
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Links an unlinked account during signup.
    ///
    /// Takes over the provider's name and photo, and marks the email verified.
    pub fn link_for_signup(&mut self, profile: &ExternalProfile) {
        let (first_name, last_name) = profile.name_parts();
        self.external_id = Some(profile.external_id.clone());
        self.thumbnail = profile.primary_photo().map(str::to_string);
        self.first_name = first_name;
        self.last_name = last_name;
        self.verified = true;
        self.updated_at = Utc::now();
    }

    /// Links an existing account during login.
    ///
    /// Only the identity and photo are taken over; local names are kept.
    pub fn link_for_login(&mut self, profile: &ExternalProfile) {
        self.external_id = Some(profile.external_id.clone());
        self.thumbnail = profile.primary_photo().map(str::to_string);
        self.verified = true;
        self.updated_at = Utc::now();
    }

    /// Sets the password hash for a non-external account.
    pub fn set_password_hash(&mut self, password_hash: Option<String>) {
        self.password_hash = password_hash;
        self.updated_at = Utc::now();
    }

    /// Blocks or unblocks the account.
    pub fn set_blocked(&mut self, blocked: bool) {
        self.blocked = blocked;
        self.updated_at = Utc::now();
    }

    pub fn set_role(&mut self, role: Role) {
        self.role = role;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ExternalProfile {
        ExternalProfile::new("g1", "a@x.com")
            .with_name(Some("Ada".to_string()), Some("Lovelace".to_string()))
            .with_photo(Some("https://img/ada".to_string()))
    }

    #[test]
    fn new_user_has_defaults() {
        let user = User::new("a@x.com".to_string(), String::new());

        assert!(user.id().to_string().starts_with("usr_"));
        assert!(!user.is_linked());
        assert!(!user.is_verified());
        assert!(!user.is_blocked());
        assert_eq!(user.role(), Role::User);
        assert_eq!(user.first_name(), "");
        assert_eq!(user.created_at(), user.updated_at());
    }

    #[test]
    fn from_profile_is_linked_and_verified() {
        let user = User::from_profile(&profile(), "a@x.com".to_string());

        assert_eq!(user.external_id(), Some("g1"));
        assert_eq!(user.email(), "a@x.com");
        assert_eq!(user.first_name(), "Ada");
        assert_eq!(user.last_name(), Some("Lovelace"));
        assert_eq!(user.thumbnail(), Some("https://img/ada"));
        assert!(user.is_verified());
    }

    #[test]
    fn link_for_signup_takes_over_names() {
        let mut user = User::new("a@x.com".to_string(), "Old".to_string());
        let before = user.updated_at();
        std::thread::sleep(std::time::Duration::from_millis(1));

        user.link_for_signup(&profile());

        assert_eq!(user.external_id(), Some("g1"));
        assert_eq!(user.first_name(), "Ada");
        assert!(user.is_verified());
        assert!(user.updated_at() > before);
    }

    #[test]
    fn link_for_login_keeps_local_names() {
        let mut user = User::new("a@x.com".to_string(), "Local".to_string());
        user.set_password_hash(Some("$argon2id$...".to_string()));

        user.link_for_login(&profile());

        assert_eq!(user.external_id(), Some("g1"));
        assert_eq!(user.thumbnail(), Some("https://img/ada"));
        assert_eq!(user.first_name(), "Local");
        assert!(user.password_hash().is_some());
        assert!(user.is_verified());
    }

    #[test]
    fn user_serialization_roundtrip() {
        let mut user = User::from_profile(&profile(), "a@x.com".to_string());
        user.set_role(Role::Admin);

        let json = serde_json::to_string(&user).expect("serialize");
        let parsed: User = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(user, parsed);
    }
}
