//! External identity assertions and flow intents.
//!
//! An `ExternalProfile` is what the identity provider vouches for after a
//! successful authorization-code exchange. The `FlowIntent` records whether
//! the browser started from the signup or the login entry point.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which entry point started an authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowIntent {
    /// Create an account, or link an unlinked one with the same email.
    Signup,
    /// Sign in to an existing, non-blocked account.
    Login,
}

impl FlowIntent {
    /// Returns the path segment used in entry and callback routes.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Signup => "signup",
            Self::Login => "login",
        }
    }
}

impl fmt::Display for FlowIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowIntent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signup" => Ok(Self::Signup),
            "login" => Ok(Self::Login),
            other => Err(format!("unknown flow intent '{other}'")),
        }
    }
}

/// Profile asserted by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    /// The provider's stable identifier for the account (`sub`).
    pub external_id: String,
    /// Email addresses; the first one is used.
    pub emails: Vec<String>,
    /// Profile photo URLs; the first one is used.
    pub photos: Vec<String>,
    /// Given name, if the provider shared it.
    pub given_name: Option<String>,
    /// Family name, if the provider shared it.
    pub family_name: Option<String>,
    /// Full display name, if the provider shared it.
    pub display_name: Option<String>,
}

impl ExternalProfile {
    /// Creates a profile with the provider id and primary email.
    #[must_use]
    pub fn new(external_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            emails: vec![email.into()],
            photos: Vec::new(),
            given_name: None,
            family_name: None,
            display_name: None,
        }
    }

    /// Adds a photo URL.
    #[must_use]
    pub fn with_photo(mut self, photo: Option<String>) -> Self {
        self.photos.extend(photo);
        self
    }

    /// Sets the structured name parts.
    #[must_use]
    pub fn with_name(mut self, given_name: Option<String>, family_name: Option<String>) -> Self {
        self.given_name = given_name;
        self.family_name = family_name;
        self
    }

    /// Sets the full display name.
    #[must_use]
    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name;
        self
    }

    /// Returns the email used to match local accounts.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    /// Returns the photo used as the account thumbnail.
    #[must_use]
    pub fn primary_photo(&self) -> Option<&str> {
        self.photos.first().map(String::as_str)
    }

    /// Returns `(first_name, last_name)` for the local account.
    ///
    /// Structured name claims win; otherwise the display name is split at
    /// its first whitespace. The first name falls back to an empty string.
    #[must_use]
    pub fn name_parts(&self) -> (String, Option<String>) {
        if self.given_name.is_some() || self.family_name.is_some() {
            return (
                self.given_name.clone().unwrap_or_default(),
                self.family_name.clone(),
            );
        }

        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => match name.split_once(char::is_whitespace) {
                Some((first, rest)) => (first.to_string(), Some(rest.trim().to_string())),
                None => (name.to_string(), None),
            },
            _ => (String::new(), None),
        }
    }
}
