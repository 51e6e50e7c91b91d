//! Account role carried in the session principal.
//!
//! Authorization beyond the blocked flag is out of scope; the role only
//! travels with the principal so pages can tell administrators apart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a local account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Standard account.
    #[default]
    User,
    /// Administrator.
    Admin,
}

impl Role {
    /// Returns the stored representation of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}
