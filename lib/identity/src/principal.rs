//! The reduced identity stored in a session.

use latchkey_core::UserId;
use serde::{Deserialize, Serialize};

use crate::role::Role;
use crate::user::User;

/// Who a session belongs to.
///
/// Only enough to find the account again; the full `User` is re-read on
/// every request so blocks and deletions take effect immediately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub email: String,
    pub role: Role,
}

/// Reduces an authenticated user to the principal kept in the session.
#[must_use]
pub fn to_principal(user: &User) -> Principal {
    Principal {
        user_id: user.id(),
        email: user.email().to_string(),
        role: user.role(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn principal_keeps_id_email_and_role() {
        let mut user = User::new("a@x.com".to_string(), "Ada".to_string());
        user.set_role(Role::Admin);

        let principal = to_principal(&user);

        assert_eq!(principal.user_id, user.id());
        assert_eq!(principal.email, "a@x.com");
        assert_eq!(principal.role, Role::Admin);
    }

    #[test]
    fn principal_serialized_shape() {
        let user = User::new("a@x.com".to_string(), String::new());
        let value = serde_json::to_value(to_principal(&user)).expect("serialize");

        assert_eq!(value["email"], "a@x.com");
        assert_eq!(value["role"], "user");
        assert!(value["user_id"].is_string());
    }
}
