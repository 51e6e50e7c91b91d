//! Identity linking and session lifecycle for latchkey.
//!
//! This crate provides:
//! - The local account model (`User`, `Role`) and the provider's assertion
//!   about it (`ExternalProfile`)
//! - The `IdentityLinker`, which resolves a signup or login attempt against
//!   the user store
//! - The `SessionManager`, which moves the authenticated `Principal` into
//!   and out of server-side sessions
//! - Storage traits with in-memory implementations
//!
//! # Example
//!
//! ```
//! use latchkey_identity::{ExternalProfile, User};
//!
//! let profile = ExternalProfile::new("google-sub-1", "alice@example.com")
//!     .with_display_name(Some("Alice Liddell".to_string()));
//!
//! let user = User::from_profile(&profile, "alice@example.com".to_string());
//! assert!(user.is_linked());
//! assert!(user.is_verified());
//! assert_eq!(user.first_name(), "Alice");
//! ```

pub mod error;
pub mod linker;
pub mod manager;
pub mod memory;
pub mod oidc;
pub mod principal;
pub mod profile;
pub mod role;
pub mod session;
pub mod store;
pub mod user;

// Re-export main types at crate root
pub use error::{LinkFailure, StoreError};
pub use linker::{IdentityLinker, LinkDisposition, LinkOutcome};
pub use manager::SessionManager;
pub use memory::{MemorySessionStore, MemoryUserStore};
pub use oidc::{GOOGLE_ISSUER_URL, OidcConfig, redirect_uri};
pub use principal::{Principal, to_principal};
pub use profile::{ExternalProfile, FlowIntent};
pub use role::Role;
pub use session::Session;
pub use store::{SessionStore, UserStore, WriteOutcome};
pub use user::User;
