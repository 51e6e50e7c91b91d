//! Core identifiers and error handling for latchkey.
//!
//! This crate provides the strongly-typed IDs and the `Result` alias
//! shared by the identity library and the server.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ParseIdError, SessionId, UserId};
