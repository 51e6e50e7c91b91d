//! latchkey web server.
//!
//! Google sign-in for local accounts: signup and login flows through an
//! OpenID Connect provider, accounts persisted in PostgreSQL (or memory),
//! and server-side sessions carried in a signed cookie.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod home;
