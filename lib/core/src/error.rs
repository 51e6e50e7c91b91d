//! Error handling foundation for latchkey.
//!
//! This module provides only the `Result` type alias using rootcause.
//! Each crate defines its own error types in its own error module and
//! carries them as `Report<E>` as they propagate up the stack.

use rootcause::Report;

/// A Result type alias using rootcause's Report for error handling.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;
