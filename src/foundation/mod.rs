//! Crate-wide building blocks.

/// Error type and result alias.
pub mod error;
