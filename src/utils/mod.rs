//!
//! Utility module for the vault indexer.
//!
//! Re-exports formatting helpers used in log lines throughout the codebase.
/// Utility functions for formatting and display
pub mod index;

pub use index::short_digest;
