//! Ledger integration module for the vault indexer
//!
//! This module provides the event source abstraction and the Sui JSON-RPC client that backs it.
//! The source is a pure I/O boundary: it holds no ingestion state and never retries.

/// JSON-RPC client for the Sui fullnode
mod client;
/// Type definitions for ledger wire data
mod types;

pub use client::SuiRpcClient;
pub use types::*;

use async_trait::async_trait;

/// Paginated access to the remote, totally ordered event stream.
#[async_trait]
pub trait LedgerEventSource: Send + Sync {
	/// Fetch one page of events.
	///
	/// Ascending pages are assumed to follow the same order as [`crate::sync::Position`].
	async fn query_events(&self, query: &EventQuery) -> Result<EventPage, IndexerError>;
}
