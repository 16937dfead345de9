//! Event Ingestion Module
//!
//! This module provides the core logic for replicating the remote vault event stream into the
//! local event store. It is composed of several submodules, each responsible for one aspect of
//! ingestion:
//!
//! - `position`: The total order over ledger positions and the genesis sentinel.
//! - `retry`: Bounded exponential retry shared by queries and persists.
//! - `persistence`: The atomic, idempotent batch write path.
//! - `progress_tracker`: Counts pages, batches and stale entries, and logs progress.
//! - `catch_up`: One-shot replay from the durable cursor to the remote head.
//! - `poller`: Single-flight, timer-driven incremental ingestion.
//! - `orchestrator`: Sequences catch-up and polling, and handles shutdown.
//!
//! Catch-up always finishes before polling starts. Both phases write through the same
//! `PersistenceGateway`, so the durable cursor is the single record of where to resume.

/// One-shot backlog replay
pub mod catch_up;
/// Main coordinator for the ingestion process
pub mod orchestrator;
/// Atomic batch persistence
pub mod persistence;
/// Live polling
pub mod poller;
/// Ordering of ledger positions
pub mod position;
/// Tracks ingestion progress and statistics
pub mod progress_tracker;
/// Retry policy
pub mod retry;
mod types;

pub use catch_up::{CatchUpCoordinator, CatchUpReport};
pub use orchestrator::*;
pub use persistence::PersistenceGateway;
pub use poller::{LivePoller, PollerReport, TickOutcome};
pub use position::{GENESIS_SEQ, GENESIS_TX_DIGEST, Position, compare, is_after, is_at_or_before};
pub use retry::{RetryPolicy, Transient};
pub use types::*;
