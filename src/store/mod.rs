//! Durable event store.
//!
//! The store holds two things: the append-only table of ingested event rows, keyed by
//! `(tx_digest, event_seq)`, and the singleton ingestion cursor. Both are written together by
//! [`EventStore::append_batch`] so the cursor never claims progress the event table does not hold.

/// In-memory store, used by tests and embedders without a database
pub mod memory;
/// Table definitions
pub mod schema;
/// SQLite-backed store
pub mod sqlite;

pub use memory::InMemoryEventStore;
pub use sqlite::SqliteEventStore;

use crate::indexer::{EventId, LedgerEvent};
use crate::sync::Position;
use async_trait::async_trait;

/// A persisted ledger event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRow {
	pub id: EventId,
	pub package_id: String,
	pub module: String,
	pub event_type: String,
	pub timestamp_ms: u64,
	pub payload: serde_json::Value,
}

impl EventRow {
	pub fn position(&self) -> Position {
		Position::At(self.id.clone())
	}
}

impl From<LedgerEvent> for EventRow {
	fn from(event: LedgerEvent) -> Self {
		Self {
			id: event.id,
			package_id: event.package_id,
			module: event.transaction_module,
			event_type: event.event_type,
			timestamp_ms: event.timestamp_ms,
			payload: event
				.parsed_json
				.unwrap_or_else(|| serde_json::Value::Object(Default::default())),
		}
	}
}

/// Storage for event rows and the ingestion cursor.
#[async_trait]
pub trait EventStore: Send + Sync {
	/// Current cursor. Initialises the singleton to genesis when it does not exist yet.
	async fn load_cursor(&self) -> Result<Position, StoreError>;

	/// Atomically insert `rows`, ignoring rows whose key already exists, and set the cursor to
	/// `cursor`. Either both effects become durable or neither does.
	async fn append_batch(&self, rows: &[EventRow], cursor: &EventId) -> Result<(), StoreError>;

	/// Every stored row in ascending position order.
	async fn load_events(&self) -> Result<Vec<EventRow>, StoreError>;

	async fn count_events(&self) -> Result<u64, StoreError>;

	/// Release underlying connections. In-flight operations complete first.
	async fn close(&self);
}

/// Error types for event store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("Database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("Encoding error: {0}")]
	Encoding(String),

	#[error("Store unavailable: {0}")]
	Unavailable(String),
}

impl StoreError {
	/// Whether retrying the same operation may succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			StoreError::Database(sqlx::Error::Configuration(_))
			| StoreError::Database(sqlx::Error::ColumnNotFound(_))
			| StoreError::Database(sqlx::Error::ColumnDecode { .. })
			| StoreError::Database(sqlx::Error::Decode(_))
			| StoreError::Database(sqlx::Error::TypeNotFound { .. }) => false,
			StoreError::Database(_) => true,
			StoreError::Encoding(_) => false,
			StoreError::Unavailable(_) => true,
		}
	}
}
