use crate::indexer::IndexerError;
use crate::store::StoreError;
use crate::sync::Position;

/// Error types for the ingestion pipeline
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
	#[error("Indexer error: {0}")]
	Indexer(#[from] IndexerError),

	#[error("Store error: {0}")]
	Store(#[from] StoreError),

	/// The remote ascending order disagrees with position order (sequence, then digest).
	#[error(
		"Remote event order is inconsistent with position order: {previous} is followed by {next}"
	)]
	UnorderedBatch { previous: Position, next: Position },
}

impl SyncError {
	/// Whether retrying the failed operation may succeed.
	pub fn is_transient(&self) -> bool {
		match self {
			SyncError::Indexer(e) => e.is_transient(),
			SyncError::Store(e) => e.is_transient(),
			SyncError::UnorderedBatch { .. } => false,
		}
	}
}
