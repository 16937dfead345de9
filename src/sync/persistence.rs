//! Persistence gateway for ingested event batches.
//!
//! This module provides the `PersistenceGateway`, the single write path into the event store. A
//! batch of rows and the cursor that trails it are written as one atomic unit, wrapped in a
//! bounded retry policy. Inserting rows that already exist is a no-op, so replaying a batch, or
//! overlapping catch-up and poll windows, leaves the store unchanged.
//!
//! The gateway is used by both the catch-up coordinator and the live poller.

use crate::store::{EventRow, EventStore};
use crate::sync::retry::RetryPolicy;
use crate::sync::{Position, SyncError};

use std::sync::Arc;
use tracing::info;

/// Service for durable, idempotent batch writes.
pub struct PersistenceGateway {
	store: Arc<dyn EventStore>,
	retry: RetryPolicy,
}

impl PersistenceGateway {
	/// Create a new gateway over `store`.
	pub fn new(store: Arc<dyn EventStore>, retry: RetryPolicy) -> Self {
		Self { store, retry }
	}

	/// Load the durable cursor.
	pub async fn current_cursor(&self) -> Result<Position, SyncError> {
		Ok(self.store.load_cursor().await?)
	}

	/// Persist `batch` and advance the cursor to its last row, returning the new cursor.
	///
	/// An empty batch is a no-op returning the unchanged cursor. The cursor never moves backwards:
	/// a batch lying entirely at or before it only re-inserts (ignored) rows.
	///
	/// # Errors
	/// `UnorderedBatch` when the rows are not strictly ascending; otherwise the store error of the
	/// last attempt once the retry budget is spent.
	pub async fn persist(&self, batch: &[EventRow]) -> Result<Position, SyncError> {
		let Some(tail) = batch.last() else {
			return self.current_cursor().await;
		};

		for pair in batch.windows(2) {
			if !pair[1].position().is_after(&pair[0].position()) {
				return Err(SyncError::UnorderedBatch {
					previous: pair[0].position(),
					next: pair[1].position(),
				});
			}
		}

		let store = &self.store;
		let cursor = self
			.retry
			.retry("Persist batch", move || async move {
				let current = store.load_cursor().await?;
				let next = match current {
					Position::At(id) if id >= tail.id => id,
					_ => tail.id.clone(),
				};
				store.append_batch(batch, &next).await?;
				Ok::<_, crate::store::StoreError>(Position::At(next))
			})
			.await?;

		info!("Persisted {} events. Cursor at: {}", batch.len(), cursor);
		Ok(cursor)
	}
}
