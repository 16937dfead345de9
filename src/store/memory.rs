//! In-memory `EventStore` with failure injection.

use super::{EventRow, EventStore, StoreError};
use crate::indexer::EventId;
use crate::sync::Position;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct State {
	events: BTreeMap<EventId, EventRow>,
	cursor: Option<Position>,
	append_calls: usize,
	failures_remaining: usize,
}

/// An event store that keeps everything in a mutex-guarded map.
///
/// Appends are atomic with respect to each other and to reads. The next `n` appends can be made
/// to fail with a transient error via [`InMemoryEventStore::fail_next_appends`].
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
	state: Mutex<State>,
}

impl InMemoryEventStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make the next `count` calls to `append_batch` fail without side effects.
	pub fn fail_next_appends(&self, count: usize) {
		self.lock().failures_remaining = count;
	}

	/// Number of `append_batch` calls so far, failed ones included.
	pub fn append_calls(&self) -> usize {
		self.lock().append_calls
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, State> {
		// A panic while holding the lock cannot leave the map half-written: every mutation is a
		// single insert or assignment.
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}
}

#[async_trait]
impl EventStore for InMemoryEventStore {
	async fn load_cursor(&self) -> Result<Position, StoreError> {
		Ok(self.lock().cursor.get_or_insert(Position::Genesis).clone())
	}

	async fn append_batch(&self, rows: &[EventRow], cursor: &EventId) -> Result<(), StoreError> {
		let mut state = self.lock();
		state.append_calls += 1;
		if state.failures_remaining > 0 {
			state.failures_remaining -= 1;
			return Err(StoreError::Unavailable("injected append failure".to_string()));
		}

		for row in rows {
			state.events.entry(row.id.clone()).or_insert_with(|| row.clone());
		}
		state.cursor = Some(Position::At(cursor.clone()));
		Ok(())
	}

	async fn load_events(&self) -> Result<Vec<EventRow>, StoreError> {
		// BTreeMap iteration follows `EventId`'s ordering, which is the position order.
		Ok(self.lock().events.values().cloned().collect())
	}

	async fn count_events(&self) -> Result<u64, StoreError> {
		Ok(self.lock().events.len() as u64)
	}

	async fn close(&self) {}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::row;

	#[tokio::test]
	async fn injected_failures_leave_no_trace() {
		let store = InMemoryEventStore::new();
		store.fail_next_appends(1);
		let batch = vec![row("TxA", 0, "VaultCreated")];

		assert!(store.append_batch(&batch, &batch[0].id).await.is_err());
		assert_eq!(store.count_events().await.unwrap(), 0);
		assert_eq!(store.load_cursor().await.unwrap(), Position::Genesis);

		store.append_batch(&batch, &batch[0].id).await.unwrap();
		assert_eq!(store.count_events().await.unwrap(), 1);
		assert_eq!(store.load_cursor().await.unwrap(), Position::at("TxA", 0));
		assert_eq!(store.append_calls(), 2);
	}

	#[tokio::test]
	async fn duplicate_rows_keep_the_first_copy() {
		let store = InMemoryEventStore::new();
		let original = row("TxA", 0, "VaultCreated");
		let mut replay = original.clone();
		replay.timestamp_ms += 1;

		store.append_batch(&[original.clone()], &original.id).await.unwrap();
		store.append_batch(&[replay], &original.id).await.unwrap();

		assert_eq!(store.load_events().await.unwrap(), vec![original]);
	}

	#[tokio::test]
	async fn load_events_is_position_ordered() {
		let store = InMemoryEventStore::new();
		let rows = vec![row("TxB", 2, "A"), row("TxA", 2, "A"), row("TxZ", 1, "A")];
		store.append_batch(&rows, &rows[0].id).await.unwrap();

		let positions: Vec<_> = store
			.load_events()
			.await
			.unwrap()
			.iter()
			.map(EventRow::position)
			.collect();
		assert_eq!(
			positions,
			vec![
				Position::at("TxZ", 1),
				Position::at("TxA", 2),
				Position::at("TxB", 2)
			]
		);
	}
}
