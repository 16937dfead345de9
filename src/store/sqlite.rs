//! SQLite implementation of the `EventStore` trait.

use super::schema::{CREATE_TABLES, CURSOR_ID};
use super::{EventRow, EventStore, StoreError};
use crate::indexer::EventId;
use crate::sync::{GENESIS_SEQ, GENESIS_TX_DIGEST, Position};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

/// SQLite-backed event store.
#[derive(Debug, Clone)]
pub struct SqliteEventStore {
	pool: SqlitePool,
}

impl SqliteEventStore {
	/// Connect to `database_url` (e.g. `sqlite://indexer.db` or `sqlite::memory:`), creating the
	/// database file and tables when missing.
	pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
		let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
		let in_memory = database_url.contains(":memory:");

		// Every connection to an in-memory database sees its own empty database, so pin the pool
		// to a single connection that is never recycled.
		let pool_options = if in_memory {
			SqlitePoolOptions::new()
				.max_connections(1)
				.min_connections(1)
				.idle_timeout(None)
				.max_lifetime(None)
		} else {
			SqlitePoolOptions::new().max_connections(5)
		};

		let pool = pool_options.connect_with(options).await?;
		let store = Self::new(pool);
		store.migrate().await?;

		info!("Opened event store at {}", database_url);
		Ok(store)
	}

	/// Wrap an existing pool. Tables are not created; call [`SqliteEventStore::migrate`].
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Create tables if they do not exist.
	pub async fn migrate(&self) -> Result<(), StoreError> {
		for statement in CREATE_TABLES {
			sqlx::query(*statement).execute(&self.pool).await?;
		}
		Ok(())
	}
}

fn to_sql_seq(event_seq: u64) -> Result<i64, StoreError> {
	i64::try_from(event_seq)
		.map_err(|_| StoreError::Encoding(format!("event sequence {} exceeds i64", event_seq)))
}

fn from_sql_seq(seq: i64) -> Result<u64, StoreError> {
	u64::try_from(seq).map_err(|_| StoreError::Encoding(format!("negative event sequence {}", seq)))
}

fn cursor_from_columns(last_tx_digest: String, last_seq: i64) -> Result<Position, StoreError> {
	if last_seq == GENESIS_SEQ {
		return Ok(Position::Genesis);
	}
	Ok(Position::At(EventId::new(last_tx_digest, from_sql_seq(last_seq)?)))
}

fn row_to_event(row: &SqliteRow) -> Result<EventRow, StoreError> {
	let payload_text: String = row.try_get("payload_json")?;
	let payload = serde_json::from_str(&payload_text)
		.map_err(|e| StoreError::Encoding(format!("stored payload is not JSON: {}", e)))?;
	let timestamp_ms: i64 = row.try_get("timestamp_ms")?;

	Ok(EventRow {
		id: EventId::new(
			row.try_get::<String, _>("txn_digest")?,
			from_sql_seq(row.try_get("seq")?)?,
		),
		package_id: row.try_get("package_id")?,
		module: row.try_get("txn_module")?,
		event_type: row.try_get("evt_type")?,
		timestamp_ms: u64::try_from(timestamp_ms)
			.map_err(|_| StoreError::Encoding(format!("negative timestamp {}", timestamp_ms)))?,
		payload,
	})
}

#[async_trait]
impl EventStore for SqliteEventStore {
	async fn load_cursor(&self) -> Result<Position, StoreError> {
		let existing = sqlx::query("SELECT last_tx_digest, last_seq FROM cursor WHERE id = ?")
			.bind(CURSOR_ID)
			.fetch_optional(&self.pool)
			.await?;

		match existing {
			Some(row) => cursor_from_columns(row.try_get("last_tx_digest")?, row.try_get("last_seq")?),
			None => {
				info!("No existing cursor found. Initializing to genesis.");
				sqlx::query(
					"INSERT INTO cursor (id, last_tx_digest, last_seq) VALUES (?, ?, ?)
					 ON CONFLICT (id) DO NOTHING",
				)
				.bind(CURSOR_ID)
				.bind(GENESIS_TX_DIGEST)
				.bind(GENESIS_SEQ)
				.execute(&self.pool)
				.await?;
				Ok(Position::Genesis)
			}
		}
	}

	async fn append_batch(&self, rows: &[EventRow], cursor: &EventId) -> Result<(), StoreError> {
		let cursor_seq = to_sql_seq(cursor.event_seq)?;
		let mut tx = self.pool.begin().await?;

		for row in rows {
			let timestamp_ms = i64::try_from(row.timestamp_ms)
				.map_err(|_| StoreError::Encoding(format!("timestamp {} exceeds i64", row.timestamp_ms)))?;
			sqlx::query(
				"INSERT INTO events
				 (txn_digest, seq, package_id, txn_module, evt_type, timestamp_ms, payload_json)
				 VALUES (?, ?, ?, ?, ?, ?, ?)
				 ON CONFLICT (txn_digest, seq) DO NOTHING",
			)
			.bind(&row.id.tx_digest)
			.bind(to_sql_seq(row.id.event_seq)?)
			.bind(&row.package_id)
			.bind(&row.module)
			.bind(&row.event_type)
			.bind(timestamp_ms)
			.bind(row.payload.to_string())
			.execute(&mut *tx)
			.await?;
		}

		sqlx::query(
			"INSERT INTO cursor (id, last_tx_digest, last_seq) VALUES (?, ?, ?)
			 ON CONFLICT (id) DO UPDATE
			 SET last_tx_digest = excluded.last_tx_digest, last_seq = excluded.last_seq",
		)
		.bind(CURSOR_ID)
		.bind(&cursor.tx_digest)
		.bind(cursor_seq)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;
		Ok(())
	}

	async fn load_events(&self) -> Result<Vec<EventRow>, StoreError> {
		let rows = sqlx::query(
			"SELECT txn_digest, seq, package_id, txn_module, evt_type, timestamp_ms, payload_json
			 FROM events
			 ORDER BY seq ASC, txn_digest ASC",
		)
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_event).collect()
	}

	async fn count_events(&self) -> Result<u64, StoreError> {
		let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
			.fetch_one(&self.pool)
			.await?;
		from_sql_seq(count)
	}

	async fn close(&self) {
		self.pool.close().await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::row;

	async fn memory_store() -> SqliteEventStore {
		SqliteEventStore::connect("sqlite::memory:").await.unwrap()
	}

	#[tokio::test]
	async fn fresh_store_starts_at_genesis_and_persists_it() {
		let store = memory_store().await;

		assert_eq!(store.load_cursor().await.unwrap(), Position::Genesis);

		let (digest, seq): (String, i64) =
			sqlx::query_as("SELECT last_tx_digest, last_seq FROM cursor WHERE id = 1")
				.fetch_one(&store.pool)
				.await
				.unwrap();
		assert_eq!(digest, GENESIS_TX_DIGEST);
		assert_eq!(seq, GENESIS_SEQ);
		assert_eq!(store.load_cursor().await.unwrap(), Position::Genesis);
	}

	#[tokio::test]
	async fn append_batch_stores_rows_and_moves_cursor() {
		let store = memory_store().await;
		let batch = vec![row("TxA", 0, "VaultCreated"), row("TxB", 1, "CoinDeposited")];

		store.append_batch(&batch, &batch[1].id).await.unwrap();

		assert_eq!(store.load_cursor().await.unwrap(), Position::at("TxB", 1));
		assert_eq!(store.load_events().await.unwrap(), batch);
	}

	#[tokio::test]
	async fn reinserting_the_same_batch_is_a_noop() {
		let store = memory_store().await;
		let batch = vec![row("TxA", 0, "VaultCreated"), row("TxB", 1, "CoinDeposited")];

		store.append_batch(&batch, &batch[1].id).await.unwrap();
		let events_once = store.load_events().await.unwrap();
		store.append_batch(&batch, &batch[1].id).await.unwrap();

		assert_eq!(store.count_events().await.unwrap(), 2);
		assert_eq!(store.load_events().await.unwrap(), events_once);
		assert_eq!(store.load_cursor().await.unwrap(), Position::at("TxB", 1));
	}

	#[tokio::test]
	async fn events_load_in_position_order() {
		let store = memory_store().await;
		let later = vec![row("TxC", 2, "CoinDeposited"), row("TxB", 2, "CoinDeposited")];
		let earlier = vec![row("TxZ", 1, "VaultCreated")];

		store.append_batch(&later, &later[0].id).await.unwrap();
		store.append_batch(&earlier, &earlier[0].id).await.unwrap();

		let ids: Vec<_> = store
			.load_events()
			.await
			.unwrap()
			.into_iter()
			.map(|row| (row.id.tx_digest, row.id.event_seq))
			.collect();
		assert_eq!(
			ids,
			vec![
				("TxZ".to_string(), 1),
				("TxB".to_string(), 2),
				("TxC".to_string(), 2)
			]
		);
	}

	#[tokio::test]
	async fn payload_round_trips_as_json() {
		let store = memory_store().await;
		let mut event = row("TxA", 0, "TokenWeightsSet");
		event.payload = serde_json::json!({
			"vault_id": "0x1",
			"target_coin_types": ["0x2::sui::SUI"],
			"target_weights_bps": [10000],
			"nested": { "null_field": null }
		});

		store.append_batch(&[event.clone()], &event.id).await.unwrap();

		assert_eq!(store.load_events().await.unwrap()[0].payload, event.payload);
	}

	#[tokio::test]
	async fn oversized_sequence_is_rejected_without_side_effects() {
		let store = memory_store().await;
		let event = row("TxA", u64::MAX, "VaultCreated");

		let result = store.append_batch(&[event.clone()], &event.id).await;

		assert!(matches!(result, Err(StoreError::Encoding(_))));
		assert_eq!(store.count_events().await.unwrap(), 0);
		assert_eq!(store.load_cursor().await.unwrap(), Position::Genesis);
	}
}
