//! Builders and a scripted ledger used across the crate's tests.

use crate::indexer::{
	EventFilter, EventId, EventPage, EventQuery, IndexerError, LedgerEvent, LedgerEventSource,
	SortOrder,
};
use crate::store::EventRow;
use crate::sync::RetryPolicy;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;

pub const PACKAGE: &str = "0xpkg";
pub const MODULE: &str = "vault";
const BASE_TIMESTAMP_MS: u64 = 1_700_000_000_000;

pub fn filter() -> EventFilter {
	EventFilter::move_module(PACKAGE, MODULE)
}

pub fn event_type(kind: &str) -> String {
	format!("{}::{}::{}", PACKAGE, MODULE, kind)
}

/// Timestamp assigned to an event built with sequence `seq`.
pub fn timestamp_for(seq: u64) -> u64 {
	BASE_TIMESTAMP_MS.saturating_add(seq.saturating_mul(1000))
}

pub fn ledger_event(digest: &str, seq: u64, kind: &str, payload: Value) -> LedgerEvent {
	LedgerEvent {
		id: EventId::new(digest, seq),
		package_id: PACKAGE.to_string(),
		transaction_module: MODULE.to_string(),
		event_type: event_type(kind),
		timestamp_ms: timestamp_for(seq),
		parsed_json: Some(payload),
	}
}

pub fn row(digest: &str, seq: u64, kind: &str) -> EventRow {
	EventRow::from(ledger_event(digest, seq, kind, json!({})))
}

pub fn payload_row(digest: &str, seq: u64, kind: &str, payload: Value) -> EventRow {
	EventRow::from(ledger_event(digest, seq, kind, payload))
}

/// `count` deposit events with digests `Tx00`, `Tx01`, ... and sequences starting at `first_seq`.
pub fn numbered_events(first_seq: u64, count: u64) -> Vec<LedgerEvent> {
	(first_seq..first_seq + count)
		.map(|seq| ledger_event(&format!("Tx{:02}", seq), seq, "CoinDeposited", json!({})))
		.collect()
}

/// Retry policy with millisecond delays.
pub fn fast_retry(max_attempts: u32) -> RetryPolicy {
	RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(2))
}

#[derive(Debug, Default)]
struct Script {
	events: Vec<LedgerEvent>,
	inclusive_boundary: bool,
	calls: usize,
	failures_remaining: usize,
	healthy_calls: Option<usize>,
}

/// An in-memory ledger answering event queries from a fixed, ascending event list.
///
/// Ascending pages start strictly after the query cursor, or at it when the boundary is made
/// inclusive. Queries can be made to fail, and can be held in flight until released.
pub struct ScriptedEventSource {
	script: Mutex<Script>,
	gate: watch::Sender<bool>,
}

impl ScriptedEventSource {
	pub fn new(events: Vec<LedgerEvent>) -> Self {
		let source = Self {
			script: Mutex::new(Script::default()),
			gate: watch::Sender::new(true),
		};
		source.push(events);
		source
	}

	/// Re-yield the cursor event at the start of every ascending page.
	pub fn with_inclusive_boundary(self) -> Self {
		self.lock().inclusive_boundary = true;
		self
	}

	/// Answer the first `calls` queries normally and fail every later one.
	pub fn failing_after(self, calls: usize) -> Self {
		self.lock().healthy_calls = Some(calls);
		self
	}

	/// Append events to the remote log.
	pub fn push(&self, events: Vec<LedgerEvent>) {
		let mut script = self.lock();
		script.events.extend(events);
		script.events.sort_by(|a, b| a.id.cmp(&b.id));
	}

	pub fn fail_next(&self, count: usize) {
		self.lock().failures_remaining = count;
	}

	/// Hold every query until [`ScriptedEventSource::resume`].
	pub fn pause(&self) {
		self.gate.send_replace(false);
	}

	pub fn resume(&self) {
		self.gate.send_replace(true);
	}

	pub fn calls(&self) -> usize {
		self.lock().calls
	}

	/// Wait until at least `count` queries have started.
	pub async fn wait_for_calls(&self, count: usize) {
		tokio::time::timeout(Duration::from_secs(5), async {
			while self.calls() < count {
				tokio::time::sleep(Duration::from_millis(1)).await;
			}
		})
		.await
		.expect("query was never issued");
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
		self.script.lock().unwrap()
	}

	fn page(script: &Script, query: &EventQuery) -> EventPage {
		let limit = query.limit as usize;
		match query.order {
			SortOrder::Descending => EventPage {
				data: script
					.events
					.iter()
					.rev()
					.filter(|event| query.cursor.as_ref().is_none_or(|cursor| event.id < *cursor))
					.take(limit)
					.cloned()
					.collect(),
				next_cursor: None,
				has_next_page: false,
			},
			SortOrder::Ascending => {
				let start = match &query.cursor {
					None => 0,
					Some(cursor) => script
						.events
						.iter()
						.position(|event| {
							if script.inclusive_boundary {
								event.id >= *cursor
							} else {
								event.id > *cursor
							}
						})
						.unwrap_or(script.events.len()),
				};
				let end = (start + limit).min(script.events.len());
				let data = script.events[start..end].to_vec();
				let next_cursor = data
					.last()
					.map(|event| event.id.clone())
					.or_else(|| query.cursor.clone());
				EventPage {
					data,
					next_cursor,
					has_next_page: end < script.events.len(),
				}
			}
		}
	}
}

#[async_trait]
impl LedgerEventSource for ScriptedEventSource {
	async fn query_events(&self, query: &EventQuery) -> Result<EventPage, IndexerError> {
		let call = {
			let mut script = self.lock();
			script.calls += 1;
			script.calls
		};

		let mut gate = self.gate.subscribe();
		gate.wait_for(|open| *open).await.expect("gate sender lives in the source");

		let mut script = self.lock();
		if script.healthy_calls.is_some_and(|healthy| call > healthy) {
			return Err(IndexerError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
		}
		if script.failures_remaining > 0 {
			script.failures_remaining -= 1;
			return Err(IndexerError::Status(reqwest::StatusCode::SERVICE_UNAVAILABLE));
		}
		Ok(Self::page(&script, query))
	}
}
