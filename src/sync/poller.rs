//! Steady-state, single-flight live polling.
//!
//! A timer feeds ticks into a channel; [`LivePoller::run`] is the only consumer. The worker owns
//! at most one in-flight tick. A tick arriving while work is outstanding is dropped, not queued.
//! Closing the channel stops the worker once the in-flight tick, if any, has finished.

use crate::indexer::{EventFilter, EventQuery, LedgerEventSource};
use crate::store::EventRow;
use crate::sync::persistence::PersistenceGateway;
use crate::sync::{Position, SyncError};

use futures::FutureExt;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Counters reported by the poller when it stops.
#[derive(Debug, Clone, PartialEq)]
pub struct PollerReport {
	/// Ticks received, skipped ones included.
	pub ticks: usize,
	/// Ticks dropped because the previous tick was still in flight.
	pub skipped_ticks: usize,
	pub failed_ticks: usize,
	pub batches: usize,
	pub events_persisted: usize,
	/// Last successfully persisted cursor.
	pub cursor: Position,
}

impl PollerReport {
	fn new(cursor: Position) -> Self {
		Self {
			ticks: 0,
			skipped_ticks: 0,
			failed_ticks: 0,
			batches: 0,
			events_persisted: 0,
			cursor,
		}
	}
}

/// Result of one successful tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
	/// No new events.
	Idle,
	Persisted { events: usize, cursor: Position },
}

pub struct LivePoller {
	source: Arc<dyn LedgerEventSource>,
	gateway: Arc<PersistenceGateway>,
	filter: EventFilter,
	batch_limit: u32,
}

impl LivePoller {
	pub fn new(
		source: Arc<dyn LedgerEventSource>,
		gateway: Arc<PersistenceGateway>,
		filter: EventFilter,
		batch_limit: u32,
	) -> Self {
		Self {
			source,
			gateway,
			filter,
			batch_limit: batch_limit.max(1),
		}
	}

	/// Fetch one page after `cursor` and persist its new entries.
	///
	/// Queries are not retried here; the next tick resumes from the last persisted cursor.
	pub async fn tick(&self, cursor: Position) -> Result<TickOutcome, SyncError> {
		let query =
			EventQuery::ascending(self.filter.clone(), cursor.pagination_cursor(), self.batch_limit);
		let page = self.source.query_events(&query).await?;

		let fetched = page.data.len();
		let batch = fresh_entries(page.data.into_iter().map(EventRow::from), &cursor);
		if batch.len() < fetched {
			debug!("Dropped {} entries at or before {}", fetched - batch.len(), cursor);
		}
		if batch.is_empty() {
			return Ok(TickOutcome::Idle);
		}

		let cursor = self.gateway.persist(&batch).await?;
		Ok(TickOutcome::Persisted {
			events: batch.len(),
			cursor,
		})
	}

	/// Consume ticks until the channel closes, starting from `cursor`.
	pub async fn run(&self, cursor: Position, mut ticks: mpsc::Receiver<()>) -> PollerReport {
		info!("Live poller started at {}", cursor);
		let mut report = PollerReport::new(cursor);
		let mut in_flight: Option<BoxFuture<'_, Result<TickOutcome, SyncError>>> = None;
		let mut ticks_open = true;

		while ticks_open || in_flight.is_some() {
			tokio::select! {
				tick = ticks.recv(), if ticks_open => match tick {
					Some(()) => {
						report.ticks += 1;
						if in_flight.is_some() {
							report.skipped_ticks += 1;
							debug!("Previous poll still in flight. Skipping tick");
						} else {
							in_flight = Some(self.tick(report.cursor.clone()).boxed());
						}
					}
					None => {
						ticks_open = false;
						if in_flight.is_some() {
							info!("Tick source closed. Waiting for the in-flight poll to finish");
						}
					}
				},
				outcome = drive(&mut in_flight), if in_flight.is_some() => {
					in_flight = None;
					match outcome {
						Ok(TickOutcome::Idle) => {}
						Ok(TickOutcome::Persisted { events, cursor }) => {
							report.batches += 1;
							report.events_persisted += events;
							report.cursor = cursor;
						}
						Err(e) => {
							report.failed_ticks += 1;
							warn!("Poll failed: {}. Next tick resumes from {}", e, report.cursor);
						}
					}
				}
			}
		}

		info!(
			"Live poller stopped at {} after {} ticks ({} skipped, {} failed), {} events persisted",
			report.cursor, report.ticks, report.skipped_ticks, report.failed_ticks, report.events_persisted
		);
		report
	}
}

async fn drive<T>(slot: &mut Option<BoxFuture<'_, T>>) -> T {
	match slot {
		Some(work) => work.await,
		None => std::future::pending().await,
	}
}

/// Leading entries at or before `cursor` are dropped; acceptance then stops at the first entry
/// that does not move strictly forward.
pub fn fresh_entries(rows: impl IntoIterator<Item = EventRow>, cursor: &Position) -> Vec<EventRow> {
	let mut last = cursor.clone();
	let mut accepted = Vec::new();
	for row in rows {
		let position = row.position();
		if position.is_after(&last) {
			last = position;
			accepted.push(row);
		} else if !accepted.is_empty() {
			break;
		}
	}
	accepted
}
