//! One-shot backlog replay from the durable cursor to the remote head.
//!
//! The coordinator probes the newest remote event, compares it with the stored cursor and, when
//! behind, walks ascending pages until the ledger reports no further page. Entries at or before
//! the local cursor are dropped before persisting: the remote pagination boundary may re-yield the
//! last seen event. Any failure that outlives its retry budget aborts the run, since the live
//! poller assumes the backlog is complete.

use crate::indexer::{EventFilter, EventPage, EventQuery, IndexerError, LedgerEventSource};
use crate::store::EventRow;
use crate::sync::persistence::PersistenceGateway;
use crate::sync::progress_tracker::IngestProgress;
use crate::sync::retry::RetryPolicy;
use crate::sync::{Position, SyncError};

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info};

/// Outcome of a catch-up run.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchUpReport {
	/// Newest remote position observed by the head probe. Equals the starting cursor when the remote
	/// stream is empty.
	pub head: Position,
	/// Durable cursor when the run ended.
	pub cursor: Position,
	pub pages: usize,
	pub events_persisted: usize,
	pub stale_skipped: usize,
	/// The run stopped early on request.
	pub interrupted: bool,
}

pub struct CatchUpCoordinator {
	source: Arc<dyn LedgerEventSource>,
	gateway: Arc<PersistenceGateway>,
	filter: EventFilter,
	batch_limit: u32,
	retry: RetryPolicy,
}

impl CatchUpCoordinator {
	pub fn new(
		source: Arc<dyn LedgerEventSource>,
		gateway: Arc<PersistenceGateway>,
		filter: EventFilter,
		batch_limit: u32,
		retry: RetryPolicy,
	) -> Self {
		Self {
			source,
			gateway,
			filter,
			batch_limit: batch_limit.max(1),
			retry,
		}
	}

	/// Replay the whole backlog.
	pub async fn run(&self) -> Result<CatchUpReport, SyncError> {
		let (_stop_tx, stop) = watch::channel(false);
		self.run_until(stop).await
	}

	/// Replay the backlog until done or until `stop` is raised. A stop request abandons a query
	/// that is still being retried, never a persist in progress, and marks the report as
	/// interrupted.
	pub async fn run_until(
		&self,
		mut stop: watch::Receiver<bool>,
	) -> Result<CatchUpReport, SyncError> {
		let mut cursor = self.gateway.current_cursor().await?;
		info!("Starting catch-up from {}", cursor);
		let mut progress = IngestProgress::new(cursor.clone());

		let probe = EventQuery::head(self.filter.clone());
		let probed = self.query_until_stopped("Probe remote head", &probe, &mut stop).await?;
		let Some(probe_page) = probed else {
			info!("Catch-up stopped at {} during the head probe", cursor);
			return Ok(Self::report(cursor.clone(), cursor, &progress, true));
		};
		let head = match probe_page.data.into_iter().next() {
			Some(event) => {
				let head = Position::At(event.id);
				info!("Remote head is at {}", head);
				head
			}
			None => {
				info!("Remote event stream is empty");
				cursor.clone()
			}
		};

		if head.is_at_or_before(&cursor) {
			info!("Already caught up at {}", cursor);
			return Ok(Self::report(head, cursor, &progress, false));
		}

		let mut page_cursor = cursor.pagination_cursor();
		loop {
			let query =
				EventQuery::ascending(self.filter.clone(), page_cursor.clone(), self.batch_limit);
			let fetched_page = self.query_until_stopped("Query events page", &query, &mut stop).await?;
			let Some(page) = fetched_page else {
				info!("Catch-up stopped at {} before reaching {}", cursor, head);
				return Ok(Self::report(head, cursor, &progress, true));
			};

			let fetched = page.data.len();
			progress.record_page(fetched);

			let batch: Vec<EventRow> = page
				.data
				.into_iter()
				.map(EventRow::from)
				.filter(|row| row.position().is_after(&cursor))
				.collect();

			let stale = fetched - batch.len();
			if stale > 0 {
				debug!("Dropped {} entries at or before {}", stale, cursor);
				progress.record_stale(stale);
			}

			if !batch.is_empty() {
				cursor = self.gateway.persist(&batch).await?;
				progress.record_batch(batch.len(), &cursor);
				progress.log_progress(false);
			}

			if !page.has_next_page {
				break;
			}
			match page.next_cursor {
				Some(next) if page_cursor.as_ref() != Some(&next) => page_cursor = Some(next),
				Some(next) => {
					return Err(IndexerError::Malformed(format!(
						"pagination cursor did not advance past {}",
						Position::At(next)
					))
					.into());
				}
				None => break,
			}
		}

		progress.log_progress(true);
		info!("Catch-up complete. {}", progress.stats().summary());
		Ok(Self::report(head, cursor, &progress, false))
	}

	/// Run `query` under the network retry policy. `None` when `stop` was raised first.
	async fn query_until_stopped(
		&self,
		operation: &str,
		query: &EventQuery,
		stop: &mut watch::Receiver<bool>,
	) -> Result<Option<EventPage>, SyncError> {
		let source = &self.source;
		let attempts = self.retry.retry(operation, move || source.query_events(query));

		tokio::select! {
			biased;
			_ = stop_requested(stop) => Ok(None),
			page = attempts => Ok(Some(page?)),
		}
	}

	fn report(
		head: Position,
		cursor: Position,
		progress: &IngestProgress,
		interrupted: bool,
	) -> CatchUpReport {
		let stats = progress.stats();
		CatchUpReport {
			head,
			cursor,
			pages: stats.pages_fetched,
			events_persisted: stats.events_persisted,
			stale_skipped: stats.stale_skipped,
			interrupted,
		}
	}
}

/// Resolve once `stop` reads `true`. A dropped sender never counts as a stop request.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
	loop {
		if *stop.borrow_and_update() {
			return;
		}
		if stop.changed().await.is_err() {
			std::future::pending::<()>().await;
		}
	}
}
