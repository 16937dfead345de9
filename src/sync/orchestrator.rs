//! Ingestion orchestrator and integration point for all sync services.
//!
//! This module defines the `IngestionOrchestrator`, which sequences the two ingestion phases:
//! the one-shot catch-up replay, then the timer-driven live poller. Catch-up always completes
//! before the first poll tick is scheduled.
//!
//! The orchestrator is responsible for:
//! - Wiring the event source, persistence gateway, coordinator and poller together
//! - Treating a failed catch-up as fatal
//! - Feeding poll ticks from a timer task into the single-flight poller
//! - Stopping on shutdown without aborting an in-flight persist, then closing the store

use crate::indexer::{EventFilter, LedgerEventSource};
use crate::store::EventStore;
use crate::sync::catch_up::{CatchUpCoordinator, CatchUpReport};
use crate::sync::persistence::PersistenceGateway;
use crate::sync::poller::{LivePoller, PollerReport};
use crate::sync::retry::RetryPolicy;
use crate::sync::SyncError;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Tunables for the ingestion pipeline.
#[derive(Debug, Clone)]
pub struct SyncSettings {
	pub filter: EventFilter,
	/// Page size for catch-up and poll queries
	pub batch_limit: u32,
	pub poll_interval: Duration,
	/// Retry policy for catch-up queries
	pub network_retry: RetryPolicy,
	/// Retry policy for each atomic persist
	pub persist_retry: RetryPolicy,
}

impl SyncSettings {
	pub fn new(filter: EventFilter) -> Self {
		Self {
			filter,
			batch_limit: 50,
			poll_interval: Duration::from_secs(5),
			network_retry: RetryPolicy::network(),
			persist_retry: RetryPolicy::persistence(),
		}
	}
}

/// Reports of both phases. `poller` is `None` when shutdown arrived during catch-up.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
	pub catch_up: CatchUpReport,
	pub poller: Option<PollerReport>,
}

/// Main ingestion orchestrator that coordinates catch-up and live polling.
pub struct IngestionOrchestrator {
	store: Arc<dyn EventStore>,
	catch_up: CatchUpCoordinator,
	poller: LivePoller,
	poll_interval: Duration,
}

impl IngestionOrchestrator {
	/// Create a new orchestrator over `source` and `store`.
	pub fn new(
		source: Arc<dyn LedgerEventSource>,
		store: Arc<dyn EventStore>,
		settings: SyncSettings,
	) -> Self {
		let gateway = Arc::new(PersistenceGateway::new(store.clone(), settings.persist_retry));
		let catch_up = CatchUpCoordinator::new(
			source.clone(),
			gateway.clone(),
			settings.filter.clone(),
			settings.batch_limit,
			settings.network_retry,
		);
		let poller = LivePoller::new(source, gateway, settings.filter, settings.batch_limit);

		Self {
			store,
			catch_up,
			poller,
			poll_interval: settings.poll_interval,
		}
	}

	/// Run catch-up, then poll until `shutdown` resolves.
	///
	/// The store is closed before returning, on success and on failure alike.
	///
	/// # Errors
	/// A catch-up failure that exhausted its retries. Poll failures are never returned.
	pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<IngestReport, SyncError> {
		tokio::pin!(shutdown);

		let (stop_tx, stop_rx) = watch::channel(false);
		let catch_up = self.catch_up.run_until(stop_rx);
		tokio::pin!(catch_up);

		let mut shutdown_requested = false;
		let catch_up = loop {
			tokio::select! {
				biased;
				_ = &mut shutdown, if !shutdown_requested => {
					info!("Shutdown requested during catch-up. Stopping before the next query");
					shutdown_requested = true;
					stop_tx.send_replace(true);
				}
				result = &mut catch_up => break result,
			}
		};

		let catch_up = match catch_up {
			Ok(report) => report,
			Err(e) => {
				error!("Catch-up failed: {}", e);
				self.store.close().await;
				return Err(e);
			}
		};

		if shutdown_requested {
			self.store.close().await;
			return Ok(IngestReport {
				catch_up,
				poller: None,
			});
		}

		let (tick_tx, tick_rx) = mpsc::channel(1);
		let timer = tokio::spawn(feed_ticks(self.poll_interval, tick_tx));
		let poller = self.poller.run(catch_up.cursor.clone(), tick_rx);
		tokio::pin!(poller);

		let poller = tokio::select! {
			report = &mut poller => report,
			_ = &mut shutdown => {
				info!("Shutdown requested. Stopping live poller");
				timer.abort();
				(&mut poller).await
			}
		};
		timer.abort();

		self.store.close().await;
		info!("Event store closed");

		Ok(IngestReport {
			catch_up,
			poller: Some(poller),
		})
	}
}

/// Send a tick every `period` until the receiver goes away. Missed ticks are skipped, not
/// bunched up.
async fn feed_ticks(period: Duration, ticks: mpsc::Sender<()>) {
	let mut interval = tokio::time::interval(period);
	interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
	loop {
		interval.tick().await;
		if ticks.send(()).await.is_err() {
			break;
		}
	}
}
