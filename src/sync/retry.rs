//! Bounded retry with exponential backoff.

use crate::indexer::IndexerError;
use crate::store::StoreError;
use crate::sync::SyncError;
use backoff::ExponentialBackoff;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Errors that know whether another attempt may succeed.
pub trait Transient {
	fn is_transient(&self) -> bool;
}

impl Transient for IndexerError {
	fn is_transient(&self) -> bool {
		IndexerError::is_transient(self)
	}
}

impl Transient for StoreError {
	fn is_transient(&self) -> bool {
		StoreError::is_transient(self)
	}
}

impl Transient for SyncError {
	fn is_transient(&self) -> bool {
		SyncError::is_transient(self)
	}
}

/// Fixed attempt budget with capped exponential delays between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
	/// Total attempts, first one included. At least 1.
	pub max_attempts: u32,
	pub initial_delay: Duration,
	pub max_delay: Duration,
}

impl RetryPolicy {
	pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			initial_delay,
			max_delay: max_delay.max(initial_delay),
		}
	}

	/// Policy for remote ledger queries.
	pub fn network() -> Self {
		Self::new(10, Duration::from_millis(500), Duration::from_secs(10))
	}

	/// Policy for one atomic persist: the first attempt plus five retries.
	pub fn persistence() -> Self {
		Self::new(6, Duration::from_secs(1), Duration::from_secs(30))
	}

	fn backoff(&self) -> ExponentialBackoff {
		ExponentialBackoff {
			current_interval: self.initial_delay,
			initial_interval: self.initial_delay,
			randomization_factor: 0.1,
			multiplier: 2.0,
			max_interval: self.max_delay,
			max_elapsed_time: None,
			..ExponentialBackoff::default()
		}
	}

	/// Run `op` until it succeeds, fails permanently or the attempt budget is spent. The error of
	/// the last attempt is returned.
	pub async fn retry<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
	where
		E: Transient + Display,
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, E>>,
	{
		let max_attempts = self.max_attempts;
		let mut attempt = 0u32;

		backoff::future::retry_notify(
			self.backoff(),
			|| {
				attempt += 1;
				let last_attempt = attempt >= max_attempts;
				let fut = op();
				async move {
					fut.await.map_err(|e| {
						if last_attempt || !e.is_transient() {
							backoff::Error::permanent(e)
						} else {
							backoff::Error::transient(e)
						}
					})
				}
			},
			|e: E, delay: Duration| {
				warn!("{} failed: {}. Retrying in {:?}", operation, e, delay);
			},
		)
		.await
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::network()
	}
}
