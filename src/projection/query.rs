//! Read-side query interface over the projection.
//!
//! [`VaultQueryService`] rebuilds the projection from the event store on demand and keeps the
//! last result, keyed by the store cursor. A changed cursor means new events were persisted and
//! the cached projection is rebuilt on the next query.

use crate::projection::aggregate::{VaultAggregate, VaultView};
use crate::projection::projector::{Projection, project};
use crate::store::{EventStore, StoreError};
use crate::sync::Position;

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Error types for vault queries
///
/// `Unavailable` keeps the storage error as its source for server-side logging, but its message
/// never includes it.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
	#[error("Vault not found: {0}")]
	NotFound(String),

	#[error("Vault data is temporarily unavailable")]
	Unavailable(#[source] StoreError),
}

impl From<StoreError> for QueryError {
	fn from(e: StoreError) -> Self {
		error!("Vault query failed: {}", e);
		QueryError::Unavailable(e)
	}
}

/// Optional exact-match criteria for listing vaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VaultFilter {
	pub creator: Option<String>,
	pub admin: Option<String>,
}

impl VaultFilter {
	pub fn matches(&self, vault: &VaultAggregate) -> bool {
		self.creator.as_ref().is_none_or(|creator| *creator == vault.creator)
			&& self.admin.as_ref().is_none_or(|admin| *admin == vault.current_admin)
	}
}

struct CachedProjection {
	cursor: Position,
	projection: Arc<Projection>,
}

pub struct VaultQueryService {
	store: Arc<dyn EventStore>,
	cache: Mutex<Option<CachedProjection>>,
}

impl VaultQueryService {
	pub fn new(store: Arc<dyn EventStore>) -> Self {
		Self {
			store,
			cache: Mutex::new(None),
		}
	}

	/// The projection of every stored event, rebuilt only when the cursor moved.
	pub async fn projection(&self) -> Result<Arc<Projection>, QueryError> {
		let cursor = self.store.load_cursor().await?;
		let mut cache = self.cache.lock().await;
		if let Some(cached) = cache.as_ref() {
			if cached.cursor == cursor {
				return Ok(cached.projection.clone());
			}
		}

		let rows = self.store.load_events().await?;
		let projection = Arc::new(project(&rows));
		debug!(
			"Rebuilt projection at {}: {} vaults from {} events",
			cursor,
			projection.vaults.len(),
			rows.len()
		);
		*cache = Some(CachedProjection {
			cursor,
			projection: projection.clone(),
		});
		Ok(projection)
	}

	/// Vaults matching `filter`, newest first. Ties keep ascending id order.
	pub async fn list_vaults(&self, filter: &VaultFilter) -> Result<Vec<VaultView>, QueryError> {
		let projection = self.projection().await?;
		let mut vaults: Vec<&VaultAggregate> =
			projection.vaults.values().filter(|vault| filter.matches(vault)).collect();
		// Stable sort over id-ordered input.
		vaults.sort_by(|a, b| b.created_at_ms.cmp(&a.created_at_ms));
		Ok(vaults.into_iter().map(VaultAggregate::view).collect())
	}

	pub async fn get_vault(&self, vault_id: &str) -> Result<VaultView, QueryError> {
		self.projection()
			.await?
			.get(vault_id)
			.map(VaultAggregate::view)
			.ok_or_else(|| QueryError::NotFound(vault_id.to_string()))
	}
}
