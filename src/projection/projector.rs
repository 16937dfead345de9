//! The fold from an ordered event log to vault aggregates.
//!
//! [`project`] sorts the rows by position and reduces them into a [`Projection`] with
//! [`Projection::apply`]. Nothing in the fold fails: rows that cannot be applied degrade to a
//! recorded [`ProjectionWarning`] and the fold moves on.

use crate::projection::aggregate::VaultAggregate;
use crate::projection::events::{DecodeError, EventKind, VaultEvent};
use crate::store::EventRow;
use crate::sync::Position;

use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A non-fatal problem met while folding one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum ProjectionWarning {
	#[error("Skipping malformed event at {position}: {reason}")]
	MalformedPayload { position: Position, reason: String },

	#[error("Skipping {kind} at {position} for vault {vault_id}: VaultCreated not seen first")]
	UnknownVault {
		position: Position,
		vault_id: String,
		kind: EventKind,
	},

	#[error("Ignoring repeated VaultCreated at {position} for vault {vault_id}")]
	DuplicateCreation { position: Position, vault_id: String },

	#[error("Ignoring withdrawal at {position} of {coin_type} from vault {vault_id}: no such balance")]
	UnknownCoinType {
		position: Position,
		vault_id: String,
		coin_type: String,
	},

	#[error(
		"Withdrawal at {position} of {amount} {coin_type} from vault {vault_id} exceeds balance {balance}; clamped to zero"
	)]
	BalanceClamped {
		position: Position,
		vault_id: String,
		coin_type: String,
		balance: u128,
		amount: u128,
	},
}

/// Vault aggregates plus the warnings raised while building them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Projection {
	pub vaults: BTreeMap<String, VaultAggregate>,
	pub warnings: Vec<ProjectionWarning>,
}

impl Projection {
	pub fn get(&self, vault_id: &str) -> Option<&VaultAggregate> {
		self.vaults.get(vault_id)
	}

	/// Fold one row into the projection. Rows must arrive in ascending position order.
	pub fn apply(mut self, row: &EventRow) -> Self {
		let position = row.position();
		let event = match VaultEvent::decode(&row.event_type, &row.payload) {
			Ok(event) => event,
			Err(DecodeError::UnsupportedType(event_type)) => {
				debug!("Ignoring {} event at {}", event_type, position);
				return self;
			}
			Err(e @ DecodeError::Malformed { .. }) => {
				return self.warn(ProjectionWarning::MalformedPayload {
					position,
					reason: e.to_string(),
				});
			}
		};

		let warning = match event {
			VaultEvent::VaultCreated {
				vault_id,
				name,
				creator,
				policy,
			} => match self.vaults.get_mut(&vault_id) {
				Some(existing) => {
					existing.last_updated_at_ms = row.timestamp_ms;
					Some(ProjectionWarning::DuplicateCreation { position, vault_id })
				}
				None => {
					let vault =
						VaultAggregate::new(vault_id.clone(), name, creator, policy, row.timestamp_ms);
					self.vaults.insert(vault_id, vault);
					None
				}
			},
			other => match self.vaults.get_mut(other.vault_id()) {
				Some(vault) => {
					vault.last_updated_at_ms = row.timestamp_ms;
					apply_to_vault(vault, other, position)
				}
				None => Some(ProjectionWarning::UnknownVault {
					position,
					vault_id: other.vault_id().to_string(),
					kind: other.kind(),
				}),
			},
		};

		match warning {
			Some(warning) => self.warn(warning),
			None => self,
		}
	}

	fn warn(mut self, warning: ProjectionWarning) -> Self {
		warn!("{}", warning);
		self.warnings.push(warning);
		self
	}
}

/// Apply a non-creation event to an existing vault.
fn apply_to_vault(
	vault: &mut VaultAggregate,
	event: VaultEvent,
	position: Position,
) -> Option<ProjectionWarning> {
	match event {
		VaultEvent::CoinDeposited { coin_type, amount, .. } => {
			let balance = vault.balances.entry(coin_type).or_insert(0);
			*balance = balance.saturating_add(amount);
			None
		}
		VaultEvent::CoinWithdrawn {
			vault_id,
			coin_type,
			amount,
		} => {
			let Some(balance) = vault.balances.get_mut(&coin_type) else {
				return Some(ProjectionWarning::UnknownCoinType {
					position,
					vault_id,
					coin_type,
				});
			};
			match balance.checked_sub(amount) {
				Some(remaining) => {
					*balance = remaining;
					None
				}
				None => {
					let before = *balance;
					*balance = 0;
					Some(ProjectionWarning::BalanceClamped {
						position,
						vault_id,
						coin_type,
						balance: before,
						amount,
					})
				}
			}
		}
		VaultEvent::PolicySet { policy, .. } => {
			vault.policy = policy;
			None
		}
		VaultEvent::TokenWeightsSet { weights, .. } => {
			vault.allocations = weights.into_iter().collect();
			None
		}
		VaultEvent::VaultTransferred { to, .. } => {
			vault.current_admin = to;
			None
		}
		VaultEvent::VaultCreated { .. } => None,
	}
}

/// Fold `rows` into vault aggregates, in ascending position order whatever order they are given in.
pub fn project<'a>(rows: impl IntoIterator<Item = &'a EventRow>) -> Projection {
	let mut ordered: Vec<&EventRow> = rows.into_iter().collect();
	ordered.sort_by(|a, b| a.id.cmp(&b.id));
	ordered.into_iter().fold(Projection::default(), Projection::apply)
}
