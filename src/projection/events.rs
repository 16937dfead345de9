//! Typed vault events and payload decoding.
//!
//! Stored rows carry the raw Move event as JSON. [`VaultEvent::decode`] turns a row's type and
//! payload into one of six variants, or rejects it. Move `u64`/`u128` fields arrive as decimal
//! strings while small integers may arrive as numbers; both are accepted.

use crate::projection::aggregate::RebalancePolicy;
use itertools::{EitherOrBoth, Itertools};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Upper bound for a single allocation weight.
pub const MAX_WEIGHT_BPS: u16 = 10_000;

/// Name given to vaults created without one.
pub const DEFAULT_VAULT_NAME: &str = "Unnamed Vault";

/// The vault event types, matched on the last segment of the Move type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum EventKind {
	VaultCreated,
	CoinDeposited,
	CoinWithdrawn,
	PolicySet,
	TokenWeightsSet,
	VaultTransferred,
}

impl EventKind {
	pub const ALL: [EventKind; 6] = [
		EventKind::VaultCreated,
		EventKind::CoinDeposited,
		EventKind::CoinWithdrawn,
		EventKind::PolicySet,
		EventKind::TokenWeightsSet,
		EventKind::VaultTransferred,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			EventKind::VaultCreated => "VaultCreated",
			EventKind::CoinDeposited => "CoinDeposited",
			EventKind::CoinWithdrawn => "CoinWithdrawn",
			EventKind::PolicySet => "PolicySet",
			EventKind::TokenWeightsSet => "TokenWeightsSet",
			EventKind::VaultTransferred => "VaultTransferred",
		}
	}

	/// Kind of a fully qualified Move type such as `0xabc::vault::CoinDeposited<0x2::sui::SUI>`.
	pub fn from_type_name(event_type: &str) -> Option<EventKind> {
		let base = event_type.split('<').next().unwrap_or(event_type);
		let name = base.rsplit("::").next().unwrap_or(base).trim();
		EventKind::ALL.into_iter().find(|kind| kind.as_str() == name)
	}
}

impl fmt::Display for EventKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A decoded vault event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
	VaultCreated {
		vault_id: String,
		name: String,
		creator: String,
		policy: RebalancePolicy,
	},
	CoinDeposited {
		vault_id: String,
		coin_type: String,
		amount: u128,
	},
	CoinWithdrawn {
		vault_id: String,
		coin_type: String,
		amount: u128,
	},
	PolicySet {
		vault_id: String,
		policy: RebalancePolicy,
	},
	/// Replaces the whole allocation map.
	TokenWeightsSet {
		vault_id: String,
		weights: Vec<(String, u16)>,
	},
	VaultTransferred {
		vault_id: String,
		to: String,
	},
}

/// Error types for payload decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
	#[error("Unsupported event type: {0}")]
	UnsupportedType(String),

	#[error("Malformed {kind} payload: {reason}")]
	Malformed { kind: EventKind, reason: String },
}

#[derive(Deserialize)]
struct CreatedPayload {
	vault_id: String,
	#[serde(default)]
	name: Option<String>,
	creator: String,
	#[serde(default)]
	policy: Option<PolicyPayload>,
}

#[derive(Deserialize)]
struct CoinPayload {
	vault_id: String,
	coin_type: String,
	#[serde(deserialize_with = "lenient::u128")]
	amount: u128,
}

#[derive(Deserialize)]
struct PolicySetPayload {
	vault_id: String,
	#[serde(flatten)]
	policy: PolicyPayload,
}

#[derive(Deserialize, Default)]
struct PolicyPayload {
	#[serde(default, deserialize_with = "lenient::text")]
	rebalance_type: String,
	#[serde(default, deserialize_with = "lenient::u64")]
	rebalance_interval_days: u64,
	#[serde(default, deserialize_with = "lenient::u64")]
	rebalance_threshold_bps: u64,
}

impl From<PolicyPayload> for RebalancePolicy {
	fn from(payload: PolicyPayload) -> Self {
		RebalancePolicy {
			rebalance_type: payload.rebalance_type,
			interval_days: payload.rebalance_interval_days,
			threshold_bps: payload.rebalance_threshold_bps,
		}
	}
}

#[derive(Deserialize)]
struct WeightsPayload {
	vault_id: String,
	#[serde(default)]
	target_coin_types: Vec<Option<String>>,
	#[serde(default, deserialize_with = "lenient::u64_vec")]
	target_weights_bps: Vec<u64>,
}

#[derive(Deserialize)]
struct TransferPayload {
	vault_id: String,
	to: String,
}

impl VaultEvent {
	/// Decode a stored event of Move type `event_type`.
	///
	/// # Errors
	/// `UnsupportedType` for types outside the six vault events; `Malformed` when required fields
	/// are missing or a value is out of range.
	pub fn decode(event_type: &str, payload: &Value) -> Result<VaultEvent, DecodeError> {
		let kind = EventKind::from_type_name(event_type)
			.ok_or_else(|| DecodeError::UnsupportedType(event_type.to_string()))?;
		let malformed = |e: serde_json::Error| DecodeError::Malformed {
			kind,
			reason: e.to_string(),
		};

		let event = match kind {
			EventKind::VaultCreated => {
				let p = CreatedPayload::deserialize(payload).map_err(malformed)?;
				VaultEvent::VaultCreated {
					vault_id: p.vault_id,
					name: p
						.name
						.filter(|name| !name.is_empty())
						.unwrap_or_else(|| DEFAULT_VAULT_NAME.to_string()),
					creator: p.creator,
					policy: p.policy.unwrap_or_default().into(),
				}
			}
			EventKind::CoinDeposited => {
				let p = CoinPayload::deserialize(payload).map_err(malformed)?;
				VaultEvent::CoinDeposited {
					vault_id: p.vault_id,
					coin_type: p.coin_type,
					amount: p.amount,
				}
			}
			EventKind::CoinWithdrawn => {
				let p = CoinPayload::deserialize(payload).map_err(malformed)?;
				VaultEvent::CoinWithdrawn {
					vault_id: p.vault_id,
					coin_type: p.coin_type,
					amount: p.amount,
				}
			}
			EventKind::PolicySet => {
				let p = PolicySetPayload::deserialize(payload).map_err(malformed)?;
				VaultEvent::PolicySet {
					vault_id: p.vault_id,
					policy: p.policy.into(),
				}
			}
			EventKind::TokenWeightsSet => {
				let p = WeightsPayload::deserialize(payload).map_err(malformed)?;
				VaultEvent::TokenWeightsSet {
					vault_id: p.vault_id,
					weights: pair_weights(kind, p.target_coin_types, p.target_weights_bps)?,
				}
			}
			EventKind::VaultTransferred => {
				let p = TransferPayload::deserialize(payload).map_err(malformed)?;
				VaultEvent::VaultTransferred {
					vault_id: p.vault_id,
					to: p.to,
				}
			}
		};

		if event.vault_id().is_empty() {
			return Err(DecodeError::Malformed {
				kind,
				reason: "empty vault_id".to_string(),
			});
		}
		Ok(event)
	}

	pub fn kind(&self) -> EventKind {
		match self {
			VaultEvent::VaultCreated { .. } => EventKind::VaultCreated,
			VaultEvent::CoinDeposited { .. } => EventKind::CoinDeposited,
			VaultEvent::CoinWithdrawn { .. } => EventKind::CoinWithdrawn,
			VaultEvent::PolicySet { .. } => EventKind::PolicySet,
			VaultEvent::TokenWeightsSet { .. } => EventKind::TokenWeightsSet,
			VaultEvent::VaultTransferred { .. } => EventKind::VaultTransferred,
		}
	}

	pub fn vault_id(&self) -> &str {
		match self {
			VaultEvent::VaultCreated { vault_id, .. }
			| VaultEvent::CoinDeposited { vault_id, .. }
			| VaultEvent::CoinWithdrawn { vault_id, .. }
			| VaultEvent::PolicySet { vault_id, .. }
			| VaultEvent::TokenWeightsSet { vault_id, .. }
			| VaultEvent::VaultTransferred { vault_id, .. } => vault_id,
		}
	}
}

/// Zip coin types with weights by index. A missing weight is zero, a surplus weight or an empty
/// coin type is ignored.
fn pair_weights(
	kind: EventKind,
	coin_types: Vec<Option<String>>,
	weights: Vec<u64>,
) -> Result<Vec<(String, u16)>, DecodeError> {
	let mut pairs = Vec::with_capacity(coin_types.len());
	for entry in coin_types.into_iter().zip_longest(weights) {
		let (coin_type, weight) = match entry {
			EitherOrBoth::Both(coin_type, weight) => (coin_type, weight),
			EitherOrBoth::Left(coin_type) => (coin_type, 0),
			EitherOrBoth::Right(_) => continue,
		};
		let Some(coin_type) = coin_type.filter(|c| !c.is_empty()) else {
			continue;
		};
		let weight = u16::try_from(weight)
			.ok()
			.filter(|w| *w <= MAX_WEIGHT_BPS)
			.ok_or_else(|| DecodeError::Malformed {
				kind,
				reason: format!("weight {} bps for {} exceeds {}", weight, coin_type, MAX_WEIGHT_BPS),
			})?;
		pairs.push((coin_type, weight));
	}
	Ok(pairs)
}

/// Deserializers accepting numbers as JSON numbers or decimal strings. `null` reads as zero.
mod lenient {
	use serde::de::{Deserializer, Error};
	use serde::Deserialize;

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Number {
		Int(u64),
		Text(String),
		Null,
	}

	fn parse<E: Error>(number: Number) -> Result<u128, E> {
		match number {
			Number::Int(value) => Ok(u128::from(value)),
			Number::Text(text) => text
				.trim()
				.parse::<u128>()
				.map_err(|_| E::custom(format!("invalid unsigned integer {:?}", text))),
			Number::Null => Ok(0),
		}
	}

	pub fn u128<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
		parse(Number::deserialize(deserializer)?)
	}

	pub fn u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
		let value = parse(Number::deserialize(deserializer)?)?;
		u64::try_from(value).map_err(|_| D::Error::custom(format!("{} exceeds u64", value)))
	}

	pub fn u64_vec<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u64>, D::Error> {
		Vec::<Number>::deserialize(deserializer)?
			.into_iter()
			.map(|number| {
				let value = parse::<D::Error>(number)?;
				u64::try_from(value).map_err(|_| D::Error::custom(format!("{} exceeds u64", value)))
			})
			.collect()
	}

	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Text {
		Text(String),
		Int(u64),
		Null,
	}

	pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
		Ok(match Text::deserialize(deserializer)? {
			Text::Text(text) => text,
			Text::Int(value) => value.to_string(),
			Text::Null => String::new(),
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn kind_comes_from_the_last_type_segment() {
		assert_eq!(
			EventKind::from_type_name("0xabc::vault::CoinDeposited"),
			Some(EventKind::CoinDeposited)
		);
		assert_eq!(
			EventKind::from_type_name("0xabc::vault::CoinDeposited<0x2::sui::SUI>"),
			Some(EventKind::CoinDeposited)
		);
		assert_eq!(EventKind::from_type_name("0xabc::vault::AdminChanged"), None);
		assert_eq!(EventKind::from_type_name("0xabc::vault_ext::VaultCreatedV2"), None);
	}

	#[test]
	fn vault_created_applies_defaults() {
		let event = VaultEvent::decode(
			"0xabc::vault::VaultCreated",
			&json!({ "vault_id": "0x1", "creator": "0xc1" }),
		)
		.unwrap();

		assert_eq!(
			event,
			VaultEvent::VaultCreated {
				vault_id: "0x1".into(),
				name: DEFAULT_VAULT_NAME.into(),
				creator: "0xc1".into(),
				policy: RebalancePolicy::default(),
			}
		);
	}

	#[test]
	fn vault_created_reads_nested_policy() {
		let event = VaultEvent::decode(
			"0xabc::vault::VaultCreated",
			&json!({
				"vault_id": "0x1",
				"name": "Blue chips",
				"creator": "0xc1",
				"policy": {
					"rebalance_type": "interval",
					"rebalance_interval_days": "7",
					"rebalance_threshold_bps": 250
				}
			}),
		)
		.unwrap();

		let VaultEvent::VaultCreated { name, policy, .. } = event else {
			panic!("expected VaultCreated");
		};
		assert_eq!(name, "Blue chips");
		assert_eq!(
			policy,
			RebalancePolicy {
				rebalance_type: "interval".into(),
				interval_days: 7,
				threshold_bps: 250,
			}
		);
	}

	#[test]
	fn amounts_accept_strings_beyond_u64() {
		let event = VaultEvent::decode(
			"0xabc::vault::CoinDeposited",
			&json!({ "vault_id": "0x1", "coin_type": "0x2::sui::SUI", "amount": "340282366920938463463374607431768211455" }),
		)
		.unwrap();

		assert_eq!(
			event,
			VaultEvent::CoinDeposited {
				vault_id: "0x1".into(),
				coin_type: "0x2::sui::SUI".into(),
				amount: u128::MAX,
			}
		);
	}

	#[test]
	fn missing_required_fields_are_malformed() {
		let result = VaultEvent::decode("0xabc::vault::CoinWithdrawn", &json!({ "vault_id": "0x1", "amount": "5" }));
		assert!(matches!(
			result,
			Err(DecodeError::Malformed {
				kind: EventKind::CoinWithdrawn,
				..
			})
		));

		let result = VaultEvent::decode("0xabc::vault::VaultTransferred", &json!({ "vault_id": "" , "to": "0x2" }));
		assert!(matches!(result, Err(DecodeError::Malformed { .. })));
	}

	#[test]
	fn negative_or_fractional_amounts_are_malformed() {
		for amount in [json!(-5), json!("-5"), json!(1.5), json!("ten")] {
			let result = VaultEvent::decode(
				"0xabc::vault::CoinDeposited",
				&json!({ "vault_id": "0x1", "coin_type": "X", "amount": amount }),
			);
			assert!(matches!(result, Err(DecodeError::Malformed { .. })), "{:?}", amount);
		}
	}

	#[test]
	fn unknown_types_are_unsupported() {
		assert_eq!(
			VaultEvent::decode("0xabc::vault::Paused", &json!({})),
			Err(DecodeError::UnsupportedType("0xabc::vault::Paused".into()))
		);
	}

	#[test]
	fn weights_are_zipped_by_index() {
		let event = VaultEvent::decode(
			"0xabc::vault::TokenWeightsSet",
			&json!({
				"vault_id": "0x1",
				"target_coin_types": ["A", null, "B", "C"],
				"target_weights_bps": ["6000", 1000, 4000]
			}),
		)
		.unwrap();

		assert_eq!(
			event,
			VaultEvent::TokenWeightsSet {
				vault_id: "0x1".into(),
				weights: vec![("A".into(), 6000), ("B".into(), 4000), ("C".into(), 0)],
			}
		);
	}

	#[test]
	fn weight_above_full_allocation_is_malformed() {
		let result = VaultEvent::decode(
			"0xabc::vault::TokenWeightsSet",
			&json!({ "vault_id": "0x1", "target_coin_types": ["A"], "target_weights_bps": [10001] }),
		);
		assert!(matches!(result, Err(DecodeError::Malformed { .. })));
	}

	#[test]
	fn policy_set_reads_flat_fields() {
		let event = VaultEvent::decode(
			"0xabc::vault::PolicySet",
			&json!({ "vault_id": "0x1", "rebalance_type": 1, "rebalance_threshold_bps": "500" }),
		)
		.unwrap();

		assert_eq!(
			event,
			VaultEvent::PolicySet {
				vault_id: "0x1".into(),
				policy: RebalancePolicy {
					rebalance_type: "1".into(),
					interval_days: 0,
					threshold_bps: 500,
				},
			}
		);
	}
}
