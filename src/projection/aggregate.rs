//! Vault aggregate state and its serialisable view.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Rebalancing policy of a vault.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancePolicy {
	#[serde(rename = "rebalanceType")]
	pub rebalance_type: String,
	#[serde(rename = "rebalanceIntervalDays")]
	pub interval_days: u64,
	#[serde(rename = "rebalanceThresholdBps")]
	pub threshold_bps: u64,
}

/// Current state of one vault, rebuilt from the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VaultAggregate {
	pub id: String,
	pub name: String,
	pub creator: String,
	pub current_admin: String,
	/// Balance per coin type. Never negative.
	pub balances: BTreeMap<String, u128>,
	/// Target weight per coin type, in basis points.
	pub allocations: BTreeMap<String, u16>,
	pub policy: RebalancePolicy,
	pub created_at_ms: u64,
	pub last_updated_at_ms: u64,
}

impl VaultAggregate {
	pub fn new(
		id: String,
		name: String,
		creator: String,
		policy: RebalancePolicy,
		created_at_ms: u64,
	) -> Self {
		Self {
			id,
			name,
			current_admin: creator.clone(),
			creator,
			balances: BTreeMap::new(),
			allocations: BTreeMap::new(),
			policy,
			created_at_ms,
			last_updated_at_ms: created_at_ms,
		}
	}

	/// One entry per coin type that has a balance or an allocation, in ascending coin type order.
	pub fn tokens(&self) -> Vec<TokenView> {
		let coin_types: BTreeSet<&String> = self.balances.keys().chain(self.allocations.keys()).collect();
		coin_types
			.into_iter()
			.map(|coin_type| TokenView {
				coin_type: coin_type.clone(),
				amount: self.balances.get(coin_type).copied().unwrap_or(0).to_string(),
				weight_bps: self.allocations.get(coin_type).copied().unwrap_or(0),
			})
			.collect()
	}

	pub fn view(&self) -> VaultView {
		VaultView {
			id: self.id.clone(),
			name: self.name.clone(),
			creator: self.creator.clone(),
			current_admin: self.current_admin.clone(),
			tokens: self.tokens(),
			policy: self.policy.clone(),
			created_at: format_timestamp(self.created_at_ms),
			last_updated_at: format_timestamp(self.last_updated_at_ms),
		}
	}
}

/// Immutable snapshot of a vault handed to query callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultView {
	pub id: String,
	pub name: String,
	pub creator: String,
	pub current_admin: String,
	pub tokens: Vec<TokenView>,
	pub policy: RebalancePolicy,
	/// RFC 3339
	pub created_at: String,
	/// RFC 3339
	pub last_updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenView {
	pub coin_type: String,
	/// Decimal string; amounts can exceed what JSON numbers carry exactly.
	pub amount: String,
	pub weight_bps: u16,
}

/// RFC 3339 with millisecond precision, e.g. `2023-11-14T22:13:20.000Z`.
pub fn format_timestamp(timestamp_ms: u64) -> String {
	i64::try_from(timestamp_ms)
		.ok()
		.and_then(DateTime::<Utc>::from_timestamp_millis)
		.unwrap_or_default()
		.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn vault() -> VaultAggregate {
		VaultAggregate::new(
			"0x1".into(),
			"Blue chips".into(),
			"0xc1".into(),
			RebalancePolicy::default(),
			1_700_000_000_000,
		)
	}

	#[test]
	fn new_vault_is_administered_by_its_creator() {
		let vault = vault();
		assert_eq!(vault.current_admin, "0xc1");
		assert_eq!(vault.last_updated_at_ms, vault.created_at_ms);
		assert!(vault.tokens().is_empty());
	}

	#[test]
	fn tokens_are_the_sorted_union_of_balances_and_allocations() {
		let mut vault = vault();
		vault.balances.insert("0x2::sui::SUI".into(), 120);
		vault.balances.insert("0xa::usdc::USDC".into(), 7);
		vault.allocations.insert("0x2::sui::SUI".into(), 6000);
		vault.allocations.insert("0x1::btc::BTC".into(), 4000);

		assert_eq!(
			vault.tokens(),
			vec![
				TokenView {
					coin_type: "0x1::btc::BTC".into(),
					amount: "0".into(),
					weight_bps: 4000
				},
				TokenView {
					coin_type: "0x2::sui::SUI".into(),
					amount: "120".into(),
					weight_bps: 6000
				},
				TokenView {
					coin_type: "0xa::usdc::USDC".into(),
					amount: "7".into(),
					weight_bps: 0
				},
			]
		);
	}

	#[test]
	fn view_serializes_camel_case_with_rfc3339_timestamps() {
		let mut vault = vault();
		vault.balances.insert("X".into(), u128::MAX);

		let json = serde_json::to_value(vault.view()).unwrap();

		assert_eq!(json["currentAdmin"], "0xc1");
		assert_eq!(json["createdAt"], "2023-11-14T22:13:20.000Z");
		assert_eq!(json["lastUpdatedAt"], "2023-11-14T22:13:20.000Z");
		assert_eq!(json["tokens"][0]["coinType"], "X");
		assert_eq!(json["tokens"][0]["amount"], u128::MAX.to_string());
		assert_eq!(json["tokens"][0]["weightBps"], 0);
		assert_eq!(json["policy"]["rebalanceIntervalDays"], 0);
	}

	#[test]
	fn out_of_range_timestamp_falls_back_to_epoch() {
		assert_eq!(format_timestamp(u64::MAX), "1970-01-01T00:00:00.000Z");
	}
}
