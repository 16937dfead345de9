//! Environment-driven configuration.

use crate::indexer::EventFilter;
use crate::sync::{RetryPolicy, SyncSettings};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://vault-indexer.db";
pub const DEFAULT_BATCH_LIMIT: u32 = 50;
pub const MAX_BATCH_LIMIT: u32 = 1000;
pub const DEFAULT_POLL_MS: u64 = 5000;
pub const DEFAULT_RPC_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_NETWORK_RETRY_ATTEMPTS: u32 = 10;
pub const DEFAULT_PERSIST_RETRY_ATTEMPTS: u32 = 6;
pub const DEFAULT_PERSIST_RETRY_DELAY_MS: u64 = 1000;
const PERSIST_RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Error types for configuration loading
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
	#[error("Missing required environment variable {0}")]
	Missing(&'static str),

	#[error("Invalid value for {name}: {reason}")]
	Invalid { name: &'static str, reason: String },
}

/// Sui network whose public fullnode is queried when no explicit RPC URL is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiNetwork {
	Mainnet,
	Testnet,
	Devnet,
	Localnet,
}

impl SuiNetwork {
	pub fn rpc_url(self) -> String {
		match self {
			SuiNetwork::Mainnet => "https://fullnode.mainnet.sui.io:443".to_string(),
			SuiNetwork::Testnet => "https://fullnode.testnet.sui.io:443".to_string(),
			SuiNetwork::Devnet => "https://fullnode.devnet.sui.io:443".to_string(),
			SuiNetwork::Localnet => "http://127.0.0.1:9000".to_string(),
		}
	}
}

impl FromStr for SuiNetwork {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"mainnet" => Ok(SuiNetwork::Mainnet),
			"testnet" => Ok(SuiNetwork::Testnet),
			"devnet" => Ok(SuiNetwork::Devnet),
			"localnet" => Ok(SuiNetwork::Localnet),
			other => Err(format!("unknown network {:?}", other)),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexerConfig {
	pub package_id: String,
	pub module_name: String,
	pub rpc_url: String,
	pub database_url: String,
	pub batch_limit: u32,
	pub poll_interval: Duration,
	pub rpc_timeout: Duration,
	pub network_retry_attempts: u32,
	pub persist_retry_attempts: u32,
	pub persist_retry_delay: Duration,
}

impl IndexerConfig {
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Build the configuration from `lookup`, which maps a variable name to its value. Empty
	/// values count as unset.
	pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
		let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
		let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

		let rpc_url = match get("SUI_RPC_URL") {
			Some(url) => url,
			None => {
				let network = required("SUI_NETWORK")?;
				network
					.parse::<SuiNetwork>()
					.map_err(|reason| ConfigError::Invalid {
						name: "SUI_NETWORK",
						reason,
					})?
					.rpc_url()
			}
		};

		let batch_limit =
			parse_or("INDEXING_BATCH_LIMIT", get("INDEXING_BATCH_LIMIT"), DEFAULT_BATCH_LIMIT)?;
		if !(1..=MAX_BATCH_LIMIT).contains(&batch_limit) {
			return Err(ConfigError::Invalid {
				name: "INDEXING_BATCH_LIMIT",
				reason: format!("{} is outside 1..={}", batch_limit, MAX_BATCH_LIMIT),
			});
		}

		Ok(Self {
			package_id: required("VAULT_PACKAGE_ID")?,
			module_name: required("VAULT_MODULE_NAME")?,
			rpc_url,
			database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
			batch_limit,
			poll_interval: positive_millis(
				"INDEXER_POLL_MS",
				get("INDEXER_POLL_MS"),
				DEFAULT_POLL_MS,
			)?,
			rpc_timeout: positive_millis(
				"RPC_TIMEOUT_MS",
				get("RPC_TIMEOUT_MS"),
				DEFAULT_RPC_TIMEOUT_MS,
			)?,
			network_retry_attempts: parse_or(
				"NETWORK_RETRY_ATTEMPTS",
				get("NETWORK_RETRY_ATTEMPTS"),
				DEFAULT_NETWORK_RETRY_ATTEMPTS,
			)?,
			persist_retry_attempts: parse_or(
				"PERSIST_RETRY_ATTEMPTS",
				get("PERSIST_RETRY_ATTEMPTS"),
				DEFAULT_PERSIST_RETRY_ATTEMPTS,
			)?,
			persist_retry_delay: positive_millis(
				"PERSIST_RETRY_DELAY_MS",
				get("PERSIST_RETRY_DELAY_MS"),
				DEFAULT_PERSIST_RETRY_DELAY_MS,
			)?,
		})
	}

	pub fn event_filter(&self) -> EventFilter {
		EventFilter::move_module(&self.package_id, &self.module_name)
	}

	pub fn sync_settings(&self) -> SyncSettings {
		let network = RetryPolicy::network();
		SyncSettings {
			filter: self.event_filter(),
			batch_limit: self.batch_limit,
			poll_interval: self.poll_interval,
			network_retry: RetryPolicy::new(
				self.network_retry_attempts,
				network.initial_delay,
				network.max_delay,
			),
			persist_retry: RetryPolicy::new(
				self.persist_retry_attempts,
				self.persist_retry_delay,
				PERSIST_RETRY_MAX_DELAY,
			),
		}
	}
}

fn parse_or<T: FromStr>(
	name: &'static str,
	value: Option<String>,
	default: T,
) -> Result<T, ConfigError>
where
	T::Err: std::fmt::Display,
{
	match value {
		None => Ok(default),
		Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
			name,
			reason: format!("{:?}: {}", raw, e),
		}),
	}
}

fn positive_millis(
	name: &'static str,
	value: Option<String>,
	default: u64,
) -> Result<Duration, ConfigError> {
	let millis = parse_or(name, value, default)?;
	if millis == 0 {
		return Err(ConfigError::Invalid {
			name,
			reason: "must be greater than zero".to_string(),
		});
	}
	Ok(Duration::from_millis(millis))
}
