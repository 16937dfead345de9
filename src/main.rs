use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use vault_indexer::config::IndexerConfig;
use vault_indexer::indexer::SuiRpcClient;
use vault_indexer::projection::{VaultFilter, VaultQueryService};
use vault_indexer::store::{EventStore, SqliteEventStore};
use vault_indexer::sync::IngestionOrchestrator;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting vault indexer");

	let config = match IndexerConfig::from_env() {
		Ok(config) => config,
		Err(e) => {
			error!("Invalid configuration: {}", e);
			return ExitCode::FAILURE;
		}
	};
	info!(
		"Indexing {}::{} from {}",
		config.package_id, config.module_name, config.rpc_url
	);

	let store: Arc<dyn EventStore> = match SqliteEventStore::connect(&config.database_url).await {
		Ok(store) => Arc::new(store),
		Err(e) => {
			error!("Failed to open event store: {}", e);
			return ExitCode::FAILURE;
		}
	};

	let client = match SuiRpcClient::new(config.rpc_url.clone(), config.rpc_timeout) {
		Ok(client) => client,
		Err(e) => {
			error!("Failed to create RPC client: {}", e);
			return ExitCode::FAILURE;
		}
	};

	log_projection_summary(&store).await;

	let orchestrator =
		IngestionOrchestrator::new(Arc::new(client), store.clone(), config.sync_settings());
	match orchestrator.run(shutdown_signal()).await {
		Ok(report) => {
			info!(
				"Vault indexer stopped. Catch-up persisted {} events, live polling {}",
				report.catch_up.events_persisted,
				report.poller.map_or(0, |poller| poller.events_persisted)
			);
			ExitCode::SUCCESS
		}
		Err(e) => {
			error!("Ingestion aborted: {}", e);
			ExitCode::FAILURE
		}
	}
}

/// Log how many vaults the stored log already describes.
async fn log_projection_summary(store: &Arc<dyn EventStore>) {
	let service = VaultQueryService::new(store.clone());
	match service.list_vaults(&VaultFilter::default()).await {
		Ok(vaults) => info!("Stored event log describes {} vaults", vaults.len()),
		Err(e) => error!("Failed to project stored events: {}", e),
	}
}

/// Resolve on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			error!("Failed to listen for Ctrl-C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		use tokio::signal::unix::{SignalKind, signal};
		match signal(SignalKind::terminate()) {
			Ok(mut sigterm) => {
				sigterm.recv().await;
			}
			Err(e) => {
				error!("Failed to listen for SIGTERM: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {}
		_ = terminate => {}
	}
	info!("Shutdown signal received");
}
