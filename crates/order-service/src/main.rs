//! Main entry point for the order service.
//!
//! Loads the configuration, builds the order service on the configured
//! storage backend and serves the HTTP API until interrupted.

use clap::Parser;
use order_config::Config;
use order_core::{OrderService, OrderServiceBuilder};
use order_storage::{get_all_implementations, StorageFactory};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

mod apis;
mod server;

/// Command-line arguments for the order service.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "ORDERS_CONFIG", default_value = "config.toml")]
	config: PathBuf,

	/// Log level (trace, debug, info, warn, error)
	#[arg(short, long, default_value = "info")]
	log_level: String,
}

/// Main entry point for the order service.
///
/// This function:
/// 1. Parses command-line arguments
/// 2. Initializes logging infrastructure
/// 3. Loads configuration from file
/// 4. Builds the order service and checks its storage backend
/// 5. Serves the API until interrupted
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	let args = Args::parse();

	use tracing_subscriber::{fmt, EnvFilter};

	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

	fmt()
		.with_env_filter(env_filter)
		.with_thread_ids(true)
		.with_target(true)
		.init();

	tracing::info!("Started order service");

	let config = Config::from_file(&args.config).await?;
	tracing::info!("Loaded configuration [{}]", config.service.id);

	let api_config = config.api.clone();
	let service = Arc::new(build_service(config)?);
	service.initialize().await?;

	server::start_server(api_config, service).await?;

	tracing::info!("Stopped order service");
	Ok(())
}

/// Builds the order service with every registered storage implementation
/// available by name.
fn build_service(config: Config) -> Result<OrderService, Box<dyn std::error::Error>> {
	let storage_factories: HashMap<String, StorageFactory> = get_all_implementations()
		.into_iter()
		.map(|(name, factory)| (name.to_string(), factory))
		.collect();

	Ok(OrderServiceBuilder::new(config).build(storage_factories)?)
}
