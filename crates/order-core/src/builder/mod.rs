//! Builder for the order service.
//!
//! Instantiates every configured storage implementation through its
//! registered factory and wires the primary one into an [`OrderService`].

use crate::service::OrderService;
use order_config::Config;
use order_storage::{StorageError, StorageInterface, StorageService};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while building the order service.
#[derive(Debug, Error)]
pub enum BuilderError {
	#[error("Configuration error: {0}")]
	Config(String),
	#[error("Missing required component: {0}")]
	MissingComponent(String),
}

/// Builds an [`OrderService`] from configuration and storage factories.
pub struct OrderServiceBuilder {
	config: Config,
}

impl OrderServiceBuilder {
	pub fn new(config: Config) -> Self {
		Self { config }
	}

	/// Creates all configured storage implementations and returns a service
	/// backed by the primary one.
	///
	/// A configured implementation without a matching factory is an error.
	pub fn build<SF>(self, storage_factories: HashMap<String, SF>) -> Result<OrderService, BuilderError>
	where
		SF: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>,
	{
		let mut storage_impls = HashMap::new();
		for (name, config) in &self.config.storage.implementations {
			let factory = storage_factories.get(name).ok_or_else(|| {
				BuilderError::Config(format!("Unknown storage implementation '{}'", name))
			})?;

			match factory(config) {
				Ok(implementation) => {
					let is_primary = &self.config.storage.primary == name;
					tracing::info!(component = "storage", implementation = %name, primary = %is_primary, "Loaded");
					storage_impls.insert(name.clone(), implementation);
				},
				Err(e) => {
					tracing::error!(
						component = "storage",
						implementation = %name,
						error = %e,
						"Failed to create storage implementation"
					);
					return Err(BuilderError::Config(format!(
						"Failed to create storage implementation '{}': {}",
						name, e
					)));
				},
			}
		}

		let primary = &self.config.storage.primary;
		let backend = storage_impls
			.remove(primary)
			.ok_or_else(|| BuilderError::MissingComponent(format!("primary storage '{}'", primary)))?;

		Ok(OrderService::new(Arc::new(StorageService::new(backend))))
	}
}
