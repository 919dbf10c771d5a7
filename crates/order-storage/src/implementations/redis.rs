//! Redis storage backend.
//!
//! Records are plain string keys holding the JSON bytes; lists are native
//! Redis lists, so pushes and removals are atomic on the server. One
//! multiplexed connection is opened on first use and shared by all callers.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use ::redis::aio::MultiplexedConnection;
use ::redis::AsyncCommands;
use async_trait::async_trait;
use order_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::time::Duration;
use tokio::sync::OnceCell;

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Redis storage implementation.
pub struct RedisStorage {
	client: ::redis::Client,
	connection: OnceCell<MultiplexedConnection>,
	/// Prepended to every key and list name.
	key_prefix: String,
	connect_timeout: Duration,
}

impl RedisStorage {
	pub fn new(client: ::redis::Client, key_prefix: String, connect_timeout: Duration) -> Self {
		Self {
			client,
			connection: OnceCell::new(),
			key_prefix,
			connect_timeout,
		}
	}

	async fn conn(&self) -> Result<MultiplexedConnection, StorageError> {
		let conn = self
			.connection
			.get_or_try_init(|| async {
				let conn = tokio::time::timeout(
					self.connect_timeout,
					self.client.get_multiplexed_async_connection(),
				)
				.await
				.map_err(|_| {
					StorageError::Backend(format!(
						"Connection timed out after {}ms",
						self.connect_timeout.as_millis()
					))
				})?
				.map_err(backend_error)?;
				tracing::debug!(component = "storage", implementation = "redis", "Connected");
				Ok::<_, StorageError>(conn)
			})
			.await?;
		Ok(conn.clone())
	}

	fn prefixed(&self, key: &str) -> String {
		format!("{}{}", self.key_prefix, key)
	}
}

fn backend_error(e: ::redis::RedisError) -> StorageError {
	StorageError::Backend(e.to_string())
}

/// Converts a page window into inclusive `LRANGE` start and stop indices.
///
/// Returns `None` when the window is empty or starts beyond any index a
/// Redis list can hold.
fn lrange_bounds(offset: usize, limit: usize) -> Option<(isize, isize)> {
	if limit == 0 {
		return None;
	}
	let start = isize::try_from(offset).ok()?;
	let span = isize::try_from(limit - 1).unwrap_or(isize::MAX);
	Some((start, start.saturating_add(span)))
}

#[async_trait]
impl StorageInterface for RedisStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let mut conn = self.conn().await?;
		let value: Option<Vec<u8>> = conn.get(self.prefixed(key)).await.map_err(backend_error)?;
		value.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let mut conn = self.conn().await?;
		let _: () = conn
			.set(self.prefixed(key), value)
			.await
			.map_err(backend_error)?;
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<bool, StorageError> {
		let mut conn = self.conn().await?;
		let removed: u64 = conn.del(self.prefixed(key)).await.map_err(backend_error)?;
		Ok(removed > 0)
	}

	async fn replace_bytes(&self, key: &str, value: Vec<u8>) -> Result<bool, StorageError> {
		let mut conn = self.conn().await?;
		// XX makes the server skip the write when the key is absent.
		let reply: Option<String> = ::redis::cmd("SET")
			.arg(self.prefixed(key))
			.arg(value)
			.arg("XX")
			.query_async(&mut conn)
			.await
			.map_err(backend_error)?;
		Ok(reply.is_some())
	}

	async fn list_push(&self, list: &str, member: &str) -> Result<(), StorageError> {
		let mut conn = self.conn().await?;
		let _: u64 = conn
			.rpush(self.prefixed(list), member)
			.await
			.map_err(backend_error)?;
		Ok(())
	}

	async fn list_remove(&self, list: &str, member: &str) -> Result<bool, StorageError> {
		let mut conn = self.conn().await?;
		// A count of 0 removes every occurrence.
		let removed: u64 = conn
			.lrem(self.prefixed(list), 0, member)
			.await
			.map_err(backend_error)?;
		Ok(removed > 0)
	}

	async fn list_range(
		&self,
		list: &str,
		offset: usize,
		limit: usize,
	) -> Result<Vec<String>, StorageError> {
		let Some((start, stop)) = lrange_bounds(offset, limit) else {
			return Ok(Vec::new());
		};

		let mut conn = self.conn().await?;
		let members: Vec<String> = conn
			.lrange(self.prefixed(list), start, stop)
			.await
			.map_err(backend_error)?;
		Ok(members)
	}

	async fn ping(&self) -> Result<(), StorageError> {
		let mut conn = self.conn().await?;
		let _: String = ::redis::cmd("PING")
			.query_async(&mut conn)
			.await
			.map_err(backend_error)?;
		Ok(())
	}
}

/// Configuration schema for RedisStorage.
pub struct RedisStorageSchema;

impl ConfigSchema for RedisStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![
				Field::new("url", FieldType::String).with_validator(|value| {
					let url = value.as_str().unwrap_or_default();
					if ["redis://", "rediss://", "unix://", "redis+unix://"]
						.iter()
						.any(|scheme| url.starts_with(scheme))
					{
						Ok(())
					} else {
						Err("url must use the redis://, rediss:// or unix:// scheme".to_string())
					}
				}),
			],
			vec![
				Field::new("key_prefix", FieldType::String),
				Field::new(
					"connect_timeout_ms",
					FieldType::Integer {
						min: Some(1),
						max: Some(60_000),
					},
				),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a Redis storage backend from configuration.
///
/// Configuration parameters:
/// - `url`: Connection URL, e.g. "redis://127.0.0.1:6379/0"
/// - `key_prefix`: Optional prefix for every key (default: none)
/// - `connect_timeout_ms`: Limit for opening the connection (default: 5000)
///
/// No connection is made here; the first operation (normally the startup
/// ping) opens it.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	RedisStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let url = config
		.get("url")
		.and_then(|v| v.as_str())
		.ok_or_else(|| StorageError::Configuration("url is required".to_string()))?;
	let key_prefix = config
		.get("key_prefix")
		.and_then(|v| v.as_str())
		.unwrap_or_default()
		.to_string();
	let connect_timeout_ms = config
		.get("connect_timeout_ms")
		.and_then(|v| v.as_integer())
		.and_then(|ms| u64::try_from(ms).ok())
		.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS);

	let client = ::redis::Client::open(url)
		.map_err(|e| StorageError::Configuration(format!("Invalid redis url: {}", e)))?;

	Ok(Box::new(RedisStorage::new(
		client,
		key_prefix,
		Duration::from_millis(connect_timeout_ms),
	)))
}

/// Registry for the Redis storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "redis";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
