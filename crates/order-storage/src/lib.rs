//! Storage module for the order service.
//!
//! This module provides a key-value abstraction over interchangeable
//! backends (in-memory, file-based, Redis). Besides plain records, every
//! backend keeps named ordered lists, which the order store uses as its
//! enumeration index.

use async_trait::async_trait;
use order_types::ImplementationRegistry;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub mod implementations {
	pub mod file;
	pub mod memory;
	pub mod redis;
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
	/// The requested item does not exist.
	#[error("Not found")]
	NotFound,
	/// A value could not be encoded or decoded.
	#[error("Serialization error: {0}")]
	Serialization(String),
	/// The backend failed (I/O, connectivity).
	#[error("Backend error: {0}")]
	Backend(String),
	/// The backend configuration is invalid.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

/// Low-level interface implemented by every storage backend.
///
/// Single-key operations are expected to be atomic. Nothing spanning two
/// keys is: a record and its list entry are written by separate calls.
/// Callers compensate for a failed second write themselves.
#[async_trait]
pub trait StorageInterface: Send + Sync {
	/// Retrieves raw bytes for the given key.
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError>;

	/// Stores raw bytes under the given key, overwriting any previous value.
	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError>;

	/// Deletes the value for the key. Returns whether a value was present.
	async fn delete(&self, key: &str) -> Result<bool, StorageError>;

	/// Overwrites the value of a key only if the key is present.
	///
	/// The presence check and the write form a single step, so a
	/// concurrent `delete` either wins and this returns `false`, or runs
	/// after the write and removes it. Returns whether the value was written.
	async fn replace_bytes(&self, key: &str, value: Vec<u8>) -> Result<bool, StorageError>;

	/// Appends a member to the end of the named list.
	async fn list_push(&self, list: &str, member: &str) -> Result<(), StorageError>;

	/// Removes every occurrence of a member from the named list.
	/// Returns whether anything was removed.
	async fn list_remove(&self, list: &str, member: &str) -> Result<bool, StorageError>;

	/// Returns up to `limit` members starting at position `offset`.
	async fn list_range(
		&self,
		list: &str,
		offset: usize,
		limit: usize,
	) -> Result<Vec<String>, StorageError>;

	/// Verifies the backend is reachable.
	async fn ping(&self) -> Result<(), StorageError>;
}

/// Signature every storage implementation exposes to build itself from its
/// configuration table.
pub type StorageFactory = fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError>;

/// Registry trait for storage implementations.
pub trait StorageRegistry: ImplementationRegistry<Factory = StorageFactory> {}

/// Get all registered storage implementations as (name, factory) pairs.
pub fn get_all_implementations() -> Vec<(&'static str, StorageFactory)> {
	use implementations::{file, memory, redis};

	vec![
		(file::Registry::NAME, file::Registry::factory()),
		(memory::Registry::NAME, memory::Registry::factory()),
		(redis::Registry::NAME, redis::Registry::factory()),
	]
}

/// High-level storage service that provides typed operations.
///
/// Values are stored as JSON under `namespace:id` keys.
pub struct StorageService {
	backend: Box<dyn StorageInterface>,
}

impl StorageService {
	pub fn new(backend: Box<dyn StorageInterface>) -> Self {
		Self { backend }
	}

	fn key(namespace: &str, id: &str) -> String {
		format!("{}:{}", namespace, id)
	}

	/// Stores a serializable value, creating or overwriting it.
	pub async fn store<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		self.backend
			.set_bytes(&Self::key(namespace, id), bytes)
			.await
	}

	/// Retrieves and deserializes a value.
	pub async fn retrieve<T: DeserializeOwned>(
		&self,
		namespace: &str,
		id: &str,
	) -> Result<T, StorageError> {
		let bytes = self.backend.get_bytes(&Self::key(namespace, id)).await?;
		serde_json::from_slice(&bytes).map_err(|e| StorageError::Serialization(e.to_string()))
	}

	/// Overwrites an existing value.
	///
	/// Unlike [`store`](Self::store), fails with `NotFound` when the key is
	/// absent, and never recreates a value removed concurrently.
	pub async fn update<T: Serialize>(
		&self,
		namespace: &str,
		id: &str,
		data: &T,
	) -> Result<(), StorageError> {
		let bytes =
			serde_json::to_vec(data).map_err(|e| StorageError::Serialization(e.to_string()))?;
		if self
			.backend
			.replace_bytes(&Self::key(namespace, id), bytes)
			.await?
		{
			Ok(())
		} else {
			Err(StorageError::NotFound)
		}
	}

	/// Removes a value, failing with `NotFound` if nothing was stored.
	pub async fn remove(&self, namespace: &str, id: &str) -> Result<(), StorageError> {
		if self.backend.delete(&Self::key(namespace, id)).await? {
			Ok(())
		} else {
			Err(StorageError::NotFound)
		}
	}

	/// Appends an id to the named list.
	pub async fn append_to_list(&self, list: &str, id: &str) -> Result<(), StorageError> {
		self.backend.list_push(list, id).await
	}

	/// Removes an id from the named list. Returns whether it was present.
	pub async fn remove_from_list(&self, list: &str, id: &str) -> Result<bool, StorageError> {
		self.backend.list_remove(list, id).await
	}

	/// Reads a window of the named list.
	pub async fn list_range(
		&self,
		list: &str,
		offset: usize,
		limit: usize,
	) -> Result<Vec<String>, StorageError> {
		self.backend.list_range(list, offset, limit).await
	}

	/// Verifies the backend is reachable.
	pub async fn ping(&self) -> Result<(), StorageError> {
		self.backend.ping().await
	}
}
