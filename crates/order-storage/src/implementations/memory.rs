//! In-memory storage backend.
//!
//! Useful for tests and development where persistence across restarts is
//! not required.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use order_types::{ConfigSchema, ImplementationRegistry, Schema, ValidationError};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory storage implementation.
pub struct MemoryStorage {
	records: RwLock<HashMap<String, Vec<u8>>>,
	lists: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryStorage {
	pub fn new() -> Self {
		Self {
			records: RwLock::new(HashMap::new()),
			lists: RwLock::new(HashMap::new()),
		}
	}
}

impl Default for MemoryStorage {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl StorageInterface for MemoryStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		let records = self.records.read().await;
		records.get(key).cloned().ok_or(StorageError::NotFound)
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let mut records = self.records.write().await;
		records.insert(key.to_string(), value);
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<bool, StorageError> {
		let mut records = self.records.write().await;
		Ok(records.remove(key).is_some())
	}

	async fn replace_bytes(&self, key: &str, value: Vec<u8>) -> Result<bool, StorageError> {
		let mut records = self.records.write().await;
		match records.get_mut(key) {
			Some(slot) => {
				*slot = value;
				Ok(true)
			},
			None => Ok(false),
		}
	}

	async fn list_push(&self, list: &str, member: &str) -> Result<(), StorageError> {
		let mut lists = self.lists.write().await;
		lists
			.entry(list.to_string())
			.or_default()
			.push(member.to_string());
		Ok(())
	}

	async fn list_remove(&self, list: &str, member: &str) -> Result<bool, StorageError> {
		let mut lists = self.lists.write().await;
		let Some(members) = lists.get_mut(list) else {
			return Ok(false);
		};
		let before = members.len();
		members.retain(|m| m != member);
		Ok(members.len() != before)
	}

	async fn list_range(
		&self,
		list: &str,
		offset: usize,
		limit: usize,
	) -> Result<Vec<String>, StorageError> {
		let lists = self.lists.read().await;
		Ok(lists
			.get(list)
			.map(|members| members.iter().skip(offset).take(limit).cloned().collect())
			.unwrap_or_default())
	}

	async fn ping(&self) -> Result<(), StorageError> {
		Ok(())
	}
}

/// Configuration schema for MemoryStorage. No fields are accepted.
pub struct MemoryStorageSchema;

impl ConfigSchema for MemoryStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

/// Factory function to create a memory storage backend from configuration.
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	MemoryStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;
	Ok(Box::new(MemoryStorage::new()))
}

/// Registry for the memory storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "memory";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
