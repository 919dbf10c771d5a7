//! File-based storage backend.
//!
//! Each record is a file under the configured directory; each list is a JSON
//! array in a `.list` file next to the records. Writes go to a temporary file
//! that is renamed into place, so readers never observe a partial value.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use order_types::{ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, ValidationError};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::Mutex;

const DEFAULT_STORAGE_PATH: &str = "./data/orders";

/// Distinguishes temp files of concurrent writers to the same key.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// File-based storage implementation.
pub struct FileStorage {
	/// Base directory path for storing files.
	base_path: PathBuf,
	/// Serializes read-modify-write cycles on list files.
	list_lock: Mutex<()>,
	/// Held by replace and delete so a replace cannot recreate a removed record.
	record_lock: Mutex<()>,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self {
			base_path,
			list_lock: Mutex::new(()),
			record_lock: Mutex::new(()),
		}
	}

	/// Converts a storage key to a filesystem-safe file path.
	fn record_path(&self, key: &str) -> PathBuf {
		self.base_path.join(format!("{}.bin", sanitize(key)))
	}

	fn list_path(&self, list: &str) -> PathBuf {
		self.base_path.join(format!("{}.list", sanitize(list)))
	}

	async fn read_list(&self, path: &Path) -> Result<Vec<String>, StorageError> {
		match fs::read(path).await {
			Ok(data) => serde_json::from_slice(&data)
				.map_err(|e| StorageError::Serialization(e.to_string())),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn write_list(&self, path: &Path, members: &[String]) -> Result<(), StorageError> {
		let data =
			serde_json::to_vec(members).map_err(|e| StorageError::Serialization(e.to_string()))?;
		write_atomic(path, data).await
	}
}

fn sanitize(key: &str) -> String {
	key.replace(['/', '\\', ':', '.'], "_")
}

/// Writes to a sibling temp file, then renames it over the target.
///
/// The temp file is removed again if the rename fails.
async fn write_atomic(path: &Path, data: Vec<u8>) -> Result<(), StorageError> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
	}

	let temp_path = path.with_extension(format!(
		"{}.tmp",
		TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
	));
	fs::write(&temp_path, data)
		.await
		.map_err(|e| StorageError::Backend(e.to_string()))?;
	if let Err(e) = fs::rename(&temp_path, path).await {
		if let Err(cleanup) = fs::remove_file(&temp_path).await {
			tracing::warn!(
				component = "storage",
				implementation = "file",
				path = %temp_path.display(),
				error = %cleanup,
				"Failed to remove temp file"
			);
		}
		return Err(StorageError::Backend(e.to_string()));
	}
	Ok(())
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match fs::read(self.record_path(key)).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		write_atomic(&self.record_path(key), value).await
	}

	async fn delete(&self, key: &str) -> Result<bool, StorageError> {
		let _guard = self.record_lock.lock().await;
		match fs::remove_file(self.record_path(key)).await {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn replace_bytes(&self, key: &str, value: Vec<u8>) -> Result<bool, StorageError> {
		let path = self.record_path(key);
		let _guard = self.record_lock.lock().await;

		let present = fs::try_exists(&path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		if !present {
			return Ok(false);
		}
		write_atomic(&path, value).await?;
		Ok(true)
	}

	async fn list_push(&self, list: &str, member: &str) -> Result<(), StorageError> {
		let path = self.list_path(list);
		let _guard = self.list_lock.lock().await;

		let mut members = self.read_list(&path).await?;
		members.push(member.to_string());
		self.write_list(&path, &members).await
	}

	async fn list_remove(&self, list: &str, member: &str) -> Result<bool, StorageError> {
		let path = self.list_path(list);
		let _guard = self.list_lock.lock().await;

		let mut members = self.read_list(&path).await?;
		let before = members.len();
		members.retain(|m| m != member);
		if members.len() == before {
			return Ok(false);
		}
		self.write_list(&path, &members).await?;
		Ok(true)
	}

	async fn list_range(
		&self,
		list: &str,
		offset: usize,
		limit: usize,
	) -> Result<Vec<String>, StorageError> {
		let members = self.read_list(&self.list_path(list)).await?;
		Ok(members.into_iter().skip(offset).take(limit).collect())
	}

	async fn ping(&self) -> Result<(), StorageError> {
		fs::create_dir_all(&self.base_path).await.map_err(|e| {
			StorageError::Backend(format!(
				"Storage directory {} is not usable: {}",
				self.base_path.display(),
				e
			))
		})
	}
}

/// Configuration schema for FileStorage.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![
				Field::new("storage_path", FieldType::String).with_validator(|value| {
					match value.as_str() {
						Some(path) if !path.trim().is_empty() => Ok(()),
						_ => Err("storage_path cannot be empty".to_string()),
					}
				}),
			],
		);
		schema.validate(config)
	}
}

/// Factory function to create a file storage backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for record files (default: "./data/orders")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or(DEFAULT_STORAGE_PATH);

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

/// Registry for the file storage implementation.
pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_records_persist_across_instances() {
		let temp_dir = TempDir::new().unwrap();

		let storage = FileStorage::new(temp_dir.path().to_path_buf());
		storage
			.set_bytes("orders:1", b"{\"a\":1}".to_vec())
			.await
			.unwrap();

		let reopened = FileStorage::new(temp_dir.path().to_path_buf());
		assert_eq!(reopened.get_bytes("orders:1").await.unwrap(), b"{\"a\":1}");
		assert!(temp_dir.path().join("orders_1.bin").exists());
		assert!(!temp_dir.path().join("orders_1.0.tmp").exists());
	}

	#[tokio::test]
	async fn test_delete_reports_presence() {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::new(temp_dir.path().to_path_buf());

		storage.set_bytes("orders:7", b"x".to_vec()).await.unwrap();
		assert!(storage.delete("orders:7").await.unwrap());
		assert!(!storage.delete("orders:7").await.unwrap());
		assert!(matches!(
			storage.get_bytes("orders:7").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_replace_requires_existing_record() {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::new(temp_dir.path().to_path_buf());

		assert!(!storage.replace_bytes("orders:3", b"a".to_vec()).await.unwrap());
		assert!(!temp_dir.path().join("orders_3.bin").exists());

		storage.set_bytes("orders:3", b"a".to_vec()).await.unwrap();
		assert!(storage.replace_bytes("orders:3", b"b".to_vec()).await.unwrap());
		assert_eq!(storage.get_bytes("orders:3").await.unwrap(), b"b");

		storage.delete("orders:3").await.unwrap();
		assert!(!storage.replace_bytes("orders:3", b"c".to_vec()).await.unwrap());
		assert!(matches!(
			storage.get_bytes("orders:3").await,
			Err(StorageError::NotFound)
		));
	}

	#[tokio::test]
	async fn test_failed_rename_removes_temp_file() {
		let temp_dir = TempDir::new().unwrap();
		// A non-empty directory at the record path makes the rename fail.
		let blocker = temp_dir.path().join("orders_1.bin");
		std::fs::create_dir(&blocker).unwrap();
		std::fs::write(blocker.join("keep"), b"x").unwrap();

		let storage = FileStorage::new(temp_dir.path().to_path_buf());
		let result = storage.set_bytes("orders:1", b"{}".to_vec()).await;
		assert!(matches!(result, Err(StorageError::Backend(_))));

		let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
			.unwrap()
			.map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
			.filter(|name| name.ends_with(".tmp"))
			.collect();
		assert!(leftovers.is_empty(), "leftover temp files: {:?}", leftovers);
	}

	#[tokio::test]
	async fn test_list_operations() {
		let temp_dir = TempDir::new().unwrap();
		let storage = FileStorage::new(temp_dir.path().join("nested"));

		assert!(storage.list_range("order_index", 0, 5).await.unwrap().is_empty());

		for member in ["10", "20", "30"] {
			storage.list_push("order_index", member).await.unwrap();
		}
		assert_eq!(
			storage.list_range("order_index", 1, 5).await.unwrap(),
			vec!["20", "30"]
		);

		assert!(storage.list_remove("order_index", "20").await.unwrap());
		assert!(!storage.list_remove("order_index", "20").await.unwrap());
		assert_eq!(
			storage.list_range("order_index", 0, 5).await.unwrap(),
			vec!["10", "30"]
		);
	}

	#[tokio::test]
	async fn test_ping_creates_directory() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("a").join("b");
		let storage = FileStorage::new(path.clone());

		storage.ping().await.unwrap();
		assert!(path.is_dir());
	}

	#[test]
	fn test_config_schema() {
		let schema = FileStorageSchema;

		let config: toml::Value = toml::from_str("storage_path = \"./orders\"").unwrap();
		assert!(schema.validate(&config).is_ok());

		let config: toml::Value = toml::from_str("storage_path = true").unwrap();
		assert!(matches!(
			schema.validate(&config),
			Err(ValidationError::TypeMismatch { .. })
		));
	}

	#[test]
	fn test_factory_validates_config() {
		let config: toml::Value = toml::from_str("storage_path = \"/tmp/orders\"").unwrap();
		assert!(create_storage(&config).is_ok());

		let config: toml::Value = toml::from_str("storage_path = 42").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));

		let config: toml::Value = toml::from_str("storage_path = \"  \"").unwrap();
		assert!(matches!(
			create_storage(&config),
			Err(StorageError::Configuration(_))
		));
	}
}
