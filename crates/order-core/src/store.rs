//! Persistence of orders on top of the generic storage service.
//!
//! Each order is a JSON record under `orders:<id>`. Enumeration goes through
//! the `order_index` list, which holds ids in insertion order; pages are
//! windows of that list.

use order_storage::{StorageError, StorageService};
use order_types::{Order, OrderId, StorageKey};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by [`OrderStore`].
#[derive(Debug, Error)]
pub enum OrderStoreError {
	#[error("Order not found: {0}")]
	NotFound(OrderId),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl OrderStoreError {
	fn from_storage(id: OrderId, error: StorageError) -> Self {
		match error {
			StorageError::NotFound => OrderStoreError::NotFound(id),
			StorageError::Serialization(msg) => OrderStoreError::Serialization(msg),
			other => OrderStoreError::Storage(other.to_string()),
		}
	}
}

/// A window into the order index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
	pub offset: usize,
	pub size: usize,
}

/// One page of orders plus the offset of the page that may follow.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult {
	pub orders: Vec<Order>,
	/// Set when the index returned a full page.
	pub next_cursor: Option<u64>,
}

/// Keyed order records plus the enumeration index.
pub struct OrderStore {
	storage: Arc<StorageService>,
}

impl OrderStore {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	/// Writes a new record and appends its id to the index.
	///
	/// If the index entry cannot be written the record is removed again, so
	/// a failed insert leaves no order that enumeration cannot reach.
	pub async fn insert(&self, order: &Order) -> Result<(), OrderStoreError> {
		let id = order.order_id.to_string();
		self.storage
			.store(StorageKey::Orders.as_str(), &id, order)
			.await
			.map_err(|e| OrderStoreError::from_storage(order.order_id, e))?;

		if let Err(e) = self
			.storage
			.append_to_list(StorageKey::OrderIndex.as_str(), &id)
			.await
		{
			if let Err(cleanup) = self.storage.remove(StorageKey::Orders.as_str(), &id).await {
				error!(
					order_id = %order.order_id,
					error = %cleanup,
					"Failed to remove unindexed order record"
				);
			}
			return Err(OrderStoreError::from_storage(order.order_id, e));
		}
		Ok(())
	}

	pub async fn find_by_id(&self, id: OrderId) -> Result<Order, OrderStoreError> {
		self.storage
			.retrieve(StorageKey::Orders.as_str(), &id.to_string())
			.await
			.map_err(|e| OrderStoreError::from_storage(id, e))
	}

	/// Overwrites an existing record. Absent records are not created.
	pub async fn update(&self, order: &Order) -> Result<(), OrderStoreError> {
		self.storage
			.update(
				StorageKey::Orders.as_str(),
				&order.order_id.to_string(),
				order,
			)
			.await
			.map_err(|e| OrderStoreError::from_storage(order.order_id, e))
	}

	/// Removes the record, then its index entry.
	pub async fn delete_by_id(&self, id: OrderId) -> Result<(), OrderStoreError> {
		let key = id.to_string();
		self.storage
			.remove(StorageKey::Orders.as_str(), &key)
			.await
			.map_err(|e| OrderStoreError::from_storage(id, e))?;

		let indexed = self
			.storage
			.remove_from_list(StorageKey::OrderIndex.as_str(), &key)
			.await
			.map_err(|e| OrderStoreError::from_storage(id, e))?;
		if !indexed {
			warn!(order_id = %id, "Deleted order had no index entry");
		}
		Ok(())
	}

	/// Returns up to `page.size` orders starting at `page.offset` in index
	/// order.
	///
	/// Index entries whose record is gone are skipped, so a page may hold
	/// fewer orders than the index window it was read from. The cursor is
	/// based on the window, not on the number of orders returned.
	pub async fn find_all(&self, page: Page) -> Result<PageResult, OrderStoreError> {
		let ids = self
			.storage
			.list_range(StorageKey::OrderIndex.as_str(), page.offset, page.size)
			.await
			.map_err(|e| OrderStoreError::Storage(e.to_string()))?;

		let mut orders = Vec::with_capacity(ids.len());
		for raw in &ids {
			let Ok(id) = raw.parse::<OrderId>() else {
				warn!(entry = %raw, "Skipping malformed order index entry");
				continue;
			};
			match self.find_by_id(id).await {
				Ok(order) => orders.push(order),
				Err(OrderStoreError::NotFound(_)) => {
					warn!(order_id = %id, "Skipping index entry without a record");
				},
				Err(e) => return Err(e),
			}
		}

		let next_cursor = if page.size > 0 && ids.len() == page.size {
			Some((page.offset + page.size) as u64)
		} else {
			None
		};

		Ok(PageResult {
			orders,
			next_cursor,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use async_trait::async_trait;
	use order_storage::implementations::memory::MemoryStorage;
	use order_storage::StorageInterface;

	/// Delegates to an in-memory backend but refuses every list append.
	struct IndexDown(Arc<MemoryStorage>);

	#[async_trait]
	impl StorageInterface for IndexDown {
		async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
			self.0.get_bytes(key).await
		}

		async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
			self.0.set_bytes(key, value).await
		}

		async fn delete(&self, key: &str) -> Result<bool, StorageError> {
			self.0.delete(key).await
		}

		async fn replace_bytes(&self, key: &str, value: Vec<u8>) -> Result<bool, StorageError> {
			self.0.replace_bytes(key, value).await
		}

		async fn list_push(&self, _list: &str, _member: &str) -> Result<(), StorageError> {
			Err(StorageError::Backend("list unavailable".into()))
		}

		async fn list_remove(&self, list: &str, member: &str) -> Result<bool, StorageError> {
			self.0.list_remove(list, member).await
		}

		async fn list_range(
			&self,
			list: &str,
			offset: usize,
			limit: usize,
		) -> Result<Vec<String>, StorageError> {
			self.0.list_range(list, offset, limit).await
		}

		async fn ping(&self) -> Result<(), StorageError> {
			Ok(())
		}
	}

	fn store() -> OrderStore {
		OrderStore::new(Arc::new(StorageService::new(Box::new(MemoryStorage::new()))))
	}

	fn order(id: u64) -> Order {
		Order::new(OrderId(id), format!("customer-{}", id), vec![], Utc::now())
	}

	#[tokio::test]
	async fn test_insert_and_find() {
		let store = store();
		let placed = order(42);

		store.insert(&placed).await.unwrap();
		assert_eq!(store.find_by_id(OrderId(42)).await.unwrap(), placed);

		assert!(matches!(
			store.find_by_id(OrderId(43)).await,
			Err(OrderStoreError::NotFound(OrderId(43)))
		));
	}

	#[tokio::test]
	async fn test_insert_without_index_leaves_no_record() {
		let backend = Arc::new(MemoryStorage::new());
		let store = OrderStore::new(Arc::new(StorageService::new(Box::new(IndexDown(
			backend.clone(),
		)))));

		assert!(matches!(
			store.insert(&order(5)).await,
			Err(OrderStoreError::Storage(_))
		));
		assert!(matches!(
			backend.get_bytes("orders:5").await,
			Err(StorageError::NotFound)
		));
		assert!(backend.list_range("order_index", 0, 10).await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_update_requires_existing_record() {
		let store = store();
		let mut placed = order(1);

		assert!(matches!(
			store.update(&placed).await,
			Err(OrderStoreError::NotFound(_))
		));

		store.insert(&placed).await.unwrap();
		placed.shipped_at = Some(Utc::now());
		store.update(&placed).await.unwrap();
		assert_eq!(store.find_by_id(OrderId(1)).await.unwrap(), placed);
	}

	#[tokio::test]
	async fn test_delete_removes_record_and_index_entry() {
		let store = store();
		store.insert(&order(1)).await.unwrap();
		store.insert(&order(2)).await.unwrap();

		store.delete_by_id(OrderId(1)).await.unwrap();

		assert!(matches!(
			store.find_by_id(OrderId(1)).await,
			Err(OrderStoreError::NotFound(_))
		));
		assert!(matches!(
			store.delete_by_id(OrderId(1)).await,
			Err(OrderStoreError::NotFound(_))
		));

		let page = store.find_all(Page { offset: 0, size: 10 }).await.unwrap();
		let ids: Vec<_> = page.orders.iter().map(|o| o.order_id).collect();
		assert_eq!(ids, vec![OrderId(2)]);
	}

	#[tokio::test]
	async fn test_find_all_keeps_insertion_order() {
		let store = store();
		for id in [30, 10, 20] {
			store.insert(&order(id)).await.unwrap();
		}

		let page = store.find_all(Page { offset: 0, size: 2 }).await.unwrap();
		let ids: Vec<_> = page.orders.iter().map(|o| o.order_id.value()).collect();
		assert_eq!(ids, vec![30, 10]);
		assert_eq!(page.next_cursor, Some(2));

		let page = store.find_all(Page { offset: 2, size: 2 }).await.unwrap();
		let ids: Vec<_> = page.orders.iter().map(|o| o.order_id.value()).collect();
		assert_eq!(ids, vec![20]);
		assert_eq!(page.next_cursor, None);
	}

	#[tokio::test]
	async fn test_find_all_skips_dangling_entries() {
		let backend = MemoryStorage::new();
		backend.list_push("order_index", "7").await.unwrap();
		backend.list_push("order_index", "not-a-number").await.unwrap();
		let store = OrderStore::new(Arc::new(StorageService::new(Box::new(backend))));
		store.insert(&order(8)).await.unwrap();

		let page = store.find_all(Page { offset: 0, size: 3 }).await.unwrap();
		assert_eq!(page.orders.len(), 1);
		assert_eq!(page.orders[0].order_id, OrderId(8));
		assert_eq!(page.next_cursor, Some(3));
	}

	#[tokio::test]
	async fn test_find_all_past_end_is_empty() {
		let store = store();
		store.insert(&order(1)).await.unwrap();

		let page = store.find_all(Page { offset: 5, size: 50 }).await.unwrap();
		assert!(page.orders.is_empty());
		assert_eq!(page.next_cursor, None);
	}
}
