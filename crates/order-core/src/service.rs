//! Order service.
//!
//! Entry point for every order operation exposed over HTTP. Input is
//! validated here before the store is touched; store failures are logged and
//! passed up as opaque storage errors.

use crate::state::{OrderStateError, OrderStateMachine};
use crate::store::{OrderStore, OrderStoreError, Page, PageResult};
use chrono::Utc;
use order_storage::StorageService;
use order_types::{LineItem, Order, OrderId, StatusAction, TransitionError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument};

/// Number of orders returned per list page.
pub const PAGE_SIZE: usize = 50;

/// Errors returned by [`OrderService`].
#[derive(Debug, Error)]
pub enum OrderServiceError {
	/// Malformed input or an illegal status transition.
	#[error("Bad request: {0}")]
	BadRequest(String),
	#[error("Order not found: {0}")]
	NotFound(OrderId),
	#[error("Storage error: {0}")]
	Storage(String),
	#[error("Serialization error: {0}")]
	Serialization(String),
}

impl From<OrderStoreError> for OrderServiceError {
	fn from(err: OrderStoreError) -> Self {
		match err {
			OrderStoreError::NotFound(id) => OrderServiceError::NotFound(id),
			OrderStoreError::Storage(msg) => OrderServiceError::Storage(msg),
			OrderStoreError::Serialization(msg) => OrderServiceError::Serialization(msg),
		}
	}
}

impl From<TransitionError> for OrderServiceError {
	fn from(err: TransitionError) -> Self {
		OrderServiceError::BadRequest(err.to_string())
	}
}

impl From<OrderStateError> for OrderServiceError {
	fn from(err: OrderStateError) -> Self {
		match err {
			OrderStateError::Store(e) => e.into(),
			OrderStateError::Transition(e) => e.into(),
		}
	}
}

/// Order lifecycle operations over an injected storage backend.
pub struct OrderService {
	storage: Arc<StorageService>,
	store: Arc<OrderStore>,
	state_machine: OrderStateMachine,
}

impl OrderService {
	pub fn new(storage: Arc<StorageService>) -> Self {
		let store = Arc::new(OrderStore::new(storage.clone()));
		let state_machine = OrderStateMachine::new(store.clone());
		Self {
			storage,
			store,
			state_machine,
		}
	}

	/// Checks that the storage backend is reachable.
	pub async fn initialize(&self) -> Result<(), OrderServiceError> {
		info!("Initializing order service");
		self.storage.ping().await.map_err(|e| {
			error!(error = %e, "Storage backend is unreachable");
			OrderServiceError::Storage(e.to_string())
		})
	}

	/// Places a new order with a server-assigned id and creation time.
	#[instrument(skip_all, fields(customer_id = %customer_id))]
	pub async fn create(
		&self,
		customer_id: String,
		line_items: Vec<LineItem>,
	) -> Result<Order, OrderServiceError> {
		if customer_id.trim().is_empty() {
			return Err(OrderServiceError::BadRequest(
				"customer_id must not be empty".to_string(),
			));
		}

		// Random ids are not checked against existing records.
		let order = Order::new(
			OrderId(rand::random::<u64>()),
			customer_id,
			line_items,
			Utc::now(),
		);

		self.store
			.insert(&order)
			.await
			.inspect_err(|e| {
				error!(order_id = %order.order_id, error = %e, "Failed to insert order")
			})?;

		info!(order_id = %order.order_id, "Order created");
		Ok(order)
	}

	/// Lists one page of orders.
	///
	/// `cursor` is the raw query value; absent or empty means the first page.
	#[instrument(skip_all, fields(cursor = ?cursor))]
	pub async fn list(&self, cursor: Option<&str>) -> Result<PageResult, OrderServiceError> {
		let offset = parse_cursor(cursor)?;
		self.store
			.find_all(Page {
				offset,
				size: PAGE_SIZE,
			})
			.await
			.inspect_err(|e| error!(error = %e, "Failed to list orders"))
			.map_err(Into::into)
	}

	#[instrument(skip_all, fields(order_id = %id))]
	pub async fn get(&self, id: OrderId) -> Result<Order, OrderServiceError> {
		self.store.find_by_id(id).await.map_err(|e| {
			log_store_failure(&e, "Failed to fetch order");
			OrderServiceError::from(e)
		})
	}

	/// Applies the requested status ("shipped" or "completed").
	#[instrument(skip_all, fields(order_id = %id, status = %status))]
	pub async fn update_status(&self, id: OrderId, status: &str) -> Result<Order, OrderServiceError> {
		let action: StatusAction = status.parse()?;
		let order = self.state_machine.apply(id, action).await.map_err(|e| {
			if let OrderStateError::Store(store_err) = &e {
				log_store_failure(store_err, "Failed to update order");
			}
			OrderServiceError::from(e)
		})?;

		info!(state = %order.state(), "Order status updated");
		Ok(order)
	}

	#[instrument(skip_all, fields(order_id = %id))]
	pub async fn delete(&self, id: OrderId) -> Result<(), OrderServiceError> {
		self.store.delete_by_id(id).await.map_err(|e| {
			log_store_failure(&e, "Failed to delete order");
			OrderServiceError::from(e)
		})?;

		info!("Order deleted");
		Ok(())
	}
}

fn parse_cursor(cursor: Option<&str>) -> Result<usize, OrderServiceError> {
	match cursor.map(str::trim) {
		None | Some("") => Ok(0),
		Some(raw) => raw.parse::<usize>().map_err(|_| {
			OrderServiceError::BadRequest(format!(
				"Cursor must be a non-negative integer, got '{}'",
				raw
			))
		}),
	}
}

/// Not-found is an expected outcome and is not logged as a failure.
fn log_store_failure(err: &OrderStoreError, context: &str) {
	if !matches!(err, OrderStoreError::NotFound(_)) {
		error!(error = %err, "{}", context);
	}
}
