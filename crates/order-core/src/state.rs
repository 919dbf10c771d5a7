//! Order state machine.
//!
//! Loads an order, checks the requested action against the lifecycle
//! transition table and persists the result. The load and the write are
//! separate store calls; two concurrent updates of one order may both pass
//! the check, and the later write wins.

use crate::store::{OrderStore, OrderStoreError};
use chrono::Utc;
use order_types::{Order, OrderId, StatusAction, TransitionError};
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while transitioning an order.
#[derive(Debug, Error)]
pub enum OrderStateError {
	#[error(transparent)]
	Store(#[from] OrderStoreError),
	#[error(transparent)]
	Transition(#[from] TransitionError),
}

/// Applies status actions to stored orders.
pub struct OrderStateMachine {
	store: Arc<OrderStore>,
}

impl OrderStateMachine {
	pub fn new(store: Arc<OrderStore>) -> Self {
		Self { store }
	}

	/// Applies `action` to the stored order and returns the updated record.
	///
	/// Nothing is written when the transition is rejected.
	pub async fn apply(&self, id: OrderId, action: StatusAction) -> Result<Order, OrderStateError> {
		let mut order = self.store.find_by_id(id).await?;
		let next = order.apply(action, Utc::now())?;
		self.store.update(&order).await?;

		tracing::debug!(order_id = %id, state = %next, "Order transitioned");
		Ok(order)
	}
}
