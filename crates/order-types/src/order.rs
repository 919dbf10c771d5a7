//! Order entity and lifecycle types.
//!
//! An order moves through a fixed lifecycle driven by two nullable
//! timestamps: Placed -> Shipped -> Completed. Transitions are described by
//! an explicit table over `(OrderState, StatusAction)` so that every pair has
//! a defined outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Server-assigned order identifier.
///
/// Serialized as a bare JSON number and parsed from path segments as a
/// base-10 unsigned 64-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u64);

impl OrderId {
	pub fn new(value: u64) -> Self {
		Self(value)
	}

	pub fn value(&self) -> u64 {
		self.0
	}
}

impl fmt::Display for OrderId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for OrderId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.parse::<u64>().map(OrderId)
	}
}

impl From<u64> for OrderId {
	fn from(value: u64) -> Self {
		Self(value)
	}
}

/// A single product/quantity entry of an order.
///
/// The payload is opaque to the service: any JSON object is accepted and
/// stored unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineItem(serde_json::Map<String, serde_json::Value>);

impl LineItem {
	pub fn new(fields: serde_json::Map<String, serde_json::Value>) -> Self {
		Self(fields)
	}
}

/// An order record as persisted and returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
	/// Unique identifier assigned at creation.
	pub order_id: OrderId,
	/// Caller-supplied customer identifier.
	pub customer_id: String,
	/// Ordered line items, passed through unchanged.
	pub line_items: Vec<LineItem>,
	/// Creation time, immutable after creation.
	pub created_at: DateTime<Utc>,
	/// Time the order was marked as shipped.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub shipped_at: Option<DateTime<Utc>>,
	/// Time the order was marked as completed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub completed_at: Option<DateTime<Utc>>,
}

impl Order {
	/// Creates a freshly placed order.
	pub fn new(
		order_id: OrderId,
		customer_id: impl Into<String>,
		line_items: Vec<LineItem>,
		created_at: DateTime<Utc>,
	) -> Self {
		Self {
			order_id,
			customer_id: customer_id.into(),
			line_items,
			created_at,
			shipped_at: None,
			completed_at: None,
		}
	}

	/// Derives the lifecycle state from the status timestamps.
	pub fn state(&self) -> OrderState {
		if self.completed_at.is_some() {
			OrderState::Completed
		} else if self.shipped_at.is_some() {
			OrderState::Shipped
		} else {
			OrderState::Placed
		}
	}

	/// Applies a status action, stamping the matching timestamp with `at`.
	///
	/// The order is left untouched when the transition is rejected.
	pub fn apply(
		&mut self,
		action: StatusAction,
		at: DateTime<Utc>,
	) -> Result<OrderState, TransitionError> {
		let next = self.state().transition(action)?;
		match action {
			StatusAction::Ship => self.shipped_at = Some(at),
			StatusAction::Complete => self.completed_at = Some(at),
		}
		Ok(next)
	}
}

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
	/// Not shipped yet. Initial state.
	Placed,
	/// Shipped but not completed.
	Shipped,
	/// Completed. Terminal state.
	Completed,
}

impl OrderState {
	/// All lifecycle states.
	pub const ALL: [OrderState; 3] = [Self::Placed, Self::Shipped, Self::Completed];

	/// Transition table for the order lifecycle.
	pub fn transition(self, action: StatusAction) -> Result<OrderState, TransitionError> {
		match (self, action) {
			(OrderState::Placed, StatusAction::Ship) => Ok(OrderState::Shipped),
			(OrderState::Shipped, StatusAction::Complete) => Ok(OrderState::Completed),
			(OrderState::Placed, StatusAction::Complete)
			| (OrderState::Shipped, StatusAction::Ship)
			| (OrderState::Completed, StatusAction::Ship)
			| (OrderState::Completed, StatusAction::Complete) => {
				Err(TransitionError::InvalidTransition { from: self, action })
			},
		}
	}

	/// Returns true if no action can leave this state.
	pub fn is_terminal(self) -> bool {
		StatusAction::ALL
			.iter()
			.all(|action| self.transition(*action).is_err())
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			OrderState::Placed => "placed",
			OrderState::Shipped => "shipped",
			OrderState::Completed => "completed",
		}
	}
}

impl fmt::Display for OrderState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Status change requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusAction {
	/// Mark the order as shipped.
	Ship,
	/// Mark the order as completed.
	Complete,
}

impl StatusAction {
	/// All status actions.
	pub const ALL: [StatusAction; 2] = [Self::Ship, Self::Complete];

	/// Returns the wire value accepted in update requests.
	pub fn as_str(&self) -> &'static str {
		match self {
			StatusAction::Ship => "shipped",
			StatusAction::Complete => "completed",
		}
	}
}

impl fmt::Display for StatusAction {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for StatusAction {
	type Err = TransitionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"shipped" => Ok(Self::Ship),
			"completed" => Ok(Self::Complete),
			other => Err(TransitionError::UnknownStatus(other.to_string())),
		}
	}
}

/// Errors produced by the lifecycle state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
	#[error("Cannot apply '{action}' to an order in state '{from}'")]
	InvalidTransition {
		from: OrderState,
		action: StatusAction,
	},
	#[error("Unknown order status: '{0}'")]
	UnknownStatus(String),
}
