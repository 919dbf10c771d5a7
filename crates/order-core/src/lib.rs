//! Core order management logic.
//!
//! Combines the order store, the lifecycle state machine and the service
//! that validates requests before they reach storage. The builder wires a
//! service from configuration.

pub mod builder;
pub mod service;
pub mod state;
pub mod store;

pub use builder::{BuilderError, OrderServiceBuilder};
pub use service::{OrderService, OrderServiceError, PAGE_SIZE};
pub use state::{OrderStateError, OrderStateMachine};
pub use store::{OrderStore, OrderStoreError, Page, PageResult};
