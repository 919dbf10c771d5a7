//! Common types module for the order service.
//!
//! This module defines the core data types shared by every crate of the
//! workspace: the order entity and its lifecycle, the HTTP API wire types,
//! storage keys, and the configuration validation framework used by
//! pluggable implementations.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Order entity and lifecycle state machine.
pub mod order;
/// Registry trait for self-registering implementations.
pub mod registry;
/// Storage types for managing persistent data.
pub mod storage;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use api::*;
pub use order::*;
pub use registry::ImplementationRegistry;
pub use storage::*;
pub use validation::*;
