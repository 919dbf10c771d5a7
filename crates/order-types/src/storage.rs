//! Storage-related types for the order service.

/// Storage keys for different data collections.
///
/// Replaces string literals with strongly typed variants when addressing
/// records and lists in a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKey {
	/// Namespace of order records, one entry per order.
	Orders,
	/// Ordered list of order ids used for paginated enumeration.
	OrderIndex,
}

impl StorageKey {
	/// Returns the string representation of the storage key.
	pub fn as_str(&self) -> &'static str {
		match self {
			StorageKey::Orders => "orders",
			StorageKey::OrderIndex => "order_index",
		}
	}
}
