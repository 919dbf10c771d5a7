//! Order endpoints.
//!
//! Parses raw request input, calls the order service and maps its errors to
//! [`APIError`]. Bodies are decoded here rather than through the `Json`
//! extractor so that malformed input yields the same error body as every
//! other bad request.

use axum::body::Bytes;
use order_core::{OrderService, OrderServiceError};
use order_types::{
	APIError, CreateOrderRequest, ListOrdersResponse, Order, OrderId, UpdateOrderRequest,
};
use serde::de::DeserializeOwned;
use tracing::{error, warn};

/// Handles `POST /orders`.
pub async fn create_order(service: &OrderService, body: &Bytes) -> Result<Order, APIError> {
	let request: CreateOrderRequest = parse_body(body)?;
	service
		.create(request.customer_id, request.line_items)
		.await
		.map_err(to_api_error)
}

/// Handles `GET /orders`.
pub async fn list_orders(
	service: &OrderService,
	cursor: Option<&str>,
) -> Result<ListOrdersResponse, APIError> {
	let page = service.list(cursor).await.map_err(to_api_error)?;
	Ok(ListOrdersResponse {
		items: page.orders,
		next: page.next_cursor,
	})
}

/// Handles `GET /orders/{id}`.
pub async fn get_order(service: &OrderService, id: &str) -> Result<Order, APIError> {
	let id = parse_order_id(id)?;
	service.get(id).await.map_err(to_api_error)
}

/// Handles `PUT /orders/{id}`.
pub async fn update_order(
	service: &OrderService,
	id: &str,
	body: &Bytes,
) -> Result<Order, APIError> {
	let id = parse_order_id(id)?;
	let request: UpdateOrderRequest = parse_body(body)?;
	service
		.update_status(id, &request.status)
		.await
		.map_err(to_api_error)
}

/// Handles `DELETE /orders/{id}`.
pub async fn delete_order(service: &OrderService, id: &str) -> Result<(), APIError> {
	let id = parse_order_id(id)?;
	service.delete(id).await.map_err(to_api_error)
}

fn parse_order_id(raw: &str) -> Result<OrderId, APIError> {
	raw.parse()
		.map_err(|_| APIError::bad_request(format!("Invalid order id: '{}'", raw)))
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, APIError> {
	serde_json::from_slice(body).map_err(|e| {
		warn!(error = %e, "Rejected malformed request body");
		APIError::bad_request(format!("Invalid request body: {}", e))
	})
}

/// Storage and serialization failures are logged here and reported to the
/// caller without details.
fn to_api_error(err: OrderServiceError) -> APIError {
	match err {
		OrderServiceError::BadRequest(message) => APIError::bad_request(message),
		OrderServiceError::NotFound(id) => {
			APIError::not_found(format!("Order {} not found", id))
		},
		other @ (OrderServiceError::Storage(_) | OrderServiceError::Serialization(_)) => {
			error!(error = %other, "Order request failed");
			APIError::internal()
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::http::StatusCode;

	#[test]
	fn test_error_mapping() {
		let cases = [
			(
				OrderServiceError::BadRequest("nope".into()),
				StatusCode::BAD_REQUEST,
			),
			(
				OrderServiceError::NotFound(OrderId(9)),
				StatusCode::NOT_FOUND,
			),
			(
				OrderServiceError::Storage("redis down".into()),
				StatusCode::INTERNAL_SERVER_ERROR,
			),
			(
				OrderServiceError::Serialization("bad json".into()),
				StatusCode::INTERNAL_SERVER_ERROR,
			),
		];

		for (err, status) in cases {
			assert_eq!(to_api_error(err).status_code(), status);
		}
	}

	#[test]
	fn test_internal_errors_hide_details() {
		let response = to_api_error(OrderServiceError::Storage("redis down".into()))
			.to_error_response();
		assert_eq!(response.error, "INTERNAL_ERROR");
		assert!(!response.message.contains("redis"));
	}

	#[test]
	fn test_order_id_parsing() {
		assert_eq!(parse_order_id("42").unwrap(), OrderId(42));
		for raw in ["", "-1", "abc", "18446744073709551616"] {
			assert_eq!(
				parse_order_id(raw).unwrap_err().status_code(),
				StatusCode::BAD_REQUEST
			);
		}
	}
}
