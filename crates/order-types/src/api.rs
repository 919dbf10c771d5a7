//! API types for the order service HTTP API.
//!
//! This module defines the request and response bodies of the `/orders`
//! endpoints together with the structured error type that maps failures onto
//! HTTP status codes.

use crate::{LineItem, Order};
use axum::{http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
	pub customer_id: String,
	pub line_items: Vec<LineItem>,
}

/// Body of `PUT /orders/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOrderRequest {
	/// Requested status: "shipped" or "completed".
	pub status: String,
}

/// Query string of `GET /orders`.
///
/// The cursor is kept as a raw string so that malformed values can be
/// reported as a bad request by the handler.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOrdersQuery {
	#[serde(rename = "Cursor", alias = "cursor", default)]
	pub cursor: Option<String>,
}

/// Response of `GET /orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOrdersResponse {
	/// Orders of the requested page.
	pub items: Vec<Order>,
	/// Cursor of the next page, omitted when no further page is implied.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub next: Option<u64>,
}

/// API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
	/// Stable error code.
	pub error: String,
	/// Human-readable description.
	pub message: String,
}

/// Structured API error type with HTTP status mapping.
#[derive(Debug)]
pub enum APIError {
	/// Malformed input or illegal status transition (400).
	BadRequest { error_type: String, message: String },
	/// No order for the given id (404).
	NotFound { error_type: String, message: String },
	/// Storage or serialization failure (500). Never carries backend details.
	InternalServerError { error_type: String, message: String },
}

impl APIError {
	pub fn bad_request(message: impl Into<String>) -> Self {
		APIError::BadRequest {
			error_type: "BAD_REQUEST".to_string(),
			message: message.into(),
		}
	}

	pub fn not_found(message: impl Into<String>) -> Self {
		APIError::NotFound {
			error_type: "ORDER_NOT_FOUND".to_string(),
			message: message.into(),
		}
	}

	pub fn internal() -> Self {
		APIError::InternalServerError {
			error_type: "INTERNAL_ERROR".to_string(),
			message: "Internal server error".to_string(),
		}
	}

	/// Get the HTTP status code for this error.
	pub fn status_code(&self) -> StatusCode {
		match self {
			APIError::BadRequest { .. } => StatusCode::BAD_REQUEST,
			APIError::NotFound { .. } => StatusCode::NOT_FOUND,
			APIError::InternalServerError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Convert to ErrorResponse for JSON serialization.
	pub fn to_error_response(&self) -> ErrorResponse {
		let (error_type, message) = match self {
			APIError::BadRequest {
				error_type,
				message,
			}
			| APIError::NotFound {
				error_type,
				message,
			}
			| APIError::InternalServerError {
				error_type,
				message,
			} => (error_type, message),
		};
		ErrorResponse {
			error: error_type.clone(),
			message: message.clone(),
		}
	}
}

impl fmt::Display for APIError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			APIError::BadRequest { message, .. } => write!(f, "Bad Request: {}", message),
			APIError::NotFound { message, .. } => write!(f, "Not Found: {}", message),
			APIError::InternalServerError { message, .. } => {
				write!(f, "Internal Server Error: {}", message)
			},
		}
	}
}

impl std::error::Error for APIError {}

impl axum::response::IntoResponse for APIError {
	fn into_response(self) -> axum::response::Response {
		(self.status_code(), Json(self.to_error_response())).into_response()
	}
}
