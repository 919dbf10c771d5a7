//! HTTP server for the order API.
//!
//! Builds the axum router for the `/orders` endpoints, applies the
//! configured middleware and serves it until Ctrl+C.

use axum::{
	body::Bytes,
	extract::{rejection::QueryRejection, DefaultBodyLimit, Path, Query, State},
	http::{HeaderName, HeaderValue, Method, StatusCode},
	response::Json,
	routing::{get, post},
	Router,
};
use order_config::{ApiConfig, CorsConfig};
use order_core::OrderService;
use order_types::{APIError, ListOrdersQuery, ListOrdersResponse, Order};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
	cors::{AllowOrigin, CorsLayer},
	timeout::TimeoutLayer,
	trace::TraceLayer,
};

/// Shared application state for the API server.
#[derive(Clone)]
pub struct AppState {
	/// Order service handling every request.
	pub orders: Arc<OrderService>,
}

/// Starts the HTTP server and serves until a shutdown signal arrives.
pub async fn start_server(
	api_config: ApiConfig,
	orders: Arc<OrderService>,
) -> Result<(), Box<dyn std::error::Error>> {
	let app = build_router(AppState { orders }, &api_config)?;

	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	tracing::info!("Order API server starting on {}", bind_address);

	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await?;

	Ok(())
}

/// Builds the router with all order routes and middleware.
pub fn build_router(
	state: AppState,
	api_config: &ApiConfig,
) -> Result<Router, Box<dyn std::error::Error>> {
	let cors = cors_layer(api_config.cors.as_ref())?;

	let router = Router::new()
		.route("/orders", post(handle_create_order).get(handle_list_orders))
		.route(
			"/orders/{id}",
			get(handle_get_order)
				.put(handle_update_order)
				.delete(handle_delete_order),
		)
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(TimeoutLayer::new(Duration::from_secs(
					api_config.timeout_seconds,
				)))
				.layer(cors)
				.layer(DefaultBodyLimit::max(api_config.max_request_size)),
		)
		.with_state(state);

	Ok(router)
}

fn cors_layer(config: Option<&CorsConfig>) -> Result<CorsLayer, Box<dyn std::error::Error>> {
	let Some(config) = config else {
		return Ok(CorsLayer::permissive());
	};

	let origins = config
		.allowed_origins
		.iter()
		.map(|origin| origin.parse::<HeaderValue>())
		.collect::<Result<Vec<_>, _>>()?;
	let headers = config
		.allowed_headers
		.iter()
		.map(|header| header.parse::<HeaderName>())
		.collect::<Result<Vec<_>, _>>()?;
	let methods = config
		.allowed_methods
		.iter()
		.map(|method| method.parse::<Method>())
		.collect::<Result<Vec<_>, _>>()?;

	Ok(CorsLayer::new()
		.allow_origin(AllowOrigin::list(origins))
		.allow_headers(headers)
		.allow_methods(methods))
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for shutdown signal");
		return;
	}
	tracing::info!("Shutdown signal received");
}

/// Handles POST /orders requests.
async fn handle_create_order(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<(StatusCode, Json<Order>), APIError> {
	let order = crate::apis::order::create_order(&state.orders, &body).await?;
	Ok((StatusCode::CREATED, Json(order)))
}

/// Handles GET /orders requests.
///
/// The page cursor is read from `Cursor` (or `cursor`) in the query string.
async fn handle_list_orders(
	State(state): State<AppState>,
	query: Result<Query<ListOrdersQuery>, QueryRejection>,
) -> Result<Json<ListOrdersResponse>, APIError> {
	let Query(query) = query.map_err(|e| APIError::bad_request(e.body_text()))?;
	let response = crate::apis::order::list_orders(&state.orders, query.cursor.as_deref()).await?;
	Ok(Json(response))
}

/// Handles GET /orders/{id} requests.
async fn handle_get_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<Json<Order>, APIError> {
	let order = crate::apis::order::get_order(&state.orders, &id).await?;
	Ok(Json(order))
}

/// Handles PUT /orders/{id} requests.
async fn handle_update_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<Order>, APIError> {
	let order = crate::apis::order::update_order(&state.orders, &id, &body).await?;
	Ok(Json(order))
}

/// Handles DELETE /orders/{id} requests.
async fn handle_delete_order(
	Path(id): Path<String>,
	State(state): State<AppState>,
) -> Result<StatusCode, APIError> {
	crate::apis::order::delete_order(&state.orders, &id).await?;
	Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::{
		body::{to_bytes, Body},
		http::Request,
	};
	use order_storage::{implementations::memory::MemoryStorage, StorageService};
	use serde_json::{json, Value};
	use tower::ServiceExt;

	fn app() -> Router {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let state = AppState {
			orders: Arc::new(OrderService::new(storage)),
		};
		build_router(state, &ApiConfig::default()).unwrap()
	}

	async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
		let mut builder = Request::builder().method(method).uri(uri);
		let body = match body {
			Some(value) => {
				builder = builder.header("content-type", "application/json");
				Body::from(value.to_string())
			},
			None => Body::empty(),
		};

		let response = app
			.clone()
			.oneshot(builder.body(body).unwrap())
			.await
			.unwrap();
		let status = response.status();
		let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).unwrap()
		};
		(status, value)
	}

	async fn create(app: &Router) -> Value {
		let (status, body) = send(
			app,
			"POST",
			"/orders",
			Some(json!({"customer_id": "c1", "line_items": [{"sku": "A", "qty": 2}]})),
		)
		.await;
		assert_eq!(status, StatusCode::CREATED);
		body
	}

	#[tokio::test]
	async fn test_create_order() {
		let app = app();
		let body = create(&app).await;

		assert!(body["order_id"].is_u64());
		assert_eq!(body["customer_id"], "c1");
		assert_eq!(body["line_items"], json!([{"sku": "A", "qty": 2}]));
		assert!(body["created_at"].is_string());
		assert!(body.get("shipped_at").is_none());
		assert!(body.get("completed_at").is_none());
	}

	#[tokio::test]
	async fn test_create_rejects_malformed_body() {
		let app = app();

		for body in [
			json!({"customer_id": "c1"}),
			json!({"customer_id": "c1", "line_items": [1, 2]}),
			json!({"customer_id": "", "line_items": []}),
			json!("not an object"),
		] {
			let (status, error) = send(&app, "POST", "/orders", Some(body)).await;
			assert_eq!(status, StatusCode::BAD_REQUEST);
			assert_eq!(error["error"], "BAD_REQUEST");
		}

		let (_, list) = send(&app, "GET", "/orders", None).await;
		assert_eq!(list["items"], json!([]));
	}

	#[tokio::test]
	async fn test_get_round_trip() {
		let app = app();
		let created = create(&app).await;
		let id = created["order_id"].as_u64().unwrap();

		let (status, fetched) = send(&app, "GET", &format!("/orders/{}", id), None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(fetched, created);
	}

	#[tokio::test]
	async fn test_get_errors() {
		let app = app();

		let (status, body) = send(&app, "GET", "/orders/12345", None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);
		assert_eq!(body["error"], "ORDER_NOT_FOUND");

		let (status, body) = send(&app, "GET", "/orders/abc", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "BAD_REQUEST");
	}

	#[tokio::test]
	async fn test_ship_twice_is_rejected() {
		let app = app();
		let id = create(&app).await["order_id"].as_u64().unwrap();
		let uri = format!("/orders/{}", id);

		let (status, body) = send(&app, "PUT", &uri, Some(json!({"status": "shipped"}))).await;
		assert_eq!(status, StatusCode::OK);
		assert!(body["shipped_at"].is_string());
		assert!(body.get("completed_at").is_none());

		let (status, body) = send(&app, "PUT", &uri, Some(json!({"status": "shipped"}))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "BAD_REQUEST");

		let (status, body) = send(&app, "PUT", &uri, Some(json!({"status": "completed"}))).await;
		assert_eq!(status, StatusCode::OK);
		assert!(body["completed_at"].is_string());
	}

	#[tokio::test]
	async fn test_update_errors() {
		let app = app();
		let id = create(&app).await["order_id"].as_u64().unwrap();
		let uri = format!("/orders/{}", id);

		let (status, _) = send(&app, "PUT", &uri, Some(json!({"status": "completed"}))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, _) = send(&app, "PUT", &uri, Some(json!({"status": "lost"}))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, _) = send(&app, "PUT", &uri, Some(json!({}))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);

		let (status, _) = send(&app, "PUT", "/orders/1", Some(json!({"status": "shipped"}))).await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let (status, _) = send(&app, "PUT", "/orders/x", Some(json!({"status": "shipped"}))).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_delete_order() {
		let app = app();
		let id = create(&app).await["order_id"].as_u64().unwrap();
		let uri = format!("/orders/{}", id);

		let (status, body) = send(&app, "DELETE", &uri, None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body, Value::Null);

		let (status, _) = send(&app, "GET", &uri, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let (status, _) = send(&app, "DELETE", &uri, None).await;
		assert_eq!(status, StatusCode::NOT_FOUND);

		let (status, _) = send(&app, "DELETE", "/orders/-3", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn test_list_pagination() {
		let app = app();
		for _ in 0..120 {
			create(&app).await;
		}

		let (status, first) = send(&app, "GET", "/orders", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(first["items"].as_array().unwrap().len(), 50);
		assert_eq!(first["next"], 50);

		let (_, second) = send(&app, "GET", "/orders?Cursor=50", None).await;
		assert_eq!(second["items"].as_array().unwrap().len(), 50);
		assert_eq!(second["next"], 100);

		let (_, third) = send(&app, "GET", "/orders?cursor=100", None).await;
		assert_eq!(third["items"].as_array().unwrap().len(), 20);
		assert!(third.get("next").is_none());
	}

	#[tokio::test]
	async fn test_list_rejects_malformed_cursor() {
		let app = app();
		let (status, body) = send(&app, "GET", "/orders?Cursor=-5", None).await;
		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(body["error"], "BAD_REQUEST");
	}

	#[tokio::test]
	async fn test_body_limit() {
		let storage = Arc::new(StorageService::new(Box::new(MemoryStorage::new())));
		let state = AppState {
			orders: Arc::new(OrderService::new(storage)),
		};
		let config = ApiConfig {
			max_request_size: 64,
			..ApiConfig::default()
		};
		let app = build_router(state, &config).unwrap();

		let items: Vec<Value> = (0..20).map(|i| json!({"sku": format!("SKU-{}", i)})).collect();
		let response = app
			.oneshot(
				Request::builder()
					.method("POST")
					.uri("/orders")
					.header("content-type", "application/json")
					.body(Body::from(
						json!({"customer_id": "c1", "line_items": items}).to_string(),
					))
					.unwrap(),
			)
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
	}

	#[test]
	fn test_invalid_cors_config_rejected() {
		let config = CorsConfig {
			allowed_origins: vec!["bad\norigin".to_string()],
			allowed_headers: vec![],
			allowed_methods: vec![],
		};
		assert!(cors_layer(Some(&config)).is_err());

		let config = CorsConfig {
			allowed_origins: vec!["http://localhost:3000".to_string()],
			allowed_headers: vec!["content-type".to_string()],
			allowed_methods: vec!["GET".to_string(), "POST".to_string()],
		};
		assert!(cors_layer(Some(&config)).is_ok());
	}
}
