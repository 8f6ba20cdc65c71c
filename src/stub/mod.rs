//! # Offline catalog stub
//!
//! A small in-process HTTP server that behaves like the public catalog API:
//! a fixed set of twenty products, category filtering, and create/update/
//! delete endpoints that answer like the real service without storing
//! anything. Runs against it are deterministic and need no network.

mod catalog;

pub use catalog::{Product, Rating};

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::HarnessError;

/// Fields a client may set on create and update.
const WRITABLE_FIELDS: [&str; 5] = ["title", "price", "description", "image", "category"];

/// Handle for a stub started with [`spawn`]. Dropping it stops the server.
pub struct StubHandle {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl StubHandle {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stop the server and wait for in-flight requests to finish.
    pub async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

impl Drop for StubHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Bind `addr` and serve the stub on a background task. Port 0 picks a free
/// port; [`StubHandle::base_url`] reports the one chosen.
pub async fn spawn(addr: &str) -> Result<StubHandle, HarnessError> {
    let listener = bind(addr).await?;
    let local = listener.local_addr().map_err(|source| HarnessError::StubBind {
        addr: addr.to_string(),
        source,
    })?;
    let base_url = format!("http://{local}");
    debug!(%base_url, "Stub server listening");

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = tokio::spawn(async move {
        let server = axum::serve(listener, router()).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        if let Err(err) = server.await {
            tracing::error!(error = %err, "Stub server stopped");
        }
    });

    Ok(StubHandle {
        base_url,
        shutdown: Some(shutdown_tx),
        join: Some(join),
    })
}

/// Serve the stub in the foreground until Ctrl-C.
pub async fn serve(addr: &str) -> Result<(), HarnessError> {
    let listener = bind(addr).await?;
    let local = listener.local_addr()?;
    info!("Stub catalog API listening on http://{local}");

    axum::serve(listener, router())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down stub server");
        })
        .await?;
    Ok(())
}

async fn bind(addr: &str) -> Result<TcpListener, HarnessError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| HarnessError::StubBind {
            addr: addr.to_string(),
            source,
        })
}

pub fn router() -> Router {
    let state = Arc::new(catalog::seed());
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/categories", get(list_categories))
        .route("/products/category/{category}", get(products_in_category))
        .route(
            "/products/{id}",
            get(get_product)
                .put(replace_product)
                .patch(update_product)
                .delete(delete_product),
        )
        .with_state(state)
}

type Catalog = Arc<Vec<Product>>;

async fn list_products(State(catalog): State<Catalog>) -> Json<Vec<Product>> {
    Json(catalog.as_ref().clone())
}

async fn list_categories(State(catalog): State<Catalog>) -> Json<Vec<String>> {
    let mut categories: Vec<String> = Vec::new();
    for product in catalog.iter() {
        if !categories.contains(&product.category) {
            categories.push(product.category.clone());
        }
    }
    Json(categories)
}

async fn products_in_category(
    State(catalog): State<Catalog>,
    Path(category): Path<String>,
) -> Json<Vec<Product>> {
    let products = catalog
        .iter()
        .filter(|product| product.category == category)
        .cloned()
        .collect();
    Json(products)
}

async fn get_product(State(catalog): State<Catalog>, Path(id): Path<String>) -> Response {
    match find(&catalog, &id) {
        Some(product) => Json(product.clone()).into_response(),
        None => not_found(&id),
    }
}

async fn create_product(body: Result<Json<Value>, JsonRejection>) -> Response {
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request(&rejection.body_text()),
    };
    let Some(fields) = body.as_object() else {
        return bad_request("product payload must be a JSON object");
    };

    let missing: Vec<&str> = WRITABLE_FIELDS
        .iter()
        .copied()
        .filter(|field| fields.get(*field).is_none_or(Value::is_null))
        .collect();
    if !missing.is_empty() {
        return bad_request(&format!("missing fields: {}", missing.join(", ")));
    }

    let mut created = Map::new();
    created.insert("id".to_string(), json!(catalog::NEXT_ID));
    copy_writable(fields, &mut created);
    debug!(id = catalog::NEXT_ID, "Stub accepted product (not stored)");
    Json(Value::Object(created)).into_response()
}

async fn replace_product(
    State(catalog): State<Catalog>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Some(existing) = find(&catalog, &id) else {
        return not_found(&id);
    };
    let fields = match payload(body) {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    let mut replaced = Map::new();
    replaced.insert("id".to_string(), json!(existing.id));
    copy_writable(&fields, &mut replaced);
    Json(Value::Object(replaced)).into_response()
}

async fn update_product(
    State(catalog): State<Catalog>,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let Some(existing) = find(&catalog, &id) else {
        return not_found(&id);
    };
    let fields = match payload(body) {
        Ok(fields) => fields,
        Err(response) => return response,
    };

    let mut merged = match serde_json::to_value(existing) {
        Ok(Value::Object(map)) => map,
        _ => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };
    copy_writable(&fields, &mut merged);
    Json(Value::Object(merged)).into_response()
}

async fn delete_product(State(catalog): State<Catalog>, Path(id): Path<String>) -> Response {
    match find(&catalog, &id) {
        Some(product) => Json(product.clone()).into_response(),
        None => not_found(&id),
    }
}

fn find<'a>(catalog: &'a [Product], id: &str) -> Option<&'a Product> {
    let id: u32 = id.parse().ok()?;
    catalog.iter().find(|product| product.id == id)
}

fn payload(body: Result<Json<Value>, JsonRejection>) -> Result<Map<String, Value>, Response> {
    match body {
        Ok(Json(Value::Object(fields))) => Ok(fields),
        Ok(_) => Err(bad_request("product payload must be a JSON object")),
        Err(rejection) => Err(bad_request(&rejection.body_text())),
    }
}

fn copy_writable(from: &Map<String, Value>, into: &mut Map<String, Value>) {
    for field in WRITABLE_FIELDS {
        if let Some(value) = from.get(field) {
            into.insert(field.to_string(), value.clone());
        }
    }
}

fn not_found(id: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "status": "error", "message": format!("product with id {id} not found") })),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "status": "error", "message": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn call(
        server: &StubHandle,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> (u16, Value) {
        let client = reqwest::Client::builder().no_proxy().build().unwrap();
        let mut request = client.request(method, format!("{}{path}", server.base_url()));
        if let Some(body) = body {
            request = request.json(&body);
        }
        let response = request.send().await.unwrap();
        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn lists_twenty_products_and_filters_by_category() {
        let server = spawn("127.0.0.1:0").await.unwrap();

        let (status, body) = call(&server, reqwest::Method::GET, "/products", None).await;
        assert_eq!(status, 200);
        assert_eq!(body.as_array().unwrap().len(), 20);

        let (_, body) =
            call(&server, reqwest::Method::GET, "/products/category/electronics", None).await;
        let items = body.as_array().unwrap();
        assert!(!items.is_empty());
        assert!(items.iter().all(|item| item["category"] == "electronics"));

        let (_, body) = call(&server, reqwest::Method::GET, "/products/categories", None).await;
        assert_eq!(body.as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let server = spawn("127.0.0.1:0").await.unwrap();
        for method in [
            reqwest::Method::GET,
            reqwest::Method::PUT,
            reqwest::Method::PATCH,
            reqwest::Method::DELETE,
        ] {
            let (status, _) =
                call(&server, method, "/products/999", Some(json!({ "title": "x" }))).await;
            assert_eq!(status, 404);
        }
        let (status, _) = call(&server, reqwest::Method::GET, "/products/abc", None).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn create_validates_payload_without_storing() {
        let server = spawn("127.0.0.1:0").await.unwrap();

        let (status, body) =
            call(&server, reqwest::Method::POST, "/products", Some(json!({}))).await;
        assert_eq!(status, 400);
        assert!(body["message"].as_str().unwrap().contains("title"));

        let product = json!({
            "title": "Test Product",
            "price": 13.5,
            "description": "Lorem ipsum set",
            "image": "https://i.pravatar.cc",
            "category": "electronic"
        });
        let (status, body) =
            call(&server, reqwest::Method::POST, "/products", Some(product)).await;
        assert_eq!(status, 200);
        assert_eq!(body["id"], 21);
        assert_eq!(body["price"], 13.5);

        let (_, body) = call(&server, reqwest::Method::GET, "/products", None).await;
        assert_eq!(body.as_array().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn put_replaces_and_patch_merges() {
        let server = spawn("127.0.0.1:0").await.unwrap();
        let change = json!({ "title": "new title" });

        let (status, body) =
            call(&server, reqwest::Method::PUT, "/products/7", Some(change.clone())).await;
        assert_eq!(status, 200);
        assert_eq!(body["id"], 7);
        assert_eq!(body["title"], "new title");
        assert!(body.get("description").is_none());

        let (status, body) =
            call(&server, reqwest::Method::PATCH, "/products/7", Some(change)).await;
        assert_eq!(status, 200);
        assert_eq!(body["title"], "new title");
        assert!(body["description"].is_string());
        assert!(body["rating"]["rate"].is_number());
    }

    #[tokio::test]
    async fn delete_returns_the_product_unchanged() {
        let server = spawn("127.0.0.1:0").await.unwrap();
        let (_, before) = call(&server, reqwest::Method::GET, "/products/6", None).await;
        let (status, deleted) = call(&server, reqwest::Method::DELETE, "/products/6", None).await;
        assert_eq!(status, 200);
        assert_eq!(before, deleted);

        let (status, _) = call(&server, reqwest::Method::GET, "/products/6", None).await;
        assert_eq!(status, 200);
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let first = spawn("127.0.0.1:0").await.unwrap();
        let taken = first.base_url().trim_start_matches("http://").to_string();
        let err = spawn(&taken).await.err().unwrap();
        assert!(matches!(err, HarnessError::StubBind { .. }));
        first.shutdown().await;
    }
}
