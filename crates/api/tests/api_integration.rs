//! Integration tests for the API server.

use std::sync::OnceLock;

use api::config::Config;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, ProductId};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use storage::{CatalogStore, InMemoryStore, NewBrand, NewCategory, NewProduct};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with_store(config: &Config) -> (Router, InMemoryStore) {
    let store = InMemoryStore::new();
    let state = api::create_state(store.clone(), config);
    (api::create_app(state, get_metrics_handle()), store)
}

fn setup() -> (Router, InMemoryStore) {
    setup_with_store(&Config::default())
}

async fn seed_product(store: &InMemoryStore, name: &str, price: Money, stock: u32) -> ProductId {
    store
        .insert_product(NewProduct::new(name, price, stock))
        .await
        .unwrap()
        .id
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn individual_body(product_id: ProductId, quantity: i64) -> Value {
    json!({
        "price_cents": 3000,
        "status": "new",
        "service_mode": "delivery",
        "phone": "+7 900 123 45 67",
        "name": "Ann",
        "order_items": [{ "product_id": product_id.as_i64(), "quantity": quantity }]
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();
    let (status, json) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_create_individual_order() {
    let (app, store) = setup();
    let p = seed_product(&store, "Drill", Money::from_units(10), 5).await;

    let (status, json) = send(
        &app,
        json_request("POST", "/individual-orders", individual_body(p, 3)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["kind"], "individual");
    assert_eq!(json["price_cents"], 3000);
    assert_eq!(json["name"], "Ann");
    assert!(json.get("organization").is_none());
    let items = json["order_items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], p.as_i64());
    assert_eq!(items[0]["order_quantity"], 3);
    assert_eq!(items[0]["stock"], 2);
    assert_eq!(store.stock_of(p).await, Some(2));
}

#[tokio::test]
async fn test_individual_order_keeps_comment() {
    let (app, store) = setup();
    let p = seed_product(&store, "Drill", Money::from_units(10), 5).await;
    let mut body = individual_body(p, 1);
    body["price_cents"] = json!(1000);
    body["comment"] = json!("ring twice");

    let (status, created) = send(&app, json_request("POST", "/individual-orders", body)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["comment"], "ring twice");

    let id = created["id"].as_i64().unwrap();
    let (_, fetched) = send(&app, get(&format!("/orders/{id}"))).await;
    assert_eq!(fetched["comment"], "ring twice");
}

#[tokio::test]
async fn test_create_legal_order() {
    let (app, store) = setup();
    let p = seed_product(&store, "Drill", Money::from_units(10), 5).await;

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/legal-orders",
            json!({
                "price_cents": 1000,
                "status": "new",
                "service_mode": "pickup",
                "organization": "Acme LLC",
                "tax_id": "7701234567",
                "comment": "invoice by email",
                "order_items": [{ "product_id": p.as_i64(), "quantity": 1 }]
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["kind"], "legal");
    assert_eq!(json["organization"], "Acme LLC");
    assert_eq!(json["comment"], "invoice by email");
    assert!(json.get("phone").is_none());
}

#[tokio::test]
async fn test_insufficient_stock_is_bad_request() {
    let (app, store) = setup();
    let p = seed_product(&store, "Drill", Money::from_units(10), 5).await;

    let (status, _) = send(
        &app,
        json_request("POST", "/individual-orders", individual_body(p, 3)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(
        &app,
        json_request("POST", "/individual-orders", individual_body(p, 3)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains(&p.to_string())
    );
    assert_eq!(store.stock_of(p).await, Some(2));
    assert_eq!(store.order_count().await, 1);
}

#[tokio::test]
async fn test_missing_product_is_bad_request() {
    let (app, store) = setup();

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/individual-orders",
            individual_body(ProductId::new(777), 1),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Product 777 not found");
    assert_eq!(store.order_count().await, 0);
}

#[tokio::test]
async fn test_validation_errors_list_fields() {
    let (app, _) = setup();

    let (status, json) = send(
        &app,
        json_request(
            "POST",
            "/individual-orders",
            json!({ "price_cents": -1, "order_items": [] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Validation failed");
    let fields: Vec<&str> = json["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    for field in ["price", "status", "service_mode", "phone", "name", "lines"] {
        assert!(fields.contains(&field), "missing {field} in {fields:?}");
    }
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _) = setup();
    let request = Request::builder()
        .method("POST")
        .uri("/individual-orders")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_idempotency_key_replays_order() {
    let (app, store) = setup();
    let p = seed_product(&store, "Drill", Money::from_units(10), 5).await;
    let key = "0b6f8c5e-3c1d-4a57-9d43-2f0c1e7a9b10";

    let request = || {
        Request::builder()
            .method("POST")
            .uri("/individual-orders")
            .header("content-type", "application/json")
            .header("Idempotency-Key", key)
            .body(Body::from(individual_body(p, 2).to_string()))
            .unwrap()
    };

    let (first_status, first) = send(&app, request()).await;
    let (second_status, second) = send(&app, request()).await;

    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["id"], second["id"]);
    assert_eq!(store.order_count().await, 1);
    assert_eq!(store.stock_of(p).await, Some(3));
}

#[tokio::test]
async fn test_idempotency_key_reused_for_other_lines_is_conflict() {
    let (app, store) = setup();
    let p = seed_product(&store, "Drill", Money::from_units(10), 5).await;
    let key = "7d1e2f30-4a5b-4c6d-8e9f-a0b1c2d3e4f5";

    let request = |quantity: i64| {
        Request::builder()
            .method("POST")
            .uri("/individual-orders")
            .header("content-type", "application/json")
            .header("Idempotency-Key", key)
            .body(Body::from(individual_body(p, quantity).to_string()))
            .unwrap()
    };

    let (status, first) = send(&app, request(1)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = send(&app, request(2)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["order_id"], first["id"]);
    assert_eq!(store.order_count().await, 1);
    assert_eq!(store.stock_of(p).await, Some(4));
}

#[tokio::test]
async fn test_get_update_and_delete_order() {
    let (app, store) = setup();
    let p = seed_product(&store, "Drill", Money::from_units(10), 5).await;

    let (_, created) = send(
        &app,
        json_request("POST", "/individual-orders", individual_body(p, 1)),
    )
    .await;
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = send(&app, get(&format!("/orders/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "new");

    let (status, updated) = send(
        &app,
        json_request(
            "PUT",
            &format!("/orders/{id}"),
            json!({ "status": "paid", "bonus_cents": 0, "organization": "ignored" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "paid");
    assert_eq!(updated["phone"], "+7 900 123 45 67");
    assert!(updated.get("organization").is_none());
    assert_eq!(updated["order_items"].as_array().unwrap().len(), 1);

    let (status, listed) = send(&app, get("/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let delete = Request::builder()
        .method("DELETE")
        .uri(format!("/orders/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, ack) = send(&app, delete).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["success"], true);

    let (status, _) = send(&app, get(&format!("/orders/{id}"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(store.stock_of(p).await, Some(4));
}

#[tokio::test]
async fn test_update_missing_order_is_not_found() {
    let (app, _) = setup();
    let (status, json) = send(
        &app,
        json_request("PUT", "/orders/999", json!({ "status": "paid" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Order 999 not found");
}

#[tokio::test]
async fn test_non_numeric_id_is_bad_request() {
    let (app, _) = setup();
    let (status, _) = send(&app, get("/orders/abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_price_match_policy_from_config() {
    let config = Config {
        enforce_price_match: true,
        ..Config::default()
    };
    let (app, store) = setup_with_store(&config);
    let p = seed_product(&store, "Drill", Money::from_units(10), 5).await;

    let (status, _) = send(
        &app,
        json_request("POST", "/individual-orders", individual_body(p, 1)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(store.stock_of(p).await, Some(5));
}

#[tokio::test]
async fn test_read_back_failure_reports_order_id() {
    let (app, store) = setup();
    let p = seed_product(&store, "Drill", Money::from_units(10), 5).await;
    store.set_fail_order_reads(true);

    let (status, json) = send(
        &app,
        json_request("POST", "/individual-orders", individual_body(p, 1)),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["order_id"].as_i64().is_some());
    assert_eq!(store.order_count().await, 1);
}

#[tokio::test]
async fn test_product_listing_pagination() {
    let (app, store) = setup();
    for i in 1..=12 {
        seed_product(&store, &format!("P{i}"), Money::from_units(1), 1).await;
    }

    let (status, json) = send(&app, get("/products?skip=10&limit=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 12);
    assert_eq!(json["skip"], 10);
    assert_eq!(json["limit"], 5);
    let names: Vec<&str> = json["products"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["P11", "P12"]);

    let (status, json) = send(&app, get("/products?limit=-1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("limit"));
}

#[tokio::test]
async fn test_search_and_catalog_entities() {
    let (app, store) = setup();
    let tools = store
        .insert_category(NewCategory::named("Power Tools"))
        .await
        .unwrap();
    let bosch = store.insert_brand(NewBrand::named("Bosch")).await.unwrap();
    store
        .insert_product(
            NewProduct::new("Cordless Drill", Money::from_units(129), 25)
                .in_category(tools.id)
                .of_brand(bosch.id),
        )
        .await
        .unwrap();

    let (status, json) = send(&app, get("/products/search?q=power")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["products"][0]["name"], "Cordless Drill");

    let (status, _) = send(&app, get("/products/search?q=")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, json) = send(
        &app,
        get(&format!("/categories/{}?product_limit=1", tools.id)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Power Tools");
    assert_eq!(json["total"], 1);
    assert_eq!(json["products"].as_array().unwrap().len(), 1);

    let (status, json) = send(&app, get(&format!("/brands/{}", bosch.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Bosch");

    let (status, json) = send(&app, get("/categories")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["categories"].as_array().unwrap().len(), 1);

    let (status, json) = send(&app, get("/brands?skip=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total"], 1);
    assert!(json["brands"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, get("/products/404")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get("/brands/404?product_skip=-1")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, store) = setup();
    let p = seed_product(&store, "Drill", Money::from_units(10), 5).await;
    send(
        &app,
        json_request("POST", "/individual-orders", individual_body(p, 3)),
    )
    .await;

    let response = app.clone().oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("orders_placed_total"));
}
