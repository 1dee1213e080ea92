//! Order placement, mutation, read and delete endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use common::{IdempotencyKey, Money, OrderId, ProductId, UserId};
use domain::{
    CatalogService, CustomerDetails, LineRequest, OrderAggregate, OrderKind, OrderService,
    PlaceOrder, PlacementPolicy, UpdateOrder,
};
use serde::{Deserialize, Serialize};
use storage::{CatalogStore, OrderLineDetail, Store};

use super::{JsonBody, PathId, accept};
use crate::error::ApiError;

/// Header carrying the client-chosen idempotency key for placements.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store + CatalogStore + Clone> {
    pub order_service: OrderService<S>,
    pub catalog_service: CatalogService<S>,
}

impl<S: Store + CatalogStore + Clone> AppState<S> {
    pub fn new(store: S, policy: PlacementPolicy) -> Self {
        Self {
            order_service: OrderService::with_policy(store.clone(), policy),
            catalog_service: CatalogService::new(store),
        }
    }
}

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct IndividualOrderRequest {
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub bonus_cents: i64,
    pub user_id: Option<i64>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub service_mode: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub name: String,
    pub comment: Option<String>,
    #[serde(default)]
    pub order_items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize)]
pub struct LegalOrderRequest {
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub bonus_cents: i64,
    pub user_id: Option<i64>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub service_mode: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub tax_id: String,
    pub comment: Option<String>,
    #[serde(default)]
    pub order_items: Vec<OrderItemRequest>,
}

/// Partial update. Omitted fields are left untouched.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderRequest {
    pub price_cents: Option<i64>,
    pub bonus_cents: Option<i64>,
    pub status: Option<String>,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub organization: Option<String>,
    pub tax_id: Option<String>,
    pub comment: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub price_cents: i64,
    pub bonus_cents: i64,
    pub user_id: Option<i64>,
    pub kind: OrderKind,
    pub status: String,
    pub service_mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub order_items: Vec<OrderItemResponse>,
}

/// One order line with the product as it looks now.
#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub id: i64,
    pub product_id: i64,
    pub name: String,
    pub price_cents: i64,
    pub images: Vec<String>,
    pub description: String,
    pub rating: f64,
    pub stock: u32,
    pub info: String,
    pub feature: String,
    pub guarantee: Option<String>,
    pub discount: Option<String>,
    pub category_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub order_quantity: u32,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

impl From<&OrderLineDetail> for OrderItemResponse {
    fn from(detail: &OrderLineDetail) -> Self {
        let product = &detail.product;
        Self {
            id: detail.line.id.as_i64(),
            product_id: product.id.as_i64(),
            name: product.name.clone(),
            price_cents: product.price.cents(),
            images: product.images.clone(),
            description: product.description.clone(),
            rating: product.rating,
            stock: product.stock,
            info: product.info.clone(),
            feature: product.feature.clone(),
            guarantee: product.guarantee.clone(),
            discount: product.discount.clone(),
            category_id: product.category_id.map(|id| id.as_i64()),
            brand_id: product.brand_id.map(|id| id.as_i64()),
            order_quantity: detail.line.quantity,
        }
    }
}

impl From<OrderAggregate> for OrderResponse {
    fn from(order: OrderAggregate) -> Self {
        let order_items = order.lines.iter().map(OrderItemResponse::from).collect();
        let header = order.header;
        Self {
            id: header.id.as_i64(),
            price_cents: header.price.cents(),
            bonus_cents: header.bonus.cents(),
            user_id: header.user_id.map(|id| id.as_i64()),
            kind: header.kind,
            status: header.status,
            service_mode: header.service_mode,
            phone: header.phone,
            name: header.name,
            organization: header.organization,
            tax_id: header.tax_id,
            comment: header.comment,
            created_at: header.created_at,
            updated_at: header.updated_at,
            order_items,
        }
    }
}

fn line_requests(items: &[OrderItemRequest]) -> Vec<LineRequest> {
    items
        .iter()
        .map(|item| LineRequest::new(ProductId::new(item.product_id), item.quantity))
        .collect()
}

fn idempotency_key(headers: &HeaderMap) -> Result<Option<IdempotencyKey>, ApiError> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map(Some)
        .ok_or_else(|| ApiError::BadRequest("Idempotency-Key must be a UUID".to_string()))
}

async fn place<S: Store + CatalogStore + Clone>(
    state: &AppState<S>,
    mut cmd: PlaceOrder,
    headers: &HeaderMap,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    cmd.idempotency_key = idempotency_key(headers)?;
    let outcome = state.order_service.place(cmd).await?;
    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome.order.into())))
}

// -- Handlers --

/// POST /individual-orders: place an order for a private customer.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create_individual<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: JsonBody<IndividualOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = accept(body)?;

    let mut cmd = PlaceOrder::new(
        CustomerDetails::individual(req.phone, req.name),
        Money::from_cents(req.price_cents),
        req.status,
        req.service_mode,
        line_requests(&req.order_items),
    )
    .with_bonus(Money::from_cents(req.bonus_cents));
    cmd.user_id = req.user_id.map(UserId::new);
    cmd.comment = req.comment.filter(|c| !c.is_empty());

    place(&state, cmd, &headers).await
}

/// POST /legal-orders: place an order for an organization.
#[tracing::instrument(skip(state, headers, body))]
pub async fn create_legal<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: JsonBody<LegalOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let Json(req) = accept(body)?;

    let mut cmd = PlaceOrder::new(
        CustomerDetails::legal(req.organization, req.tax_id),
        Money::from_cents(req.price_cents),
        req.status,
        req.service_mode,
        line_requests(&req.order_items),
    )
    .with_bonus(Money::from_cents(req.bonus_cents));
    cmd.user_id = req.user_id.map(UserId::new);
    cmd.comment = req.comment.filter(|c| !c.is_empty());

    place(&state, cmd, &headers).await
}

/// GET /orders: every order with its lines.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.order_service.list().await?;
    Ok(Json(orders.into_iter().map(OrderResponse::from).collect()))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state, id))]
pub async fn get<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: PathId,
) -> Result<Json<OrderResponse>, ApiError> {
    let Path(id) = accept(id)?;
    let order = state.order_service.get(OrderId::new(id)).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}: apply a partial header update.
#[tracing::instrument(skip(state, id, body))]
pub async fn update<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: PathId,
    body: JsonBody<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let Path(id) = accept(id)?;
    let Json(req) = accept(body)?;

    let cmd = UpdateOrder {
        order_id: OrderId::new(id),
        price: req.price_cents.map(Money::from_cents),
        bonus: req.bonus_cents.map(Money::from_cents),
        status: req.status,
        phone: req.phone,
        name: req.name,
        organization: req.organization,
        tax_id: req.tax_id,
        comment: req.comment,
    };

    let order = state.order_service.update(cmd).await?;
    Ok(Json(order.into()))
}

/// DELETE /orders/{id}: remove an order and its lines.
#[tracing::instrument(skip(state, id))]
pub async fn delete<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: PathId,
) -> Result<Json<DeleteResponse>, ApiError> {
    let Path(id) = accept(id)?;
    state.order_service.delete(OrderId::new(id)).await?;
    Ok(Json(DeleteResponse {
        success: true,
        message: "Order deleted successfully".to_string(),
    }))
}
