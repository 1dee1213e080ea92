//! Order placement, mutation and reads.

mod commands;
mod mutation;
mod placement;
mod service;
mod validation;

pub use commands::{CustomerDetails, LineRequest, PlaceOrder, UpdateOrder};
pub use mutation::OrderMutationService;
pub use placement::{OrderPlacementService, PlacementOutcome, PlacementPolicy};
pub use service::OrderService;

use common::{Money, OrderId, ProductId};
use storage::{Store, StoreError, StoreTransaction};
use thiserror::Error;

use crate::error::ValidationErrors;

/// An order header with its lines and the products they reference, as read
/// after the last committed write.
pub type OrderAggregate = storage::StoredOrder;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The command was malformed. Nothing was written.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// A line referenced a product that does not exist.
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// A line asked for more units than remain.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// The order does not exist.
    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// The caller-supplied price disagrees with the line total and the policy
    /// requires them to match.
    #[error("Order price {received} does not match line total {expected}")]
    PriceMismatch { expected: Money, received: Money },

    /// The storage layer failed. Whether the write landed is unknown.
    #[error("Transaction failed: {0}")]
    TransactionFailure(#[source] StoreError),

    /// The idempotency key already belongs to an order with other lines or
    /// another kind.
    #[error("Idempotency key already used for order {0} with a different request")]
    IdempotencyConflict(OrderId),

    /// The write committed but the order could not be read back.
    #[error("Order {order_id} was saved but could not be loaded: {reason}")]
    ViewUnavailable { order_id: OrderId, reason: String },
}

impl OrderError {
    /// Short label used in logs and metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::PriceMismatch { .. } => "price_mismatch",
            OrderError::IdempotencyConflict(_) => "idempotency_conflict",
            OrderError::TransactionFailure(_) => "transaction_failure",
            OrderError::ViewUnavailable { .. } => "view_unavailable",
        }
    }
}

impl From<ValidationErrors> for OrderError {
    fn from(e: ValidationErrors) -> Self {
        OrderError::Validation(e)
    }
}

impl From<StoreError> for OrderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ProductNotFound(id) => OrderError::ProductNotFound(id),
            StoreError::InsufficientStock {
                product_id,
                requested,
                available,
            } => OrderError::InsufficientStock {
                product_id,
                requested,
                available,
            },
            other => OrderError::TransactionFailure(other),
        }
    }
}

/// Loads an order after its write committed.
///
/// Any failure becomes [`OrderError::ViewUnavailable`] since the write itself
/// already landed.
pub(crate) async fn read_back<S: Store>(
    store: &S,
    order_id: OrderId,
) -> Result<OrderAggregate, OrderError> {
    match store.get_order(order_id).await {
        Ok(Some(order)) => Ok(order),
        Ok(None) => Err(OrderError::ViewUnavailable {
            order_id,
            reason: "order is no longer present".to_string(),
        }),
        Err(e) => {
            tracing::error!(%order_id, error = %e, "committed order could not be read back");
            Err(OrderError::ViewUnavailable {
                order_id,
                reason: e.to_string(),
            })
        }
    }
}

/// Rolls back, logging instead of failing so the original error wins.
pub(crate) async fn abandon<T: StoreTransaction>(tx: T) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "rollback failed");
    }
}
