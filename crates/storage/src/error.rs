use common::{IdempotencyKey, InvalidRange, ProductId};
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The product does not exist.
    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    /// A conditional stock decrement found fewer units than requested.
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Another order already claimed this idempotency key.
    #[error("Idempotency key {0} is already in use")]
    DuplicateIdempotencyKey(IdempotencyKey),

    /// A pagination window was out of range.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRange),

    /// A stored row could not be mapped back to a record.
    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The backend could not serve the request.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
