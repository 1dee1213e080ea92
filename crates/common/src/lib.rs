//! Shared types for the storefront backend.

pub mod money;
pub mod page;
pub mod types;

pub use money::Money;
pub use page::{InvalidRange, Page, Paginated};
pub use types::{BrandId, CategoryId, IdempotencyKey, OrderId, OrderLineId, ProductId, UserId};
