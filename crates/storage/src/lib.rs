//! Transactional storage for the catalog, the order ledger and inventory.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use common::{BrandId, CategoryId, IdempotencyKey, OrderId, OrderLineId, ProductId, UserId};
pub use error::{Result, StoreError};
pub use memory::{InMemoryStore, InMemoryTransaction};
pub use model::{
    Brand, Category, NewBrand, NewCategory, NewOrder, NewOrderLine, NewProduct, OrderKind,
    OrderLineDetail, OrderLineRecord, OrderRecord, Product, StoredOrder,
};
pub use postgres::{PostgresStore, PostgresTransaction};
pub use query::ProductQuery;
pub use store::{CatalogStore, InventoryLedger, Store, StoreTransaction};
