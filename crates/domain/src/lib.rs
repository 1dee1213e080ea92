//! Domain layer for the storefront backend.
//!
//! This crate provides:
//! - Transactional order placement with inventory decrement
//! - Partial header updates, reads and deletion of orders
//! - Catalog queries with search fallback and pagination
//! - Field-level validation shared by every command

pub mod catalog;
pub mod error;
pub mod order;

pub use catalog::{
    BrandWithProducts, CatalogError, CatalogService, CategoryWithProducts, ListProducts,
    PageRequest, SearchMatch, SearchResults,
};
pub use error::{FieldError, ValidationErrors};
pub use order::{
    CustomerDetails, LineRequest, OrderAggregate, OrderError, OrderMutationService,
    OrderPlacementService, OrderService, PlaceOrder, PlacementOutcome, PlacementPolicy,
    UpdateOrder,
};
pub use storage::{OrderKind, Product};
