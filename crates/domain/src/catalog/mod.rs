//! Read-only catalog queries.

mod service;

pub use service::CatalogService;

use common::{BrandId, CategoryId, InvalidRange, Paginated, ProductId};
use storage::{Brand, Category, Product, StoreError};
use thiserror::Error;

/// Errors that can occur during catalog reads.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    InvalidRange(#[from] InvalidRange),

    #[error("Query parameter 'q' is required")]
    EmptySearchQuery,

    #[error("Product {0} not found")]
    ProductNotFound(ProductId),

    #[error("Category {0} not found")]
    CategoryNotFound(CategoryId),

    #[error("Brand {0} not found")]
    BrandNotFound(BrandId),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Raw `(skip, limit)` as received from a caller, not yet range-checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

impl PageRequest {
    pub fn new(skip: Option<i64>, limit: Option<i64>) -> Self {
        Self { skip, limit }
    }
}

/// Filters for a product listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListProducts {
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub page: PageRequest,
}

/// Which fallback stage of a search produced its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMatch {
    ProductName,
    CategoryName,
    BrandName,
    Nothing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    pub matched_by: SearchMatch,
    pub products: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryWithProducts {
    pub category: Category,
    pub products: Paginated<Product>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrandWithProducts {
    pub brand: Brand,
    pub products: Paginated<Product>,
}
