//! Read-only catalog endpoints: products, categories and brands.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::{BrandId, CategoryId, Paginated, ProductId};
use domain::{ListProducts, PageRequest, Product};
use serde::{Deserialize, Serialize};
use storage::{Brand, CatalogStore, Category, Store};

use super::orders::AppState;
use super::{PathId, QueryParams, accept};
use crate::error::ApiError;

// -- Query types --

#[derive(Debug, Default, Deserialize)]
pub struct ListProductsQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub category_id: Option<i64>,
    pub brand_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductPageQuery {
    pub product_skip: Option<i64>,
    pub product_limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub price_cents: i64,
    pub stock: u32,
    pub rating: f64,
    pub description: String,
    pub images: Vec<String>,
    pub info: String,
    pub feature: String,
    pub guarantee: Option<String>,
    pub discount: Option<String>,
    pub category_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total: u64,
    pub skip: u64,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub products: Vec<ProductResponse>,
}

#[derive(Debug, Serialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BrandResponse {
    pub id: i64,
    pub name: String,
    pub country: String,
    pub description: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub categories: Vec<CategoryResponse>,
    pub total: u64,
    pub skip: u64,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct BrandListResponse {
    pub brands: Vec<BrandResponse>,
    pub total: u64,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// An entity with one page of its products, flattened the way clients expect.
#[derive(Debug, Serialize)]
pub struct WithProductsResponse<T: Serialize> {
    #[serde(flatten)]
    pub entity: T,
    pub products: Vec<ProductResponse>,
    pub total: u64,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id.as_i64(),
            name: p.name,
            price_cents: p.price.cents(),
            stock: p.stock,
            rating: p.rating,
            description: p.description,
            images: p.images,
            info: p.info,
            feature: p.feature,
            guarantee: p.guarantee,
            discount: p.discount,
            category_id: p.category_id.map(|id| id.as_i64()),
            brand_id: p.brand_id.map(|id| id.as_i64()),
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id.as_i64(),
            name: c.name,
            description: c.description,
            image: c.image,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl From<Brand> for BrandResponse {
    fn from(b: Brand) -> Self {
        Self {
            id: b.id.as_i64(),
            name: b.name,
            country: b.country,
            description: b.description,
            image: b.image,
            created_at: b.created_at,
            updated_at: b.updated_at,
        }
    }
}

impl<T: Serialize> WithProductsResponse<T> {
    fn new(entity: T, products: Paginated<Product>) -> Self {
        let products = products.map(ProductResponse::from);
        Self {
            entity,
            products: products.items,
            total: products.total,
            skip: products.skip,
            limit: products.limit,
        }
    }
}

// -- Handlers --

/// GET /products: filtered, paginated product listing.
#[tracing::instrument(skip(state, query))]
pub async fn list_products<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: QueryParams<ListProductsQuery>,
) -> Result<Json<ProductListResponse>, ApiError> {
    let Query(query) = accept(query)?;

    let page = state
        .catalog_service
        .list_products(ListProducts {
            category_id: query.category_id.map(CategoryId::new),
            brand_id: query.brand_id.map(BrandId::new),
            page: PageRequest::new(query.skip, query.limit),
        })
        .await?
        .map(ProductResponse::from);

    Ok(Json(ProductListResponse {
        products: page.items,
        total: page.total,
        skip: page.skip,
        limit: page.limit,
    }))
}

/// GET /products/search?q=: name, then category, then brand match.
#[tracing::instrument(skip(state, query))]
pub async fn search_products<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: QueryParams<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Query(query) = accept(query)?;
    let results = state
        .catalog_service
        .search_products(query.q.as_deref().unwrap_or_default())
        .await?;
    tracing::debug!(matched_by = ?results.matched_by, count = results.products.len(), "search done");

    Ok(Json(SearchResponse {
        products: results.products.into_iter().map(Into::into).collect(),
    }))
}

/// GET /products/{id}
#[tracing::instrument(skip(state, id))]
pub async fn get_product<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: PathId,
) -> Result<Json<ProductResponse>, ApiError> {
    let Path(id) = accept(id)?;
    let product = state.catalog_service.get_product(ProductId::new(id)).await?;
    Ok(Json(product.into()))
}

/// GET /categories
#[tracing::instrument(skip(state, query))]
pub async fn list_categories<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: QueryParams<PageQuery>,
) -> Result<Json<CategoryListResponse>, ApiError> {
    let Query(query) = accept(query)?;
    let page = state
        .catalog_service
        .list_categories(PageRequest::new(query.skip, query.limit))
        .await?
        .map(CategoryResponse::from);

    Ok(Json(CategoryListResponse {
        categories: page.items,
        total: page.total,
        skip: page.skip,
        limit: page.limit,
    }))
}

/// GET /categories/{id}: the category with a page of its products.
#[tracing::instrument(skip(state, id, query))]
pub async fn get_category<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: PathId,
    query: QueryParams<ProductPageQuery>,
) -> Result<Json<WithProductsResponse<CategoryResponse>>, ApiError> {
    let Path(id) = accept(id)?;
    let Query(query) = accept(query)?;

    let view = state
        .catalog_service
        .get_category(
            CategoryId::new(id),
            PageRequest::new(query.product_skip, query.product_limit),
        )
        .await?;

    Ok(Json(WithProductsResponse::new(
        view.category.into(),
        view.products,
    )))
}

/// GET /brands
#[tracing::instrument(skip(state, query))]
pub async fn list_brands<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: QueryParams<PageQuery>,
) -> Result<Json<BrandListResponse>, ApiError> {
    let Query(query) = accept(query)?;
    let page = state
        .catalog_service
        .list_brands(PageRequest::new(query.skip, query.limit))
        .await?
        .map(BrandResponse::from);

    Ok(Json(BrandListResponse {
        brands: page.items,
        total: page.total,
        skip: page.skip,
        limit: page.limit,
    }))
}

/// GET /brands/{id}: the brand with a page of its products.
#[tracing::instrument(skip(state, id, query))]
pub async fn get_brand<S: Store + CatalogStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    id: PathId,
    query: QueryParams<ProductPageQuery>,
) -> Result<Json<WithProductsResponse<BrandResponse>>, ApiError> {
    let Path(id) = accept(id)?;
    let Query(query) = accept(query)?;

    let view = state
        .catalog_service
        .get_brand(
            BrandId::new(id),
            PageRequest::new(query.product_skip, query.product_limit),
        )
        .await?;

    Ok(Json(WithProductsResponse::new(view.brand.into(), view.products)))
}
