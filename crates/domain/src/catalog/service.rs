use common::{BrandId, CategoryId, Page, Paginated, ProductId};
use storage::{Brand, CatalogStore, Category, Product, ProductQuery};

use super::{
    BrandWithProducts, CatalogError, CategoryWithProducts, ListProducts, PageRequest, SearchMatch,
    SearchResults,
};

/// Catalog reads: products, categories and brands.
///
/// Nothing here locks; stock values are display-only.
#[derive(Clone)]
pub struct CatalogService<C: CatalogStore> {
    store: C,
}

impl<C: CatalogStore> CatalogService<C> {
    pub fn new(store: C) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_products(
        &self,
        request: ListProducts,
    ) -> Result<Paginated<Product>, CatalogError> {
        let page = Page::from_params(request.page.skip, request.page.limit)?;

        let mut query = ProductQuery::new().page(page);
        if let Some(id) = request.category_id {
            query = query.category(id);
        }
        if let Some(id) = request.brand_id {
            query = query.brand(id);
        }

        Ok(self.store.query_products(query).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, product_id: ProductId) -> Result<Product, CatalogError> {
        self.store
            .get_product(product_id)
            .await?
            .ok_or(CatalogError::ProductNotFound(product_id))
    }

    /// Case-insensitive substring search.
    ///
    /// Tries product names first, then the names of categories, then the
    /// names of brands, and returns the first non-empty stage.
    #[tracing::instrument(skip(self))]
    pub async fn search_products(&self, q: &str) -> Result<SearchResults, CatalogError> {
        let term = q.trim();
        if term.is_empty() {
            return Err(CatalogError::EmptySearchQuery);
        }

        let by_name = self.all(ProductQuery::new().name_contains(term)).await?;
        if !by_name.is_empty() {
            return Ok(SearchResults {
                matched_by: SearchMatch::ProductName,
                products: by_name,
            });
        }

        let category_ids = self.store.find_category_ids_by_name(term).await?;
        if !category_ids.is_empty() {
            let by_category = self.all(ProductQuery::new().any_category(category_ids)).await?;
            if !by_category.is_empty() {
                return Ok(SearchResults {
                    matched_by: SearchMatch::CategoryName,
                    products: by_category,
                });
            }
        }

        let brand_ids = self.store.find_brand_ids_by_name(term).await?;
        if !brand_ids.is_empty() {
            let by_brand = self.all(ProductQuery::new().any_brand(brand_ids)).await?;
            if !by_brand.is_empty() {
                return Ok(SearchResults {
                    matched_by: SearchMatch::BrandName,
                    products: by_brand,
                });
            }
        }

        Ok(SearchResults {
            matched_by: SearchMatch::Nothing,
            products: Vec::new(),
        })
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_categories(
        &self,
        page: PageRequest,
    ) -> Result<Paginated<Category>, CatalogError> {
        let page = Page::from_params(page.skip, page.limit)?;
        Ok(self.store.list_categories(page).await?)
    }

    /// Loads a category with one page of its products.
    #[tracing::instrument(skip(self))]
    pub async fn get_category(
        &self,
        category_id: CategoryId,
        products: PageRequest,
    ) -> Result<CategoryWithProducts, CatalogError> {
        let page = product_page(products)?;
        let category = self
            .store
            .get_category(category_id)
            .await?
            .ok_or(CatalogError::CategoryNotFound(category_id))?;
        let products = self
            .store
            .query_products(ProductQuery::new().category(category_id).page(page))
            .await?;

        Ok(CategoryWithProducts { category, products })
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_brands(&self, page: PageRequest) -> Result<Paginated<Brand>, CatalogError> {
        let page = Page::from_params(page.skip, page.limit)?;
        Ok(self.store.list_brands(page).await?)
    }

    /// Loads a brand with one page of its products.
    #[tracing::instrument(skip(self))]
    pub async fn get_brand(
        &self,
        brand_id: BrandId,
        products: PageRequest,
    ) -> Result<BrandWithProducts, CatalogError> {
        let page = product_page(products)?;
        let brand = self
            .store
            .get_brand(brand_id)
            .await?
            .ok_or(CatalogError::BrandNotFound(brand_id))?;
        let products = self
            .store
            .query_products(ProductQuery::new().brand(brand_id).page(page))
            .await?;

        Ok(BrandWithProducts { brand, products })
    }

    async fn all(&self, query: ProductQuery) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.query_products(query).await?.items)
    }
}

fn product_page(request: PageRequest) -> Result<Page, CatalogError> {
    Ok(Page::from_named_params(
        ("product_skip", request.skip),
        ("product_limit", request.limit),
    )?)
}
