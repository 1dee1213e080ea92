use common::{BrandId, CategoryId, Page};

use crate::Product;

/// Builder for constructing product listings.
///
/// All filters combine with AND. Results are ordered by product id, which is
/// the insertion order.
#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    /// Filter by a single category.
    pub category_id: Option<CategoryId>,

    /// Filter by a single brand.
    pub brand_id: Option<BrandId>,

    /// Case-insensitive substring match on the product name.
    pub name_contains: Option<String>,

    /// Filter by any of these categories.
    pub category_ids: Option<Vec<CategoryId>>,

    /// Filter by any of these brands.
    pub brand_ids: Option<Vec<BrandId>>,

    /// Window applied after filtering.
    pub page: Page,
}

impl ProductQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, id: CategoryId) -> Self {
        self.category_id = Some(id);
        self
    }

    pub fn brand(mut self, id: BrandId) -> Self {
        self.brand_id = Some(id);
        self
    }

    pub fn name_contains(mut self, fragment: impl Into<String>) -> Self {
        self.name_contains = Some(fragment.into());
        self
    }

    pub fn any_category(mut self, ids: Vec<CategoryId>) -> Self {
        self.category_ids = Some(ids);
        self
    }

    pub fn any_brand(mut self, ids: Vec<BrandId>) -> Self {
        self.brand_ids = Some(ids);
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    /// Evaluates every filter except the page against one product.
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(id) = self.category_id
            && product.category_id != Some(id)
        {
            return false;
        }
        if let Some(id) = self.brand_id
            && product.brand_id != Some(id)
        {
            return false;
        }
        if let Some(ref fragment) = self.name_contains
            && !contains_ignore_case(&product.name, fragment)
        {
            return false;
        }
        if let Some(ref ids) = self.category_ids
            && !product.category_id.is_some_and(|id| ids.contains(&id))
        {
            return false;
        }
        if let Some(ref ids) = self.brand_ids
            && !product.brand_id.is_some_and(|id| ids.contains(&id))
        {
            return false;
        }
        true
    }
}

/// Case-insensitive substring test shared by the in-memory searches.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Turns a search fragment into an `ILIKE` pattern with wildcards escaped.
pub fn like_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
