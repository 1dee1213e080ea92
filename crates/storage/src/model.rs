//! Stored records for the catalog and the order ledger.

use chrono::{DateTime, Utc};
use common::{
    BrandId, CategoryId, IdempotencyKey, Money, OrderId, OrderLineId, ProductId, UserId,
};
use serde::{Deserialize, Serialize};

/// A sellable catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    /// Units available for sale. Only order placement decrements it.
    pub stock: u32,
    pub rating: f64,
    pub description: String,
    pub images: Vec<String>,
    pub info: String,
    pub feature: String,
    pub guarantee: Option<String>,
    pub discount: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a product about to be inserted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewProduct {
    pub name: String,
    pub price: Money,
    pub stock: u32,
    pub rating: f64,
    pub description: String,
    pub images: Vec<String>,
    pub info: String,
    pub feature: String,
    pub guarantee: Option<String>,
    pub discount: Option<String>,
    pub category_id: Option<CategoryId>,
    pub brand_id: Option<BrandId>,
}

impl NewProduct {
    /// Minimal product with a name, a unit price and a stock count.
    pub fn new(name: impl Into<String>, price: Money, stock: u32) -> Self {
        Self {
            name: name.into(),
            price,
            stock,
            ..Default::default()
        }
    }

    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn of_brand(mut self, brand_id: BrandId) -> Self {
        self.brand_id = Some(brand_id);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewCategory {
    pub name: String,
    pub description: String,
    pub image: String,
}

impl NewCategory {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: BrandId,
    pub name: String,
    pub country: String,
    pub description: String,
    pub image: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewBrand {
    pub name: String,
    pub country: String,
    pub description: String,
    pub image: String,
}

impl NewBrand {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Order discriminator deciding which header fields are required and editable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// A private customer identified by phone and name.
    Individual,
    /// An organization identified by name and tax id.
    Legal,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Individual => "individual",
            OrderKind::Legal => "legal",
        }
    }
}

impl std::fmt::Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(OrderKind::Individual),
            "legal" => Ok(OrderKind::Legal),
            other => Err(format!("unknown order kind '{other}'")),
        }
    }
}

/// A persisted order header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub price: Money,
    pub bonus: Money,
    pub user_id: Option<UserId>,
    pub kind: OrderKind,
    pub status: String,
    pub service_mode: String,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub organization: Option<String>,
    pub tax_id: Option<String>,
    pub comment: Option<String>,
    pub idempotency_key: Option<IdempotencyKey>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Header fields for an order about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub price: Money,
    pub bonus: Money,
    pub user_id: Option<UserId>,
    pub kind: OrderKind,
    pub status: String,
    pub service_mode: String,
    pub phone: Option<String>,
    pub name: Option<String>,
    pub organization: Option<String>,
    pub tax_id: Option<String>,
    pub comment: Option<String>,
    pub idempotency_key: Option<IdempotencyKey>,
}

/// A persisted order line. Immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineRecord {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A line about to be inserted under an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// An order line joined with the product as it looks at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLineDetail {
    pub line: OrderLineRecord,
    pub product: Product,
}

/// An order header together with all of its lines, in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOrder {
    pub header: OrderRecord,
    pub lines: Vec<OrderLineDetail>,
}

impl StoredOrder {
    pub fn id(&self) -> OrderId {
        self.header.id
    }

    /// Sum of current unit price times quantity over all lines.
    pub fn line_total(&self) -> Money {
        self.lines
            .iter()
            .map(|detail| detail.product.price.multiply(detail.line.quantity))
            .sum()
    }
}
