use async_trait::async_trait;
use common::{BrandId, CategoryId, IdempotencyKey, OrderId, Page, Paginated, ProductId};

use crate::{
    Brand, Category, NewBrand, NewCategory, NewOrder, NewOrderLine, NewProduct, OrderLineRecord,
    OrderRecord, Product, ProductQuery, Result, StoredOrder,
};

/// Stock bookkeeping available inside a write transaction.
///
/// Reads lock the product row for the rest of the transaction, and every
/// decrement is conditional on enough stock remaining, so stock can never go
/// negative even when several transactions target the same product.
#[async_trait]
pub trait InventoryLedger: Send {
    /// Returns the stock as seen by this transaction.
    ///
    /// Fails with `ProductNotFound` if the product does not exist.
    async fn get_stock(&mut self, product_id: ProductId) -> Result<u32>;

    /// Removes `amount` units from stock and returns what remains.
    ///
    /// Fails with `InsufficientStock` when fewer than `amount` units are left;
    /// the stock is then left untouched.
    async fn decrement_stock(&mut self, product_id: ProductId, amount: u32) -> Result<u32>;
}

/// A single atomic unit of work against the store.
///
/// Nothing written through a transaction is visible to other readers until
/// [`StoreTransaction::commit`] succeeds. Dropping a transaction without
/// committing discards every write.
#[async_trait]
pub trait StoreTransaction: InventoryLedger {
    /// Loads a product and locks it until the transaction ends.
    async fn find_product(&mut self, product_id: ProductId) -> Result<Option<Product>>;

    /// Locks every listed product until the transaction ends.
    ///
    /// Rows are locked in ascending id order whatever order `product_ids`
    /// comes in. Missing products are skipped.
    async fn lock_products(&mut self, product_ids: &[ProductId]) -> Result<()>;

    /// Looks up the order that already claimed an idempotency key.
    async fn find_order_by_idempotency_key(
        &mut self,
        key: IdempotencyKey,
    ) -> Result<Option<OrderId>>;

    /// Inserts an order header and returns its new id.
    ///
    /// Fails with `DuplicateIdempotencyKey` if the key is already taken.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId>;

    /// Inserts lines under an order, preserving their order.
    async fn insert_order_lines(
        &mut self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLineRecord>>;

    /// Loads an order header and locks it until the transaction ends.
    async fn find_order_for_update(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Overwrites every mutable header field of an existing order.
    async fn update_order(&mut self, order: &OrderRecord) -> Result<()>;

    /// Makes all writes of this transaction visible.
    async fn commit(self) -> Result<()>;

    /// Discards all writes of this transaction.
    async fn rollback(self) -> Result<()>;
}

/// Order ledger access.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Store: Send + Sync {
    type Transaction: StoreTransaction;

    /// Opens a new write transaction.
    async fn begin(&self) -> Result<Self::Transaction>;

    /// Loads an order with its lines and current product snapshots.
    async fn get_order(&self, order_id: OrderId) -> Result<Option<StoredOrder>>;

    /// Loads every order, oldest first.
    async fn list_orders(&self) -> Result<Vec<StoredOrder>>;

    /// Resolves an idempotency key outside of any transaction.
    async fn find_order_id_by_idempotency_key(&self, key: IdempotencyKey)
    -> Result<Option<OrderId>>;

    /// Deletes an order and its lines. Stock is not restored.
    ///
    /// Returns false if the order did not exist.
    async fn delete_order(&self, order_id: OrderId) -> Result<bool>;
}

/// Read access to the catalog, plus the inserts used to seed it.
///
/// Reads never lock; they may observe stock that a concurrent placement is
/// about to change.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>>;

    /// Lists products matching a query, ordered by id.
    async fn query_products(&self, query: ProductQuery) -> Result<Paginated<Product>>;

    async fn get_category(&self, category_id: CategoryId) -> Result<Option<Category>>;

    async fn list_categories(&self, page: Page) -> Result<Paginated<Category>>;

    async fn get_brand(&self, brand_id: BrandId) -> Result<Option<Brand>>;

    async fn list_brands(&self, page: Page) -> Result<Paginated<Brand>>;

    /// Ids of categories whose name contains `fragment`, ignoring case.
    async fn find_category_ids_by_name(&self, fragment: &str) -> Result<Vec<CategoryId>>;

    /// Ids of brands whose name contains `fragment`, ignoring case.
    async fn find_brand_ids_by_name(&self, fragment: &str) -> Result<Vec<BrandId>>;

    async fn insert_category(&self, category: NewCategory) -> Result<Category>;

    async fn insert_brand(&self, brand: NewBrand) -> Result<Brand>;

    async fn insert_product(&self, product: NewProduct) -> Result<Product>;
}
