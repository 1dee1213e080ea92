use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use common::{
    BrandId, CategoryId, IdempotencyKey, OrderId, OrderLineId, Page, Paginated, ProductId,
};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Brand, Category, CatalogStore, InventoryLedger, NewBrand, NewCategory, NewOrder,
    NewOrderLine, NewProduct, OrderLineDetail, OrderLineRecord, OrderRecord, Product,
    ProductQuery, Result, Store, StoreError, StoreTransaction, StoredOrder,
    query::contains_ignore_case,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    category: i64,
    brand: i64,
    product: i64,
    order: i64,
    line: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default)]
struct Tables {
    categories: BTreeMap<CategoryId, Category>,
    brands: BTreeMap<BrandId, Brand>,
    products: BTreeMap<ProductId, Product>,
    orders: BTreeMap<OrderId, OrderRecord>,
    lines: BTreeMap<OrderLineId, OrderLineRecord>,
    sequences: Sequences,
}

impl Tables {
    fn stored_order(&self, header: &OrderRecord) -> Result<StoredOrder> {
        let lines = self
            .lines
            .values()
            .filter(|line| line.order_id == header.id)
            .map(|line| {
                let product = self.products.get(&line.product_id).cloned().ok_or_else(|| {
                    StoreError::CorruptRow {
                        table: "order_lines",
                        reason: format!(
                            "line {} references missing product {}",
                            line.id, line.product_id
                        ),
                    }
                })?;
                Ok(OrderLineDetail {
                    line: *line,
                    product,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(StoredOrder {
            header: header.clone(),
            lines,
        })
    }
}

#[derive(Debug, Default)]
struct Faults {
    fail_next_commit: AtomicBool,
    fail_order_reads: AtomicBool,
    miss_next_key_lookup: AtomicBool,
}

/// In-memory store for tests and local runs.
///
/// Writers are serialized on a single lock held for the lifetime of a
/// transaction, which gives every transaction a serializable view. Each
/// transaction works on a private copy of the tables that replaces the shared
/// copy on commit, so readers never observe uncommitted writes.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    writer: Arc<Mutex<()>>,
    faults: Arc<Faults>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next commit fail after the transaction did all its work.
    pub fn set_fail_next_commit(&self, fail: bool) {
        self.faults.fail_next_commit.store(fail, Ordering::SeqCst);
    }

    /// Makes order reads outside of transactions fail.
    pub fn set_fail_order_reads(&self, fail: bool) {
        self.faults.fail_order_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes the next in-transaction idempotency-key lookup miss, as if the
    /// order holding the key committed right after the lookup.
    pub fn set_miss_next_key_lookup(&self, miss: bool) {
        self.faults.miss_next_key_lookup.store(miss, Ordering::SeqCst);
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of committed order lines.
    pub async fn order_line_count(&self) -> usize {
        self.tables.read().await.lines.len()
    }

    /// Returns the committed stock of a product.
    pub async fn stock_of(&self, product_id: ProductId) -> Option<u32> {
        self.tables
            .read()
            .await
            .products
            .get(&product_id)
            .map(|p| p.stock)
    }

    fn check_order_reads(&self) -> Result<()> {
        if self.faults.fail_order_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("order reads disabled".to_string()));
        }
        Ok(())
    }

    async fn write<T>(&self, f: impl FnOnce(&mut Tables) -> T) -> T {
        let _writer = self.writer.lock().await;
        let mut tables = self.tables.write().await;
        f(&mut tables)
    }
}

/// Transaction over a private copy of the in-memory tables.
pub struct InMemoryTransaction {
    tables: Arc<RwLock<Tables>>,
    working: Tables,
    faults: Arc<Faults>,
    _writer: OwnedMutexGuard<()>,
}

#[async_trait]
impl InventoryLedger for InMemoryTransaction {
    async fn get_stock(&mut self, product_id: ProductId) -> Result<u32> {
        self.working
            .products
            .get(&product_id)
            .map(|p| p.stock)
            .ok_or(StoreError::ProductNotFound(product_id))
    }

    async fn decrement_stock(&mut self, product_id: ProductId, amount: u32) -> Result<u32> {
        let product = self
            .working
            .products
            .get_mut(&product_id)
            .ok_or(StoreError::ProductNotFound(product_id))?;

        if product.stock < amount {
            return Err(StoreError::InsufficientStock {
                product_id,
                requested: amount,
                available: product.stock,
            });
        }

        product.stock -= amount;
        product.updated_at = Utc::now();
        Ok(product.stock)
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn find_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(&product_id).cloned())
    }

    async fn lock_products(&mut self, _product_ids: &[ProductId]) -> Result<()> {
        // The writer lock already covers every row.
        Ok(())
    }

    async fn find_order_by_idempotency_key(
        &mut self,
        key: IdempotencyKey,
    ) -> Result<Option<OrderId>> {
        if self.faults.miss_next_key_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .working
            .orders
            .values()
            .find(|o| o.idempotency_key == Some(key))
            .map(|o| o.id))
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId> {
        if let Some(key) = order.idempotency_key
            && self
                .working
                .orders
                .values()
                .any(|o| o.idempotency_key == Some(key))
        {
            return Err(StoreError::DuplicateIdempotencyKey(key));
        }

        let id = OrderId::new(next(&mut self.working.sequences.order));
        let now = Utc::now();
        self.working.orders.insert(
            id,
            OrderRecord {
                id,
                price: order.price,
                bonus: order.bonus,
                user_id: order.user_id,
                kind: order.kind,
                status: order.status.clone(),
                service_mode: order.service_mode.clone(),
                phone: order.phone.clone(),
                name: order.name.clone(),
                organization: order.organization.clone(),
                tax_id: order.tax_id.clone(),
                comment: order.comment.clone(),
                idempotency_key: order.idempotency_key,
                created_at: now,
                updated_at: now,
            },
        );
        Ok(id)
    }

    async fn insert_order_lines(
        &mut self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLineRecord>> {
        let mut records = Vec::with_capacity(lines.len());
        for line in lines {
            let record = OrderLineRecord {
                id: OrderLineId::new(next(&mut self.working.sequences.line)),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
            };
            self.working.lines.insert(record.id, record);
            records.push(record);
        }
        Ok(records)
    }

    async fn find_order_for_update(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<()> {
        if let Some(existing) = self.working.orders.get_mut(&order.id) {
            *existing = OrderRecord {
                updated_at: Utc::now(),
                ..order.clone()
            };
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        let InMemoryTransaction {
            tables,
            working,
            faults,
            _writer,
        } = self;

        if faults.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commit rejected".to_string()));
        }

        *tables.write().await = working;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> Result<InMemoryTransaction> {
        let writer = self.writer.clone().lock_owned().await;
        let working = self.tables.read().await.clone();
        Ok(InMemoryTransaction {
            tables: self.tables.clone(),
            working,
            faults: self.faults.clone(),
            _writer: writer,
        })
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<StoredOrder>> {
        self.check_order_reads()?;
        let tables = self.tables.read().await;
        tables
            .orders
            .get(&order_id)
            .map(|header| tables.stored_order(header))
            .transpose()
    }

    async fn list_orders(&self) -> Result<Vec<StoredOrder>> {
        self.check_order_reads()?;
        let tables = self.tables.read().await;
        tables
            .orders
            .values()
            .map(|header| tables.stored_order(header))
            .collect()
    }

    async fn find_order_id_by_idempotency_key(
        &self,
        key: IdempotencyKey,
    ) -> Result<Option<OrderId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .find(|o| o.idempotency_key == Some(key))
            .map(|o| o.id))
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool> {
        Ok(self
            .write(|tables| {
                let existed = tables.orders.remove(&order_id).is_some();
                tables.lines.retain(|_, line| line.order_id != order_id);
                existed
            })
            .await)
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        Ok(self.tables.read().await.products.get(&product_id).cloned())
    }

    async fn query_products(&self, query: ProductQuery) -> Result<Paginated<Product>> {
        let tables = self.tables.read().await;
        let matching: Vec<Product> = tables
            .products
            .values()
            .filter(|p| query.matches(p))
            .cloned()
            .collect();
        let total = matching.len() as u64;
        Ok(Paginated::new(
            query.page.slice(&matching),
            total,
            query.page,
        ))
    }

    async fn get_category(&self, category_id: CategoryId) -> Result<Option<Category>> {
        Ok(self
            .tables
            .read()
            .await
            .categories
            .get(&category_id)
            .cloned())
    }

    async fn list_categories(&self, page: Page) -> Result<Paginated<Category>> {
        let tables = self.tables.read().await;
        let all: Vec<Category> = tables.categories.values().cloned().collect();
        Ok(Paginated::new(page.slice(&all), all.len() as u64, page))
    }

    async fn get_brand(&self, brand_id: BrandId) -> Result<Option<Brand>> {
        Ok(self.tables.read().await.brands.get(&brand_id).cloned())
    }

    async fn list_brands(&self, page: Page) -> Result<Paginated<Brand>> {
        let tables = self.tables.read().await;
        let all: Vec<Brand> = tables.brands.values().cloned().collect();
        Ok(Paginated::new(page.slice(&all), all.len() as u64, page))
    }

    async fn find_category_ids_by_name(&self, fragment: &str) -> Result<Vec<CategoryId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .values()
            .filter(|c| contains_ignore_case(&c.name, fragment))
            .map(|c| c.id)
            .collect())
    }

    async fn find_brand_ids_by_name(&self, fragment: &str) -> Result<Vec<BrandId>> {
        let tables = self.tables.read().await;
        Ok(tables
            .brands
            .values()
            .filter(|b| contains_ignore_case(&b.name, fragment))
            .map(|b| b.id)
            .collect())
    }

    async fn insert_category(&self, category: NewCategory) -> Result<Category> {
        Ok(self
            .write(|tables| {
                let id = CategoryId::new(next(&mut tables.sequences.category));
                let now = Utc::now();
                let record = Category {
                    id,
                    name: category.name,
                    description: category.description,
                    image: category.image,
                    created_at: now,
                    updated_at: now,
                };
                tables.categories.insert(id, record.clone());
                record
            })
            .await)
    }

    async fn insert_brand(&self, brand: NewBrand) -> Result<Brand> {
        Ok(self
            .write(|tables| {
                let id = BrandId::new(next(&mut tables.sequences.brand));
                let now = Utc::now();
                let record = Brand {
                    id,
                    name: brand.name,
                    country: brand.country,
                    description: brand.description,
                    image: brand.image,
                    created_at: now,
                    updated_at: now,
                };
                tables.brands.insert(id, record.clone());
                record
            })
            .await)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        Ok(self
            .write(|tables| {
                let id = ProductId::new(next(&mut tables.sequences.product));
                let now = Utc::now();
                let record = Product {
                    id,
                    name: product.name,
                    price: product.price,
                    stock: product.stock,
                    rating: product.rating,
                    description: product.description,
                    images: product.images,
                    info: product.info,
                    feature: product.feature,
                    guarantee: product.guarantee,
                    discount: product.discount,
                    category_id: product.category_id,
                    brand_id: product.brand_id,
                    created_at: now,
                    updated_at: now,
                };
                tables.products.insert(id, record.clone());
                record
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Money;

    use crate::OrderKind;

    fn individual_order() -> NewOrder {
        NewOrder {
            price: Money::from_units(30),
            bonus: Money::zero(),
            user_id: None,
            kind: OrderKind::Individual,
            status: "new".to_string(),
            service_mode: "delivery".to_string(),
            phone: Some("+100200300".to_string()),
            name: Some("Dana".to_string()),
            organization: None,
            tax_id: None,
            comment: None,
            idempotency_key: None,
        }
    }

    async fn seeded_product(store: &InMemoryStore, stock: u32) -> ProductId {
        store
            .insert_product(NewProduct::new("Electrode", Money::from_units(10), stock))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_commit_publishes_writes() {
        let store = InMemoryStore::new();
        let product_id = seeded_product(&store, 5).await;

        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&individual_order()).await.unwrap();
        tx.insert_order_lines(
            order_id,
            &[NewOrderLine {
                product_id,
                quantity: 3,
            }],
        )
        .await
        .unwrap();
        assert_eq!(tx.decrement_stock(product_id, 3).await.unwrap(), 2);

        // Uncommitted writes stay private.
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.stock_of(product_id).await, Some(5));

        tx.commit().await.unwrap();

        assert_eq!(store.order_count().await, 1);
        assert_eq!(store.stock_of(product_id).await, Some(2));
        let stored = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.lines.len(), 1);
        assert_eq!(stored.lines[0].product.stock, 2);
    }

    #[tokio::test]
    async fn test_dropped_transaction_discards_writes() {
        let store = InMemoryStore::new();
        let product_id = seeded_product(&store, 5).await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_order(&individual_order()).await.unwrap();
            tx.decrement_stock(product_id, 5).await.unwrap();
        }

        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.stock_of(product_id).await, Some(5));
    }

    #[tokio::test]
    async fn test_decrement_is_conditional() {
        let store = InMemoryStore::new();
        let product_id = seeded_product(&store, 2).await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.decrement_stock(product_id, 3).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::InsufficientStock {
                requested: 3,
                available: 2,
                ..
            }
        ));
        assert_eq!(tx.get_stock(product_id).await.unwrap(), 2);

        let err = tx.get_stock(ProductId::new(999)).await.unwrap_err();
        assert!(matches!(err, StoreError::ProductNotFound(_)));
    }

    #[tokio::test]
    async fn test_duplicate_idempotency_key_is_rejected() {
        let store = InMemoryStore::new();
        let key = IdempotencyKey::new();
        let order = NewOrder {
            idempotency_key: Some(key),
            ..individual_order()
        };

        let mut tx = store.begin().await.unwrap();
        let first = tx.insert_order(&order).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(
            tx.find_order_by_idempotency_key(key).await.unwrap(),
            Some(first)
        );
        let err = tx.insert_order(&order).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateIdempotencyKey(k) if k == key));
    }

    #[tokio::test]
    async fn test_injected_commit_failure_keeps_state() {
        let store = InMemoryStore::new();
        store.set_fail_next_commit(true);

        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&individual_order()).await.unwrap();
        assert!(tx.commit().await.is_err());
        assert_eq!(store.order_count().await, 0);

        // The fault only fires once.
        let mut tx = store.begin().await.unwrap();
        tx.insert_order(&individual_order()).await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn test_delete_order_removes_lines() {
        let store = InMemoryStore::new();
        let product_id = seeded_product(&store, 5).await;

        let mut tx = store.begin().await.unwrap();
        let order_id = tx.insert_order(&individual_order()).await.unwrap();
        tx.insert_order_lines(
            order_id,
            &[NewOrderLine {
                product_id,
                quantity: 1,
            }],
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert!(store.delete_order(order_id).await.unwrap());
        assert!(!store.delete_order(order_id).await.unwrap());
        assert_eq!(store.order_line_count().await, 0);
        assert!(store.get_order(order_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_products_filters_and_paginates() {
        let store = InMemoryStore::new();
        let tools = store
            .insert_category(NewCategory::named("Tools"))
            .await
            .unwrap();
        for i in 0..12 {
            let mut product = NewProduct::new(format!("Item {i}"), Money::from_units(1), 1);
            if i % 2 == 0 {
                product = product.in_category(tools.id);
            }
            store.insert_product(product).await.unwrap();
        }

        let page = store
            .query_products(ProductQuery::new().page(Page::new(10, Some(5))))
            .await
            .unwrap();
        assert_eq!(page.total, 12);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].name, "Item 10");
        assert_eq!(page.items[1].name, "Item 11");

        let in_tools = store
            .query_products(ProductQuery::new().category(tools.id))
            .await
            .unwrap();
        assert_eq!(in_tools.total, 6);
    }
}
