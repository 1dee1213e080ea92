use std::collections::HashMap;

use async_trait::async_trait;
use common::{
    BrandId, CategoryId, IdempotencyKey, Money, OrderId, OrderLineId, Page, Paginated, ProductId,
    UserId,
};
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Brand, Category, CatalogStore, InventoryLedger, NewBrand, NewCategory, NewOrder,
    NewOrderLine, NewProduct, OrderKind, OrderLineDetail, OrderLineRecord, OrderRecord, Product,
    ProductQuery, Result, Store, StoreError, StoreTransaction, StoredOrder, query::like_pattern,
};

const PRODUCT_COLUMNS: &str = "id, name, price_cents, stock, rating, description, images, info, feature, guarantee, discount, category_id, brand_id, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, price_cents, bonus_cents, user_id, order_kind, status, service_mode, phone, name, organization, tax_id, comment, idempotency_key, created_at, updated_at";

const IDEMPOTENCY_CONSTRAINT: &str = "unique_order_idempotency_key";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn load_lines(&self, order_ids: &[i64]) -> Result<HashMap<OrderId, Vec<OrderLineDetail>>> {
        let sql = format!(
            r#"
            SELECT l.id AS line_id, l.order_id, l.product_id AS line_product_id, l.quantity,
                   {}
            FROM order_lines l
            JOIN products p ON p.id = l.product_id
            WHERE l.order_id = ANY($1)
            ORDER BY l.id ASC
            "#,
            prefixed_product_columns("p")
        );

        let rows = sqlx::query(&sql)
            .bind(order_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut lines: HashMap<OrderId, Vec<OrderLineDetail>> = HashMap::new();
        for row in rows {
            let line = OrderLineRecord {
                id: OrderLineId::new(row.try_get("line_id")?),
                order_id: OrderId::new(row.try_get("order_id")?),
                product_id: ProductId::new(row.try_get("line_product_id")?),
                quantity: to_u32("order_lines", "quantity", row.try_get("quantity")?)?,
            };
            let product = row_to_product(&row)?;
            lines
                .entry(line.order_id)
                .or_default()
                .push(OrderLineDetail { line, product });
        }
        Ok(lines)
    }
}

fn prefixed_product_columns(alias: &str) -> String {
    PRODUCT_COLUMNS
        .split(", ")
        .map(|column| format!("{alias}.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn to_u32(table: &'static str, column: &str, value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::CorruptRow {
        table,
        reason: format!("negative {column}: {value}"),
    })
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        price: Money::from_cents(row.try_get("price_cents")?),
        stock: to_u32("products", "stock", row.try_get("stock")?)?,
        rating: row.try_get("rating")?,
        description: row.try_get("description")?,
        images: row.try_get("images")?,
        info: row.try_get("info")?,
        feature: row.try_get("feature")?,
        guarantee: row.try_get("guarantee")?,
        discount: row.try_get("discount")?,
        category_id: row.try_get::<Option<i64>, _>("category_id")?.map(CategoryId::new),
        brand_id: row.try_get::<Option<i64>, _>("brand_id")?.map(BrandId::new),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: &PgRow) -> Result<OrderRecord> {
    let kind: String = row.try_get("order_kind")?;
    let kind = kind
        .parse::<OrderKind>()
        .map_err(|reason| StoreError::CorruptRow {
            table: "orders",
            reason,
        })?;

    Ok(OrderRecord {
        id: OrderId::new(row.try_get("id")?),
        price: Money::from_cents(row.try_get("price_cents")?),
        bonus: Money::from_cents(row.try_get("bonus_cents")?),
        user_id: row.try_get::<Option<i64>, _>("user_id")?.map(UserId::new),
        kind,
        status: row.try_get("status")?,
        service_mode: row.try_get("service_mode")?,
        phone: row.try_get("phone")?,
        name: row.try_get("name")?,
        organization: row.try_get("organization")?,
        tax_id: row.try_get("tax_id")?,
        comment: row.try_get("comment")?,
        idempotency_key: row
            .try_get::<Option<Uuid>, _>("idempotency_key")?
            .map(IdempotencyKey::from_uuid),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_category(row: &PgRow) -> Result<Category> {
    Ok(Category {
        id: CategoryId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        image: row.try_get("image")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_brand(row: &PgRow) -> Result<Brand> {
    Ok(Brand {
        id: BrandId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        country: row.try_get("country")?,
        description: row.try_get("description")?,
        image: row.try_get("image")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn page_bounds(page: Page) -> (i64, Option<i64>) {
    let skip = i64::try_from(page.skip).unwrap_or(i64::MAX);
    let limit = page.limit.map(|l| i64::try_from(l).unwrap_or(i64::MAX));
    (skip, limit)
}

/// A write transaction on a pooled connection.
///
/// Dropping it without committing rolls back.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
}

#[async_trait]
impl InventoryLedger for PostgresTransaction {
    async fn get_stock(&mut self, product_id: ProductId) -> Result<u32> {
        let stock: Option<i32> =
            sqlx::query_scalar("SELECT stock FROM products WHERE id = $1 FOR UPDATE")
                .bind(product_id.as_i64())
                .fetch_optional(&mut *self.tx)
                .await?;

        match stock {
            Some(stock) => to_u32("products", "stock", stock),
            None => Err(StoreError::ProductNotFound(product_id)),
        }
    }

    async fn decrement_stock(&mut self, product_id: ProductId, amount: u32) -> Result<u32> {
        let amount_i32 = i32::try_from(amount).unwrap_or(i32::MAX);

        // Conditional decrement: zero rows means the product is missing or short.
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.as_i64())
        .bind(amount_i32)
        .fetch_optional(&mut *self.tx)
        .await?;

        match remaining {
            Some(stock) => to_u32("products", "stock", stock),
            None => {
                let available = self.get_stock(product_id).await?;
                Err(StoreError::InsufficientStock {
                    product_id,
                    requested: amount,
                    available,
                })
            }
        }
    }
}

#[async_trait]
impl StoreTransaction for PostgresTransaction {
    async fn find_product(&mut self, product_id: ProductId) -> Result<Option<Product>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE"
        ))
        .bind(product_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn lock_products(&mut self, product_ids: &[ProductId]) -> Result<()> {
        let ids: Vec<i64> = product_ids.iter().map(|id| id.as_i64()).collect();
        sqlx::query("SELECT id FROM products WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn find_order_by_idempotency_key(
        &mut self,
        key: IdempotencyKey,
    ) -> Result<Option<OrderId>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM orders WHERE idempotency_key = $1")
            .bind(key.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(id.map(OrderId::new))
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<OrderId> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO orders (price_cents, bonus_cents, user_id, order_kind, status, service_mode,
                                phone, name, organization, tax_id, comment, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING id
            "#,
        )
        .bind(order.price.cents())
        .bind(order.bonus.cents())
        .bind(order.user_id.map(|u| u.as_i64()))
        .bind(order.kind.as_str())
        .bind(&order.status)
        .bind(&order.service_mode)
        .bind(&order.phone)
        .bind(&order.name)
        .bind(&order.organization)
        .bind(&order.tax_id)
        .bind(&order.comment)
        .bind(order.idempotency_key.map(|k| k.as_uuid()))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some(IDEMPOTENCY_CONSTRAINT)
                && let Some(key) = order.idempotency_key
            {
                return StoreError::DuplicateIdempotencyKey(key);
            }
            StoreError::Database(e)
        })?;

        Ok(OrderId::new(id))
    }

    async fn insert_order_lines(
        &mut self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLineRecord>> {
        let mut records = Vec::with_capacity(lines.len());
        for line in lines {
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO order_lines (order_id, product_id, quantity)
                VALUES ($1, $2, $3)
                RETURNING id
                "#,
            )
            .bind(order_id.as_i64())
            .bind(line.product_id.as_i64())
            .bind(i32::try_from(line.quantity).unwrap_or(i32::MAX))
            .fetch_one(&mut *self.tx)
            .await?;

            records.push(OrderLineRecord {
                id: OrderLineId::new(id),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
            });
        }
        Ok(records)
    }

    async fn find_order_for_update(&mut self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(order_id.as_i64())
        .fetch_optional(&mut *self.tx)
        .await?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn update_order(&mut self, order: &OrderRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE orders
            SET price_cents = $2, bonus_cents = $3, status = $4, phone = $5, name = $6,
                organization = $7, tax_id = $8, comment = $9, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(order.id.as_i64())
        .bind(order.price.cents())
        .bind(order.bonus.cents())
        .bind(&order.status)
        .bind(&order.phone)
        .bind(&order.name)
        .bind(&order.organization)
        .bind(&order.tax_id)
        .bind(&order.comment)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> Result<PostgresTransaction> {
        Ok(PostgresTransaction {
            tx: self.pool.begin().await?,
        })
    }

    async fn get_order(&self, order_id: OrderId) -> Result<Option<StoredOrder>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(order_id.as_i64())
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let header = row_to_order(&row)?;
        let lines = self
            .load_lines(&[header.id.as_i64()])
            .await?
            .remove(&header.id)
            .unwrap_or_default();

        Ok(Some(StoredOrder { header, lines }))
    }

    async fn list_orders(&self) -> Result<Vec<StoredOrder>> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        let headers = rows
            .iter()
            .map(row_to_order)
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<i64> = headers.iter().map(|h| h.id.as_i64()).collect();
        let mut lines = self.load_lines(&ids).await?;

        Ok(headers
            .into_iter()
            .map(|header| StoredOrder {
                lines: lines.remove(&header.id).unwrap_or_default(),
                header,
            })
            .collect())
    }

    async fn find_order_id_by_idempotency_key(
        &self,
        key: IdempotencyKey,
    ) -> Result<Option<OrderId>> {
        let id: Option<i64> = sqlx::query_scalar("SELECT id FROM orders WHERE idempotency_key = $1")
            .bind(key.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(id.map(OrderId::new))
    }

    async fn delete_order(&self, order_id: OrderId) -> Result<bool> {
        // Lines go with the header through ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn get_product(&self, product_id: ProductId) -> Result<Option<Product>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(product_id.as_i64())
                .fetch_optional(&self.pool)
                .await?;

        row.as_ref().map(row_to_product).transpose()
    }

    async fn query_products(&self, query: ProductQuery) -> Result<Paginated<Product>> {
        let mut filter = String::from(" WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic filter
        if query.category_id.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND category_id = ${param_count}"));
        }
        if query.brand_id.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND brand_id = ${param_count}"));
        }
        if query.name_contains.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND name ILIKE ${param_count}"));
        }
        if query.category_ids.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND category_id = ANY(${param_count})"));
        }
        if query.brand_ids.is_some() {
            param_count += 1;
            filter.push_str(&format!(" AND brand_id = ANY(${param_count})"));
        }

        let (skip, limit) = page_bounds(query.page);
        let mut select = format!("SELECT {PRODUCT_COLUMNS} FROM products{filter} ORDER BY id ASC");
        param_count += 1;
        select.push_str(&format!(" OFFSET ${param_count}"));
        if limit.is_some() {
            param_count += 1;
            select.push_str(&format!(" LIMIT ${param_count}"));
        }
        let count = format!("SELECT COUNT(*) FROM products{filter}");

        let name_pattern = query.name_contains.as_deref().map(like_pattern);
        let category_ids: Option<Vec<i64>> = query
            .category_ids
            .as_ref()
            .map(|ids| ids.iter().map(|id| id.as_i64()).collect());
        let brand_ids: Option<Vec<i64>> = query
            .brand_ids
            .as_ref()
            .map(|ids| ids.iter().map(|id| id.as_i64()).collect());

        // Bind the same filter parameters to both statements
        let mut count_query = sqlx::query_scalar::<_, i64>(&count);
        let mut select_query = sqlx::query(&select);
        if let Some(id) = query.category_id {
            count_query = count_query.bind(id.as_i64());
            select_query = select_query.bind(id.as_i64());
        }
        if let Some(id) = query.brand_id {
            count_query = count_query.bind(id.as_i64());
            select_query = select_query.bind(id.as_i64());
        }
        if let Some(ref pattern) = name_pattern {
            count_query = count_query.bind(pattern);
            select_query = select_query.bind(pattern);
        }
        if let Some(ref ids) = category_ids {
            count_query = count_query.bind(ids);
            select_query = select_query.bind(ids);
        }
        if let Some(ref ids) = brand_ids {
            count_query = count_query.bind(ids);
            select_query = select_query.bind(ids);
        }
        select_query = select_query.bind(skip);
        if let Some(limit) = limit {
            select_query = select_query.bind(limit);
        }

        let total = count_query.fetch_one(&self.pool).await?;
        let rows = select_query.fetch_all(&self.pool).await?;
        let items = rows.iter().map(row_to_product).collect::<Result<Vec<_>>>()?;

        Ok(Paginated::new(
            items,
            u64::try_from(total).unwrap_or_default(),
            query.page,
        ))
    }

    async fn get_category(&self, category_id: CategoryId) -> Result<Option<Category>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, name, description, image, created_at, updated_at FROM categories WHERE id = $1",
        )
        .bind(category_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_category).transpose()
    }

    async fn list_categories(&self, page: Page) -> Result<Paginated<Category>> {
        let (skip, limit) = page_bounds(page);
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
            .fetch_one(&self.pool)
            .await?;
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, image, created_at, updated_at
            FROM categories
            ORDER BY id ASC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(row_to_category).collect::<Result<Vec<_>>>()?;
        Ok(Paginated::new(
            items,
            u64::try_from(total).unwrap_or_default(),
            page,
        ))
    }

    async fn get_brand(&self, brand_id: BrandId) -> Result<Option<Brand>> {
        let row: Option<PgRow> = sqlx::query(
            "SELECT id, name, country, description, image, created_at, updated_at FROM brands WHERE id = $1",
        )
        .bind(brand_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_brand).transpose()
    }

    async fn list_brands(&self, page: Page) -> Result<Paginated<Brand>> {
        let (skip, limit) = page_bounds(page);
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM brands")
            .fetch_one(&self.pool)
            .await?;
        // A NULL limit is LIMIT ALL.
        let rows = sqlx::query(
            r#"
            SELECT id, name, country, description, image, created_at, updated_at
            FROM brands
            ORDER BY id ASC
            OFFSET $1 LIMIT $2
            "#,
        )
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let items = rows.iter().map(row_to_brand).collect::<Result<Vec<_>>>()?;
        Ok(Paginated::new(
            items,
            u64::try_from(total).unwrap_or_default(),
            page,
        ))
    }

    async fn find_category_ids_by_name(&self, fragment: &str) -> Result<Vec<CategoryId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM categories WHERE name ILIKE $1 ORDER BY id ASC")
                .bind(like_pattern(fragment))
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().map(CategoryId::new).collect())
    }

    async fn find_brand_ids_by_name(&self, fragment: &str) -> Result<Vec<BrandId>> {
        let ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM brands WHERE name ILIKE $1 ORDER BY id ASC")
                .bind(like_pattern(fragment))
                .fetch_all(&self.pool)
                .await?;
        Ok(ids.into_iter().map(BrandId::new).collect())
    }

    async fn insert_category(&self, category: NewCategory) -> Result<Category> {
        let row = sqlx::query(
            r#"
            INSERT INTO categories (name, description, image)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, image, created_at, updated_at
            "#,
        )
        .bind(&category.name)
        .bind(&category.description)
        .bind(&category.image)
        .fetch_one(&self.pool)
        .await?;

        row_to_category(&row)
    }

    async fn insert_brand(&self, brand: NewBrand) -> Result<Brand> {
        let row = sqlx::query(
            r#"
            INSERT INTO brands (name, country, description, image)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, country, description, image, created_at, updated_at
            "#,
        )
        .bind(&brand.name)
        .bind(&brand.country)
        .bind(&brand.description)
        .bind(&brand.image)
        .fetch_one(&self.pool)
        .await?;

        row_to_brand(&row)
    }

    async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (name, price_cents, stock, rating, description, images, info,
                                  feature, guarantee, discount, category_id, brand_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(&product.name)
        .bind(product.price.cents())
        .bind(i32::try_from(product.stock).unwrap_or(i32::MAX))
        .bind(product.rating)
        .bind(&product.description)
        .bind(&product.images)
        .bind(&product.info)
        .bind(&product.feature)
        .bind(&product.guarantee)
        .bind(&product.discount)
        .bind(product.category_id.map(|id| id.as_i64()))
        .bind(product.brand_id.map(|id| id.as_i64()))
        .fetch_one(&self.pool)
        .await?;

        row_to_product(&row)
    }
}
