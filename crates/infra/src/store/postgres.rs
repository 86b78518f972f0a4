//! Postgres-backed ledger + catalog.
//!
//! ## Placement transaction
//!
//! `begin_placement()` opens a SQL transaction. `lock_products()` takes row locks with
//! `SELECT ... ORDER BY id FOR UPDATE`, so concurrent placements on the same product
//! serialize their read-check-decrement while placements on other products proceed.
//! `commit()` inserts the order and its items, applies the conditional stock decrements
//! and commits. Dropping the handle rolls the transaction back (sqlx semantics).
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation on `order_number`) | `23505` | `DuplicateOrderNumber` |
//! | Database (check violation) | `23514` | `Backend` |
//! | PoolClosed / network / other | N/A | `Backend` |

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use storefront_catalog::Product;
use storefront_core::{Money, OrderId, OrderItemId, ProductId, UserId};
use storefront_orders::{NewOrder, Order, OrderItem, OrderNumber, OrderStatus, ShippingInfo};

use super::{CatalogStore, OrderLedger, PlacementTx, StoreError};

const SCHEMA: &str = include_str!("../../migrations/0001_orders.sql");

const ORDER_COLUMNS: &str = r#"
    id,
    order_number,
    user_id,
    total_amount_cents,
    status,
    shipping_address,
    shipping_city,
    shipping_postal_code,
    created_at,
    updated_at
"#;

/// Postgres-backed implementation of [`OrderLedger`] and [`CatalogStore`].
///
/// Uses the SQLx connection pool, which is `Send + Sync` and cheap to clone.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Connect a pool to `database_url`.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the tables if they do not exist yet.
    #[instrument(skip_all, err)]
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

        let item_rows = sqlx::query(
            r#"
            SELECT id, order_id, product_id, quantity, unit_price_cents, total_price_cents
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("load_order_items", e))?;

        let mut items: HashMap<i64, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let order_id: i64 = row.try_get("order_id").map_err(|e| decode_error("order_items", e))?;
            items.entry(order_id).or_default().push(item_from_row(&row)?);
        }

        rows.into_iter()
            .map(|row| {
                let order_items = items.remove(&row.id).unwrap_or_default();
                row.into_order(order_items)
            })
            .collect()
    }
}

#[async_trait]
impl OrderLedger for PostgresStore {
    async fn begin_placement(&self) -> Result<Box<dyn PlacementTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgPlacement {
            tx,
            locked: HashMap::new(),
        }))
    }

    #[instrument(skip_all, fields(order_id = %id), err)]
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_order", e))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut orders = self.attach_items(vec![OrderRow::from_row(&row)?]).await?;
        Ok(orders.pop())
    }

    #[instrument(skip_all, fields(user_id = %user_id), err)]
    async fn list_orders_by_user(&self, user_id: UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY id ASC"
        ))
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_orders_by_user", e))?;

        let rows = rows.iter().map(OrderRow::from_row).collect::<Result<Vec<_>, _>>()?;
        self.attach_items(rows).await
    }

    #[instrument(skip_all, err)]
    async fn list_all_orders(&self) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders ORDER BY id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_all_orders", e))?;

        let rows = rows.iter().map(OrderRow::from_row).collect::<Result<Vec<_>, _>>()?;
        self.attach_items(rows).await
    }

    #[instrument(skip_all, fields(order_id = %id, status = %status), err)]
    async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        at: DateTime<Utc>,
    ) -> Result<Order, StoreError> {
        let row = sqlx::query(&format!(
            "UPDATE orders SET status = $2, updated_at = $3 WHERE id = $1 RETURNING {ORDER_COLUMNS}"
        ))
        .bind(id.get())
        .bind(status.as_str())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_status", e))?
        .ok_or(StoreError::NotFound)?;

        let mut orders = self.attach_items(vec![OrderRow::from_row(&row)?]).await?;
        orders.pop().ok_or(StoreError::NotFound)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            "SELECT id, name, price_cents, stock_quantity, is_active FROM products WHERE id = $1",
        )
        .bind(id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_product", e))?;

        row.as_ref().map(product_from_row).transpose()
    }

    async fn put_product(&self, product: Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price_cents, stock_quantity, is_active)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id)
            DO UPDATE SET
                name = EXCLUDED.name,
                price_cents = EXCLUDED.price_cents,
                stock_quantity = EXCLUDED.stock_quantity,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            "#,
        )
        .bind(product.id().get())
        .bind(product.name())
        .bind(to_db_cents(product.price())?)
        .bind(product.stock_quantity())
        .bind(product.is_active())
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("put_product", e))?;
        Ok(())
    }
}

struct PgPlacement {
    tx: Transaction<'static, Postgres>,
    locked: HashMap<ProductId, Product>,
}

#[async_trait]
impl PlacementTx for PgPlacement {
    async fn lock_products(&mut self, ids: &[ProductId]) -> Result<Vec<Product>, StoreError> {
        let wanted: Vec<i64> = ids
            .iter()
            .filter(|id| !self.locked.contains_key(id))
            .map(|id| id.get())
            .collect();

        if !wanted.is_empty() {
            let rows = sqlx::query(
                r#"
                SELECT id, name, price_cents, stock_quantity, is_active
                FROM products
                WHERE id = ANY($1)
                ORDER BY id ASC
                FOR UPDATE
                "#,
            )
            .bind(wanted)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_products", e))?;

            for row in &rows {
                let product = product_from_row(row)?;
                self.locked.insert(product.id(), product);
            }
        }

        Ok(ids.iter().filter_map(|id| self.locked.get(id).cloned()).collect())
    }

    #[instrument(skip_all, fields(order_number = %order.order_number()), err)]
    async fn commit(self: Box<Self>, order: NewOrder) -> Result<Order, StoreError> {
        let PgPlacement { mut tx, .. } = *self;

        let row = sqlx::query(
            r#"
            INSERT INTO orders (
                order_number,
                user_id,
                total_amount_cents,
                status,
                shipping_address,
                shipping_city,
                shipping_postal_code
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, created_at
            "#,
        )
        .bind(order.order_number().as_str())
        .bind(order.user_id().get())
        .bind(to_db_cents(order.total_amount())?)
        .bind(OrderStatus::Pending.as_str())
        .bind(&order.shipping().address)
        .bind(&order.shipping().city)
        .bind(&order.shipping().postal_code)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::DuplicateOrderNumber(order.order_number().clone())
            } else {
                map_sqlx_error("insert_order", e)
            }
        })?;

        let order_id: i64 = row.try_get("id").map_err(|e| decode_error("orders", e))?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(|e| decode_error("orders", e))?;

        let mut item_ids = Vec::with_capacity(order.items().len());
        for item in order.items() {
            let row = sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id,
                    product_id,
                    quantity,
                    unit_price_cents,
                    total_price_cents
                )
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(order_id)
            .bind(item.product_id().get())
            .bind(item.quantity())
            .bind(to_db_cents(item.unit_price())?)
            .bind(to_db_cents(item.total_price())?)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_order_item", e))?;
            let item_id: i64 = row.try_get("id").map_err(|e| decode_error("order_items", e))?;
            item_ids.push(OrderItemId::new(item_id));
        }

        for (product_id, quantity) in order.reservations() {
            let result = sqlx::query(
                r#"
                UPDATE products
                SET stock_quantity = stock_quantity - $2,
                    updated_at = NOW()
                WHERE id = $1 AND stock_quantity >= $2
                "#,
            )
            .bind(product_id.get())
            .bind(quantity)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("reserve_stock", e))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::StockConflict {
                    product_id,
                    requested: quantity,
                });
            }
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(order.into_order(OrderId::new(order_id), item_ids, created_at))
    }
}

// SQLx row types

#[derive(Debug)]
struct OrderRow {
    id: i64,
    order_number: String,
    user_id: i64,
    total_amount_cents: i64,
    status: String,
    shipping_address: String,
    shipping_city: String,
    shipping_postal_code: String,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn from_row(row: &PgRow) -> Result<Self, StoreError> {
        let read = || -> Result<Self, sqlx::Error> {
            Ok(OrderRow {
                id: row.try_get("id")?,
                order_number: row.try_get("order_number")?,
                user_id: row.try_get("user_id")?,
                total_amount_cents: row.try_get("total_amount_cents")?,
                status: row.try_get("status")?,
                shipping_address: row.try_get("shipping_address")?,
                shipping_city: row.try_get("shipping_city")?,
                shipping_postal_code: row.try_get("shipping_postal_code")?,
                created_at: row.try_get("created_at")?,
                updated_at: row.try_get("updated_at")?,
            })
        };
        read().map_err(|e| decode_error("orders", e))
    }

    fn into_order(self, items: Vec<OrderItem>) -> Result<Order, StoreError> {
        Ok(Order {
            id: OrderId::new(self.id),
            order_number: OrderNumber::parse(self.order_number).map_err(StoreError::Backend)?,
            user_id: UserId::new(self.user_id),
            total_amount: from_db_cents(self.total_amount_cents)?,
            status: self.status.parse().map_err(StoreError::Backend)?,
            shipping: ShippingInfo {
                address: self.shipping_address,
                city: self.shipping_city,
                postal_code: self.shipping_postal_code,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
            items,
        })
    }
}

fn item_from_row(row: &PgRow) -> Result<OrderItem, StoreError> {
    let read = || -> Result<(i64, i64, i64, i64, i64, i64), sqlx::Error> {
        Ok((
            row.try_get("id")?,
            row.try_get("order_id")?,
            row.try_get("product_id")?,
            row.try_get("quantity")?,
            row.try_get("unit_price_cents")?,
            row.try_get("total_price_cents")?,
        ))
    };
    let (id, order_id, product_id, quantity, unit_price, total_price) =
        read().map_err(|e| decode_error("order_items", e))?;

    Ok(OrderItem {
        id: OrderItemId::new(id),
        order_id: OrderId::new(order_id),
        product_id: ProductId::new(product_id),
        quantity,
        unit_price: from_db_cents(unit_price)?,
        total_price: from_db_cents(total_price)?,
    })
}

fn product_from_row(row: &PgRow) -> Result<Product, StoreError> {
    let read = || -> Result<(i64, String, i64, i64, bool), sqlx::Error> {
        Ok((
            row.try_get("id")?,
            row.try_get("name")?,
            row.try_get("price_cents")?,
            row.try_get("stock_quantity")?,
            row.try_get("is_active")?,
        ))
    };
    let (id, name, price_cents, stock_quantity, is_active) =
        read().map_err(|e| decode_error("products", e))?;

    Ok(Product::new(
        ProductId::new(id),
        name,
        from_db_cents(price_cents)?,
        stock_quantity,
        is_active,
    ))
}

fn to_db_cents(amount: Money) -> Result<i64, StoreError> {
    i64::try_from(amount.cents())
        .map_err(|_| StoreError::backend(format!("amount {amount} exceeds BIGINT range")))
}

fn from_db_cents(cents: i64) -> Result<Money, StoreError> {
    u64::try_from(cents)
        .map(Money::from_cents)
        .map_err(|_| StoreError::backend(format!("negative amount in storage: {cents}")))
}

fn decode_error(table: &str, err: sqlx::Error) -> StoreError {
    StoreError::backend(format!("failed to decode {table} row: {err}"))
}

/// Map SQLx errors to `StoreError`.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => StoreError::backend(format!(
            "database error in {}: {} (code {:?})",
            operation,
            db_err.message(),
            db_err.code()
        )),
        sqlx::Error::PoolClosed => {
            StoreError::backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
