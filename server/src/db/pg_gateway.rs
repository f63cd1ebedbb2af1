// server/src/db/pg_gateway.rs

//! `Gateway` over Postgres using runtime-checked sqlx queries.

use async_trait::async_trait;
use atelier::gateway::Gateway;
use atelier::models::{
  NewOrder, Order, OrderItem, OrderStatus, PlacedOrder, Product, ProductListing, ProductPatch, RemoteCartItem, Store,
  StoreSummary, UserIdentity, UserRole,
};
use atelier::{MarketError, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::BTreeMap;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

const PICKUP_CODE_CONSTRAINT: &str = "orders_pickup_code_key";

fn db_error(operation: &'static str) -> impl Fn(sqlx::Error) -> MarketError {
  move |e| {
    error!(operation, error = %e, "Database operation failed.");
    MarketError::Gateway(format!("{} failed: {}", operation, e))
  }
}

#[derive(sqlx::FromRow)]
struct ListingRow {
  #[sqlx(flatten)]
  product: Product,
  store_name: String,
  store_logo_url: Option<String>,
}

impl From<ListingRow> for ProductListing {
  fn from(row: ListingRow) -> Self {
    let store = StoreSummary {
      id: row.product.store_id,
      name: row.store_name,
      logo_url: row.store_logo_url,
    };
    ProductListing {
      product: row.product,
      store,
    }
  }
}

#[derive(Clone)]
pub struct PgGateway {
  pool: PgPool,
}

impl PgGateway {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  /// Explains why a guarded stock decrement touched no row.
  async fn stock_failure(
    tx: &mut Transaction<'_, Postgres>,
    store_id: Uuid,
    product_id: Uuid,
    requested: i32,
  ) -> MarketError {
    let row: std::result::Result<Option<(Uuid, i32)>, sqlx::Error> =
      sqlx::query_as("SELECT store_id, stock_quantity FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await;
    match row {
      Ok(None) => MarketError::Validation(format!("Product {} does not exist.", product_id)),
      Ok(Some((owner, _))) if owner != store_id => {
        MarketError::Validation(format!("Product {} is not sold by store {}.", product_id, store_id))
      }
      Ok(Some((_, available))) => MarketError::InsufficientStock {
        product_id,
        requested,
        available,
      },
      Err(e) => db_error("stock lookup")(e),
    }
  }
}

#[async_trait]
impl Gateway for PgGateway {
  async fn current_user(&self, token: &str) -> Result<Option<UserIdentity>> {
    let row: Option<(Uuid, String, UserRole, serde_json::Value)> = sqlx::query_as(
      "SELECT u.id, u.email, u.role, u.metadata FROM sessions s JOIN users u ON u.id = s.user_id \
       WHERE s.token = $1 AND s.expires_at > NOW()",
    )
    .bind(token)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error("session lookup"))?;

    Ok(row.map(|(id, email, role, metadata)| UserIdentity {
      id,
      email,
      role,
      metadata,
    }))
  }

  async fn list_cart_items(&self, user_id: Uuid) -> Result<Vec<RemoteCartItem>> {
    sqlx::query_as("SELECT * FROM cart_items WHERE user_id = $1 ORDER BY created_at DESC, id")
      .bind(user_id)
      .fetch_all(&self.pool)
      .await
      .map_err(db_error("list cart items"))
  }

  #[instrument(name = "PgGateway::insert_cart_item", skip(self), err(Display))]
  async fn insert_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<RemoteCartItem> {
    sqlx::query_as(
      "INSERT INTO cart_items (id, user_id, product_id, quantity) VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(&self.pool)
    .await
    .map_err(db_error("insert cart item"))
  }

  async fn update_cart_item_quantity(&self, user_id: Uuid, item_id: Uuid, quantity: i32) -> Result<RemoteCartItem> {
    let row: Option<RemoteCartItem> = sqlx::query_as(
      "UPDATE cart_items SET quantity = $3, updated_at = NOW() WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(item_id)
    .bind(user_id)
    .bind(quantity)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error("update cart item"))?;
    row.ok_or_else(|| MarketError::NotFound(format!("Cart item {} not found.", item_id)))
  }

  async fn delete_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
      .bind(item_id)
      .bind(user_id)
      .execute(&self.pool)
      .await
      .map_err(db_error("delete cart item"))?;
    if result.rows_affected() == 0 {
      return Err(MarketError::NotFound(format!("Cart item {} not found.", item_id)));
    }
    Ok(())
  }

  async fn delete_cart_items_for_store(&self, user_id: Uuid, store_id: Uuid) -> Result<u64> {
    let result = sqlx::query(
      "DELETE FROM cart_items c USING products p WHERE c.product_id = p.id AND c.user_id = $1 AND p.store_id = $2",
    )
    .bind(user_id)
    .bind(store_id)
    .execute(&self.pool)
    .await
    .map_err(db_error("clear store cart items"))?;
    Ok(result.rows_affected())
  }

  async fn products_with_stores(&self, product_ids: &[Uuid]) -> Result<Vec<ProductListing>> {
    if product_ids.is_empty() {
      return Ok(Vec::new());
    }
    let rows: Vec<ListingRow> = sqlx::query_as(
      "SELECT p.*, s.name AS store_name, s.logo_url AS store_logo_url \
       FROM products p JOIN stores s ON s.id = p.store_id WHERE p.id = ANY($1)",
    )
    .bind(product_ids)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error("fetch cart products"))?;
    Ok(rows.into_iter().map(ProductListing::from).collect())
  }

  async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1")
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error("get product"))
  }

  #[instrument(name = "PgGateway::update_product", skip(self, patch), err(Display))]
  async fn update_product(&self, product_id: Uuid, patch: &ProductPatch) -> Result<Product> {
    let row: Option<Product> = sqlx::query_as(
      "UPDATE products SET \
         name = COALESCE($2, name), \
         price = COALESCE($3, price), \
         category = COALESCE($4, category), \
         image_urls = COALESCE($5, image_urls), \
         stock_quantity = COALESCE($6, stock_quantity), \
         updated_at = NOW() \
       WHERE id = $1 RETURNING *",
    )
    .bind(product_id)
    .bind(patch.name.as_deref())
    .bind(patch.price)
    .bind(patch.category.as_deref())
    .bind(patch.image_urls.as_deref())
    .bind(patch.stock_quantity)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error("update product"))?;
    row.ok_or_else(|| MarketError::NotFound(format!("Product {} not found.", product_id)))
  }

  async fn delete_product(&self, product_id: Uuid) -> Result<()> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
      .bind(product_id)
      .execute(&self.pool)
      .await
      .map_err(db_error("delete product"))?;
    if result.rows_affected() == 0 {
      return Err(MarketError::NotFound(format!("Product {} not found.", product_id)));
    }
    Ok(())
  }

  async fn get_store(&self, store_id: Uuid) -> Result<Option<Store>> {
    sqlx::query_as("SELECT id, merchant_id, name, logo_url FROM stores WHERE id = $1")
      .bind(store_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error("get store"))
  }

  async fn pickup_code_exists(&self, code: &str) -> Result<bool> {
    let (exists,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM orders WHERE pickup_code = $1)")
      .bind(code)
      .fetch_one(&self.pool)
      .await
      .map_err(db_error("pickup code lookup"))?;
    Ok(exists)
  }

  #[instrument(
    name = "PgGateway::place_order",
    skip(self, new_order),
    fields(store_id = %new_order.store_id, customer_id = %new_order.customer_id, lines = new_order.items.len()),
    err(Display)
  )]
  async fn place_order(&self, new_order: NewOrder) -> Result<PlacedOrder> {
    // Sorted so concurrent checkouts lock product rows in the same order.
    let mut demand: BTreeMap<Uuid, i32> = BTreeMap::new();
    for line in &new_order.items {
      let requested = demand.entry(line.product_id).or_insert(0);
      *requested = requested.checked_add(line.quantity).ok_or_else(|| {
        MarketError::Validation(format!("Quantity for product {} is too large.", line.product_id))
      })?;
    }

    let mut tx = self.pool.begin().await.map_err(db_error("begin order transaction"))?;

    for (product_id, requested) in &demand {
      let result = sqlx::query(
        "UPDATE products SET stock_quantity = stock_quantity - $1, updated_at = NOW() \
         WHERE id = $2 AND store_id = $3 AND stock_quantity >= $1",
      )
      .bind(*requested)
      .bind(*product_id)
      .bind(new_order.store_id)
      .execute(&mut *tx)
      .await
      .map_err(db_error("decrement stock"))?;

      if result.rows_affected() != 1 {
        let failure = Self::stock_failure(&mut tx, new_order.store_id, *product_id, *requested).await;
        warn!(%product_id, requested, error = %failure, "Stock decrement rejected; rolling back order.");
        return Err(failure); // Dropping `tx` rolls back.
      }
    }

    let order: Order = sqlx::query_as(
      "INSERT INTO orders (id, customer_id, store_id, total_amount, status, pickup_code) \
       VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(new_order.customer_id)
    .bind(new_order.store_id)
    .bind(new_order.total_amount)
    .bind(OrderStatus::Reserved)
    .bind(&new_order.pickup_code)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
      let code_taken =
        matches!(&e, sqlx::Error::Database(db) if db.constraint() == Some(PICKUP_CODE_CONSTRAINT));
      if code_taken {
        warn!(pickup_code = %new_order.pickup_code, "Pickup code taken by a concurrent order.");
        MarketError::Validation(format!("Pickup code {} is already in use.", new_order.pickup_code))
      } else {
        db_error("insert order")(e)
      }
    })?;

    let mut items = Vec::with_capacity(new_order.items.len());
    for line in &new_order.items {
      let item: OrderItem = sqlx::query_as(
        "INSERT INTO order_items (id, order_id, product_id, quantity, price) VALUES ($1, $2, $3, $4, $5) RETURNING *",
      )
      .bind(Uuid::new_v4())
      .bind(order.id)
      .bind(line.product_id)
      .bind(line.quantity)
      .bind(line.price)
      .fetch_one(&mut *tx)
      .await
      .map_err(db_error("insert order item"))?;
      items.push(item);
    }

    tx.commit().await.map_err(db_error("commit order transaction"))?;
    info!(order_id = %order.id, items = items.len(), "Order committed.");

    Ok(PlacedOrder {
      pickup_code: order.pickup_code.clone(),
      order,
      items,
    })
  }

  async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1")
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await
      .map_err(db_error("get order"))
  }

  async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1")
      .bind(order_id)
      .fetch_all(&self.pool)
      .await
      .map_err(db_error("list order items"))
  }

  async fn orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>> {
    sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY created_at DESC")
      .bind(customer_id)
      .fetch_all(&self.pool)
      .await
      .map_err(db_error("list customer orders"))
  }

  async fn orders_for_merchant(&self, merchant_id: Uuid) -> Result<Vec<Order>> {
    sqlx::query_as(
      "SELECT o.* FROM orders o JOIN stores s ON s.id = o.store_id WHERE s.merchant_id = $1 ORDER BY o.created_at DESC",
    )
    .bind(merchant_id)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error("list merchant orders"))
  }

  #[instrument(name = "PgGateway::update_order_status", skip(self), err(Display))]
  async fn update_order_status(
    &self,
    order_id: Uuid,
    expected: OrderStatus,
    status: OrderStatus,
    completed_at: Option<DateTime<Utc>>,
  ) -> Result<Option<Order>> {
    let updated: Option<Order> = sqlx::query_as(
      "UPDATE orders SET status = $3, completed_at = $4, updated_at = NOW() \
       WHERE id = $1 AND status = $2 RETURNING *",
    )
    .bind(order_id)
    .bind(expected)
    .bind(status)
    .bind(completed_at)
    .fetch_optional(&self.pool)
    .await
    .map_err(db_error("update order status"))?;

    if updated.is_none() && self.get_order(order_id).await?.is_none() {
      return Err(MarketError::NotFound(format!("Order {} not found.", order_id)));
    }
    Ok(updated)
  }

  async fn expire_orders_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
    sqlx::query_as(
      "UPDATE orders SET status = 'expired', updated_at = NOW() \
       WHERE created_at < $1 AND status IN ('reserved', 'confirmed') RETURNING *",
    )
    .bind(cutoff)
    .fetch_all(&self.pool)
    .await
    .map_err(db_error("expire orders"))
  }
}
