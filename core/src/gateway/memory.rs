// core/src/gateway/memory.rs

//! An in-process [`Gateway`] holding every table behind one mutex.
//!
//! `place_order` checks and decrements stock under that single lock, so concurrent
//! checkouts against the same product cannot oversell. Used by the test suites and
//! for running the server without a database.

use super::Gateway;
use crate::error::{MarketError, Result};
use crate::models::{
  NewOrder, Order, OrderItem, OrderStatus, PlacedOrder, Product, ProductListing, ProductPatch, RemoteCartItem, Store,
  UserIdentity, UserRole,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
  sessions: HashMap<String, UserIdentity>,
  stores: HashMap<Uuid, Store>,
  products: HashMap<Uuid, Product>,
  // Insertion order doubles as creation order.
  cart_items: Vec<RemoteCartItem>,
  orders: Vec<Order>,
  order_items: Vec<OrderItem>,
}

#[derive(Default)]
pub struct MemoryGateway {
  tables: Mutex<Tables>,
  fail_writes: AtomicBool,
}

impl MemoryGateway {
  pub fn new() -> Self {
    Self::default()
  }

  /// While set, every mutating call fails with `MarketError::Gateway`.
  pub fn set_fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  fn check_writable(&self) -> Result<()> {
    if self.fail_writes.load(Ordering::SeqCst) {
      warn!("MemoryGateway: rejecting write (failure injection enabled).");
      return Err(MarketError::Gateway("simulated write failure".to_string()));
    }
    Ok(())
  }

  // --- Seeding ---

  /// Creates a user and a session token that resolves to it.
  pub fn add_user(&self, email: &str, role: UserRole, token: &str) -> UserIdentity {
    let user = UserIdentity {
      id: Uuid::new_v4(),
      email: email.to_string(),
      role,
      metadata: serde_json::Value::Null,
    };
    self.tables.lock().sessions.insert(token.to_string(), user.clone());
    user
  }

  pub fn add_store(&self, merchant_id: Uuid, name: &str) -> Store {
    let store = Store {
      id: Uuid::new_v4(),
      merchant_id,
      name: name.to_string(),
      logo_url: Some(format!("https://cdn.example.com/logos/{}.png", name.to_lowercase().replace(' ', "-"))),
    };
    self.tables.lock().stores.insert(store.id, store.clone());
    store
  }

  pub fn add_product(&self, store_id: Uuid, name: &str, price: Decimal, stock_quantity: i32) -> Product {
    let now = Utc::now();
    let product = Product {
      id: Uuid::new_v4(),
      store_id,
      name: name.to_string(),
      price,
      category: "apparel".to_string(),
      image_urls: vec![format!("https://cdn.example.com/products/{}.jpg", name.to_lowercase().replace(' ', "-"))],
      stock_quantity,
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().products.insert(product.id, product.clone());
    product
  }

  pub fn product(&self, product_id: Uuid) -> Option<Product> {
    self.tables.lock().products.get(&product_id).cloned()
  }

  pub fn order_count(&self) -> usize {
    self.tables.lock().orders.len()
  }

  /// Rewrites an order's creation time, for expiry scenarios.
  pub fn backdate_order(&self, order_id: Uuid, created_at: DateTime<Utc>) {
    if let Some(order) = self.tables.lock().orders.iter_mut().find(|o| o.id == order_id) {
      order.created_at = created_at;
    }
  }
}

fn newest_first<T: Clone>(rows: impl DoubleEndedIterator<Item = T>) -> Vec<T> {
  rows.rev().collect()
}

#[async_trait]
impl Gateway for MemoryGateway {
  async fn current_user(&self, token: &str) -> Result<Option<UserIdentity>> {
    Ok(self.tables.lock().sessions.get(token).cloned())
  }

  async fn list_cart_items(&self, user_id: Uuid) -> Result<Vec<RemoteCartItem>> {
    let tables = self.tables.lock();
    Ok(newest_first(
      tables.cart_items.iter().filter(|row| row.user_id == user_id).cloned(),
    ))
  }

  #[instrument(name = "MemoryGateway::insert_cart_item", skip(self))]
  async fn insert_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<RemoteCartItem> {
    self.check_writable()?;
    let now = Utc::now();
    let row = RemoteCartItem {
      id: Uuid::new_v4(),
      user_id,
      product_id,
      quantity,
      created_at: now,
      updated_at: now,
    };
    self.tables.lock().cart_items.push(row.clone());
    debug!(cart_item_id = %row.id, "Cart row inserted.");
    Ok(row)
  }

  async fn update_cart_item_quantity(&self, user_id: Uuid, item_id: Uuid, quantity: i32) -> Result<RemoteCartItem> {
    self.check_writable()?;
    let mut tables = self.tables.lock();
    let row = tables
      .cart_items
      .iter_mut()
      .find(|row| row.id == item_id && row.user_id == user_id)
      .ok_or_else(|| MarketError::NotFound(format!("Cart item {} not found.", item_id)))?;
    row.quantity = quantity;
    row.updated_at = Utc::now();
    Ok(row.clone())
  }

  async fn delete_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<()> {
    self.check_writable()?;
    let mut tables = self.tables.lock();
    let before = tables.cart_items.len();
    tables.cart_items.retain(|row| !(row.id == item_id && row.user_id == user_id));
    if tables.cart_items.len() == before {
      return Err(MarketError::NotFound(format!("Cart item {} not found.", item_id)));
    }
    Ok(())
  }

  async fn delete_cart_items_for_store(&self, user_id: Uuid, store_id: Uuid) -> Result<u64> {
    self.check_writable()?;
    let mut tables = self.tables.lock();
    let Tables {
      products, cart_items, ..
    } = &mut *tables;
    let before = cart_items.len();
    cart_items.retain(|row| {
      let in_store = products
        .get(&row.product_id)
        .map_or(false, |product| product.store_id == store_id);
      !(row.user_id == user_id && in_store)
    });
    Ok((before - cart_items.len()) as u64)
  }

  async fn products_with_stores(&self, product_ids: &[Uuid]) -> Result<Vec<ProductListing>> {
    let tables = self.tables.lock();
    let listings = product_ids
      .iter()
      .filter_map(|id| tables.products.get(id))
      .filter_map(|product| {
        tables.stores.get(&product.store_id).map(|store| ProductListing {
          product: product.clone(),
          store: store.summary(),
        })
      })
      .collect();
    Ok(listings)
  }

  async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>> {
    Ok(self.tables.lock().products.get(&product_id).cloned())
  }

  async fn update_product(&self, product_id: Uuid, patch: &ProductPatch) -> Result<Product> {
    self.check_writable()?;
    let mut tables = self.tables.lock();
    let product = tables
      .products
      .get_mut(&product_id)
      .ok_or_else(|| MarketError::NotFound(format!("Product {} not found.", product_id)))?;
    patch.apply_to(product);
    product.updated_at = Utc::now();
    Ok(product.clone())
  }

  async fn delete_product(&self, product_id: Uuid) -> Result<()> {
    self.check_writable()?;
    self
      .tables
      .lock()
      .products
      .remove(&product_id)
      .map(|_| ())
      .ok_or_else(|| MarketError::NotFound(format!("Product {} not found.", product_id)))
  }

  async fn get_store(&self, store_id: Uuid) -> Result<Option<Store>> {
    Ok(self.tables.lock().stores.get(&store_id).cloned())
  }

  async fn pickup_code_exists(&self, code: &str) -> Result<bool> {
    Ok(self.tables.lock().orders.iter().any(|o| o.pickup_code == code))
  }

  #[instrument(
    name = "MemoryGateway::place_order",
    skip(self, new_order),
    fields(store_id = %new_order.store_id, customer_id = %new_order.customer_id, lines = new_order.items.len())
  )]
  async fn place_order(&self, new_order: NewOrder) -> Result<PlacedOrder> {
    self.check_writable()?;
    let mut tables = self.tables.lock();

    if tables.orders.iter().any(|o| o.pickup_code == new_order.pickup_code) {
      return Err(MarketError::Validation(format!(
        "Pickup code {} is already in use.",
        new_order.pickup_code
      )));
    }

    // Check every line before touching anything; a later failure must not leave earlier decrements behind.
    let mut demand: HashMap<Uuid, i32> = HashMap::new();
    for line in &new_order.items {
      let requested = demand.entry(line.product_id).or_insert(0);
      *requested = requested.checked_add(line.quantity).ok_or_else(|| {
        MarketError::Validation(format!("Quantity for product {} is too large.", line.product_id))
      })?;
    }
    for (product_id, requested) in &demand {
      let product = tables
        .products
        .get(product_id)
        .ok_or_else(|| MarketError::Validation(format!("Product {} does not exist.", product_id)))?;
      if product.store_id != new_order.store_id {
        return Err(MarketError::Validation(format!(
          "Product {} is not sold by store {}.",
          product_id, new_order.store_id
        )));
      }
      if product.stock_quantity < *requested {
        return Err(MarketError::InsufficientStock {
          product_id: *product_id,
          requested: *requested,
          available: product.stock_quantity,
        });
      }
    }

    let now = Utc::now();
    for (product_id, requested) in &demand {
      if let Some(product) = tables.products.get_mut(product_id) {
        product.stock_quantity -= requested;
        product.updated_at = now;
      }
    }

    let order = Order {
      id: Uuid::new_v4(),
      customer_id: new_order.customer_id,
      store_id: new_order.store_id,
      total_amount: new_order.total_amount,
      status: OrderStatus::Reserved,
      pickup_code: new_order.pickup_code.clone(),
      created_at: now,
      updated_at: now,
      completed_at: None,
    };
    let items: Vec<OrderItem> = new_order
      .items
      .iter()
      .map(|line| OrderItem {
        id: Uuid::new_v4(),
        order_id: order.id,
        product_id: line.product_id,
        quantity: line.quantity,
        price: line.price,
      })
      .collect();

    tables.orders.push(order.clone());
    tables.order_items.extend(items.iter().cloned());
    debug!(order_id = %order.id, "Order stored.");

    Ok(PlacedOrder {
      order,
      items,
      pickup_code: new_order.pickup_code,
    })
  }

  async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
    Ok(self.tables.lock().orders.iter().find(|o| o.id == order_id).cloned())
  }

  async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>> {
    let tables = self.tables.lock();
    Ok(
      tables
        .order_items
        .iter()
        .filter(|item| item.order_id == order_id)
        .cloned()
        .collect(),
    )
  }

  async fn orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>> {
    let tables = self.tables.lock();
    Ok(newest_first(
      tables.orders.iter().filter(|o| o.customer_id == customer_id).cloned(),
    ))
  }

  async fn orders_for_merchant(&self, merchant_id: Uuid) -> Result<Vec<Order>> {
    let tables = self.tables.lock();
    Ok(newest_first(
      tables
        .orders
        .iter()
        .filter(|o| {
          tables
            .stores
            .get(&o.store_id)
            .map_or(false, |store| store.is_owned_by(merchant_id))
        })
        .cloned(),
    ))
  }

  async fn update_order_status(
    &self,
    order_id: Uuid,
    expected: OrderStatus,
    status: OrderStatus,
    completed_at: Option<DateTime<Utc>>,
  ) -> Result<Option<Order>> {
    self.check_writable()?;
    let mut tables = self.tables.lock();
    let order = tables
      .orders
      .iter_mut()
      .find(|o| o.id == order_id)
      .ok_or_else(|| MarketError::NotFound(format!("Order {} not found.", order_id)))?;
    if order.status != expected {
      return Ok(None);
    }
    order.status = status;
    order.completed_at = completed_at;
    order.updated_at = Utc::now();
    Ok(Some(order.clone()))
  }

  async fn expire_orders_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
    self.check_writable()?;
    let now = Utc::now();
    let mut tables = self.tables.lock();
    let expired = tables
      .orders
      .iter_mut()
      .filter(|o| o.created_at < cutoff && matches!(o.status, OrderStatus::Reserved | OrderStatus::Confirmed))
      .map(|o| {
        o.status = OrderStatus::Expired;
        o.updated_at = now;
        o.clone()
      })
      .collect();
    Ok(expired)
  }
}
