// core/src/gateway/mod.rs

//! The data gateway contract.
//!
//! Every read and write the cart and order code performs goes through [`Gateway`].
//! The Postgres implementation lives in the server crate; [`memory::MemoryGateway`]
//! backs tests and local runs.

pub mod memory;

use crate::error::Result;
use crate::models::{
  NewOrder, Order, OrderItem, OrderStatus, PlacedOrder, Product, ProductListing, ProductPatch, RemoteCartItem, Store,
  UserIdentity,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

pub type SharedGateway = Arc<dyn Gateway>;

#[async_trait]
pub trait Gateway: Send + Sync + 'static {
  // --- Identity ---

  /// Resolves a bearer token to its user. `Ok(None)` for unknown or expired tokens.
  async fn current_user(&self, token: &str) -> Result<Option<UserIdentity>>;

  // --- Cart rows ---

  /// The user's cart rows, newest first.
  async fn list_cart_items(&self, user_id: Uuid) -> Result<Vec<RemoteCartItem>>;

  async fn insert_cart_item(&self, user_id: Uuid, product_id: Uuid, quantity: i32) -> Result<RemoteCartItem>;

  /// Sets a row's quantity. Only rows owned by `user_id` are touched.
  async fn update_cart_item_quantity(&self, user_id: Uuid, item_id: Uuid, quantity: i32) -> Result<RemoteCartItem>;

  async fn delete_cart_item(&self, user_id: Uuid, item_id: Uuid) -> Result<()>;

  /// Deletes the user's rows whose product belongs to `store_id`. Returns the count removed.
  async fn delete_cart_items_for_store(&self, user_id: Uuid, store_id: Uuid) -> Result<u64>;

  // --- Catalog ---

  /// One batched lookup. Ids without a product are simply absent from the result.
  async fn products_with_stores(&self, product_ids: &[Uuid]) -> Result<Vec<ProductListing>>;

  async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>>;

  async fn update_product(&self, product_id: Uuid, patch: &ProductPatch) -> Result<Product>;

  async fn delete_product(&self, product_id: Uuid) -> Result<()>;

  async fn get_store(&self, store_id: Uuid) -> Result<Option<Store>>;

  // --- Orders ---

  async fn pickup_code_exists(&self, code: &str) -> Result<bool>;

  /// Inserts the order, its items and decrements stock as one atomic unit.
  ///
  /// Fails with `MarketError::InsufficientStock` when any product cannot cover its
  /// quantity, and with `MarketError::Validation` when a product is missing or sold
  /// by another store. On failure nothing is written.
  async fn place_order(&self, new_order: NewOrder) -> Result<PlacedOrder>;

  async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>>;

  async fn order_items(&self, order_id: Uuid) -> Result<Vec<OrderItem>>;

  /// Newest first.
  async fn orders_for_customer(&self, customer_id: Uuid) -> Result<Vec<Order>>;

  /// Orders of every store the merchant owns, newest first.
  async fn orders_for_merchant(&self, merchant_id: Uuid) -> Result<Vec<Order>>;

  /// Writes `status` and `completed_at` only if the stored status still equals `expected`.
  ///
  /// Returns `Ok(None)` when the row changed underneath (someone else transitioned it).
  async fn update_order_status(
    &self,
    order_id: Uuid,
    expected: OrderStatus,
    status: OrderStatus,
    completed_at: Option<DateTime<Utc>>,
  ) -> Result<Option<Order>>;

  /// Moves `reserved`/`confirmed` orders created before `cutoff` to `expired`.
  async fn expire_orders_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>>;
}
