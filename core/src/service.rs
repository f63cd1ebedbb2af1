// core/src/service.rs

//! `Marketplace`: the entry point the HTTP layer (or any other front end) talks to.
//!
//! It owns the gateway handle, the flow registry with the `cart_sync` and
//! `order_submission` flows registered, and the checkout settings.

use crate::cart::{self, CartStore, GroupedCart, OptimisticCart};
use crate::catalog;
use crate::error::{MarketError, Result};
use crate::flow::{FlowContext, FlowRegistry};
use crate::gateway::SharedGateway;
use crate::models::{
  Order, OrderDetail, OrderStatus, PlacedOrder, Product, ProductPatch, RemoteCartItem, UserIdentity,
};
use crate::orders::{self, OrderSubmission};
use crate::settings::CheckoutSettings;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

pub struct Marketplace {
  gateway: SharedGateway,
  flows: Arc<FlowRegistry<MarketError>>,
  settings: CheckoutSettings,
}

impl Marketplace {
  pub fn new(gateway: SharedGateway, settings: CheckoutSettings) -> Self {
    let flows = FlowRegistry::<MarketError>::new();
    flows.register(cart::build_cart_sync_flow());
    flows.register(orders::submission::build_order_submission_flow());
    info!(
      pickup_code_length = settings.pickup_code_length,
      max_code_attempts = settings.max_code_attempts,
      "Marketplace flows registered."
    );
    Self {
      gateway,
      flows: Arc::new(flows),
      settings,
    }
  }

  pub fn gateway(&self) -> &SharedGateway {
    &self.gateway
  }

  pub fn flows(&self) -> &Arc<FlowRegistry<MarketError>> {
    &self.flows
  }

  pub fn settings(&self) -> &CheckoutSettings {
    &self.settings
  }

  // --- Identity ---

  /// Resolves a bearer token. A missing or unknown token is `Unauthenticated`.
  pub async fn authenticate(&self, token: Option<&str>) -> Result<UserIdentity> {
    let token = token
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or_else(|| MarketError::Unauthenticated("Missing bearer token.".to_string()))?;
    self
      .gateway
      .current_user(token)
      .await?
      .ok_or_else(|| MarketError::Unauthenticated("Invalid or expired session.".to_string()))
  }

  // --- Cart ---

  pub async fn grouped_cart(&self, actor: &UserIdentity) -> Result<GroupedCart> {
    cart::load_grouped_cart(&self.flows, self.gateway.clone(), actor.id).await
  }

  pub async fn optimistic_cart(&self, actor: &UserIdentity) -> Result<OptimisticCart> {
    OptimisticCart::load(self.flows.clone(), self.gateway.clone(), actor.id).await
  }

  pub async fn add_to_cart(&self, actor: &UserIdentity, product_id: Uuid, quantity: i32) -> Result<RemoteCartItem> {
    cart::add_to_cart(&self.gateway, actor.id, product_id, quantity).await
  }

  /// Sets a remote cart row's quantity. Below 1 the row is deleted and `None` returned.
  #[instrument(name = "Marketplace::set_cart_quantity", skip(self, actor), fields(user_id = %actor.id), err(Display))]
  pub async fn set_cart_quantity(
    &self,
    actor: &UserIdentity,
    item_id: Uuid,
    quantity: i64,
  ) -> Result<Option<RemoteCartItem>> {
    if quantity < 1 {
      self.gateway.delete_cart_item(actor.id, item_id).await?;
      debug!(%item_id, "Cart row removed by zero quantity.");
      return Ok(None);
    }
    let quantity = i32::try_from(quantity)
      .map_err(|_| MarketError::Validation(format!("Quantity {} is out of range.", quantity)))?;
    let row = self
      .gateway
      .update_cart_item_quantity(actor.id, item_id, quantity)
      .await?;
    Ok(Some(row))
  }

  pub async fn remove_cart_item(&self, actor: &UserIdentity, item_id: Uuid) -> Result<()> {
    self.gateway.delete_cart_item(actor.id, item_id).await
  }

  // --- Orders ---

  /// Places one store's order; `local_cart`, when given, loses that store's lines on success.
  pub async fn submit_order(
    &self,
    actor: &UserIdentity,
    submission: OrderSubmission,
    local_cart: Option<FlowContext<CartStore>>,
  ) -> Result<PlacedOrder> {
    orders::submission::submit_order(
      &self.flows,
      self.gateway.clone(),
      self.settings.clone(),
      actor,
      submission,
      local_cart,
    )
    .await
  }

  /// Customers see their own orders; merchants see the orders of their stores.
  pub async fn list_orders(&self, actor: &UserIdentity) -> Result<Vec<Order>> {
    if actor.is_merchant() {
      self.gateway.orders_for_merchant(actor.id).await
    } else {
      self.gateway.orders_for_customer(actor.id).await
    }
  }

  /// An order with its items, visible to the customer who placed it and the store's merchant.
  #[instrument(name = "Marketplace::order_detail", skip(self, actor), fields(actor_id = %actor.id), err(Display))]
  pub async fn order_detail(&self, actor: &UserIdentity, order_id: Uuid) -> Result<OrderDetail> {
    let order = self
      .gateway
      .get_order(order_id)
      .await?
      .ok_or_else(|| MarketError::NotFound(format!("Order {} not found.", order_id)))?;

    if order.customer_id != actor.id {
      let owns_store = self
        .gateway
        .get_store(order.store_id)
        .await?
        .map(|store| store.is_owned_by(actor.id))
        .unwrap_or(false);
      if !owns_store {
        warn!(%order_id, "Rejected order read by unrelated user.");
        return Err(MarketError::Forbidden("You do not have access to this order.".to_string()));
      }
    }

    let items = self.gateway.order_items(order_id).await?;
    Ok(OrderDetail { order, items })
  }

  pub async fn transition_order(&self, actor: &UserIdentity, order_id: Uuid, next: OrderStatus) -> Result<Order> {
    orders::status::transition_order(self.gateway.as_ref(), actor, order_id, next).await
  }

  /// Expires reservations older than `ttl`.
  pub async fn expire_stale_reservations(&self, ttl: Duration) -> Result<Vec<Order>> {
    orders::status::expire_stale_reservations(self.gateway.as_ref(), Utc::now() - ttl).await
  }

  // --- Catalog ---

  pub async fn product(&self, product_id: Uuid) -> Result<Product> {
    catalog::get_product(self.gateway.as_ref(), product_id).await
  }

  pub async fn update_product(&self, actor: &UserIdentity, product_id: Uuid, patch: &ProductPatch) -> Result<Product> {
    catalog::update_product(self.gateway.as_ref(), actor, product_id, patch).await
  }

  pub async fn delete_product(&self, actor: &UserIdentity, product_id: Uuid) -> Result<()> {
    catalog::delete_product(self.gateway.as_ref(), actor, product_id).await
  }
}
