// core/src/cart/sync.rs

//! Reconciles persisted cart rows with catalog data and groups them by store.
//!
//! The remote cart table stores only foreign keys, so loading a cart is a two-phase
//! fetch (rows, then one batched product+store lookup) followed by a left join that
//! silently drops rows whose product is gone. The whole load is the `cart_sync` flow.
//!
//! Mutations go through [`OptimisticCart`]: apply to the local view, write remotely,
//! and restore the last-known-good snapshot if the write fails.

use crate::error::{MarketError, Result};
use crate::flow::{Flow, FlowContext, FlowError, FlowRegistry, SkipCondition, StepControl};
use crate::gateway::SharedGateway;
use crate::models::{Product, ProductListing, RemoteCartItem};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// A cart row with its product attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedCartItem {
  #[serde(flatten)]
  pub row: RemoteCartItem,
  pub product: Product,
}

impl MergedCartItem {
  pub fn line_total(&self) -> Decimal {
    self.product.price * Decimal::from(self.row.quantity)
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreCartGroup {
  pub store_id: Uuid,
  pub store_name: String,
  pub store_logo: Option<String>,
  pub items: Vec<MergedCartItem>,
}

impl StoreCartGroup {
  pub fn subtotal(&self) -> Decimal {
    self.items.iter().map(MergedCartItem::line_total).sum()
  }
}

/// The rendered cart: merged rows keyed by store id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedCart {
  pub stores: BTreeMap<Uuid, StoreCartGroup>,
  /// Rows skipped because their product no longer exists.
  pub dropped_rows: usize,
}

impl GroupedCart {
  pub fn is_empty(&self) -> bool {
    self.stores.is_empty()
  }

  pub fn group(&self, store_id: Uuid) -> Option<&StoreCartGroup> {
    self.stores.get(&store_id)
  }

  pub fn item_count(&self) -> usize {
    self.stores.values().map(|group| group.items.len()).sum()
  }

  pub fn total_quantity(&self) -> i64 {
    self
      .stores
      .values()
      .flat_map(|group| group.items.iter())
      .map(|item| i64::from(item.row.quantity))
      .sum()
  }

  pub fn total_amount(&self) -> Decimal {
    self.stores.values().map(StoreCartGroup::subtotal).sum()
  }

  pub fn find(&self, row_id: Uuid) -> Option<&MergedCartItem> {
    self
      .stores
      .values()
      .flat_map(|group| group.items.iter())
      .find(|item| item.row.id == row_id)
  }

  fn set_quantity(&mut self, row_id: Uuid, quantity: i32) -> bool {
    for group in self.stores.values_mut() {
      if let Some(item) = group.items.iter_mut().find(|item| item.row.id == row_id) {
        item.row.quantity = quantity;
        return true;
      }
    }
    false
  }

  fn remove(&mut self, row_id: Uuid) -> bool {
    let mut removed = false;
    for group in self.stores.values_mut() {
      let before = group.items.len();
      group.items.retain(|item| item.row.id != row_id);
      removed |= group.items.len() != before;
    }
    self.stores.retain(|_, group| !group.items.is_empty());
    removed
  }

  fn from_merged(merged: Vec<MergedCartItem>, listings: &HashMap<Uuid, ProductListing>, dropped_rows: usize) -> Self {
    let mut stores: BTreeMap<Uuid, StoreCartGroup> = BTreeMap::new();
    for item in merged {
      let store_id = item.product.store_id;
      let group = stores.entry(store_id).or_insert_with(|| {
        let store = listings.get(&item.product.id).map(|listing| &listing.store);
        StoreCartGroup {
          store_id,
          store_name: store.map(|s| s.name.clone()).unwrap_or_default(),
          store_logo: store.and_then(|s| s.logo_url.clone()),
          items: Vec::new(),
        }
      });
      group.items.push(item);
    }
    Self { stores, dropped_rows }
  }
}

// --- Sync flow state ---

pub struct CartSyncCtx {
  pub gateway: SharedGateway,
  pub user_id: Uuid,
  pub rows: Vec<RemoteCartItem>,
  pub listings: HashMap<Uuid, ProductListing>,
  pub merged: Vec<MergedCartItem>,
  pub dropped_rows: usize,
  pub grouped: Option<GroupedCart>,
}

impl CartSyncCtx {
  pub fn new(gateway: SharedGateway, user_id: Uuid) -> Self {
    Self {
      gateway,
      user_id,
      rows: Vec::new(),
      listings: HashMap::new(),
      merged: Vec::new(),
      dropped_rows: 0,
      grouped: None,
    }
  }
}

pub fn build_cart_sync_flow() -> Flow<CartSyncCtx, MarketError> {
  let no_rows: SkipCondition<CartSyncCtx> = Arc::new(|ctx: FlowContext<CartSyncCtx>| ctx.read().rows.is_empty());
  let mut flow = Flow::<CartSyncCtx, MarketError>::new(
    "cart_sync",
    &[
      ("fetch_cart_rows", false, None),
      ("fetch_products", false, Some(no_rows)),
      ("merge_rows", false, None),
      ("group_by_store", false, None),
    ],
  );

  flow.on_step("fetch_cart_rows", |ctx: FlowContext<CartSyncCtx>| async move {
    let (gateway, user_id) = {
      let guard = ctx.read();
      (guard.gateway.clone(), guard.user_id)
    };
    let rows = gateway.list_cart_items(user_id).await?;
    debug!(%user_id, rows = rows.len(), "Cart rows fetched.");
    ctx.write().rows = rows;
    Ok::<_, MarketError>(StepControl::Continue)
  });

  flow.on_step("fetch_products", |ctx: FlowContext<CartSyncCtx>| async move {
    let (gateway, product_ids) = {
      let guard = ctx.read();
      let distinct: BTreeSet<Uuid> = guard.rows.iter().map(|row| row.product_id).collect();
      (guard.gateway.clone(), distinct.into_iter().collect::<Vec<_>>())
    };
    let listings = gateway.products_with_stores(&product_ids).await?;
    debug!(requested = product_ids.len(), found = listings.len(), "Products fetched for cart.");
    ctx.write().listings = listings
      .into_iter()
      .map(|listing| (listing.product.id, listing))
      .collect();
    Ok::<_, MarketError>(StepControl::Continue)
  });

  flow.on_step("merge_rows", |ctx: FlowContext<CartSyncCtx>| async move {
    let mut guard = ctx.write();
    let mut merged = Vec::with_capacity(guard.rows.len());
    let mut dropped = 0;
    for row in &guard.rows {
      match guard.listings.get(&row.product_id) {
        Some(listing) => merged.push(MergedCartItem {
          row: row.clone(),
          product: listing.product.clone(),
        }),
        None => {
          warn!(cart_item_id = %row.id, product_id = %row.product_id, "Dropping cart row: product no longer exists.");
          dropped += 1;
        }
      }
    }
    guard.merged = merged;
    guard.dropped_rows = dropped;
    Ok::<_, MarketError>(StepControl::Continue)
  });

  flow.on_step("group_by_store", |ctx: FlowContext<CartSyncCtx>| async move {
    let mut guard = ctx.write();
    let merged = std::mem::take(&mut guard.merged);
    let grouped = GroupedCart::from_merged(merged, &guard.listings, guard.dropped_rows);
    debug!(stores = grouped.stores.len(), items = grouped.item_count(), "Cart grouped by store.");
    guard.grouped = Some(grouped);
    Ok::<_, MarketError>(StepControl::Continue)
  });

  flow
}

/// Loads the user's cart through the registered `cart_sync` flow.
#[instrument(name = "cart::load_grouped_cart", skip(flows, gateway), err(Display))]
pub async fn load_grouped_cart(
  flows: &FlowRegistry<MarketError>,
  gateway: SharedGateway,
  user_id: Uuid,
) -> Result<GroupedCart> {
  let ctx = FlowContext::new(CartSyncCtx::new(gateway, user_id));
  flows.run(ctx.clone()).await?;
  let grouped = ctx.write().grouped.take();
  grouped.ok_or_else(|| {
    MarketError::from(FlowError::MissingState {
      step_name: "group_by_store".to_string(),
      field: "grouped".to_string(),
    })
  })
}

/// Adds a product to the user's remote cart.
///
/// Always inserts a new row, even if one for the same product exists; the table does
/// not deduplicate and neither does this.
#[instrument(name = "cart::add_to_cart", skip(gateway), err(Display))]
pub async fn add_to_cart(
  gateway: &SharedGateway,
  user_id: Uuid,
  product_id: Uuid,
  quantity: i32,
) -> Result<RemoteCartItem> {
  if quantity < 1 {
    return Err(MarketError::Validation("Quantity must be a positive number.".to_string()));
  }
  let product = gateway
    .get_product(product_id)
    .await?
    .ok_or_else(|| MarketError::NotFound(format!("Product with ID {} not found.", product_id)))?;
  if product.stock_quantity < quantity {
    return Err(MarketError::InsufficientStock {
      product_id,
      requested: quantity,
      available: product.stock_quantity,
    });
  }
  let row = gateway.insert_cart_item(user_id, product_id, quantity).await?;
  info!(cart_item_id = %row.id, "Item added to cart.");
  Ok(row)
}

/// A user's grouped cart with optimistic, snapshot-reverting mutations.
///
/// Every mutation applies to the local view first, then writes through the gateway.
/// If the write fails, the view is restored to the snapshot taken before the change
/// and the gateway error is returned. `refresh` re-runs the full load.
///
/// Overlapping mutations share one view: when one of them fails, its restore also
/// discards the local effect of any mutation that started after its snapshot, even
/// one whose write succeeded. Call `refresh` after a failure to resync with the gateway.
pub struct OptimisticCart {
  flows: Arc<FlowRegistry<MarketError>>,
  gateway: SharedGateway,
  user_id: Uuid,
  view: FlowContext<GroupedCart>,
}

impl OptimisticCart {
  pub async fn load(flows: Arc<FlowRegistry<MarketError>>, gateway: SharedGateway, user_id: Uuid) -> Result<Self> {
    let grouped = load_grouped_cart(&flows, gateway.clone(), user_id).await?;
    Ok(Self {
      flows,
      gateway,
      user_id,
      view: FlowContext::new(grouped),
    })
  }

  /// A handle to the current view. Reads observe optimistic changes immediately.
  pub fn view(&self) -> FlowContext<GroupedCart> {
    self.view.clone()
  }

  pub fn snapshot(&self) -> GroupedCart {
    self.view.snapshot()
  }

  pub async fn refresh(&self) -> Result<()> {
    let grouped = load_grouped_cart(&self.flows, self.gateway.clone(), self.user_id).await?;
    self.view.replace(grouped);
    Ok(())
  }

  /// Sets a row's quantity; anything below 1 removes the row.
  #[instrument(name = "OptimisticCart::set_quantity", skip(self), fields(user_id = %self.user_id), err(Display))]
  pub async fn set_quantity(&self, row_id: Uuid, quantity: i64) -> Result<()> {
    if quantity < 1 {
      return self.remove(row_id).await;
    }
    let quantity = i32::try_from(quantity)
      .map_err(|_| MarketError::Validation(format!("Quantity {} is out of range.", quantity)))?;

    let last_good = self.view.snapshot();
    if !self.view.write().set_quantity(row_id, quantity) {
      return Err(MarketError::NotFound(format!("Cart item {} not found.", row_id)));
    }

    if let Err(e) = self.gateway.update_cart_item_quantity(self.user_id, row_id, quantity).await {
      warn!(%row_id, error = %e, "Quantity update failed remotely; restoring previous cart.");
      self.view.replace(last_good);
      return Err(e);
    }
    Ok(())
  }

  #[instrument(name = "OptimisticCart::remove", skip(self), fields(user_id = %self.user_id), err(Display))]
  pub async fn remove(&self, row_id: Uuid) -> Result<()> {
    let last_good = self.view.snapshot();
    if !self.view.write().remove(row_id) {
      return Err(MarketError::NotFound(format!("Cart item {} not found.", row_id)));
    }

    if let Err(e) = self.gateway.delete_cart_item(self.user_id, row_id).await {
      warn!(%row_id, error = %e, "Removal failed remotely; restoring previous cart.");
      self.view.replace(last_good);
      return Err(e);
    }
    Ok(())
  }
}
