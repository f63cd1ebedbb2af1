// core/src/catalog.rs

//! Product reads and the merchant-only product mutations.

use crate::error::{MarketError, Result};
use crate::gateway::Gateway;
use crate::models::{Product, ProductPatch, UserIdentity};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub async fn get_product(gateway: &dyn Gateway, product_id: Uuid) -> Result<Product> {
  gateway
    .get_product(product_id)
    .await?
    .ok_or_else(|| MarketError::NotFound(format!("Product with ID {} not found.", product_id)))
}

async fn load_owned_product(gateway: &dyn Gateway, actor: &UserIdentity, product_id: Uuid) -> Result<Product> {
  let product = get_product(gateway, product_id).await?;
  let store = gateway
    .get_store(product.store_id)
    .await?
    .ok_or_else(|| MarketError::NotFound(format!("Store {} not found.", product.store_id)))?;
  if !store.is_owned_by(actor.id) {
    warn!(%product_id, actor_id = %actor.id, "Rejected product change by non-owner.");
    return Err(MarketError::Forbidden("Only the store's merchant can modify this product.".to_string()));
  }
  Ok(product)
}

#[instrument(name = "catalog::update_product", skip(gateway, actor, patch), fields(actor_id = %actor.id), err(Display))]
pub async fn update_product(
  gateway: &dyn Gateway,
  actor: &UserIdentity,
  product_id: Uuid,
  patch: &ProductPatch,
) -> Result<Product> {
  patch.validate().map_err(MarketError::Validation)?;
  load_owned_product(gateway, actor, product_id).await?;
  let updated = gateway.update_product(product_id, patch).await?;
  info!(%product_id, stock = updated.stock_quantity, "Product updated.");
  Ok(updated)
}

#[instrument(name = "catalog::delete_product", skip(gateway, actor), fields(actor_id = %actor.id), err(Display))]
pub async fn delete_product(gateway: &dyn Gateway, actor: &UserIdentity, product_id: Uuid) -> Result<()> {
  load_owned_product(gateway, actor, product_id).await?;
  gateway.delete_product(product_id).await?;
  info!(%product_id, "Product deleted.");
  Ok(())
}
