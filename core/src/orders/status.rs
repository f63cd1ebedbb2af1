// core/src/orders/status.rs

//! The order status state machine.
//!
//! ```text
//! reserved ──confirm──▶ confirmed ──mark ready──▶ ready ──mark delivered──▶ completed
//!    │                      │
//!    ├──cancel──────────────┴──▶ cancelled
//!    └──(system expiry)─────┴──▶ expired
//! ```
//!
//! `completed`, `cancelled` and `expired` are terminal. Only the merchant owning the
//! order's store may drive merchant transitions; expiry is system-only.

use crate::error::{MarketError, Result};
use crate::gateway::Gateway;
use crate::models::{Order, OrderStatus, UserIdentity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

impl OrderStatus {
  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Expired)
  }

  pub fn can_transition_to(&self, next: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
      (self, next),
      (Reserved, Confirmed)
        | (Confirmed, Ready)
        | (Ready, Completed)
        | (Reserved, Cancelled)
        | (Confirmed, Cancelled)
        | (Reserved, Expired)
        | (Confirmed, Expired)
    )
  }

  /// Whether a merchant may request this status directly.
  pub fn is_merchant_target(&self) -> bool {
    matches!(
      self,
      OrderStatus::Confirmed | OrderStatus::Ready | OrderStatus::Completed | OrderStatus::Cancelled
    )
  }
}

/// The buttons a merchant has on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MerchantAction {
  Confirm,
  MarkReady,
  MarkDelivered,
  Cancel,
}

impl MerchantAction {
  pub fn target_status(&self) -> OrderStatus {
    match self {
      MerchantAction::Confirm => OrderStatus::Confirmed,
      MerchantAction::MarkReady => OrderStatus::Ready,
      MerchantAction::MarkDelivered => OrderStatus::Completed,
      MerchantAction::Cancel => OrderStatus::Cancelled,
    }
  }

  /// Actions offered for an order in `status`.
  pub fn available_for(status: OrderStatus) -> Vec<MerchantAction> {
    [
      MerchantAction::Confirm,
      MerchantAction::MarkReady,
      MerchantAction::MarkDelivered,
      MerchantAction::Cancel,
    ]
    .into_iter()
    .filter(|action| status.can_transition_to(action.target_status()))
    .collect()
  }
}

impl Order {
  /// Moves the order to `next`, stamping `completed_at` exactly when it completes.
  pub fn apply_transition(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<()> {
    if !self.status.can_transition_to(next) {
      return Err(MarketError::InvalidTransition {
        from: self.status,
        to: next,
      });
    }
    self.status = next;
    self.completed_at = if next == OrderStatus::Completed { Some(now) } else { None };
    self.updated_at = now;
    Ok(())
  }
}

/// Loads an order and checks the caller may act on it as the store's merchant.
pub(crate) async fn load_owned_order(gateway: &dyn Gateway, actor: &UserIdentity, order_id: Uuid) -> Result<Order> {
  let order = gateway
    .get_order(order_id)
    .await?
    .ok_or_else(|| MarketError::NotFound(format!("Order {} not found.", order_id)))?;
  let store = gateway
    .get_store(order.store_id)
    .await?
    .ok_or_else(|| MarketError::NotFound(format!("Store {} not found.", order.store_id)))?;
  if !store.is_owned_by(actor.id) {
    warn!(%order_id, actor_id = %actor.id, "Rejected status change by non-owner.");
    return Err(MarketError::Forbidden("Only the store's merchant can update this order.".to_string()));
  }
  Ok(order)
}

/// Applies a merchant-requested status change and persists it.
///
/// The write is conditional on the status the transition was validated against; if
/// another session changed it meanwhile, the current status is reported as an
/// invalid transition.
#[instrument(name = "orders::transition_order", skip(gateway, actor), fields(actor_id = %actor.id), err(Display))]
pub async fn transition_order(
  gateway: &dyn Gateway,
  actor: &UserIdentity,
  order_id: Uuid,
  next: OrderStatus,
) -> Result<Order> {
  let mut order = load_owned_order(gateway, actor, order_id).await?;
  if !next.is_merchant_target() {
    return Err(MarketError::Validation(format!(
      "Status '{}' cannot be set directly.",
      next
    )));
  }

  let previous = order.status;
  order.apply_transition(next, Utc::now())?;

  match gateway
    .update_order_status(order_id, previous, order.status, order.completed_at)
    .await?
  {
    Some(updated) => {
      info!(%order_id, from = %previous, to = %updated.status, "Order status updated.");
      Ok(updated)
    }
    None => {
      let current = gateway
        .get_order(order_id)
        .await?
        .map(|o| o.status)
        .unwrap_or(previous);
      warn!(%order_id, expected = %previous, %current, "Order changed concurrently; transition rejected.");
      Err(MarketError::InvalidTransition { from: current, to: next })
    }
  }
}

/// Convenience for the merchant UI actions.
pub async fn apply_merchant_action(
  gateway: &dyn Gateway,
  actor: &UserIdentity,
  order_id: Uuid,
  action: MerchantAction,
) -> Result<Order> {
  transition_order(gateway, actor, order_id, action.target_status()).await
}

/// Expires `reserved`/`confirmed` orders created before `cutoff`.
#[instrument(name = "orders::expire_stale_reservations", skip(gateway), err(Display))]
pub async fn expire_stale_reservations(gateway: &dyn Gateway, cutoff: DateTime<Utc>) -> Result<Vec<Order>> {
  let expired = gateway.expire_orders_before(cutoff).await?;
  if !expired.is_empty() {
    info!(count = expired.len(), "Stale reservations expired.");
  }
  Ok(expired)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal::Decimal;

  fn order(status: OrderStatus) -> Order {
    let now = Utc::now();
    Order {
      id: Uuid::new_v4(),
      customer_id: Uuid::new_v4(),
      store_id: Uuid::new_v4(),
      total_amount: Decimal::new(1000, 2),
      status,
      pickup_code: "AB12CD".to_string(),
      created_at: now,
      updated_at: now,
      completed_at: None,
    }
  }

  #[test]
  fn terminal_states_have_no_exits() {
    use OrderStatus::*;
    let all = [Reserved, Confirmed, Ready, Completed, Cancelled, Expired];
    for from in [Completed, Cancelled, Expired] {
      assert!(from.is_terminal());
      for to in all {
        assert!(!from.can_transition_to(to), "{} -> {} should be rejected", from, to);
      }
    }
  }

  #[test]
  fn ready_cannot_be_cancelled_or_go_back() {
    let mut o = order(OrderStatus::Ready);
    assert!(o.apply_transition(OrderStatus::Cancelled, Utc::now()).is_err());
    assert!(o.apply_transition(OrderStatus::Confirmed, Utc::now()).is_err());
    assert_eq!(o.status, OrderStatus::Ready);
  }

  #[test]
  fn completed_at_set_only_on_completion() {
    let mut o = order(OrderStatus::Reserved);
    o.apply_transition(OrderStatus::Confirmed, Utc::now()).unwrap();
    assert!(o.completed_at.is_none());
    o.apply_transition(OrderStatus::Ready, Utc::now()).unwrap();
    assert!(o.completed_at.is_none());
    o.apply_transition(OrderStatus::Completed, Utc::now()).unwrap();
    assert!(o.completed_at.is_some());
  }

  #[test]
  fn available_actions_follow_the_table() {
    assert_eq!(
      MerchantAction::available_for(OrderStatus::Reserved),
      vec![MerchantAction::Confirm, MerchantAction::Cancel]
    );
    assert_eq!(
      MerchantAction::available_for(OrderStatus::Ready),
      vec![MerchantAction::MarkDelivered]
    );
    assert!(MerchantAction::available_for(OrderStatus::Cancelled).is_empty());
  }

  #[test]
  fn pending_deserializes_as_reserved() {
    let status: OrderStatus = serde_json::from_str("\"pending\"").unwrap();
    assert_eq!(status, OrderStatus::Reserved);
    assert_eq!(serde_json::to_string(&status).unwrap(), "\"reserved\"");
  }
}
