// tests/order_status_tests.rs
mod common;

use atelier::models::{OrderStatus, PlacedOrder};
use atelier::orders::status::apply_merchant_action;
use atelier::{MarketError, MerchantAction};
use chrono::{Duration, Utc};
use common::*;

async fn place_one(shop: &Shop) -> PlacedOrder {
  let dress = shop.product_a("Wrap dress", 9900, 5);
  shop
    .market
    .submit_order(&shop.customer, submission(shop.store_a.id, vec![line(&dress, 1)]), None)
    .await
    .unwrap()
}

#[tokio::test]
async fn test_forward_sequence_succeeds_and_stamps_completion() {
  let shop = Shop::new();
  let placed = place_one(&shop).await;
  let order_id = placed.order.id;
  assert_eq!(placed.order.status, OrderStatus::Reserved);
  assert!(placed.order.completed_at.is_none());

  let confirmed = shop.market.transition_order(&shop.merchant, order_id, OrderStatus::Confirmed).await.unwrap();
  assert_eq!(confirmed.status, OrderStatus::Confirmed);
  assert!(confirmed.completed_at.is_none());

  let ready = shop.market.transition_order(&shop.merchant, order_id, OrderStatus::Ready).await.unwrap();
  assert_eq!(ready.status, OrderStatus::Ready);
  assert!(ready.completed_at.is_none());

  let completed = shop.market.transition_order(&shop.merchant, order_id, OrderStatus::Completed).await.unwrap();
  assert_eq!(completed.status, OrderStatus::Completed);
  assert!(completed.completed_at.is_some());
}

#[tokio::test]
async fn test_backwards_transition_is_rejected() {
  let shop = Shop::new();
  let order_id = place_one(&shop).await.order.id;
  shop.market.transition_order(&shop.merchant, order_id, OrderStatus::Confirmed).await.unwrap();
  shop.market.transition_order(&shop.merchant, order_id, OrderStatus::Ready).await.unwrap();

  let back = shop.market.transition_order(&shop.merchant, order_id, OrderStatus::Confirmed).await;
  assert!(matches!(
    back,
    Err(MarketError::InvalidTransition {
      from: OrderStatus::Ready,
      to: OrderStatus::Confirmed
    })
  ));
}

#[tokio::test]
async fn test_terminal_states_have_no_exits() {
  let shop = Shop::new();

  let cancelled = place_one(&shop).await.order.id;
  shop.market.transition_order(&shop.merchant, cancelled, OrderStatus::Cancelled).await.unwrap();
  for next in [OrderStatus::Confirmed, OrderStatus::Ready, OrderStatus::Completed, OrderStatus::Cancelled] {
    let result = shop.market.transition_order(&shop.merchant, cancelled, next).await;
    assert!(matches!(result, Err(MarketError::InvalidTransition { .. })), "cancelled -> {}", next);
  }

  let completed = place_one(&shop).await.order.id;
  for next in [OrderStatus::Confirmed, OrderStatus::Ready, OrderStatus::Completed] {
    shop.market.transition_order(&shop.merchant, completed, next).await.unwrap();
  }
  let reopen = shop.market.transition_order(&shop.merchant, completed, OrderStatus::Cancelled).await;
  assert!(matches!(reopen, Err(MarketError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_cancel_only_from_reserved_or_confirmed() {
  let shop = Shop::new();
  let from_confirmed = place_one(&shop).await.order.id;
  shop.market.transition_order(&shop.merchant, from_confirmed, OrderStatus::Confirmed).await.unwrap();
  let cancelled = shop.market.transition_order(&shop.merchant, from_confirmed, OrderStatus::Cancelled).await.unwrap();
  assert_eq!(cancelled.status, OrderStatus::Cancelled);

  let from_ready = place_one(&shop).await.order.id;
  shop.market.transition_order(&shop.merchant, from_ready, OrderStatus::Confirmed).await.unwrap();
  shop.market.transition_order(&shop.merchant, from_ready, OrderStatus::Ready).await.unwrap();
  let result = shop.market.transition_order(&shop.merchant, from_ready, OrderStatus::Cancelled).await;
  assert!(matches!(result, Err(MarketError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_system_states_cannot_be_requested() {
  let shop = Shop::new();
  let order_id = place_one(&shop).await.order.id;
  for next in [OrderStatus::Reserved, OrderStatus::Expired] {
    let result = shop.market.transition_order(&shop.merchant, order_id, next).await;
    assert!(matches!(result, Err(MarketError::Validation(_))), "target {}", next);
  }
}

#[tokio::test]
async fn test_only_owning_merchant_may_transition() {
  let shop = Shop::new();
  let order_id = place_one(&shop).await.order.id;

  let by_customer = shop.market.transition_order(&shop.customer, order_id, OrderStatus::Confirmed).await;
  assert!(matches!(by_customer, Err(MarketError::Forbidden(_))));

  let by_stranger = shop
    .market
    .transition_order(&shop.other_merchant, order_id, OrderStatus::Confirmed)
    .await;
  assert!(matches!(by_stranger, Err(MarketError::Forbidden(_))));

  let detail = shop.market.order_detail(&shop.customer, order_id).await.unwrap();
  assert_eq!(detail.order.status, OrderStatus::Reserved);
}

#[tokio::test]
async fn test_merchant_actions_drive_the_same_machine() {
  let shop = Shop::new();
  let order_id = place_one(&shop).await.order.id;
  let gateway = shop.shared_gateway();

  assert_eq!(
    MerchantAction::available_for(OrderStatus::Reserved),
    vec![MerchantAction::Confirm, MerchantAction::Cancel]
  );
  assert!(MerchantAction::available_for(OrderStatus::Completed).is_empty());

  for action in [MerchantAction::Confirm, MerchantAction::MarkReady, MerchantAction::MarkDelivered] {
    apply_merchant_action(gateway.as_ref(), &shop.merchant, order_id, action).await.unwrap();
  }
  let detail = shop.market.order_detail(&shop.merchant, order_id).await.unwrap();
  assert_eq!(detail.order.status, OrderStatus::Completed);
  assert!(detail.order.completed_at.is_some());
}

#[tokio::test]
async fn test_unknown_order_is_not_found() {
  let shop = Shop::new();
  let result = shop
    .market
    .transition_order(&shop.merchant, uuid::Uuid::new_v4(), OrderStatus::Confirmed)
    .await;
  assert!(matches!(result, Err(MarketError::NotFound(_))));
}

#[tokio::test]
async fn test_stale_reservations_expire() {
  let shop = Shop::new();
  let stale = place_one(&shop).await.order.id;
  let stale_confirmed = place_one(&shop).await.order.id;
  let fresh = place_one(&shop).await.order.id;
  let ready = place_one(&shop).await.order.id;

  shop.market.transition_order(&shop.merchant, stale_confirmed, OrderStatus::Confirmed).await.unwrap();
  shop.market.transition_order(&shop.merchant, ready, OrderStatus::Confirmed).await.unwrap();
  shop.market.transition_order(&shop.merchant, ready, OrderStatus::Ready).await.unwrap();
  let two_hours_ago = Utc::now() - Duration::hours(2);
  for id in [stale, stale_confirmed, ready] {
    shop.gateway.backdate_order(id, two_hours_ago);
  }

  let expired = shop.market.expire_stale_reservations(Duration::minutes(30)).await.unwrap();
  let mut expired_ids: Vec<_> = expired.iter().map(|o| o.id).collect();
  expired_ids.sort();
  let mut expected = vec![stale, stale_confirmed];
  expected.sort();
  assert_eq!(expired_ids, expected);

  let fresh_detail = shop.market.order_detail(&shop.customer, fresh).await.unwrap();
  assert_eq!(fresh_detail.order.status, OrderStatus::Reserved);
  let ready_detail = shop.market.order_detail(&shop.customer, ready).await.unwrap();
  assert_eq!(ready_detail.order.status, OrderStatus::Ready);

  let after = shop.market.transition_order(&shop.merchant, stale, OrderStatus::Confirmed).await;
  assert!(matches!(after, Err(MarketError::InvalidTransition { from: OrderStatus::Expired, .. })));
}

#[test]
fn test_pending_is_read_as_reserved() {
  let status: OrderStatus = serde_json::from_str("\"pending\"").unwrap();
  assert_eq!(status, OrderStatus::Reserved);
  assert_eq!(serde_json::to_string(&status).unwrap(), "\"reserved\"");
}
