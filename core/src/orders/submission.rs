// core/src/orders/submission.rs

//! Checkout for one store: the `order_submission` flow.
//!
//! Steps:
//! 1. `validate_submission`: shape and arithmetic checks on the request.
//! 2. `reserve_pickup_code`: draw a code not already in use.
//! 3. `persist_order`: a single gateway call that writes the order, its items and the
//!    stock decrements together, or nothing at all.
//! 4. `clear_checked_out_items` (optional): drop that store's lines from the local cart
//!    and the caller's remote cart rows. A failure here is logged, not raised; the
//!    order already exists.

use crate::cart::CartStore;
use crate::error::{MarketError, Result};
use crate::flow::{Flow, FlowContext, FlowError, FlowOutcome, FlowRegistry, StepControl};
use crate::gateway::SharedGateway;
use crate::models::{NewOrder, OrderLineInput, PlacedOrder, UserIdentity};
use crate::orders::pickup::allocate_pickup_code;
use crate::settings::CheckoutSettings;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// One store's checkout request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSubmission {
  pub store_id: Uuid,
  pub items: Vec<OrderLineInput>,
  pub total_amount: Decimal,
}

impl OrderSubmission {
  /// Builds the request for `store_id` from the local cart, capturing current line prices.
  pub fn from_cart(cart: &CartStore, store_id: Uuid) -> Self {
    Self {
      store_id,
      items: cart.checkout_lines(store_id),
      total_amount: cart.store_total(store_id),
    }
  }

  /// Σ price × quantity, or `None` if it does not fit in a `Decimal`.
  pub fn computed_total(&self) -> Option<Decimal> {
    self
      .items
      .iter()
      .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.line_total()?))
  }

  pub fn validate(&self) -> Result<()> {
    if self.items.is_empty() {
      return Err(MarketError::Validation("An order needs at least one item.".to_string()));
    }
    let mut demand: HashMap<Uuid, i64> = HashMap::new();
    for line in &self.items {
      if line.quantity < 1 {
        return Err(MarketError::Validation(format!(
          "Quantity for product {} must be at least 1.",
          line.product_id
        )));
      }
      check_money("Price", line.price)?;
      let requested = demand.entry(line.product_id).or_insert(0);
      *requested += i64::from(line.quantity);
      if *requested > i64::from(i32::MAX) {
        return Err(MarketError::Validation(format!(
          "Quantity for product {} is too large.",
          line.product_id
        )));
      }
    }
    check_money("Total amount", self.total_amount)?;
    let computed = self
      .computed_total()
      .ok_or_else(|| MarketError::Validation("Order total is out of range.".to_string()))?;
    if computed != self.total_amount {
      return Err(MarketError::Validation(format!(
        "Total amount {} does not match the items ({}).",
        self.total_amount, computed
      )));
    }
    Ok(())
  }
}

/// Amounts are stored as `NUMERIC(12, 2)`: positive, at most two decimal places.
fn check_money(label: &str, amount: Decimal) -> Result<()> {
  if amount <= Decimal::ZERO {
    return Err(MarketError::Validation(format!("{} must be positive.", label)));
  }
  if amount.normalize().scale() > MONEY_SCALE {
    return Err(MarketError::Validation(format!(
      "{} {} has more than {} decimal places.",
      label, amount, MONEY_SCALE
    )));
  }
  if amount > max_money() {
    return Err(MarketError::Validation(format!("{} {} is out of range.", label, amount)));
  }
  Ok(())
}

const MONEY_SCALE: u32 = 2;

fn max_money() -> Decimal {
  Decimal::new(999_999_999_999, MONEY_SCALE)
}

pub struct OrderSubmissionCtx {
  pub gateway: SharedGateway,
  pub settings: CheckoutSettings,
  pub customer_id: Uuid,
  pub submission: OrderSubmission,
  /// The caller's device cart, if it has one to clear after checkout.
  pub local_cart: Option<FlowContext<CartStore>>,
  pub pickup_code: Option<String>,
  pub placed: Option<PlacedOrder>,
  pub local_lines_cleared: usize,
  pub remote_rows_cleared: u64,
}

impl OrderSubmissionCtx {
  pub fn new(
    gateway: SharedGateway,
    settings: CheckoutSettings,
    customer_id: Uuid,
    submission: OrderSubmission,
    local_cart: Option<FlowContext<CartStore>>,
  ) -> Self {
    Self {
      gateway,
      settings,
      customer_id,
      submission,
      local_cart,
      pickup_code: None,
      placed: None,
      local_lines_cleared: 0,
      remote_rows_cleared: 0,
    }
  }
}

pub fn build_order_submission_flow() -> Flow<OrderSubmissionCtx, MarketError> {
  let mut flow = Flow::<OrderSubmissionCtx, MarketError>::new(
    "order_submission",
    &[
      ("validate_submission", false, None),
      ("reserve_pickup_code", false, None),
      ("persist_order", false, None),
      ("clear_checked_out_items", true, None),
    ],
  );

  flow.on_step("validate_submission", |ctx: FlowContext<OrderSubmissionCtx>| async move {
    let guard = ctx.read();
    guard.submission.validate()?;
    info!(
      store_id = %guard.submission.store_id,
      lines = guard.submission.items.len(),
      total = %guard.submission.total_amount,
      "Order submission validated."
    );
    Ok::<_, MarketError>(StepControl::Continue)
  });

  flow.on_step("reserve_pickup_code", |ctx: FlowContext<OrderSubmissionCtx>| async move {
    let (gateway, settings) = {
      let guard = ctx.read();
      (guard.gateway.clone(), guard.settings.clone())
    };
    let code =
      allocate_pickup_code(gateway.as_ref(), settings.pickup_code_length, settings.max_code_attempts).await?;
    ctx.write().pickup_code = Some(code);
    Ok::<_, MarketError>(StepControl::Continue)
  });

  flow.on_step("persist_order", |ctx: FlowContext<OrderSubmissionCtx>| async move {
    let (gateway, new_order) = {
      let guard = ctx.read();
      let pickup_code = guard.pickup_code.clone().ok_or_else(|| FlowError::MissingState {
        step_name: "persist_order".to_string(),
        field: "pickup_code".to_string(),
      })?;
      (
        guard.gateway.clone(),
        NewOrder {
          customer_id: guard.customer_id,
          store_id: guard.submission.store_id,
          total_amount: guard.submission.total_amount,
          pickup_code,
          items: guard.submission.items.clone(),
        },
      )
    };
    let placed = gateway.place_order(new_order).await?;
    info!(
      order_id = %placed.order.id,
      pickup_code = %placed.pickup_code,
      "Order placed."
    );
    ctx.write().placed = Some(placed);
    Ok::<_, MarketError>(StepControl::Continue)
  });

  flow.on_step("clear_checked_out_items", |ctx: FlowContext<OrderSubmissionCtx>| async move {
    let (gateway, customer_id, store_id, local_cart) = {
      let guard = ctx.read();
      (
        guard.gateway.clone(),
        guard.customer_id,
        guard.submission.store_id,
        guard.local_cart.clone(),
      )
    };

    if let Some(cart) = local_cart {
      let removed = cart.write().clear_store(store_id);
      ctx.write().local_lines_cleared = removed;
    }

    match gateway.delete_cart_items_for_store(customer_id, store_id).await {
      Ok(removed) => ctx.write().remote_rows_cleared = removed,
      Err(e) => {
        warn!(%customer_id, %store_id, error = %e, "Order placed but cart rows could not be cleared.");
      }
    }
    Ok::<_, MarketError>(StepControl::Continue)
  });

  flow
}

/// Places one store's order for `actor` through the registered `order_submission` flow.
#[instrument(
  name = "orders::submit_order",
  skip_all,
  fields(customer_id = %actor.id, store_id = %submission.store_id),
  err(Display)
)]
pub async fn submit_order(
  flows: &FlowRegistry<MarketError>,
  gateway: SharedGateway,
  settings: CheckoutSettings,
  actor: &UserIdentity,
  submission: OrderSubmission,
  local_cart: Option<FlowContext<CartStore>>,
) -> Result<PlacedOrder> {
  let ctx = FlowContext::new(OrderSubmissionCtx::new(gateway, settings, actor.id, submission, local_cart));
  let outcome = flows.run(ctx.clone()).await?;
  let placed = ctx.write().placed.take();
  match (outcome, placed) {
    (FlowOutcome::Completed, Some(placed)) => Ok(placed),
    _ => Err(MarketError::from(FlowError::MissingState {
      step_name: "persist_order".to_string(),
      field: "placed".to_string(),
    })),
  }
}
