// tests/common/mod.rs
#![allow(dead_code)] // Each test binary uses a different slice of this module

use atelier::flow::{FlowContext, FlowError, StepControl};
use atelier::models::{OrderLineInput, Product, Store, UserIdentity, UserRole};
use atelier::{CheckoutSettings, Flow, Marketplace, MemoryGateway, OrderSubmission, SharedGateway};
use rust_decimal::Decimal;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use tracing::Level;

// --- Flow engine fixtures ---

#[derive(Clone, Debug, Default)]
pub struct TestState {
  pub counter: i32,
  pub steps_executed: Vec<String>,
  pub should_stop_at: Option<String>,
  pub skip_second: bool,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TestError {
  #[error("Flow engine error: {0}")]
  Flow(String), // FlowError is neither Clone nor PartialEq

  #[error("Test handler failed: {0}")]
  Handler(String),
}

impl From<FlowError> for TestError {
  fn from(fe: FlowError) -> Self {
    TestError::Flow(fe.to_string())
  }
}

/// Registers a handler on `step` that records its name and honours `should_stop_at`.
pub fn add_recording_handler(flow: &mut Flow<TestState, TestError>, step: &'static str) {
  flow.on_step(step, move |ctx: FlowContext<TestState>| async move {
    HANDLER_EXEC_COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut guard = ctx.write();
    guard.counter += 1;
    guard.steps_executed.push(step.to_string());
    tracing::debug!(target: "test_handlers", %step, counter = guard.counter, "executed");
    if guard.should_stop_at.as_deref() == Some(step) {
      return Ok(StepControl::Stop);
    }
    Ok::<_, TestError>(StepControl::Continue)
  });
}

pub fn add_failing_handler(flow: &mut Flow<TestState, TestError>, step: &'static str, message: &'static str) {
  flow.on_step(step, move |ctx: FlowContext<TestState>| async move {
    ctx.write().steps_executed.push(step.to_string());
    tracing::warn!(target: "test_handlers", %step, "failing with: '{}'", message);
    Err::<StepControl, _>(TestError::Handler(message.to_string()))
  });
}

// --- Tracing (initialized once per test binary) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub static HANDLER_EXEC_COUNTER: Lazy<Arc<AtomicUsize>> = Lazy::new(|| Arc::new(AtomicUsize::new(0)));

pub fn reset_counters() {
  HANDLER_EXEC_COUNTER.store(0, Ordering::SeqCst);
}

// --- Marketplace fixtures ---

pub fn money(cents: i64) -> Decimal {
  Decimal::new(cents, 2)
}

/// One customer, one merchant owning two stores, over a fresh `MemoryGateway`.
pub struct Shop {
  pub gateway: Arc<MemoryGateway>,
  pub market: Marketplace,
  pub customer: UserIdentity,
  pub merchant: UserIdentity,
  pub other_merchant: UserIdentity,
  pub store_a: Store,
  pub store_b: Store,
}

impl Shop {
  pub fn new() -> Self {
    Self::with_settings(CheckoutSettings::default())
  }

  pub fn with_settings(settings: CheckoutSettings) -> Self {
    setup_tracing();
    let gateway = Arc::new(MemoryGateway::new());
    let customer = gateway.add_user("ada@example.com", UserRole::Customer, "customer-token");
    let merchant = gateway.add_user("lin@atelier.example", UserRole::Merchant, "merchant-token");
    let other_merchant = gateway.add_user("rui@atelier.example", UserRole::Merchant, "other-merchant-token");
    let store_a = gateway.add_store(merchant.id, "Linen House");
    let store_b = gateway.add_store(merchant.id, "Denim Works");
    let shared: SharedGateway = gateway.clone();
    let market = Marketplace::new(shared, settings);
    Self {
      gateway,
      market,
      customer,
      merchant,
      other_merchant,
      store_a,
      store_b,
    }
  }

  pub fn shared_gateway(&self) -> SharedGateway {
    self.gateway.clone()
  }

  pub fn product_a(&self, name: &str, price_cents: i64, stock: i32) -> Product {
    self.gateway.add_product(self.store_a.id, name, money(price_cents), stock)
  }

  pub fn product_b(&self, name: &str, price_cents: i64, stock: i32) -> Product {
    self.gateway.add_product(self.store_b.id, name, money(price_cents), stock)
  }
}

pub fn line(product: &Product, quantity: i32) -> OrderLineInput {
  OrderLineInput {
    product_id: product.id,
    quantity,
    price: product.price,
  }
}

/// A submission whose total is the exact sum of its lines.
pub fn submission(store_id: uuid::Uuid, items: Vec<OrderLineInput>) -> OrderSubmission {
  let total_amount = items
    .iter()
    .map(|line| line.line_total().expect("line total fits"))
    .sum();
  OrderSubmission {
    store_id,
    items,
    total_amount,
  }
}
