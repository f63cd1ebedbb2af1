// core/src/error.rs

use crate::flow::FlowError;
use crate::models::OrderStatus;
use thiserror::Error;
use uuid::Uuid;

/// Everything the cart and order operations can fail with.
#[derive(Debug, Error)]
pub enum MarketError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication required: {0}")]
  Unauthenticated(String),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Order cannot move from {from} to {to}")]
  InvalidTransition { from: OrderStatus, to: OrderStatus },

  #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
  InsufficientStock {
    product_id: Uuid,
    requested: i32,
    available: i32,
  },

  #[error("Could not allocate a unique pickup code after {attempts} attempts")]
  PickupCodeExhausted { attempts: u32 },

  #[error("Gateway Error: {0}")]
  Gateway(String),

  #[error("Workflow Error: {source}")]
  Flow {
    #[from]
    source: FlowError,
  },
}

impl MarketError {
  /// Client-caused failures that the caller can fix by changing the request.
  pub fn is_client_error(&self) -> bool {
    !matches!(self, MarketError::Gateway(_) | MarketError::Flow { .. })
  }
}

pub type Result<T, E = MarketError> = std::result::Result<T, E>;
