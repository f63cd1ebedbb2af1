// core/src/models/order.rs

use super::order_item::{OrderItem, OrderLineInput};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order lifecycle. `reserved` is canonical; `pending` is accepted on input as an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "order_status", rename_all = "lowercase"))]
pub enum OrderStatus {
  #[serde(alias = "pending")]
  Reserved,
  Confirmed,
  Ready,
  Completed,
  Cancelled,
  Expired,
}

impl OrderStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Reserved => "reserved",
      OrderStatus::Confirmed => "confirmed",
      OrderStatus::Ready => "ready",
      OrderStatus::Completed => "completed",
      OrderStatus::Cancelled => "cancelled",
      OrderStatus::Expired => "expired",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Order {
  pub id: Uuid,
  pub customer_id: Uuid,
  pub store_id: Uuid,
  pub total_amount: Decimal,
  pub status: OrderStatus,
  pub pickup_code: String,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

/// Everything the gateway needs to create an order and its items in one call.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
  pub customer_id: Uuid,
  pub store_id: Uuid,
  pub total_amount: Decimal,
  pub pickup_code: String,
  pub items: Vec<OrderLineInput>,
}

/// A freshly created order, returned to the customer as proof of purchase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedOrder {
  pub order: Order,
  pub items: Vec<OrderItem>,
  pub pickup_code: String,
}

/// An order with its items, as shown on the detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetail {
  #[serde(flatten)]
  pub order: Order,
  pub items: Vec<OrderItem>,
}
