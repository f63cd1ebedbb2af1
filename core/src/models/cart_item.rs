// core/src/models/cart_item.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A line in the device-local cart. `quantity` is always at least 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLineItem {
  pub id: Uuid,
  pub product_id: Uuid,
  pub store_id: Uuid,
  pub store_name: String,
  pub name: String,
  pub price: Decimal,
  pub quantity: u32,
  pub color: Option<String>,
  pub size: Option<String>,
  pub image_url: Option<String>,
}

impl CartLineItem {
  pub fn line_total(&self) -> Decimal {
    self.price * Decimal::from(self.quantity)
  }

  /// Two lines are the same merchandise when product and chosen options agree.
  pub fn matches(&self, new_line: &NewCartLine) -> bool {
    self.product_id == new_line.product_id && self.color == new_line.color && self.size == new_line.size
  }
}

/// Input for `CartStore::add_item`; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCartLine {
  pub product_id: Uuid,
  pub store_id: Uuid,
  pub store_name: String,
  pub name: String,
  pub price: Decimal,
  pub quantity: u32,
  #[serde(default)]
  pub color: Option<String>,
  #[serde(default)]
  pub size: Option<String>,
  #[serde(default)]
  pub image_url: Option<String>,
}

/// A persisted `cart_items` row. Only foreign keys; product data is joined in later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct RemoteCartItem {
  pub id: Uuid,
  pub user_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
