// core/src/models/product.rs

use super::store::StoreSummary;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Product {
  pub id: Uuid,
  pub store_id: Uuid,
  pub name: String,
  pub price: Decimal,
  pub category: String,
  pub image_urls: Vec<String>,
  pub stock_quantity: i32,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Product {
  pub fn primary_image(&self) -> Option<&str> {
    self.image_urls.first().map(String::as_str)
  }
}

/// A product joined with the store that sells it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductListing {
  pub product: Product,
  pub store: StoreSummary,
}

/// Merchant edit of a product. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
  pub name: Option<String>,
  pub price: Option<Decimal>,
  pub category: Option<String>,
  pub image_urls: Option<Vec<String>>,
  pub stock_quantity: Option<i32>,
}

impl ProductPatch {
  pub fn validate(&self) -> Result<(), String> {
    if let Some(name) = &self.name {
      if name.trim().is_empty() {
        return Err("Product name cannot be empty.".to_string());
      }
    }
    if let Some(price) = self.price {
      if price <= Decimal::ZERO {
        return Err("Product price must be positive.".to_string());
      }
      if price.normalize().scale() > 2 {
        return Err("Product price cannot have more than two decimal places.".to_string());
      }
    }
    if let Some(stock) = self.stock_quantity {
      if stock < 0 {
        return Err("Stock quantity cannot be negative.".to_string());
      }
    }
    Ok(())
  }

  pub fn apply_to(&self, product: &mut Product) {
    if let Some(name) = &self.name {
      product.name = name.clone();
    }
    if let Some(price) = self.price {
      product.price = price;
    }
    if let Some(category) = &self.category {
      product.category = category.clone();
    }
    if let Some(image_urls) = &self.image_urls {
      product.image_urls = image_urls.clone();
    }
    if let Some(stock) = self.stock_quantity {
      product.stock_quantity = stock;
    }
  }
}
