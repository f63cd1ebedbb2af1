// core/src/cart/store.rs

//! `CartStore`: the local list of cart lines.
//!
//! Pure state transitions with no I/O. Callers own an instance and inject it where it
//! is needed (a checkout flow, a UI session); there is no global cart.

use crate::models::{CartLineItem, NewCartLine, OrderLineInput};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, trace};
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartStore {
  items: Vec<CartLineItem>,
}

impl CartStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn items(&self) -> &[CartLineItem] {
    &self.items
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn get(&self, id: Uuid) -> Option<&CartLineItem> {
    self.items.iter().find(|item| item.id == id)
  }

  /// Adds a line, merging into an existing one with the same product, color and size.
  ///
  /// Returns the id of the line that now holds the quantity. A zero quantity changes
  /// nothing and returns `None`.
  pub fn add_item(&mut self, new_line: NewCartLine) -> Option<Uuid> {
    if new_line.quantity == 0 {
      debug!(product_id = %new_line.product_id, "Ignoring add of zero quantity.");
      return None;
    }

    if let Some(existing) = self.items.iter_mut().find(|item| item.matches(&new_line)) {
      existing.quantity = existing.quantity.saturating_add(new_line.quantity);
      trace!(line_id = %existing.id, quantity = existing.quantity, "Merged into existing cart line.");
      return Some(existing.id);
    }

    let line = CartLineItem {
      id: Uuid::new_v4(),
      product_id: new_line.product_id,
      store_id: new_line.store_id,
      store_name: new_line.store_name,
      name: new_line.name,
      price: new_line.price,
      quantity: new_line.quantity,
      color: new_line.color,
      size: new_line.size,
      image_url: new_line.image_url,
    };
    let id = line.id;
    trace!(line_id = %id, "Appended cart line.");
    self.items.push(line);
    Some(id)
  }

  /// Returns `true` if a line was removed.
  pub fn remove_item(&mut self, id: Uuid) -> bool {
    let before = self.items.len();
    self.items.retain(|item| item.id != id);
    before != self.items.len()
  }

  /// Sets a line's quantity. Anything below 1 removes the line.
  pub fn update_quantity(&mut self, id: Uuid, quantity: i64) {
    if quantity < 1 {
      self.remove_item(id);
      return;
    }
    let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
    if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
      item.quantity = quantity;
    }
  }

  pub fn clear_cart(&mut self) {
    self.items.clear();
  }

  /// Removes only the lines sold by `store_id`. Returns how many were removed.
  pub fn clear_store(&mut self, store_id: Uuid) -> usize {
    let before = self.items.len();
    self.items.retain(|item| item.store_id != store_id);
    before - self.items.len()
  }

  pub fn items_by_store(&self) -> BTreeMap<Uuid, Vec<CartLineItem>> {
    let mut grouped: BTreeMap<Uuid, Vec<CartLineItem>> = BTreeMap::new();
    for item in &self.items {
      grouped.entry(item.store_id).or_default().push(item.clone());
    }
    grouped
  }

  pub fn total_items(&self) -> u64 {
    self.items.iter().map(|item| u64::from(item.quantity)).sum()
  }

  pub fn total_amount(&self) -> Decimal {
    self.items.iter().map(CartLineItem::line_total).sum()
  }

  pub fn store_total(&self, store_id: Uuid) -> Decimal {
    self
      .items
      .iter()
      .filter(|item| item.store_id == store_id)
      .map(CartLineItem::line_total)
      .sum()
  }

  /// The lines of one store in the shape a checkout submission takes.
  pub fn checkout_lines(&self, store_id: Uuid) -> Vec<OrderLineInput> {
    self
      .items
      .iter()
      .filter(|item| item.store_id == store_id)
      .map(|item| OrderLineInput {
        product_id: item.product_id,
        quantity: i32::try_from(item.quantity).unwrap_or(i32::MAX),
        price: item.price,
      })
      .collect()
  }

  /// Serializes the cart for on-device persistence.
  pub fn to_json(&self) -> serde_json::Result<String> {
    serde_json::to_string(self)
  }

  /// Restores a persisted cart, dropping any line that would violate `quantity >= 1`.
  pub fn from_json(raw: &str) -> serde_json::Result<Self> {
    let mut store: CartStore = serde_json::from_str(raw)?;
    store.items.retain(|item| item.quantity >= 1);
    Ok(store)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn line(product_id: Uuid, store_id: Uuid, price: i64, quantity: u32, size: Option<&str>) -> NewCartLine {
    NewCartLine {
      product_id,
      store_id,
      store_name: "Maison".to_string(),
      name: "Linen shirt".to_string(),
      price: Decimal::new(price, 2),
      quantity,
      color: Some("ecru".to_string()),
      size: size.map(str::to_string),
      image_url: None,
    }
  }

  #[test]
  fn different_sizes_stay_separate_lines() {
    let mut cart = CartStore::new();
    let product = Uuid::new_v4();
    let store = Uuid::new_v4();
    cart.add_item(line(product, store, 4500, 1, Some("M")));
    cart.add_item(line(product, store, 4500, 1, Some("L")));
    assert_eq!(cart.items().len(), 2);
    assert_eq!(cart.total_items(), 2);
  }

  #[test]
  fn zero_quantity_add_is_ignored() {
    let mut cart = CartStore::new();
    assert!(cart.add_item(line(Uuid::new_v4(), Uuid::new_v4(), 100, 0, None)).is_none());
    assert!(cart.is_empty());
  }

  #[test]
  fn update_to_zero_removes_line() {
    let mut cart = CartStore::new();
    let id = cart.add_item(line(Uuid::new_v4(), Uuid::new_v4(), 100, 3, None)).unwrap();
    cart.update_quantity(id, 0);
    assert!(cart.get(id).is_none());
  }

  #[test]
  fn json_snapshot_drops_zero_quantity_lines() {
    let mut cart = CartStore::new();
    let id = cart.add_item(line(Uuid::new_v4(), Uuid::new_v4(), 1999, 2, None)).unwrap();
    let mut raw: serde_json::Value = serde_json::from_str(&cart.to_json().unwrap()).unwrap();
    raw["items"][0]["quantity"] = serde_json::json!(0);
    let restored = CartStore::from_json(&raw.to_string()).unwrap();
    assert!(restored.get(id).is_none());
  }
}
