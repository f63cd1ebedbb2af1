// core/src/settings.rs

/// Tunables for checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
  pub pickup_code_length: usize,
  /// How many codes to draw before giving up on finding an unused one.
  pub max_code_attempts: u32,
}

impl Default for CheckoutSettings {
  fn default() -> Self {
    Self {
      pickup_code_length: 6,
      max_code_attempts: 5,
    }
  }
}
