// core/src/orders/pickup.rs

//! Pickup codes: short uppercase alphanumeric tokens shown at collection.

use crate::error::{MarketError, Result};
use crate::gateway::Gateway;
use rand::Rng;
use tracing::{debug, warn};

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn generate_pickup_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
  (0..length)
    .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
    .collect()
}

/// Draws codes until one is not in use, up to `max_attempts` draws.
pub async fn allocate_pickup_code(gateway: &dyn Gateway, length: usize, max_attempts: u32) -> Result<String> {
  for attempt in 1..=max_attempts {
    // ThreadRng is !Send; keep it out of scope across the await below.
    let candidate = generate_pickup_code(&mut rand::thread_rng(), length);
    if !gateway.pickup_code_exists(&candidate).await? {
      debug!(attempt, "Pickup code allocated.");
      return Ok(candidate);
    }
    warn!(attempt, "Pickup code collision, drawing again.");
  }
  Err(MarketError::PickupCodeExhausted { attempts: max_attempts })
}
