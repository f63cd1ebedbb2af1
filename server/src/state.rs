// server/src/state.rs
use atelier::Marketplace;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub marketplace: Arc<Marketplace>,
}

impl AppState {
  pub fn new(marketplace: Marketplace) -> Self {
    Self {
      marketplace: Arc::new(marketplace),
    }
  }
}
