// core/src/models/store.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct Store {
  pub id: Uuid,
  pub merchant_id: Uuid,
  pub name: String,
  pub logo_url: Option<String>,
}

impl Store {
  pub fn is_owned_by(&self, user_id: Uuid) -> bool {
    self.merchant_id == user_id
  }

  pub fn summary(&self) -> StoreSummary {
    StoreSummary {
      id: self.id,
      name: self.name.clone(),
      logo_url: self.logo_url.clone(),
    }
  }
}

/// The store fields a cart needs for its per-store headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSummary {
  pub id: Uuid,
  pub name: String,
  pub logo_url: Option<String>,
}
