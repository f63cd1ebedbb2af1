// core/src/models/user.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "user_role", rename_all = "lowercase"))]
pub enum UserRole {
  Customer,
  Merchant,
}

/// The authenticated caller as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
  pub id: Uuid,
  pub email: String,
  pub role: UserRole,
  #[serde(default)]
  pub metadata: serde_json::Value,
}

impl UserIdentity {
  pub fn is_merchant(&self) -> bool {
    self.role == UserRole::Merchant
  }
}
