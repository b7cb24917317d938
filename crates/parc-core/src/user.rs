//! Users and the two workflow roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role a user holds in the maintenance workflow.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Role {
  Admin,
  #[serde(rename = "Chef de Parc")]
  ChefDeParc,
}

impl Role {
  /// Human-readable role name, also used as the wire discriminant.
  pub fn label(self) -> &'static str {
    match self {
      Self::Admin => "Admin",
      Self::ChefDeParc => "Chef de Parc",
    }
  }
}

/// Roles that receive preventive checklist broadcasts.
pub const BROADCAST_ROLES: [Role; 2] = [Role::Admin, Role::ChefDeParc];

/// A person who can be assigned work orders and receive notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  /// Login name; unique across the store.
  pub username:   String,
  /// Display name used in notification text.
  pub name:       String,
  pub role:       Role,
  /// Inactive users keep their history but receive no notifications.
  pub active:     bool,
  pub created_at: DateTime<Utc>,
}

impl User {
  /// Whether this user should receive role-wide broadcasts.
  pub fn is_broadcast_recipient(&self) -> bool {
    self.active && BROADCAST_ROLES.contains(&self.role)
  }
}

/// Input to [`crate::store::ParcStore::add_user`].
#[derive(Debug, Clone)]
pub struct NewUser {
  pub username: String,
  pub name:     String,
  pub role:     Role,
}
