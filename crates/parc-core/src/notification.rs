//! Notification records addressed to individual users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  user::{Role, User},
};

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationCategory {
  Task,
  CycleVisit,
  PreventiveChecklist,
  General,
}

/// A message delivered to one user. Only `read` changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub message:         String,
  pub created_at:      DateTime<Utc>,
  pub read:            bool,
  pub recipient_user:  Uuid,
  /// The role under which the recipient was addressed.
  pub recipient_role:  Role,
  pub category:        NotificationCategory,
  pub oi_id:           Option<String>,
  pub task_id:         Option<Uuid>,
}

/// A notification that has been decided on but not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
  pub recipient_user: Uuid,
  pub recipient_role: Role,
  pub category:       NotificationCategory,
  pub message:        String,
  pub oi_id:          Option<String>,
  pub task_id:        Option<Uuid>,
}

impl NewNotification {
  /// Stamp the notification with an id and creation time.
  pub fn into_notification(self, created_at: DateTime<Utc>) -> Notification {
    Notification {
      notification_id: Uuid::new_v4(),
      message: self.message,
      created_at,
      read: false,
      recipient_user: self.recipient_user,
      recipient_role: self.recipient_role,
      category: self.category,
      oi_id: self.oi_id,
      task_id: self.task_id,
    }
  }
}

/// Only an active Admin sends free-form [`NotificationCategory::General`]
/// messages.
pub fn check_sender(actor: &User) -> Result<()> {
  if !actor.active {
    return Err(Error::InactiveUser(actor.user_id));
  }
  if actor.role != Role::Admin {
    return Err(Error::Forbidden(format!(
      "{} cannot send notifications",
      actor.username
    )));
  }
  Ok(())
}
