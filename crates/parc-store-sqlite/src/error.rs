//! Error type for `parc-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] parc_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("decimal parse error: {0}")]
  Decimal(#[from] rust_decimal::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value with no matching domain variant.
  #[error("decode error: {0}")]
  Decode(String),

  #[error("OI not found: {0}")]
  OiNotFound(String),

  #[error("user not found: {0}")]
  UserNotFound(Uuid),

  #[error("task not found: {0}")]
  TaskNotFound(Uuid),

  #[error("template not found: {0}")]
  TemplateNotFound(Uuid),

  #[error("notification not found: {0}")]
  NotificationNotFound(Uuid),

  #[error("an OI with id {id:?} or value {value:?} already exists")]
  DuplicateOi { id: String, value: String },

  #[error("username already taken: {0}")]
  DuplicateUsername(String),

  #[error("template already exists for OI {oi_id} at {trigger_hours}h with this description")]
  DuplicateTemplate { oi_id: String, trigger_hours: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
