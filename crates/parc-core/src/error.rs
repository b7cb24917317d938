//! Error types for `parc-core`.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("trigger hours must be a positive integer")]
  NonPositiveTriggerHours,

  #[error("operating hours out of range: {0}")]
  HoursOutOfRange(Decimal),

  #[error("operating hours carry more than two decimal places: {0}")]
  HoursPrecision(Decimal),

  #[error("a checklist submission needs at least one item")]
  EmptyChecklist,

  #[error("next cycle visit {0} is in the past")]
  NextVisitInPast(NaiveDate),

  #[error("cycle visit date {0} is in the future")]
  VisitInFuture(NaiveDate),

  #[error("end date cannot be before start date")]
  InvalidDateRange,

  #[error("an admin must assign the task to a chef de parc")]
  MissingAssignee,

  #[error("user {0} is not an active chef de parc")]
  InvalidAssignee(Uuid),

  #[error("user {0} is inactive")]
  InactiveUser(Uuid),

  #[error("forbidden: {0}")]
  Forbidden(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
