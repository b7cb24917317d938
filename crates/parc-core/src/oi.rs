//! Ordres d'Imputation: the equipment units that accumulate operating hours.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Exclusive upper bound for a recorded hours total (ten digits, two of them
/// decimals).
pub const MAX_HOURS: u32 = 100_000_000;

/// Decimal places kept for an hours total.
pub const HOURS_SCALE: u32 = 2;

/// A cost-tracking unit whose operating hours drive preventive maintenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Oi {
  /// Caller-assigned identity key.
  pub id:                      String,
  /// Display name; unique across the store.
  pub value:                   String,
  /// The latest reported cumulative total. Overwritten on every report,
  /// never summed.
  #[serde(with = "rust_decimal::serde::str")]
  pub total_hours_of_work:     Decimal,
  /// Highest absolute trigger point whose early warning has been handled.
  pub last_notified_threshold: Option<u64>,
  /// When the next cycle visit is due.
  pub next_cycle_visit:        Option<NaiveDate>,
  /// When the last cycle visit was carried out.
  pub last_cycle_visit:        Option<NaiveDate>,
  /// Whether the last cycle visit passed. `None` until one is recorded.
  pub last_visit_accepted:     Option<bool>,
  pub created_at:              DateTime<Utc>,
}

impl Oi {
  /// Move `last_notified_threshold` forward to `threshold`. A smaller value
  /// never lowers it.
  pub fn advance_threshold(&mut self, threshold: u64) {
    self.last_notified_threshold = Some(
      self
        .last_notified_threshold
        .map_or(threshold, |current| current.max(threshold)),
    );
  }
}

/// Input to [`crate::store::ParcStore::add_oi`].
#[derive(Debug, Clone)]
pub struct NewOi {
  pub id:               String,
  pub value:            String,
  pub next_cycle_visit: Option<NaiveDate>,
}

/// Reject totals that are negative, exceed the storable range, or carry more
/// than [`HOURS_SCALE`] decimal places. Trailing zeros are dropped.
pub fn validate_hours(hours: Decimal) -> Result<Decimal> {
  if hours < Decimal::ZERO || hours >= Decimal::from(MAX_HOURS) {
    return Err(Error::HoursOutOfRange(hours));
  }
  let hours = hours.normalize();
  if hours.scale() > HOURS_SCALE {
    return Err(Error::HoursPrecision(hours));
  }
  Ok(hours)
}
