//! Preventive checklist templates and the per-OI view the scheduler reads.
//!
//! A template ties one checklist item to a trigger offset inside the repeating
//! maintenance cycle. Several templates may share an offset; they are
//! announced together.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// One checklist item configured for an OI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreventiveTaskTemplate {
  pub template_id:   Uuid,
  pub oi_id:         String,
  /// Offset in hours inside one maintenance cycle.
  pub trigger_hours: u32,
  pub title:         String,
  /// The checklist text sent to recipients.
  pub description:   String,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::ParcStore::add_template`].
#[derive(Debug, Clone)]
pub struct NewTemplate {
  pub oi_id:         String,
  pub trigger_hours: u32,
  pub title:         String,
  pub description:   String,
}

impl NewTemplate {
  pub fn validate(&self) -> Result<()> {
    if self.trigger_hours == 0 {
      return Err(Error::NonPositiveTriggerHours);
    }
    Ok(())
  }
}

/// The templates of a single OI, grouped by trigger offset.
///
/// Within an offset, templates keep the order they were supplied in.
#[derive(Debug, Clone, Default)]
pub struct TemplateSet {
  by_offset: BTreeMap<u32, Vec<PreventiveTaskTemplate>>,
}

impl TemplateSet {
  pub fn new(templates: impl IntoIterator<Item = PreventiveTaskTemplate>) -> Self {
    let mut by_offset: BTreeMap<u32, Vec<_>> = BTreeMap::new();
    for template in templates {
      by_offset
        .entry(template.trigger_hours)
        .or_default()
        .push(template);
    }
    Self { by_offset }
  }

  pub fn is_empty(&self) -> bool { self.by_offset.is_empty() }

  /// The distinct positive offsets configured.
  pub fn offsets(&self) -> BTreeSet<u32> {
    self.by_offset.keys().copied().filter(|&t| t > 0).collect()
  }

  /// Checklist items for `offset`, or `None` if nothing is configured there.
  pub fn checklist(&self, offset: u32) -> Option<&[PreventiveTaskTemplate]> {
    self
      .by_offset
      .get(&offset)
      .map(Vec::as_slice)
      .filter(|items| !items.is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn template(trigger_hours: u32, description: &str) -> PreventiveTaskTemplate {
    PreventiveTaskTemplate {
      template_id: Uuid::new_v4(),
      oi_id: "OI-1".into(),
      trigger_hours,
      title: description.to_uppercase(),
      description: description.into(),
      created_at: Utc::now(),
    }
  }

  #[test]
  fn zero_trigger_hours_rejected() {
    let input = NewTemplate {
      oi_id:         "OI-1".into(),
      trigger_hours: 0,
      title:         "Vidange".into(),
      description:   "Vidanger le moteur".into(),
    };
    assert!(matches!(input.validate(), Err(Error::NonPositiveTriggerHours)));
  }

  #[test]
  fn groups_by_offset_in_supplied_order() {
    let set = TemplateSet::new([
      template(400, "filtres"),
      template(200, "graissage"),
      template(400, "courroies"),
    ]);

    assert_eq!(set.offsets().into_iter().collect::<Vec<_>>(), [200, 400]);
    let items: Vec<_> = set
      .checklist(400)
      .unwrap()
      .iter()
      .map(|t| t.description.as_str())
      .collect();
    assert_eq!(items, ["filtres", "courroies"]);
    assert!(set.checklist(600).is_none());
  }

  #[test]
  fn empty_set() {
    let set = TemplateSet::new(Vec::<PreventiveTaskTemplate>::new());
    assert!(set.is_empty());
    assert!(set.offsets().is_empty());
  }
}
