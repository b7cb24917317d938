//! Preventive-maintenance threshold scheduling.
//!
//! Each OI configures trigger offsets inside a repeating cycle of
//! [`CYCLE_HOURS`]. Every offset `t` yields absolute trigger points
//! `k * CYCLE_HOURS + t` for `k = 0, 1, 2, …`. Once the OI's operating hours
//! reach 90% of a trigger point, an early warning carrying that offset's
//! checklist is broadcast to every Admin and Chef de Parc, and the OI's
//! `last_notified_threshold` moves forward so the same point is never
//! announced twice.
//!
//! Everything here is pure. The caller owns the transaction that reads the OI,
//! runs [`schedule`], and persists the resulting [`DispatchPlan`]; two
//! concurrent runs for the same OI without that boundary may both announce the
//! same threshold.
//!
//! ```text
//!  offsets ──► generate_trigger_points ──► evaluate ──► plan_dispatch
//!                   (bounded by hours)      (first        (notifications +
//!                                            unfired)      threshold commit)
//! ```

use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
  notification::{NewNotification, NotificationCategory},
  oi::Oi,
  template::{PreventiveTaskTemplate, TemplateSet},
  user::User,
};

/// Width of one maintenance cycle, in operating hours.
pub const CYCLE_HOURS: u32 = 1600;

/// How far past the current hours trigger points are generated.
pub const LOOKAHEAD_HOURS: u32 = 2000;

// ─── Threshold generation ────────────────────────────────────────────────────

/// Expand per-cycle offsets into absolute trigger points, ascending and
/// de-duplicated.
///
/// Cycle 0 is always generated in full. Later cycles stop at the first point
/// beyond `current_hours + LOOKAHEAD_HOURS`. Non-positive offsets are ignored;
/// no offsets means no points.
pub fn generate_trigger_points(
  offsets: &BTreeSet<u32>,
  current_hours: Decimal,
) -> Vec<u64> {
  let offsets: Vec<u64> = offsets
    .iter()
    .filter(|&&t| t > 0)
    .map(|&t| u64::from(t))
    .collect();
  let horizon = current_hours + Decimal::from(LOOKAHEAD_HOURS);

  let mut points = BTreeSet::new();
  let mut cycle: u64 = 0;
  loop {
    let base = cycle * u64::from(CYCLE_HOURS);
    let mut produced = false;

    // Offsets are ascending, so the first one past the horizon ends the cycle.
    for &offset in &offsets {
      let point = base + offset;
      if cycle > 0 && Decimal::from(point) > horizon {
        break;
      }
      points.insert(point);
      produced = true;
    }

    if !produced || (cycle > 0 && Decimal::from(base) > horizon) {
      break;
    }
    cycle += 1;
  }

  points.into_iter().collect()
}

/// The per-cycle offset whose templates apply to `threshold`.
///
/// A threshold on a cycle boundary maps to `CYCLE_HOURS`, the last offset of
/// the previous cycle, never to `0`.
pub fn template_offset(threshold: u64) -> u32 {
  match threshold % u64::from(CYCLE_HOURS) {
    0 => CYCLE_HOURS,
    // Strictly below CYCLE_HOURS.
    rem => rem as u32,
  }
}

/// The hours at which the early warning for `threshold` fires (90%).
pub fn warning_line(threshold: u64) -> Decimal {
  Decimal::from(threshold) * Decimal::new(90, 2)
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

/// A threshold whose warning line has been crossed and not yet handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
  pub actual_threshold:       u64,
  pub template_trigger_hours: u32,
  /// Checklist items for `template_trigger_hours`. Empty when the threshold
  /// has no templates configured for its offset.
  pub checklist:              Vec<PreventiveTaskTemplate>,
}

/// Find the smallest unhandled trigger point whose warning line
/// `current_hours` has reached.
///
/// Candidates whose offset has no templates are skipped in favour of a later
/// candidate that has some. If every candidate is templateless, the last one
/// seen is returned with an empty checklist so the caller can mark it handled.
pub fn evaluate(
  trigger_points: &[u64],
  current_hours: Decimal,
  last_notified_threshold: Option<u64>,
  templates: &TemplateSet,
) -> Option<Evaluation> {
  let floor = last_notified_threshold.unwrap_or(0);
  let mut templateless = None;

  for &threshold in trigger_points {
    if threshold <= floor || current_hours < warning_line(threshold) {
      continue;
    }

    let offset = template_offset(threshold);
    match templates.checklist(offset) {
      Some(items) => {
        return Some(Evaluation {
          actual_threshold:       threshold,
          template_trigger_hours: offset,
          checklist:              items.to_vec(),
        });
      }
      None => templateless = Some((threshold, offset)),
    }
  }

  templateless.map(|(actual_threshold, template_trigger_hours)| Evaluation {
    actual_threshold,
    template_trigger_hours,
    checklist: Vec::new(),
  })
}

// ─── Dispatch planning ───────────────────────────────────────────────────────

/// Side effects to persist for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchPlan {
  pub notifications: Vec<NewNotification>,
  /// New value for `last_notified_threshold`, if it should move.
  pub commit:        Option<u64>,
}

/// Render the early-warning text for `oi` approaching `threshold`.
pub fn checklist_message(
  oi: &Oi,
  threshold: u64,
  checklist: &[PreventiveTaskTemplate],
) -> String {
  let items: Vec<String> = checklist
    .iter()
    .map(|t| format!("- {}", t.description))
    .collect();
  format!(
    "Alerte Anticipée: Maintenance Préventive pour OI '{}' (approche les {}h de service).\n\
     Veuillez vous préparer pour les tâches suivantes:\n{}",
    oi.value,
    threshold,
    items.join("\n"),
  )
}

/// Turn an evaluation into notifications and a threshold commit.
///
/// Every active Admin, then every active Chef de Parc, receives one copy. The
/// threshold only moves when at least one copy goes out, except for a
/// templateless threshold, which is committed without notifying anyone.
pub fn plan_dispatch(
  oi: &Oi,
  evaluation: &Evaluation,
  recipients: &[User],
) -> DispatchPlan {
  if evaluation.checklist.is_empty() {
    return DispatchPlan {
      notifications: Vec::new(),
      commit:        Some(evaluation.actual_threshold),
    };
  }

  let message =
    checklist_message(oi, evaluation.actual_threshold, &evaluation.checklist);

  let mut ordered: Vec<&User> = recipients
    .iter()
    .filter(|u| u.is_broadcast_recipient())
    .collect();
  ordered.sort_by_key(|u| u.role);

  let notifications: Vec<NewNotification> = ordered
    .into_iter()
    .map(|user| NewNotification {
      recipient_user: user.user_id,
      recipient_role: user.role,
      category:       NotificationCategory::PreventiveChecklist,
      message:        message.clone(),
      oi_id:          Some(oi.id.clone()),
      task_id:        None,
    })
    .collect();

  let commit = (!notifications.is_empty()).then_some(evaluation.actual_threshold);
  DispatchPlan { notifications, commit }
}

// ─── Full run ────────────────────────────────────────────────────────────────

/// What one scheduler run decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
  /// The OI has no templates at all; nothing was checked.
  NoTemplates,
  /// No unhandled threshold has its warning line crossed.
  NothingEligible,
  /// Warnings went out and the threshold was committed.
  Notified {
    threshold:              u64,
    template_trigger_hours: u32,
    recipients:             usize,
  },
  /// An eligible threshold found nobody to notify; left open for retry.
  NoRecipients { threshold: u64 },
  /// An eligible threshold had no checklist; committed without notifying.
  MarkedWithoutTemplates { threshold: u64 },
}

/// The decision and side effects of one scheduler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
  pub outcome: Outcome,
  pub plan:    DispatchPlan,
}

/// Evaluate `oi` against its templates and plan the resulting side effects.
///
/// Every active user in `recipients` holding a broadcast role is addressed,
/// regardless of which OI they work on.
pub fn schedule(oi: &Oi, templates: &TemplateSet, recipients: &[User]) -> Run {
  let offsets = templates.offsets();
  if offsets.is_empty() {
    return Run { outcome: Outcome::NoTemplates, plan: DispatchPlan::default() };
  }

  let points = generate_trigger_points(&offsets, oi.total_hours_of_work);
  let Some(evaluation) = evaluate(
    &points,
    oi.total_hours_of_work,
    oi.last_notified_threshold,
    templates,
  ) else {
    return Run {
      outcome: Outcome::NothingEligible,
      plan:    DispatchPlan::default(),
    };
  };

  let plan = plan_dispatch(oi, &evaluation, recipients);
  let threshold = evaluation.actual_threshold;
  let outcome = if evaluation.checklist.is_empty() {
    Outcome::MarkedWithoutTemplates { threshold }
  } else if plan.notifications.is_empty() {
    Outcome::NoRecipients { threshold }
  } else {
    Outcome::Notified {
      threshold,
      template_trigger_hours: evaluation.template_trigger_hours,
      recipients: plan.notifications.len(),
    }
  };

  Run { outcome, plan }
}
