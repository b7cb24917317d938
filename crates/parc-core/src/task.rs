//! Work orders ("OT") and the Admin / Chef de Parc status workflow.
//!
//! ```text
//!            chef update              chef requests close
//!  Assigned ────────────► InProgress ────────────────────► Closed
//!     ▲                                                      │
//!     └──────────────── admin may set any status ────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  user::{Role, User},
};

/// The nature of the maintenance work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
  #[default]
  Preventif,
  Curatif,
  VisiteHierarchique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  #[default]
  Assigned,
  InProgress,
  Closed,
}

impl TaskStatus {
  pub fn label(self) -> &'static str {
    match self {
      Self::Assigned => "Assigned",
      Self::InProgress => "In Progress",
      Self::Closed => "Closed",
    }
  }
}

/// A maintenance work order against an OI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
  pub task_id:         Uuid,
  /// Human-facing identifier, `ORDT-<n>`.
  pub display_id:      String,
  pub oi_id:           Option<String>,
  pub kind:            TaskKind,
  pub description:     String,
  /// The Chef de Parc responsible for the work.
  pub assigned_to:     Option<Uuid>,
  pub status:          TaskStatus,
  /// New cumulative operating hours reported for the OI with this task.
  #[serde(with = "rust_decimal::serde::str_option")]
  pub hours_of_work:   Option<Decimal>,
  #[serde(with = "rust_decimal::serde::str_option")]
  pub estimated_hours: Option<Decimal>,
  pub start_date:      Option<NaiveDate>,
  pub end_date:        Option<NaiveDate>,
  pub closed_at:       Option<DateTime<Utc>>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl Task {
  /// Set `status`, keeping `closed_at` consistent. Returns whether the status
  /// changed.
  pub fn apply_status(&mut self, status: TaskStatus, now: DateTime<Utc>) -> bool {
    if status == self.status {
      return false;
    }
    if status == TaskStatus::Closed {
      self.closed_at = Some(now);
    } else if self.status == TaskStatus::Closed {
      self.closed_at = None;
    }
    self.status = status;
    true
  }
}

/// Format the display identifier for the `seq`-th task.
pub fn display_id(seq: i64) -> String { format!("ORDT-{seq}") }

/// Input to [`crate::store::ParcStore::create_task`].
#[derive(Debug, Clone, Default)]
pub struct NewTask {
  pub oi_id:           Option<String>,
  pub kind:            TaskKind,
  pub description:     String,
  /// Required when an Admin creates the task; ignored for a Chef.
  pub assigned_to:     Option<Uuid>,
  pub hours_of_work:   Option<Decimal>,
  pub estimated_hours: Option<Decimal>,
  pub start_date:      Option<NaiveDate>,
  pub end_date:        Option<NaiveDate>,
}

/// Input to [`crate::store::ParcStore::update_task`]. `None` leaves a field
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskUpdate {
  /// Requested status. Admins get exactly this; Chefs only reach `Closed`
  /// through it.
  pub status:          Option<TaskStatus>,
  pub description:     Option<String>,
  pub hours_of_work:   Option<Decimal>,
  pub estimated_hours: Option<Decimal>,
  pub start_date:      Option<NaiveDate>,
  pub end_date:        Option<NaiveDate>,
}

pub fn validate_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
  match (start, end) {
    (Some(start), Some(end)) if end < start => Err(Error::InvalidDateRange),
    _ => Ok(()),
  }
}

/// Initial assignee and status for a task created by `actor`.
pub fn initial_assignment(
  actor: &User,
  requested: Option<&User>,
) -> Result<(Uuid, TaskStatus)> {
  if !actor.active {
    return Err(Error::InactiveUser(actor.user_id));
  }
  match actor.role {
    Role::Admin => {
      let chef = requested.ok_or(Error::MissingAssignee)?;
      if chef.role != Role::ChefDeParc || !chef.active {
        return Err(Error::InvalidAssignee(chef.user_id));
      }
      Ok((chef.user_id, TaskStatus::Assigned))
    }
    Role::ChefDeParc => Ok((actor.user_id, TaskStatus::InProgress)),
  }
}

/// The status a task moves to when `actor` updates it.
pub fn next_status(
  actor: &User,
  task: &Task,
  requested: Option<TaskStatus>,
) -> Result<TaskStatus> {
  if !actor.active {
    return Err(Error::InactiveUser(actor.user_id));
  }
  match actor.role {
    Role::Admin => Ok(requested.unwrap_or(task.status)),
    Role::ChefDeParc => {
      if task.assigned_to != Some(actor.user_id) {
        return Err(Error::Forbidden(format!(
          "task {} is not assigned to {}",
          task.display_id, actor.username
        )));
      }
      Ok(match (task.status, requested) {
        (TaskStatus::Assigned, _) => TaskStatus::InProgress,
        (TaskStatus::InProgress, Some(TaskStatus::Closed)) => TaskStatus::Closed,
        (current, _) => current,
      })
    }
  }
}

// ─── Checklist submission ────────────────────────────────────────────────────

/// One line of a submitted preventive checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
  pub description: String,
  pub completed:   bool,
}

/// A completed preventive checklist for an OI. Recorded as a closed
/// `preventif` task.
#[derive(Debug, Clone)]
pub struct ChecklistSubmission {
  pub oi_id: String,
  pub items: Vec<ChecklistItem>,
  pub notes: Option<String>,
}

impl ChecklistSubmission {
  pub fn validate(&self) -> Result<()> {
    if self.items.is_empty() {
      return Err(Error::EmptyChecklist);
    }
    Ok(())
  }

  /// Task text: one `[X]` / `[ ]` line per item, then any notes.
  pub fn description(&self) -> String {
    let mut text = String::from("Maintenance Préventive Effectuée (Checklist):");
    for item in &self.items {
      let mark = if item.completed { "[X]" } else { "[ ]" };
      text.push_str(&format!("\n{mark} {}", item.description));
    }
    if let Some(notes) = self.notes.as_deref().filter(|n| !n.trim().is_empty()) {
      text.push_str(&format!("\n\nNotes: {notes}"));
    }
    text
  }
}

/// Which tasks `actor` may list: everything for an Admin, only their own for
/// a Chef de Parc.
pub fn visible_to(actor: &User) -> Option<Uuid> {
  match actor.role {
    Role::Admin => None,
    Role::ChefDeParc => Some(actor.user_id),
  }
}

// ─── Notification text ───────────────────────────────────────────────────────

pub fn assigned_message(task: &Task) -> String {
  format!("Nouveau OT '{}' vous a été assigné par l'Admin.", task.display_id)
}

pub fn created_by_chef_message(task: &Task, chef: &User) -> String {
  format!(
    "Nouveau OT '{}' créé par {} est maintenant '{}'.",
    task.display_id,
    chef.name,
    task.status.label()
  )
}

pub fn checklist_submitted_message(oi_value: &str, task: &Task, submitter: &User) -> String {
  format!(
    "Checklist préventive pour OI '{}' soumise par {}. Tâche: {}",
    oi_value, submitter.name, task.display_id
  )
}

/// Text for a status change, or `None` when the change is not announced.
pub fn status_change_message(task: &Task, actor: &User) -> Option<String> {
  match (actor.role, task.status) {
    (Role::ChefDeParc, TaskStatus::InProgress) => Some(format!(
      "L'OT '{}' assigné à {} est maintenant '{}'.",
      task.display_id,
      actor.name,
      task.status.label()
    )),
    (Role::ChefDeParc, TaskStatus::Closed) => Some(format!(
      "L'OT '{}' a été clôturé par {}.",
      task.display_id, actor.name
    )),
    (Role::ChefDeParc, TaskStatus::Assigned) => None,
    (Role::Admin, status) => Some(format!(
      "Le statut de l'OT '{}' a été changé à '{}' par l'Admin.",
      task.display_id,
      status.label()
    )),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(role: Role) -> User {
    User {
      user_id: Uuid::new_v4(),
      username: format!("{role:?}").to_lowercase(),
      name: "Nadia".into(),
      role,
      active: true,
      created_at: Utc::now(),
    }
  }

  fn task(assigned_to: Option<Uuid>, status: TaskStatus) -> Task {
    let now = Utc::now();
    Task {
      task_id: Uuid::new_v4(),
      display_id: display_id(3),
      oi_id: Some("OI-1".into()),
      kind: TaskKind::Curatif,
      description: "Remplacer le vérin".into(),
      assigned_to,
      status,
      hours_of_work: None,
      estimated_hours: None,
      start_date: None,
      end_date: None,
      closed_at: None,
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn admin_must_name_a_chef() {
    let admin = user(Role::Admin);
    assert!(matches!(
      initial_assignment(&admin, None),
      Err(Error::MissingAssignee)
    ));
    let other_admin = user(Role::Admin);
    assert!(matches!(
      initial_assignment(&admin, Some(&other_admin)),
      Err(Error::InvalidAssignee(_))
    ));
    let chef = user(Role::ChefDeParc);
    let (assignee, status) = initial_assignment(&admin, Some(&chef)).unwrap();
    assert_eq!(assignee, chef.user_id);
    assert_eq!(status, TaskStatus::Assigned);
  }

  #[test]
  fn chef_creates_for_self_in_progress() {
    let chef = user(Role::ChefDeParc);
    let (assignee, status) = initial_assignment(&chef, None).unwrap();
    assert_eq!(assignee, chef.user_id);
    assert_eq!(status, TaskStatus::InProgress);
  }

  #[test]
  fn chef_workflow() {
    let chef = user(Role::ChefDeParc);
    let assigned = task(Some(chef.user_id), TaskStatus::Assigned);
    assert_eq!(
      next_status(&chef, &assigned, Some(TaskStatus::Closed)).unwrap(),
      TaskStatus::InProgress
    );

    let in_progress = task(Some(chef.user_id), TaskStatus::InProgress);
    assert_eq!(
      next_status(&chef, &in_progress, None).unwrap(),
      TaskStatus::InProgress
    );
    assert_eq!(
      next_status(&chef, &in_progress, Some(TaskStatus::Closed)).unwrap(),
      TaskStatus::Closed
    );

    let closed = task(Some(chef.user_id), TaskStatus::Closed);
    assert_eq!(
      next_status(&chef, &closed, Some(TaskStatus::Assigned)).unwrap(),
      TaskStatus::Closed
    );
  }

  #[test]
  fn chef_cannot_touch_foreign_task() {
    let chef = user(Role::ChefDeParc);
    let foreign = task(Some(Uuid::new_v4()), TaskStatus::Assigned);
    assert!(matches!(
      next_status(&chef, &foreign, None),
      Err(Error::Forbidden(_))
    ));
  }

  #[test]
  fn admin_sets_any_status() {
    let admin = user(Role::Admin);
    let closed = task(None, TaskStatus::Closed);
    assert_eq!(
      next_status(&admin, &closed, Some(TaskStatus::Assigned)).unwrap(),
      TaskStatus::Assigned
    );
    assert_eq!(next_status(&admin, &closed, None).unwrap(), TaskStatus::Closed);
  }

  #[test]
  fn closing_and_reopening_tracks_closed_at() {
    let now = Utc::now();
    let mut t = task(None, TaskStatus::InProgress);
    assert!(t.apply_status(TaskStatus::Closed, now));
    assert_eq!(t.closed_at, Some(now));
    assert!(!t.apply_status(TaskStatus::Closed, now));
    assert!(t.apply_status(TaskStatus::InProgress, now));
    assert_eq!(t.closed_at, None);
  }

  #[test]
  fn date_range() {
    let d = |day| NaiveDate::from_ymd_opt(2025, 3, day).unwrap();
    assert!(validate_dates(Some(d(1)), Some(d(2))).is_ok());
    assert!(validate_dates(Some(d(1)), None).is_ok());
    assert!(matches!(
      validate_dates(Some(d(2)), Some(d(1))),
      Err(Error::InvalidDateRange)
    ));
  }

  #[test]
  fn checklist_text_marks_each_item() {
    let submission = ChecklistSubmission {
      oi_id: "OI-1".into(),
      items: vec![
        ChecklistItem { description: "Graisser".into(), completed: true },
        ChecklistItem { description: "Filtre à air".into(), completed: false },
      ],
      notes: Some("Filtre commandé".into()),
    };
    assert_eq!(
      submission.description(),
      "Maintenance Préventive Effectuée (Checklist):\n[X] Graisser\n[ ] Filtre à air\n\n\
       Notes: Filtre commandé"
    );

    let bare = ChecklistSubmission { notes: Some("  ".into()), ..submission.clone() };
    assert!(!bare.description().contains("Notes"));

    let empty = ChecklistSubmission { items: Vec::new(), ..submission };
    assert!(matches!(empty.validate(), Err(Error::EmptyChecklist)));
  }

  #[test]
  fn listing_scope_by_role() {
    assert_eq!(visible_to(&user(Role::Admin)), None);
    let chef = user(Role::ChefDeParc);
    assert_eq!(visible_to(&chef), Some(chef.user_id));
  }

  #[test]
  fn messages() {
    let chef = user(Role::ChefDeParc);
    let mut t = task(Some(chef.user_id), TaskStatus::Closed);
    assert_eq!(
      status_change_message(&t, &chef).unwrap(),
      "L'OT 'ORDT-3' a été clôturé par Nadia."
    );
    t.status = TaskStatus::Assigned;
    assert!(status_change_message(&t, &chef).is_none());
    assert_eq!(
      assigned_message(&t),
      "Nouveau OT 'ORDT-3' vous a été assigné par l'Admin."
    );
  }
}
