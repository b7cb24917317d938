//! Synchronous query helpers that run on the database thread.
//!
//! Every function takes a plain [`rusqlite::Connection`]; callers pass a
//! transaction (which derefs to one) whenever several statements must commit
//! together. In particular [`apply_hours`] reads the OI, runs the scheduler,
//! and writes hours, notifications and threshold as one unit.

use chrono::Utc;
use parc_core::{
  notification::{NewNotification, Notification},
  oi::{Oi, validate_hours},
  schedule::{self, Outcome},
  store::SchedulerRun,
  task::Task,
  template::{PreventiveTaskTemplate, TemplateSet},
  user::{BROADCAST_ROLES, User},
};
use rusqlite::{Connection, OptionalExtension as _, params};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    NOTIFICATION_COLUMNS, OI_COLUMNS, RawNotification, RawOi, RawTask, RawTemplate,
    RawUser, TASK_COLUMNS, TEMPLATE_COLUMNS, USER_COLUMNS, encode_category, encode_date,
    encode_decimal, encode_dt, encode_role, encode_task_kind, encode_task_status,
    encode_uuid,
  },
};

// ─── Users ───────────────────────────────────────────────────────────────────

pub fn load_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
  let raw = conn
    .query_row(
      &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
      params![encode_uuid(id)],
      RawUser::from_row,
    )
    .optional()?;
  raw.map(RawUser::into_user).transpose()
}

pub fn require_user(conn: &Connection, id: Uuid) -> Result<User> {
  load_user(conn, id)?.ok_or(Error::UserNotFound(id))
}

/// Every active user holding a broadcast role, Admins first.
pub fn load_recipients(conn: &Connection) -> Result<Vec<User>> {
  let [first, second] = BROADCAST_ROLES.map(encode_role);
  let mut stmt = conn.prepare(&format!(
    "SELECT {USER_COLUMNS} FROM users
     WHERE active = 1 AND role IN (?1, ?2)
     ORDER BY created_at, rowid"
  ))?;
  let raws = stmt
    .query_map(params![first, second], RawUser::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawUser::into_user).collect()
}

// ─── OIs and templates ───────────────────────────────────────────────────────

pub fn load_oi(conn: &Connection, id: &str) -> Result<Option<Oi>> {
  let raw = conn
    .query_row(
      &format!("SELECT {OI_COLUMNS} FROM ois WHERE oi_id = ?1"),
      params![id],
      RawOi::from_row,
    )
    .optional()?;
  raw.map(RawOi::into_oi).transpose()
}

pub fn load_templates(conn: &Connection, oi_id: &str) -> Result<Vec<PreventiveTaskTemplate>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {TEMPLATE_COLUMNS} FROM preventive_templates
     WHERE oi_id = ?1
     ORDER BY trigger_hours, rowid"
  ))?;
  let raws = stmt
    .query_map(params![oi_id], RawTemplate::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawTemplate::into_template).collect()
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub fn insert_notification(conn: &Connection, n: &Notification) -> Result<()> {
  conn.execute(
    "INSERT INTO notifications (
       notification_id, message, created_at, read,
       recipient_user, recipient_role, category, oi_id, task_id
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    params![
      encode_uuid(n.notification_id),
      n.message,
      encode_dt(n.created_at),
      n.read,
      encode_uuid(n.recipient_user),
      encode_role(n.recipient_role),
      encode_category(n.category),
      n.oi_id,
      n.task_id.map(encode_uuid),
    ],
  )?;
  Ok(())
}

/// Persist a batch of decided notifications, all stamped with the same time.
pub fn deliver(conn: &Connection, batch: Vec<NewNotification>) -> Result<Vec<Notification>> {
  let now = Utc::now();
  batch
    .into_iter()
    .map(|n| {
      let notification = n.into_notification(now);
      insert_notification(conn, &notification)?;
      Ok(notification)
    })
    .collect()
}

pub fn load_notification(conn: &Connection, user: Uuid, id: Uuid) -> Result<Option<Notification>> {
  let raw = conn
    .query_row(
      &format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications
         WHERE notification_id = ?1 AND recipient_user = ?2"
      ),
      params![encode_uuid(id), encode_uuid(user)],
      RawNotification::from_row,
    )
    .optional()?;
  raw.map(RawNotification::into_notification).transpose()
}

// ─── Scheduler host ──────────────────────────────────────────────────────────

/// Overwrite an OI's hours total and run the scheduler against it.
pub fn apply_hours(conn: &Connection, oi_id: &str, hours: Decimal) -> Result<SchedulerRun> {
  let hours = validate_hours(hours)?;
  let mut oi = load_oi(conn, oi_id)?.ok_or_else(|| Error::OiNotFound(oi_id.to_owned()))?;

  conn.execute(
    "UPDATE ois SET total_hours_of_work = ?2 WHERE oi_id = ?1",
    params![oi_id, encode_decimal(hours)],
  )?;
  oi.total_hours_of_work = hours;

  run_scheduler(conn, oi)
}

/// Evaluate `oi`, persist the resulting notifications, and commit the
/// threshold if the plan says so.
pub fn run_scheduler(conn: &Connection, mut oi: Oi) -> Result<SchedulerRun> {
  let templates = TemplateSet::new(load_templates(conn, &oi.id)?);
  if templates.is_empty() {
    tracing::debug!(oi = %oi.value, "no preventive templates; skipping check");
    return Ok(SchedulerRun { oi, outcome: Outcome::NoTemplates, notifications: Vec::new() });
  }

  let recipients = load_recipients(conn)?;
  let run = schedule::schedule(&oi, &templates, &recipients);
  let notifications = deliver(conn, run.plan.notifications)?;

  if let Some(threshold) = run.plan.commit {
    // The guard keeps the column monotonic even if a caller bypasses `Oi`.
    conn.execute(
      "UPDATE ois SET last_notified_threshold = ?2
       WHERE oi_id = ?1
         AND (last_notified_threshold IS NULL OR last_notified_threshold < ?2)",
      params![oi.id, threshold as i64],
    )?;
    oi.advance_threshold(threshold);
  }

  match &run.outcome {
    Outcome::Notified { threshold, recipients, .. } => tracing::info!(
      oi = %oi.value,
      threshold,
      recipients,
      "preventive warning dispatched"
    ),
    Outcome::NoRecipients { threshold } => tracing::warn!(
      oi = %oi.value,
      threshold,
      "preventive warning due but no Admin or Chef de Parc to notify"
    ),
    Outcome::MarkedWithoutTemplates { threshold } => tracing::info!(
      oi = %oi.value,
      threshold,
      "warning line crossed but no templates for this threshold; marked handled"
    ),
    Outcome::NoTemplates | Outcome::NothingEligible => {
      tracing::debug!(oi = %oi.value, hours = %oi.total_hours_of_work, "nothing to announce")
    }
  }

  Ok(SchedulerRun { oi, outcome: run.outcome, notifications })
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

pub fn load_task(conn: &Connection, id: Uuid) -> Result<Option<Task>> {
  let raw = conn
    .query_row(
      &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?1"),
      params![encode_uuid(id)],
      RawTask::from_row,
    )
    .optional()?;
  raw.map(RawTask::into_task).transpose()
}

/// The sequence number the next task will be displayed under.
pub fn next_task_seq(conn: &Connection) -> Result<i64> {
  Ok(conn.query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM tasks", [], |r| r.get(0))?)
}

pub fn insert_task(conn: &Connection, seq: i64, task: &Task) -> Result<()> {
  conn.execute(
    &format!(
      "INSERT INTO tasks ({TASK_COLUMNS})
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"
    ),
    params![
      encode_uuid(task.task_id),
      seq,
      task.oi_id,
      encode_task_kind(task.kind),
      task.description,
      task.assigned_to.map(encode_uuid),
      encode_task_status(task.status),
      task.hours_of_work.map(encode_decimal),
      task.estimated_hours.map(encode_decimal),
      task.start_date.map(encode_date),
      task.end_date.map(encode_date),
      task.closed_at.map(encode_dt),
      encode_dt(task.created_at),
      encode_dt(task.updated_at),
    ],
  )?;
  Ok(())
}

pub fn save_task(conn: &Connection, task: &Task) -> Result<()> {
  conn.execute(
    "UPDATE tasks SET
       description = ?2, status = ?3, hours_of_work = ?4, estimated_hours = ?5,
       start_date = ?6, end_date = ?7, closed_at = ?8, updated_at = ?9
     WHERE task_id = ?1",
    params![
      encode_uuid(task.task_id),
      task.description,
      encode_task_status(task.status),
      task.hours_of_work.map(encode_decimal),
      task.estimated_hours.map(encode_decimal),
      task.start_date.map(encode_date),
      task.end_date.map(encode_date),
      task.closed_at.map(encode_dt),
      encode_dt(task.updated_at),
    ],
  )?;
  Ok(())
}

/// Push a task's reported hours onto its OI when they differ from the OI's
/// current total.
pub fn propagate_hours(conn: &Connection, task: &Task) -> Result<Option<SchedulerRun>> {
  let (Some(oi_id), Some(hours)) = (task.oi_id.as_deref(), task.hours_of_work) else {
    return Ok(None);
  };
  let oi = load_oi(conn, oi_id)?.ok_or_else(|| Error::OiNotFound(oi_id.to_owned()))?;
  if oi.total_hours_of_work == hours {
    return Ok(None);
  }
  apply_hours(conn, oi_id, hours).map(Some)
}
