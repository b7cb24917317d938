//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates are `YYYY-MM-DD`, decimals are their
//! canonical string form, and UUIDs are hyphenated lowercase strings. Enum
//! columns hold their wire discriminants.

use std::str::FromStr as _;

use chrono::{DateTime, NaiveDate, Utc};
use parc_core::{
  notification::{Notification, NotificationCategory},
  oi::Oi,
  task::{Task, TaskKind, TaskStatus, display_id},
  template::PreventiveTaskTemplate,
  user::{Role, User},
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── Dates and times ──────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Decimal ──────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String { d.to_string() }

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn encode_role(r: Role) -> &'static str { r.label() }

pub fn decode_role(s: &str) -> Result<Role> {
  match s {
    "Admin" => Ok(Role::Admin),
    "Chef de Parc" => Ok(Role::ChefDeParc),
    other => Err(Error::Decode(format!("unknown role: {other:?}"))),
  }
}

pub fn encode_category(c: NotificationCategory) -> &'static str {
  match c {
    NotificationCategory::Task => "TASK",
    NotificationCategory::CycleVisit => "CYCLE_VISIT",
    NotificationCategory::PreventiveChecklist => "PREVENTIVE_CHECKLIST",
    NotificationCategory::General => "GENERAL",
  }
}

pub fn decode_category(s: &str) -> Result<NotificationCategory> {
  match s {
    "TASK" => Ok(NotificationCategory::Task),
    "CYCLE_VISIT" => Ok(NotificationCategory::CycleVisit),
    "PREVENTIVE_CHECKLIST" => Ok(NotificationCategory::PreventiveChecklist),
    "GENERAL" => Ok(NotificationCategory::General),
    other => Err(Error::Decode(format!("unknown notification category: {other:?}"))),
  }
}

pub fn encode_task_kind(k: TaskKind) -> &'static str {
  match k {
    TaskKind::Preventif => "preventif",
    TaskKind::Curatif => "curatif",
    TaskKind::VisiteHierarchique => "visite_hierarchique",
  }
}

pub fn decode_task_kind(s: &str) -> Result<TaskKind> {
  match s {
    "preventif" => Ok(TaskKind::Preventif),
    "curatif" => Ok(TaskKind::Curatif),
    "visite_hierarchique" => Ok(TaskKind::VisiteHierarchique),
    other => Err(Error::Decode(format!("unknown task kind: {other:?}"))),
  }
}

pub fn encode_task_status(s: TaskStatus) -> &'static str {
  match s {
    TaskStatus::Assigned => "assigned",
    TaskStatus::InProgress => "in_progress",
    TaskStatus::Closed => "closed",
  }
}

pub fn decode_task_status(s: &str) -> Result<TaskStatus> {
  match s {
    "assigned" => Ok(TaskStatus::Assigned),
    "in_progress" => Ok(TaskStatus::InProgress),
    "closed" => Ok(TaskStatus::Closed),
    other => Err(Error::Decode(format!("unknown task status: {other:?}"))),
  }
}

fn decode_opt<T>(s: Option<String>, f: impl FnOnce(&str) -> Result<T>) -> Result<Option<T>> {
  s.as_deref().map(f).transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const USER_COLUMNS: &str = "user_id, username, name, role, active, created_at";

/// Raw values read directly from a `users` row.
pub struct RawUser {
  pub user_id:    String,
  pub username:   String,
  pub name:       String,
  pub role:       String,
  pub active:     bool,
  pub created_at: String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:    row.get(0)?,
      username:   row.get(1)?,
      name:       row.get(2)?,
      role:       row.get(3)?,
      active:     row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_user(self) -> Result<User> {
    Ok(User {
      user_id:    decode_uuid(&self.user_id)?,
      username:   self.username,
      name:       self.name,
      role:       decode_role(&self.role)?,
      active:     self.active,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const OI_COLUMNS: &str = "oi_id, value, total_hours_of_work, last_notified_threshold, \
   next_cycle_visit, last_cycle_visit, last_visit_accepted, created_at";

/// Raw values read directly from an `ois` row.
pub struct RawOi {
  pub oi_id:                   String,
  pub value:                   String,
  pub total_hours_of_work:     String,
  pub last_notified_threshold: Option<i64>,
  pub next_cycle_visit:        Option<String>,
  pub last_cycle_visit:        Option<String>,
  pub last_visit_accepted:     Option<bool>,
  pub created_at:              String,
}

impl RawOi {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      oi_id:                   row.get(0)?,
      value:                   row.get(1)?,
      total_hours_of_work:     row.get(2)?,
      last_notified_threshold: row.get(3)?,
      next_cycle_visit:        row.get(4)?,
      last_cycle_visit:        row.get(5)?,
      last_visit_accepted:     row.get(6)?,
      created_at:              row.get(7)?,
    })
  }

  pub fn into_oi(self) -> Result<Oi> {
    let last_notified_threshold = self
      .last_notified_threshold
      .map(|t| {
        u64::try_from(t)
          .map_err(|_| Error::Decode(format!("negative threshold {t} on OI {}", self.oi_id)))
      })
      .transpose()?;

    Ok(Oi {
      total_hours_of_work: decode_decimal(&self.total_hours_of_work)?,
      last_notified_threshold,
      next_cycle_visit: decode_opt(self.next_cycle_visit, decode_date)?,
      last_cycle_visit: decode_opt(self.last_cycle_visit, decode_date)?,
      last_visit_accepted: self.last_visit_accepted,
      created_at: decode_dt(&self.created_at)?,
      id: self.oi_id,
      value: self.value,
    })
  }
}

pub const TEMPLATE_COLUMNS: &str =
  "template_id, oi_id, trigger_hours, title, description, created_at";

/// Raw values read directly from a `preventive_templates` row.
pub struct RawTemplate {
  pub template_id:   String,
  pub oi_id:         String,
  pub trigger_hours: i64,
  pub title:         String,
  pub description:   String,
  pub created_at:    String,
}

impl RawTemplate {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      template_id:   row.get(0)?,
      oi_id:         row.get(1)?,
      trigger_hours: row.get(2)?,
      title:         row.get(3)?,
      description:   row.get(4)?,
      created_at:    row.get(5)?,
    })
  }

  pub fn into_template(self) -> Result<PreventiveTaskTemplate> {
    let trigger_hours = u32::try_from(self.trigger_hours)
      .map_err(|_| Error::Decode(format!("trigger hours out of range: {}", self.trigger_hours)))?;
    Ok(PreventiveTaskTemplate {
      template_id: decode_uuid(&self.template_id)?,
      oi_id: self.oi_id,
      trigger_hours,
      title: self.title,
      description: self.description,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

pub const NOTIFICATION_COLUMNS: &str = "notification_id, message, created_at, read, \
   recipient_user, recipient_role, category, oi_id, task_id";

/// Raw values read directly from a `notifications` row.
pub struct RawNotification {
  pub notification_id: String,
  pub message:         String,
  pub created_at:      String,
  pub read:            bool,
  pub recipient_user:  String,
  pub recipient_role:  String,
  pub category:        String,
  pub oi_id:           Option<String>,
  pub task_id:         Option<String>,
}

impl RawNotification {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      message:         row.get(1)?,
      created_at:      row.get(2)?,
      read:            row.get(3)?,
      recipient_user:  row.get(4)?,
      recipient_role:  row.get(5)?,
      category:        row.get(6)?,
      oi_id:           row.get(7)?,
      task_id:         row.get(8)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      message:         self.message,
      created_at:      decode_dt(&self.created_at)?,
      read:            self.read,
      recipient_user:  decode_uuid(&self.recipient_user)?,
      recipient_role:  decode_role(&self.recipient_role)?,
      category:        decode_category(&self.category)?,
      oi_id:           self.oi_id,
      task_id:         decode_opt(self.task_id, decode_uuid)?,
    })
  }
}

pub const TASK_COLUMNS: &str = "task_id, seq, oi_id, kind, description, assigned_to, \
   status, hours_of_work, estimated_hours, start_date, end_date, closed_at, \
   created_at, updated_at";

/// Raw values read directly from a `tasks` row.
pub struct RawTask {
  pub task_id:         String,
  pub seq:             i64,
  pub oi_id:           Option<String>,
  pub kind:            String,
  pub description:     String,
  pub assigned_to:     Option<String>,
  pub status:          String,
  pub hours_of_work:   Option<String>,
  pub estimated_hours: Option<String>,
  pub start_date:      Option<String>,
  pub end_date:        Option<String>,
  pub closed_at:       Option<String>,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawTask {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      task_id:         row.get(0)?,
      seq:             row.get(1)?,
      oi_id:           row.get(2)?,
      kind:            row.get(3)?,
      description:     row.get(4)?,
      assigned_to:     row.get(5)?,
      status:          row.get(6)?,
      hours_of_work:   row.get(7)?,
      estimated_hours: row.get(8)?,
      start_date:      row.get(9)?,
      end_date:        row.get(10)?,
      closed_at:       row.get(11)?,
      created_at:      row.get(12)?,
      updated_at:      row.get(13)?,
    })
  }

  pub fn into_task(self) -> Result<Task> {
    Ok(Task {
      task_id:         decode_uuid(&self.task_id)?,
      display_id:      display_id(self.seq),
      oi_id:           self.oi_id,
      kind:            decode_task_kind(&self.kind)?,
      description:     self.description,
      assigned_to:     decode_opt(self.assigned_to, decode_uuid)?,
      status:          decode_task_status(&self.status)?,
      hours_of_work:   decode_opt(self.hours_of_work, decode_decimal)?,
      estimated_hours: decode_opt(self.estimated_hours, decode_decimal)?,
      start_date:      decode_opt(self.start_date, decode_date)?,
      end_date:        decode_opt(self.end_date, decode_date)?,
      closed_at:       decode_opt(self.closed_at, decode_dt)?,
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}
