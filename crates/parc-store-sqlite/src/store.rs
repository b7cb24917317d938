//! [`SqliteStore`] — the SQLite implementation of [`ParcStore`].

use std::path::Path;

use chrono::Utc;
use parc_core::{
  notification::{NewNotification, Notification, NotificationCategory, check_sender},
  oi::{NewOi, Oi},
  store::{ParcStore, SavedTask, SchedulerRun},
  task::{
    ChecklistSubmission, NewTask, Task, TaskKind, TaskStatus, TaskUpdate, assigned_message,
    checklist_submitted_message, created_by_chef_message, display_id, initial_assignment,
    next_status, status_change_message, validate_dates, visible_to,
  },
  template::{NewTemplate, PreventiveTaskTemplate},
  user::{NewUser, Role, User},
  visit::{CycleVisit, check_recorder, cycle_visit_message},
};
use rusqlite::{Connection, OptionalExtension as _, TransactionBehavior, params};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    NOTIFICATION_COLUMNS, OI_COLUMNS, RawNotification, RawOi, RawTask, RawUser, TASK_COLUMNS,
    USER_COLUMNS, encode_date, encode_decimal, encode_dt, encode_role, encode_uuid,
  },
  host,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Parc store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the database thread without a transaction.
  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Run `f` inside an immediate transaction, committing only if it succeeds.
  ///
  /// `BEGIN IMMEDIATE` takes the write lock up front, so concurrent hours
  /// updates for the same OI are serialised rather than both evaluating the
  /// same `last_notified_threshold`.
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let out = f(&*tx);
        if out.is_ok() {
          tx.commit()?;
        }
        Ok(out)
      })
      .await?
  }
}

// ─── ParcStore impl ──────────────────────────────────────────────────────────

impl ParcStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn add_user(&self, input: NewUser) -> Result<User> {
    let user = User {
      user_id:    Uuid::new_v4(),
      username:   input.username,
      name:       input.name,
      role:       input.role,
      active:     true,
      created_at: Utc::now(),
    };

    let row = user.clone();
    self
      .write(move |conn| {
        let taken = conn
          .query_row(
            "SELECT 1 FROM users WHERE username = ?1",
            params![row.username],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Err(Error::DuplicateUsername(row.username));
        }

        conn.execute(
          "INSERT INTO users (user_id, username, name, role, active, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            encode_uuid(row.user_id),
            row.username,
            row.name,
            encode_role(row.role),
            row.active,
            encode_dt(row.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    self.read(move |conn| host::load_user(conn, id)).await
  }

  async fn list_users(&self, role: Option<Role>) -> Result<Vec<User>> {
    let role_str = role.map(encode_role);

    self
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {USER_COLUMNS} FROM users
           WHERE ?1 IS NULL OR role = ?1
           ORDER BY username"
        ))?;
        let raws = stmt
          .query_map(params![role_str], RawUser::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawUser::into_user).collect()
      })
      .await
  }

  async fn set_user_active(&self, id: Uuid, active: bool) -> Result<User> {
    self
      .write(move |conn| {
        let changed = conn.execute(
          "UPDATE users SET active = ?2 WHERE user_id = ?1",
          params![encode_uuid(id), active],
        )?;
        if changed == 0 {
          return Err(Error::UserNotFound(id));
        }
        host::require_user(conn, id)
      })
      .await
  }

  // ── OIs ───────────────────────────────────────────────────────────────────

  async fn add_oi(&self, input: NewOi) -> Result<Oi> {
    let oi = Oi {
      id:                      input.id,
      value:                   input.value,
      total_hours_of_work:     Decimal::ZERO,
      last_notified_threshold: None,
      next_cycle_visit:        input.next_cycle_visit,
      last_cycle_visit:        None,
      last_visit_accepted:     None,
      created_at:              Utc::now(),
    };

    let row = oi.clone();
    self
      .write(move |conn| {
        let taken = conn
          .query_row(
            "SELECT 1 FROM ois WHERE oi_id = ?1 OR value = ?2",
            params![row.id, row.value],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if taken {
          return Err(Error::DuplicateOi { id: row.id, value: row.value });
        }

        conn.execute(
          "INSERT INTO ois (oi_id, value, total_hours_of_work, next_cycle_visit, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          params![
            row.id,
            row.value,
            encode_decimal(row.total_hours_of_work),
            row.next_cycle_visit.map(encode_date),
            encode_dt(row.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(oi)
  }

  async fn get_oi(&self, id: String) -> Result<Option<Oi>> {
    self.read(move |conn| host::load_oi(conn, &id)).await
  }

  async fn list_ois(&self) -> Result<Vec<Oi>> {
    self
      .read(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {OI_COLUMNS} FROM ois ORDER BY value"))?;
        let raws = stmt
          .query_map([], RawOi::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawOi::into_oi).collect()
      })
      .await
  }

  async fn on_hours_updated(
    &self,
    oi_id: String,
    new_total_hours: Decimal,
  ) -> Result<SchedulerRun> {
    self
      .write(move |conn| host::apply_hours(conn, &oi_id, new_total_hours))
      .await
  }

  async fn record_cycle_visit(
    &self,
    actor: Uuid,
    oi_id: String,
    visit: CycleVisit,
  ) -> Result<Oi> {
    visit.validate(Utc::now().date_naive())?;

    self
      .write(move |conn| {
        let actor = host::require_user(conn, actor)?;
        check_recorder(&actor)?;
        let mut oi = host::load_oi(conn, &oi_id)?.ok_or(Error::OiNotFound(oi_id))?;

        visit.apply_to(&mut oi);
        conn.execute(
          "UPDATE ois SET next_cycle_visit = ?2, last_cycle_visit = ?3, last_visit_accepted = ?4
           WHERE oi_id = ?1",
          params![
            oi.id,
            oi.next_cycle_visit.map(encode_date),
            oi.last_cycle_visit.map(encode_date),
            oi.last_visit_accepted,
          ],
        )?;

        let message = cycle_visit_message(&oi, &visit, &actor);
        let batch = admins(conn)?
          .into_iter()
          .map(|admin| NewNotification {
            recipient_user: admin.user_id,
            recipient_role: Role::Admin,
            category:       NotificationCategory::CycleVisit,
            message:        message.clone(),
            oi_id:          Some(oi.id.clone()),
            task_id:        None,
          })
          .collect();
        host::deliver(conn, batch)?;

        tracing::info!(oi = %oi.value, accepted = visit.accepted, "cycle visit recorded");
        Ok(oi)
      })
      .await
  }

  // ── Templates ─────────────────────────────────────────────────────────────

  async fn add_template(&self, input: NewTemplate) -> Result<PreventiveTaskTemplate> {
    input.validate()?;

    let template = PreventiveTaskTemplate {
      template_id:   Uuid::new_v4(),
      oi_id:         input.oi_id,
      trigger_hours: input.trigger_hours,
      title:         input.title,
      description:   input.description,
      created_at:    Utc::now(),
    };

    let row = template.clone();
    self
      .write(move |conn| {
        if host::load_oi(conn, &row.oi_id)?.is_none() {
          return Err(Error::OiNotFound(row.oi_id));
        }

        let duplicate = conn
          .query_row(
            "SELECT 1 FROM preventive_templates
             WHERE oi_id = ?1 AND trigger_hours = ?2 AND description = ?3",
            params![row.oi_id, row.trigger_hours, row.description],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if duplicate {
          return Err(Error::DuplicateTemplate {
            oi_id:         row.oi_id,
            trigger_hours: row.trigger_hours,
          });
        }

        conn.execute(
          "INSERT INTO preventive_templates (
             template_id, oi_id, trigger_hours, title, description, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            encode_uuid(row.template_id),
            row.oi_id,
            row.trigger_hours,
            row.title,
            row.description,
            encode_dt(row.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(template)
  }

  async fn list_templates(&self, oi_id: String) -> Result<Vec<PreventiveTaskTemplate>> {
    self.read(move |conn| host::load_templates(conn, &oi_id)).await
  }

  async fn delete_template(&self, id: Uuid) -> Result<()> {
    self
      .write(move |conn| {
        let removed = conn.execute(
          "DELETE FROM preventive_templates WHERE template_id = ?1",
          params![encode_uuid(id)],
        )?;
        if removed == 0 {
          return Err(Error::TemplateNotFound(id));
        }
        Ok(())
      })
      .await
  }

  // ── Tasks ─────────────────────────────────────────────────────────────────

  async fn create_task(&self, actor: Uuid, input: NewTask) -> Result<SavedTask> {
    validate_dates(input.start_date, input.end_date)?;

    self
      .write(move |conn| {
        let actor = host::require_user(conn, actor)?;
        let requested = input
          .assigned_to
          .map(|id| host::require_user(conn, id))
          .transpose()?;
        let (assignee, status) = initial_assignment(&actor, requested.as_ref())?;

        if let Some(oi_id) = input.oi_id.as_deref()
          && host::load_oi(conn, oi_id)?.is_none()
        {
          return Err(Error::OiNotFound(oi_id.to_owned()));
        }

        let seq = host::next_task_seq(conn)?;
        let now = Utc::now();
        let task = Task {
          task_id: Uuid::new_v4(),
          display_id: display_id(seq),
          oi_id: input.oi_id,
          kind: input.kind,
          description: input.description,
          assigned_to: Some(assignee),
          status,
          hours_of_work: input.hours_of_work,
          estimated_hours: input.estimated_hours,
          start_date: input.start_date,
          end_date: input.end_date,
          closed_at: None,
          created_at: now,
          updated_at: now,
        };
        host::insert_task(conn, seq, &task)?;

        let batch = match actor.role {
          Role::Admin => vec![task_notification(
            &task,
            assignee,
            Role::ChefDeParc,
            assigned_message(&task),
          )],
          Role::ChefDeParc => {
            let message = created_by_chef_message(&task, &actor);
            admins(conn)?
              .into_iter()
              .map(|admin| {
                task_notification(&task, admin.user_id, Role::Admin, message.clone())
              })
              .collect()
          }
        };
        host::deliver(conn, batch)?;

        let scheduler_run = host::propagate_hours(conn, &task)?;
        Ok(SavedTask { task, scheduler_run })
      })
      .await
  }

  async fn update_task(
    &self,
    actor: Uuid,
    task_id: Uuid,
    update: TaskUpdate,
  ) -> Result<SavedTask> {
    self
      .write(move |conn| {
        let actor = host::require_user(conn, actor)?;
        let mut task = host::load_task(conn, task_id)?.ok_or(Error::TaskNotFound(task_id))?;
        let status = next_status(&actor, &task, update.status)?;

        if let Some(description) = update.description {
          task.description = description;
        }
        if update.hours_of_work.is_some() {
          task.hours_of_work = update.hours_of_work;
        }
        if update.estimated_hours.is_some() {
          task.estimated_hours = update.estimated_hours;
        }
        if update.start_date.is_some() {
          task.start_date = update.start_date;
        }
        if update.end_date.is_some() {
          task.end_date = update.end_date;
        }
        validate_dates(task.start_date, task.end_date)?;

        let now = Utc::now();
        let changed = task.apply_status(status, now);
        task.updated_at = now;
        host::save_task(conn, &task)?;

        if changed && let Some(message) = status_change_message(&task, &actor) {
          let batch: Vec<NewNotification> = match actor.role {
            Role::ChefDeParc => admins(conn)?
              .into_iter()
              .map(|admin| {
                task_notification(&task, admin.user_id, Role::Admin, message.clone())
              })
              .collect(),
            Role::Admin => task
              .assigned_to
              .map(|chef| task_notification(&task, chef, Role::ChefDeParc, message))
              .into_iter()
              .collect(),
          };
          host::deliver(conn, batch)?;
        }

        let scheduler_run = host::propagate_hours(conn, &task)?;
        Ok(SavedTask { task, scheduler_run })
      })
      .await
  }

  async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
    self.read(move |conn| host::load_task(conn, id)).await
  }

  async fn list_tasks(&self, actor: Uuid) -> Result<Vec<Task>> {
    self
      .read(move |conn| {
        let actor = host::require_user(conn, actor)?;
        let assignee = visible_to(&actor).map(encode_uuid);
        let mut stmt = conn.prepare(&format!(
          "SELECT {TASK_COLUMNS} FROM tasks
           WHERE ?1 IS NULL OR assigned_to = ?1
           ORDER BY created_at DESC, seq DESC"
        ))?;
        let raws = stmt
          .query_map(params![assignee], RawTask::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawTask::into_task).collect()
      })
      .await
  }

  async fn submit_checklist(&self, actor: Uuid, submission: ChecklistSubmission) -> Result<Task> {
    submission.validate()?;

    self
      .write(move |conn| {
        let actor = host::require_user(conn, actor)?;
        if !actor.active {
          return Err(parc_core::Error::InactiveUser(actor.user_id).into());
        }
        let oi = host::load_oi(conn, &submission.oi_id)?
          .ok_or_else(|| Error::OiNotFound(submission.oi_id.clone()))?;

        let seq = host::next_task_seq(conn)?;
        let now = Utc::now();
        let task = Task {
          task_id: Uuid::new_v4(),
          display_id: display_id(seq),
          oi_id: Some(oi.id.clone()),
          kind: TaskKind::Preventif,
          description: submission.description(),
          assigned_to: (actor.role == Role::ChefDeParc).then_some(actor.user_id),
          status: TaskStatus::Closed,
          hours_of_work: None,
          estimated_hours: None,
          start_date: None,
          end_date: None,
          closed_at: Some(now),
          created_at: now,
          updated_at: now,
        };
        host::insert_task(conn, seq, &task)?;

        let message = checklist_submitted_message(&oi.value, &task, &actor);
        let batch = admins(conn)?
          .into_iter()
          .filter(|admin| admin.user_id != actor.user_id)
          .map(|admin| task_notification(&task, admin.user_id, Role::Admin, message.clone()))
          .collect();
        host::deliver(conn, batch)?;

        Ok(task)
      })
      .await
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn list_notifications(&self, user: Uuid, unread_only: bool) -> Result<Vec<Notification>> {
    self
      .read(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
           WHERE recipient_user = ?1 AND (?2 = 0 OR read = 0)
           ORDER BY created_at DESC, rowid DESC"
        ))?;
        let raws = stmt
          .query_map(params![encode_uuid(user), unread_only], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawNotification::into_notification).collect()
      })
      .await
  }

  async fn send_notification(
    &self,
    actor: Uuid,
    recipient: Uuid,
    message: String,
  ) -> Result<Notification> {
    self
      .write(move |conn| {
        check_sender(&host::require_user(conn, actor)?)?;
        let recipient = host::require_user(conn, recipient)?;
        let notification = NewNotification {
          recipient_user: recipient.user_id,
          recipient_role: recipient.role,
          category: NotificationCategory::General,
          message,
          oi_id: None,
          task_id: None,
        }
        .into_notification(Utc::now());
        host::insert_notification(conn, &notification)?;
        Ok(notification)
      })
      .await
  }

  async fn mark_read(&self, user: Uuid, notification_id: Uuid) -> Result<Notification> {
    self
      .write(move |conn| {
        let mut notification = host::load_notification(conn, user, notification_id)?
          .ok_or(Error::NotificationNotFound(notification_id))?;
        conn.execute(
          "UPDATE notifications SET read = 1 WHERE notification_id = ?1",
          params![encode_uuid(notification_id)],
        )?;
        notification.read = true;
        Ok(notification)
      })
      .await
  }

  async fn mark_all_read(&self, user: Uuid) -> Result<usize> {
    self
      .write(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET read = 1 WHERE recipient_user = ?1 AND read = 0",
          params![encode_uuid(user)],
        )?)
      })
      .await
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn admins(conn: &Connection) -> Result<Vec<User>> {
  Ok(
    host::load_recipients(conn)?
      .into_iter()
      .filter(|u| u.role == Role::Admin)
      .collect(),
  )
}

fn task_notification(task: &Task, recipient: Uuid, role: Role, message: String) -> NewNotification {
  NewNotification {
    recipient_user: recipient,
    recipient_role: role,
    category: NotificationCategory::Task,
    message,
    oi_id: task.oi_id.clone(),
    task_id: Some(task.task_id),
  }
}
