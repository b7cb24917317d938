//! The `ParcStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `parc-store-sqlite`).
//! The `parc` binary depends on this abstraction, not on any concrete backend.
//!
//! Every operation that changes an OI's operating hours must run the
//! [scheduler](crate::schedule) and persist its plan inside one transaction
//! per OI, so that two concurrent updates can never announce the same
//! threshold twice.

use std::future::Future;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::{
  notification::Notification,
  oi::{NewOi, Oi},
  schedule::Outcome,
  task::{ChecklistSubmission, NewTask, Task, TaskUpdate},
  template::{NewTemplate, PreventiveTaskTemplate},
  user::{NewUser, Role, User},
  visit::CycleVisit,
};

/// Result of running the scheduler for one hours update.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerRun {
  /// The OI as committed, including any advanced threshold.
  pub oi:            Oi,
  pub outcome:       Outcome,
  pub notifications: Vec<Notification>,
}

/// A saved task, plus the scheduler run its reported hours triggered.
#[derive(Debug, Clone, Serialize)]
pub struct SavedTask {
  pub task:          Task,
  pub scheduler_run: Option<SchedulerRun>,
}

/// Abstraction over a Parc store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ParcStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  fn add_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// List users, optionally restricted to one role.
  fn list_users(
    &self,
    role: Option<Role>,
  ) -> impl Future<Output = Result<Vec<User>, Self::Error>> + Send + '_;

  /// Activate or deactivate a user. Inactive users receive no broadcasts.
  fn set_user_active(
    &self,
    id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<User, Self::Error>> + Send + '_;

  // ── OIs ───────────────────────────────────────────────────────────────

  fn add_oi(
    &self,
    input: NewOi,
  ) -> impl Future<Output = Result<Oi, Self::Error>> + Send + '_;

  fn get_oi(
    &self,
    id: String,
  ) -> impl Future<Output = Result<Option<Oi>, Self::Error>> + Send + '_;

  /// All OIs, ordered by display value.
  fn list_ois(&self) -> impl Future<Output = Result<Vec<Oi>, Self::Error>> + Send + '_;

  /// Record a new cumulative hours total for an OI and run the scheduler.
  ///
  /// The total overwrites the previous one. The scheduler always runs, even
  /// when the total is unchanged; it is idempotent for unchanged inputs.
  fn on_hours_updated(
    &self,
    oi_id: String,
    new_total_hours: Decimal,
  ) -> impl Future<Output = Result<SchedulerRun, Self::Error>> + Send + '_;

  /// Record a cycle visit on behalf of a Chef de Parc and notify every
  /// active Admin.
  fn record_cycle_visit(
    &self,
    actor: Uuid,
    oi_id: String,
    visit: CycleVisit,
  ) -> impl Future<Output = Result<Oi, Self::Error>> + Send + '_;

  // ── Templates ─────────────────────────────────────────────────────────

  /// Add a checklist item. Rejects zero trigger hours and duplicate
  /// (OI, trigger hours, description) triples.
  fn add_template(
    &self,
    input: NewTemplate,
  ) -> impl Future<Output = Result<PreventiveTaskTemplate, Self::Error>> + Send + '_;

  /// Templates of one OI, by trigger hours then creation order.
  fn list_templates(
    &self,
    oi_id: String,
  ) -> impl Future<Output = Result<Vec<PreventiveTaskTemplate>, Self::Error>> + Send + '_;

  fn delete_template(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Tasks ─────────────────────────────────────────────────────────────

  /// Create a work order on behalf of `actor`. If the task reports hours that
  /// differ from the OI's total, the OI is updated and the scheduler runs in
  /// the same transaction.
  fn create_task(
    &self,
    actor: Uuid,
    input: NewTask,
  ) -> impl Future<Output = Result<SavedTask, Self::Error>> + Send + '_;

  /// Apply `update` on behalf of `actor`, following the status workflow.
  /// Hours propagate to the OI exactly as in [`Self::create_task`].
  fn update_task(
    &self,
    actor: Uuid,
    task_id: Uuid,
    update: TaskUpdate,
  ) -> impl Future<Output = Result<SavedTask, Self::Error>> + Send + '_;

  fn get_task(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Task>, Self::Error>> + Send + '_;

  /// Tasks visible to `actor`, newest first: all of them for an Admin, only
  /// those assigned to a Chef de Parc for that Chef.
  fn list_tasks(
    &self,
    actor: Uuid,
  ) -> impl Future<Output = Result<Vec<Task>, Self::Error>> + Send + '_;

  /// Record a completed preventive checklist as a closed `preventif` task
  /// and notify every other active Admin.
  fn submit_checklist(
    &self,
    actor: Uuid,
    submission: ChecklistSubmission,
  ) -> impl Future<Output = Result<Task, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  /// Notifications addressed to `user`, newest first.
  fn list_notifications(
    &self,
    user: Uuid,
    unread_only: bool,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Send a free-form message from an Admin to one user.
  fn send_notification(
    &self,
    actor: Uuid,
    recipient: Uuid,
    message: String,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Mark one of `user`'s notifications as read.
  fn mark_read(
    &self,
    user: Uuid,
    notification_id: Uuid,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Mark all of `user`'s unread notifications as read; returns how many.
  fn mark_all_read(
    &self,
    user: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
