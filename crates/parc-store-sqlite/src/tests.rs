//! Integration tests for `SqliteStore`, mostly against an in-memory database.

use chrono::{Days, NaiveDate, Utc};
use parc_core::{
  notification::NotificationCategory,
  oi::NewOi,
  schedule::Outcome,
  store::ParcStore,
  task::{ChecklistItem, ChecklistSubmission, NewTask, TaskKind, TaskStatus, TaskUpdate},
  template::NewTemplate,
  user::{NewUser, Role, User},
  visit::CycleVisit,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn hours(h: i64) -> Decimal { Decimal::from(h) }

async fn user(s: &SqliteStore, username: &str, role: Role) -> User {
  s.add_user(NewUser {
    username: username.into(),
    name: username.to_uppercase(),
    role,
  })
  .await
  .unwrap()
}

async fn oi(s: &SqliteStore, id: &str) -> String {
  s.add_oi(NewOi { id: id.into(), value: format!("Engin {id}"), next_cycle_visit: None })
    .await
    .unwrap();
  id.to_owned()
}

async fn template(s: &SqliteStore, oi_id: &str, trigger_hours: u32, description: &str) {
  s.add_template(NewTemplate {
    oi_id: oi_id.into(),
    trigger_hours,
    title: format!("Entretien {trigger_hours}h"),
    description: description.into(),
  })
  .await
  .unwrap();
}

/// An OI with checklist items at 200h and 400h.
async fn configured_oi(s: &SqliteStore) -> String {
  let id = oi(s, "OI-1").await;
  template(s, &id, 200, "Graisser les articulations").await;
  template(s, &id, 200, "Contrôler les niveaux").await;
  template(s, &id, 400, "Changer le filtre à huile").await;
  id
}

// ─── Users and OIs ───────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_list_users_by_role() {
  let s = store().await;
  user(&s, "alice", Role::Admin).await;
  user(&s, "bruno", Role::ChefDeParc).await;
  user(&s, "chloe", Role::ChefDeParc).await;

  assert_eq!(s.list_users(None).await.unwrap().len(), 3);
  let chefs = s.list_users(Some(Role::ChefDeParc)).await.unwrap();
  assert_eq!(chefs.len(), 2);
  assert!(chefs.iter().all(|u| u.role == Role::ChefDeParc));
}

#[tokio::test]
async fn duplicate_username_rejected() {
  let s = store().await;
  user(&s, "alice", Role::Admin).await;
  let err = s
    .add_user(NewUser { username: "alice".into(), name: "A".into(), role: Role::ChefDeParc })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateUsername(_)));
}

#[tokio::test]
async fn new_oi_starts_at_zero() {
  let s = store().await;
  let id = oi(&s, "OI-9").await;
  let fetched = s.get_oi(id).await.unwrap().unwrap();
  assert_eq!(fetched.total_hours_of_work, Decimal::ZERO);
  assert_eq!(fetched.last_notified_threshold, None);
  assert!(s.get_oi("missing".into()).await.unwrap().is_none());
}

#[tokio::test]
async fn new_oi_keeps_first_visit_date() {
  let s = store().await;
  let due = NaiveDate::from_ymd_opt(2031, 3, 1).unwrap();
  s.add_oi(NewOi { id: "OI-5".into(), value: "Grue".into(), next_cycle_visit: Some(due) })
    .await
    .unwrap();
  let fetched = s.get_oi("OI-5".into()).await.unwrap().unwrap();
  assert_eq!(fetched.next_cycle_visit, Some(due));
  assert_eq!(fetched.last_cycle_visit, None);
  assert_eq!(fetched.last_visit_accepted, None);
}

#[tokio::test]
async fn duplicate_oi_value_rejected() {
  let s = store().await;
  oi(&s, "OI-1").await;
  let err = s
    .add_oi(NewOi {
      id:               "OI-2".into(),
      value:            "Engin OI-1".into(),
      next_cycle_visit: None,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateOi { .. }));
}

// ─── Templates ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_template_rejected() {
  let s = store().await;
  let id = configured_oi(&s).await;
  let err = s
    .add_template(NewTemplate {
      oi_id:         id.clone(),
      trigger_hours: 200,
      title:         "Autre titre".into(),
      description:   "Contrôler les niveaux".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::DuplicateTemplate { trigger_hours: 200, .. }));
  assert_eq!(s.list_templates(id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn zero_trigger_template_rejected() {
  let s = store().await;
  let id = oi(&s, "OI-1").await;
  let err = s
    .add_template(NewTemplate {
      oi_id:         id,
      trigger_hours: 0,
      title:         "x".into(),
      description:   "x".into(),
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(parc_core::Error::NonPositiveTriggerHours)));
}

#[tokio::test]
async fn templates_listed_by_trigger_hours() {
  let s = store().await;
  let id = oi(&s, "OI-1").await;
  template(&s, &id, 400, "b").await;
  template(&s, &id, 200, "a").await;
  let listed: Vec<_> = s
    .list_templates(id)
    .await
    .unwrap()
    .into_iter()
    .map(|t| t.trigger_hours)
    .collect();
  assert_eq!(listed, [200, 400]);
}

// ─── Scheduler host ──────────────────────────────────────────────────────────

#[tokio::test]
async fn no_templates_no_side_effects() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let id = oi(&s, "OI-1").await;

  let run = s.on_hours_updated(id, hours(5000)).await.unwrap();
  assert_eq!(run.outcome, Outcome::NoTemplates);
  assert!(run.notifications.is_empty());
  assert_eq!(run.oi.last_notified_threshold, None);
  assert_eq!(run.oi.total_hours_of_work, hours(5000));
  assert!(s.list_notifications(admin.user_id, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn warning_line_crossing_notifies_every_role_holder() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let id = configured_oi(&s).await;

  let run = s.on_hours_updated(id.clone(), hours(180)).await.unwrap();
  assert_eq!(
    run.outcome,
    Outcome::Notified { threshold: 200, template_trigger_hours: 200, recipients: 2 }
  );
  assert_eq!(run.oi.last_notified_threshold, Some(200));

  let stored = s.get_oi(id.clone()).await.unwrap().unwrap();
  assert_eq!(stored.last_notified_threshold, Some(200));
  assert_eq!(stored.total_hours_of_work, hours(180));

  for recipient in [&admin, &chef] {
    let inbox = s.list_notifications(recipient.user_id, false).await.unwrap();
    assert_eq!(inbox.len(), 1);
    let n = &inbox[0];
    assert_eq!(n.category, NotificationCategory::PreventiveChecklist);
    assert_eq!(n.oi_id.as_deref(), Some(id.as_str()));
    assert_eq!(n.recipient_role, recipient.role);
    assert!(n.message.contains("- Graisser les articulations\n- Contrôler les niveaux"));
    assert!(!n.read);
  }
}

#[tokio::test]
async fn repeat_update_is_idempotent() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let id = configured_oi(&s).await;

  s.on_hours_updated(id.clone(), hours(180)).await.unwrap();
  let again = s.on_hours_updated(id, hours(180)).await.unwrap();

  assert_eq!(again.outcome, Outcome::NothingEligible);
  assert!(again.notifications.is_empty());
  assert_eq!(again.oi.last_notified_threshold, Some(200));
  assert_eq!(s.list_notifications(admin.user_id, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn large_jump_announces_thresholds_in_order() {
  let s = store().await;
  user(&s, "alice", Role::Admin).await;
  let id = configured_oi(&s).await;

  let mut announced = Vec::new();
  let mut previous = None;
  loop {
    let run = s.on_hours_updated(id.clone(), hours(1980)).await.unwrap();
    assert!(run.oi.last_notified_threshold >= previous);
    previous = run.oi.last_notified_threshold;
    match run.outcome {
      Outcome::Notified { threshold, .. } => announced.push(threshold),
      Outcome::NothingEligible => break,
      other => panic!("unexpected outcome {other:?}"),
    }
  }

  assert_eq!(announced, [200, 400, 1800, 2000]);
}

#[tokio::test]
async fn no_recipients_keeps_threshold_retryable() {
  let s = store().await;
  let id = configured_oi(&s).await;

  let run = s.on_hours_updated(id.clone(), hours(180)).await.unwrap();
  assert_eq!(run.outcome, Outcome::NoRecipients { threshold: 200 });
  assert_eq!(run.oi.last_notified_threshold, None);

  // Once someone holds a role, the same threshold fires.
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let run = s.on_hours_updated(id, hours(180)).await.unwrap();
  assert!(matches!(run.outcome, Outcome::Notified { threshold: 200, .. }));
  assert_eq!(s.list_notifications(chef.user_id, false).await.unwrap().len(), 1);
}

#[tokio::test]
async fn inactive_users_are_skipped() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  s.set_user_active(admin.user_id, false).await.unwrap();
  let id = configured_oi(&s).await;

  let run = s.on_hours_updated(id, hours(180)).await.unwrap();
  assert_eq!(run.outcome, Outcome::NoRecipients { threshold: 200 });
}

#[tokio::test]
async fn templateless_threshold_advances_without_notifying() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let id = oi(&s, "OI-1").await;
  // 2000 remaps to offset 400, which has no checklist of its own.
  template(&s, &id, 2000, "Révision générale").await;

  let run = s.on_hours_updated(id.clone(), hours(1800)).await.unwrap();
  assert_eq!(run.outcome, Outcome::MarkedWithoutTemplates { threshold: 2000 });
  assert!(run.notifications.is_empty());
  assert_eq!(
    s.get_oi(id).await.unwrap().unwrap().last_notified_threshold,
    Some(2000)
  );
  assert!(s.list_notifications(admin.user_id, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_templates_stops_warnings() {
  let s = store().await;
  user(&s, "alice", Role::Admin).await;
  let id = oi(&s, "OI-1").await;
  template(&s, &id, 200, "Graisser").await;

  let templates = s.list_templates(id.clone()).await.unwrap();
  s.delete_template(templates[0].template_id).await.unwrap();

  let run = s.on_hours_updated(id, hours(180)).await.unwrap();
  assert_eq!(run.outcome, Outcome::NoTemplates);

  let err = s.delete_template(templates[0].template_id).await.unwrap_err();
  assert!(matches!(err, Error::TemplateNotFound(_)));
}

#[tokio::test]
async fn negative_hours_rejected_without_writing() {
  let s = store().await;
  let id = configured_oi(&s).await;
  s.on_hours_updated(id.clone(), hours(50)).await.unwrap();

  let err = s.on_hours_updated(id.clone(), hours(-1)).await.unwrap_err();
  assert!(matches!(err, Error::Core(parc_core::Error::HoursOutOfRange(_))));
  assert_eq!(s.get_oi(id).await.unwrap().unwrap().total_hours_of_work, hours(50));
}

#[tokio::test]
async fn overly_precise_hours_rejected_without_writing() {
  let s = store().await;
  let id = configured_oi(&s).await;
  s.on_hours_updated(id.clone(), Decimal::new(5025, 2)).await.unwrap();

  let err = s
    .on_hours_updated(id.clone(), Decimal::new(1_234_567, 6))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(parc_core::Error::HoursPrecision(_))));
  assert_eq!(
    s.get_oi(id).await.unwrap().unwrap().total_hours_of_work,
    Decimal::new(5025, 2)
  );
}

#[tokio::test]
async fn concurrent_updates_from_two_connections_notify_once() {
  let dir = tempfile::TempDir::new().unwrap();
  let path = dir.path().join("parc.db");
  let first = SqliteStore::open(&path).await.unwrap();
  let admin = user(&first, "alice", Role::Admin).await;
  let id = configured_oi(&first).await;
  let second = SqliteStore::open(&path).await.unwrap();

  let (a, b) = tokio::join!(
    first.on_hours_updated(id.clone(), hours(180)),
    second.on_hours_updated(id.clone(), hours(180)),
  );
  let outcomes = [a.unwrap().outcome, b.unwrap().outcome];
  let notified = outcomes
    .iter()
    .filter(|o| matches!(o, Outcome::Notified { threshold: 200, .. }))
    .count();
  assert_eq!(notified, 1, "outcomes: {outcomes:?}");
  assert!(outcomes.contains(&Outcome::NothingEligible));

  assert_eq!(first.list_notifications(admin.user_id, false).await.unwrap().len(), 1);
  assert_eq!(
    second.get_oi(id).await.unwrap().unwrap().last_notified_threshold,
    Some(200)
  );
}

#[tokio::test]
async fn unknown_oi_is_an_error() {
  let s = store().await;
  let err = s.on_hours_updated("nope".into(), hours(10)).await.unwrap_err();
  assert!(matches!(err, Error::OiNotFound(_)));
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

fn new_task(oi_id: &str) -> NewTask {
  NewTask {
    oi_id: Some(oi_id.into()),
    description: "Vidange".into(),
    ..NewTask::default()
  }
}

#[tokio::test]
async fn admin_task_requires_chef_assignee() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let id = oi(&s, "OI-1").await;

  let err = s.create_task(admin.user_id, new_task(&id)).await.unwrap_err();
  assert!(matches!(err, Error::Core(parc_core::Error::MissingAssignee)));
}

#[tokio::test]
async fn admin_task_notifies_assignee() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let id = oi(&s, "OI-1").await;

  let saved = s
    .create_task(admin.user_id, NewTask { assigned_to: Some(chef.user_id), ..new_task(&id) })
    .await
    .unwrap();
  assert_eq!(saved.task.display_id, "ORDT-1");
  assert_eq!(saved.task.status, TaskStatus::Assigned);
  assert_eq!(saved.task.assigned_to, Some(chef.user_id));
  assert!(saved.scheduler_run.is_none());

  let inbox = s.list_notifications(chef.user_id, false).await.unwrap();
  assert_eq!(inbox.len(), 1);
  assert_eq!(inbox[0].category, NotificationCategory::Task);
  assert_eq!(inbox[0].task_id, Some(saved.task.task_id));
}

#[tokio::test]
async fn chef_workflow_through_close() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let id = oi(&s, "OI-1").await;

  let created = s
    .create_task(admin.user_id, NewTask { assigned_to: Some(chef.user_id), ..new_task(&id) })
    .await
    .unwrap()
    .task;

  let started = s
    .update_task(chef.user_id, created.task_id, TaskUpdate::default())
    .await
    .unwrap()
    .task;
  assert_eq!(started.status, TaskStatus::InProgress);

  let closed = s
    .update_task(
      chef.user_id,
      created.task_id,
      TaskUpdate { status: Some(TaskStatus::Closed), ..TaskUpdate::default() },
    )
    .await
    .unwrap()
    .task;
  assert_eq!(closed.status, TaskStatus::Closed);
  assert!(closed.closed_at.is_some());

  // Admin heard about the start and the close.
  let inbox = s.list_notifications(admin.user_id, false).await.unwrap();
  assert_eq!(inbox.len(), 2);
  assert!(inbox[0].message.contains("clôturé"));

  let reopened = s
    .update_task(
      admin.user_id,
      created.task_id,
      TaskUpdate { status: Some(TaskStatus::InProgress), ..TaskUpdate::default() },
    )
    .await
    .unwrap()
    .task;
  assert!(reopened.closed_at.is_none());
}

#[tokio::test]
async fn chef_cannot_update_foreign_task() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let owner = user(&s, "bruno", Role::ChefDeParc).await;
  let other = user(&s, "chloe", Role::ChefDeParc).await;
  let id = oi(&s, "OI-1").await;

  let task = s
    .create_task(admin.user_id, NewTask { assigned_to: Some(owner.user_id), ..new_task(&id) })
    .await
    .unwrap()
    .task;

  let err = s
    .update_task(other.user_id, task.task_id, TaskUpdate::default())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(parc_core::Error::Forbidden(_))));
}

#[tokio::test]
async fn task_hours_drive_the_scheduler() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let id = configured_oi(&s).await;

  let saved = s
    .create_task(chef.user_id, NewTask { hours_of_work: Some(hours(185)), ..new_task(&id) })
    .await
    .unwrap();
  assert_eq!(saved.task.status, TaskStatus::InProgress);
  let run = saved.scheduler_run.expect("hours changed");
  assert!(matches!(run.outcome, Outcome::Notified { threshold: 200, .. }));
  assert_eq!(run.oi.total_hours_of_work, hours(185));

  // Same hours again: no propagation, no new run.
  let again = s
    .update_task(
      chef.user_id,
      saved.task.task_id,
      TaskUpdate { hours_of_work: Some(Decimal::new(185_00, 2)), ..TaskUpdate::default() },
    )
    .await
    .unwrap();
  assert!(again.scheduler_run.is_none());

  // One task notice plus one checklist for the admin.
  let categories: Vec<_> = s
    .list_notifications(admin.user_id, false)
    .await
    .unwrap()
    .into_iter()
    .map(|n| n.category)
    .collect();
  assert_eq!(categories.len(), 2);
  assert!(categories.contains(&NotificationCategory::Task));
  assert!(categories.contains(&NotificationCategory::PreventiveChecklist));
}

#[tokio::test]
async fn display_ids_are_sequential() {
  let s = store().await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let id = oi(&s, "OI-1").await;

  for expected in ["ORDT-1", "ORDT-2", "ORDT-3"] {
    let task = s.create_task(chef.user_id, new_task(&id)).await.unwrap().task;
    assert_eq!(task.display_id, expected);
    let fetched = s.get_task(task.task_id).await.unwrap().unwrap();
    assert_eq!(fetched.display_id, expected);
  }
}

#[tokio::test]
async fn task_listing_is_scoped_by_role() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let bruno = user(&s, "bruno", Role::ChefDeParc).await;
  let chloe = user(&s, "chloe", Role::ChefDeParc).await;
  let id = oi(&s, "OI-1").await;

  let first = s.create_task(bruno.user_id, new_task(&id)).await.unwrap().task;
  let foreign = s.create_task(chloe.user_id, new_task(&id)).await.unwrap().task;
  let second = s
    .create_task(admin.user_id, NewTask { assigned_to: Some(bruno.user_id), ..new_task(&id) })
    .await
    .unwrap()
    .task;

  let all: Vec<_> = s
    .list_tasks(admin.user_id)
    .await
    .unwrap()
    .into_iter()
    .map(|t| t.display_id)
    .collect();
  assert_eq!(all, ["ORDT-3", "ORDT-2", "ORDT-1"]);

  let own: Vec<_> = s
    .list_tasks(bruno.user_id)
    .await
    .unwrap()
    .into_iter()
    .map(|t| t.task_id)
    .collect();
  assert_eq!(own, [second.task_id, first.task_id]);
  assert!(!own.contains(&foreign.task_id));

  let err = s.list_tasks(Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::UserNotFound(_)));
}

// ─── Checklists and cycle visits ─────────────────────────────────────────────

fn submission(oi_id: &str) -> ChecklistSubmission {
  ChecklistSubmission {
    oi_id: oi_id.into(),
    items: vec![
      ChecklistItem { description: "Graisser les articulations".into(), completed: true },
      ChecklistItem { description: "Contrôler les niveaux".into(), completed: false },
    ],
    notes: Some("Fuite légère".into()),
  }
}

#[tokio::test]
async fn checklist_submission_closes_a_preventive_task() {
  let s = store().await;
  let alice = user(&s, "alice", Role::Admin).await;
  let denis = user(&s, "denis", Role::Admin).await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let id = oi(&s, "OI-1").await;

  let task = s.submit_checklist(chef.user_id, submission(&id)).await.unwrap();
  assert_eq!(task.kind, TaskKind::Preventif);
  assert_eq!(task.status, TaskStatus::Closed);
  assert!(task.closed_at.is_some());
  assert_eq!(task.assigned_to, Some(chef.user_id));
  assert_eq!(
    task.description,
    "Maintenance Préventive Effectuée (Checklist):\n\
     [X] Graisser les articulations\n\
     [ ] Contrôler les niveaux\n\nNotes: Fuite légère"
  );
  let stored = s.get_task(task.task_id).await.unwrap().unwrap();
  assert_eq!(stored.description, task.description);
  assert_eq!(stored.status, TaskStatus::Closed);

  for admin in [&alice, &denis] {
    let inbox = s.list_notifications(admin.user_id, false).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].category, NotificationCategory::Task);
    assert_eq!(inbox[0].task_id, Some(task.task_id));
  }
  assert!(s.list_notifications(chef.user_id, false).await.unwrap().is_empty());

  // An admin submitting is not told about their own checklist.
  let own = s.submit_checklist(alice.user_id, submission(&id)).await.unwrap();
  assert_eq!(own.assigned_to, None);
  assert_eq!(s.list_notifications(alice.user_id, false).await.unwrap().len(), 1);
  assert_eq!(s.list_notifications(denis.user_id, false).await.unwrap().len(), 2);
}

#[tokio::test]
async fn empty_checklist_rejected() {
  let s = store().await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let id = oi(&s, "OI-1").await;

  let err = s
    .submit_checklist(chef.user_id, ChecklistSubmission { items: Vec::new(), ..submission(&id) })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(parc_core::Error::EmptyChecklist)));
  assert!(s.list_tasks(chef.user_id).await.unwrap().is_empty());

  let err = s
    .submit_checklist(chef.user_id, submission("missing"))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::OiNotFound(_)));
}

fn visit(accepted: bool) -> CycleVisit {
  let today = Utc::now().date_naive();
  CycleVisit {
    accepted,
    performed_on: today,
    next_visit: today.checked_add_days(Days::new(90)).unwrap(),
  }
}

#[tokio::test]
async fn cycle_visit_updates_oi_and_notifies_admins() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let id = oi(&s, "OI-1").await;

  let v = visit(false);
  let updated = s.record_cycle_visit(chef.user_id, id.clone(), v).await.unwrap();
  assert_eq!(updated.last_visit_accepted, Some(false));
  assert_eq!(updated.last_cycle_visit, Some(v.performed_on));
  assert_eq!(updated.next_cycle_visit, Some(v.next_visit));
  let stored = s.get_oi(id.clone()).await.unwrap().unwrap();
  assert_eq!(stored.last_visit_accepted, Some(false));
  assert_eq!(stored.next_cycle_visit, Some(v.next_visit));

  let inbox = s.list_notifications(admin.user_id, false).await.unwrap();
  assert_eq!(inbox.len(), 1);
  assert_eq!(inbox[0].category, NotificationCategory::CycleVisit);
  assert_eq!(inbox[0].oi_id.as_deref(), Some(id.as_str()));
  assert!(inbox[0].message.contains("échouée par BRUNO"));
  assert!(s.list_notifications(chef.user_id, false).await.unwrap().is_empty());
}

#[tokio::test]
async fn cycle_visit_rules() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let id = oi(&s, "OI-1").await;

  let err = s
    .record_cycle_visit(admin.user_id, id.clone(), visit(true))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(parc_core::Error::Forbidden(_))));

  let today = Utc::now().date_naive();
  let overdue = CycleVisit {
    next_visit: today.checked_sub_days(Days::new(1)).unwrap(),
    ..visit(true)
  };
  let err = s.record_cycle_visit(chef.user_id, id.clone(), overdue).await.unwrap_err();
  assert!(matches!(err, Error::Core(parc_core::Error::NextVisitInPast(_))));

  let err = s
    .record_cycle_visit(chef.user_id, "missing".into(), visit(true))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::OiNotFound(_)));

  let untouched = s.get_oi(id).await.unwrap().unwrap();
  assert_eq!(untouched.last_cycle_visit, None);
  assert!(s.list_notifications(admin.user_id, false).await.unwrap().is_empty());
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_sends_a_direct_notification() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;

  let sent = s
    .send_notification(admin.user_id, chef.user_id, "Réunion demain 8h".into())
    .await
    .unwrap();
  assert_eq!(sent.category, NotificationCategory::General);
  assert_eq!(sent.recipient_role, Role::ChefDeParc);
  let inbox = s.list_notifications(chef.user_id, false).await.unwrap();
  assert_eq!(inbox.len(), 1);
  assert_eq!(inbox[0].notification_id, sent.notification_id);
  assert_eq!(inbox[0].message, "Réunion demain 8h");

  let err = s
    .send_notification(chef.user_id, admin.user_id, "Bonjour".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(parc_core::Error::Forbidden(_))));

  let err = s
    .send_notification(admin.user_id, Uuid::new_v4(), "Bonjour".into())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::UserNotFound(_)));
}

#[tokio::test]
async fn mark_read_and_mark_all_read() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let chef = user(&s, "bruno", Role::ChefDeParc).await;
  let id = configured_oi(&s).await;

  s.on_hours_updated(id.clone(), hours(180)).await.unwrap();
  s.on_hours_updated(id, hours(360)).await.unwrap();

  let inbox = s.list_notifications(admin.user_id, false).await.unwrap();
  assert_eq!(inbox.len(), 2);
  assert!(inbox[0].message.contains("400h"));

  let marked = s.mark_read(admin.user_id, inbox[0].notification_id).await.unwrap();
  assert!(marked.read);
  assert_eq!(s.list_notifications(admin.user_id, true).await.unwrap().len(), 1);

  // Someone else's notification is invisible.
  let err = s.mark_read(chef.user_id, inbox[1].notification_id).await.unwrap_err();
  assert!(matches!(err, Error::NotificationNotFound(_)));

  assert_eq!(s.mark_all_read(admin.user_id).await.unwrap(), 1);
  assert!(s.list_notifications(admin.user_id, true).await.unwrap().is_empty());
  assert_eq!(s.mark_all_read(chef.user_id).await.unwrap(), 2);
}

#[tokio::test]
async fn mark_read_unknown_notification() {
  let s = store().await;
  let admin = user(&s, "alice", Role::Admin).await;
  let err = s.mark_read(admin.user_id, Uuid::new_v4()).await.unwrap_err();
  assert!(matches!(err, Error::NotificationNotFound(_)));
}
