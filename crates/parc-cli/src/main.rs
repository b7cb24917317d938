//! `parc` — command-line host for the Parc fleet maintenance store.
//!
//! Reads `parc.toml` (or the path given with `--config`) and `PARC_*`
//! environment variables, opens the SQLite store, runs one command and prints
//! its result as JSON.
//!
//! # Usage
//!
//! ```text
//! parc oi add OI-12 "Chargeuse CAT 966"
//! parc template add OI-12 200 "Entretien 200h" "Graisser les articulations"
//! parc oi hours OI-12 181.5
//! parc oi visit OI-12 --as <CHEF_ID> --next 2026-01-15
//! parc task checklist OI-12 --as <CHEF_ID> --done "Graisser" --todo "Vidange"
//! parc notifications list <USER_ID> --unread
//! ```

mod settings;

use std::path::PathBuf;

use anyhow::Context as _;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use parc_core::{
  oi::NewOi,
  store::ParcStore,
  task::{ChecklistItem, ChecklistSubmission, NewTask, TaskKind, TaskStatus, TaskUpdate},
  template::NewTemplate,
  user::{NewUser, Role},
  visit::CycleVisit,
};
use parc_store_sqlite::SqliteStore;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::settings::ParcConfig;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "parc", version, about = "Fleet preventive maintenance")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "parc.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Manage Admins and Chefs de Parc.
  #[command(subcommand)]
  User(UserCommand),
  /// Manage OIs and record their operating hours.
  #[command(subcommand)]
  Oi(OiCommand),
  /// Manage preventive checklist templates.
  #[command(subcommand)]
  Template(TemplateCommand),
  /// Create and move work orders.
  #[command(subcommand)]
  Task(TaskCommand),
  /// Read a user's notifications.
  #[command(subcommand)]
  Notifications(NotificationCommand),
}

#[derive(Subcommand)]
enum UserCommand {
  Add {
    username: String,
    name:     String,
    #[arg(value_enum)]
    role:     RoleArg,
  },
  List {
    #[arg(long, value_enum)]
    role: Option<RoleArg>,
  },
  Activate { user_id: Uuid },
  Deactivate { user_id: Uuid },
}

#[derive(Subcommand)]
enum OiCommand {
  Add {
    id:         String,
    value:      String,
    /// Date of the first cycle visit.
    #[arg(long)]
    next_visit: Option<NaiveDate>,
  },
  List,
  Show { id: String },
  /// Overwrite the cumulative hours and run the preventive scheduler.
  Hours { id: String, hours: Decimal },
  /// Record a cycle visit and schedule the next one.
  Visit {
    id:        String,
    #[arg(long = "as")]
    actor:     Uuid,
    /// The OI failed the visit.
    #[arg(long)]
    failed:    bool,
    /// Defaults to today.
    #[arg(long)]
    performed: Option<NaiveDate>,
    #[arg(long)]
    next:      NaiveDate,
  },
}

#[derive(Subcommand)]
enum TemplateCommand {
  Add {
    oi_id:         String,
    trigger_hours: u32,
    title:         String,
    description:   String,
  },
  List { oi_id: String },
  Delete { template_id: Uuid },
}

#[derive(Subcommand)]
enum TaskCommand {
  Create {
    /// The acting user.
    #[arg(long = "as")]
    actor:           Uuid,
    description:     String,
    #[arg(long)]
    oi:              Option<String>,
    #[arg(long, value_enum, default_value = "preventif")]
    kind:            KindArg,
    #[arg(long)]
    assign:          Option<Uuid>,
    #[arg(long)]
    hours:           Option<Decimal>,
    #[arg(long)]
    estimated_hours: Option<Decimal>,
    #[arg(long)]
    start:           Option<NaiveDate>,
    #[arg(long)]
    end:             Option<NaiveDate>,
  },
  Update {
    #[arg(long = "as")]
    actor:           Uuid,
    task_id:         Uuid,
    #[arg(long, value_enum)]
    status:          Option<StatusArg>,
    #[arg(long)]
    description:     Option<String>,
    #[arg(long)]
    hours:           Option<Decimal>,
    #[arg(long)]
    estimated_hours: Option<Decimal>,
    #[arg(long)]
    start:           Option<NaiveDate>,
    #[arg(long)]
    end:             Option<NaiveDate>,
  },
  Show { task_id: Uuid },
  /// Tasks visible to the acting user, newest first.
  List {
    #[arg(long = "as")]
    actor: Uuid,
  },
  /// Record a completed preventive checklist as a closed task.
  Checklist {
    oi_id: String,
    #[arg(long = "as")]
    actor: Uuid,
    /// A checked item; repeatable.
    #[arg(long)]
    done:  Vec<String>,
    /// An unchecked item; repeatable.
    #[arg(long)]
    todo:  Vec<String>,
    #[arg(long)]
    notes: Option<String>,
  },
}

#[derive(Subcommand)]
enum NotificationCommand {
  List {
    user_id: Uuid,
    #[arg(long)]
    unread:  bool,
  },
  Read { user_id: Uuid, notification_id: Uuid },
  ReadAll { user_id: Uuid },
  /// Send a direct message from an Admin.
  Send {
    #[arg(long = "as")]
    actor:     Uuid,
    recipient: Uuid,
    message:   String,
  },
}

#[derive(Clone, Copy, ValueEnum)]
enum RoleArg {
  Admin,
  Chef,
}

impl From<RoleArg> for Role {
  fn from(arg: RoleArg) -> Self {
    match arg {
      RoleArg::Admin => Role::Admin,
      RoleArg::Chef => Role::ChefDeParc,
    }
  }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
  Preventif,
  Curatif,
  VisiteHierarchique,
}

impl From<KindArg> for TaskKind {
  fn from(arg: KindArg) -> Self {
    match arg {
      KindArg::Preventif => TaskKind::Preventif,
      KindArg::Curatif => TaskKind::Curatif,
      KindArg::VisiteHierarchique => TaskKind::VisiteHierarchique,
    }
  }
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
  Assigned,
  InProgress,
  Closed,
}

impl From<StatusArg> for TaskStatus {
  fn from(arg: StatusArg) -> Self {
    match arg {
      StatusArg::Assigned => TaskStatus::Assigned,
      StatusArg::InProgress => TaskStatus::InProgress,
      StatusArg::Closed => TaskStatus::Closed,
    }
  }
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Logs go to stderr; stdout carries the JSON result.
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let cfg = ParcConfig::load(&cli.config)?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  match cli.command {
    Command::User(cmd) => run_user(&store, cmd).await,
    Command::Oi(cmd) => run_oi(&store, cmd).await,
    Command::Template(cmd) => run_template(&store, cmd).await,
    Command::Task(cmd) => run_task(&store, cmd).await,
    Command::Notifications(cmd) => run_notifications(&store, cmd).await,
  }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  let out = serde_json::to_string_pretty(value).context("failed to serialise output")?;
  println!("{out}");
  Ok(())
}

// ─── Commands ─────────────────────────────────────────────────────────────────

async fn run_user<S: ParcStore>(store: &S, cmd: UserCommand) -> anyhow::Result<()> {
  match cmd {
    UserCommand::Add { username, name, role } => {
      let user = store
        .add_user(NewUser { username, name, role: role.into() })
        .await
        .context("failed to add user")?;
      print_json(&user)
    }
    UserCommand::List { role } => {
      let users = store
        .list_users(role.map(Role::from))
        .await
        .context("failed to list users")?;
      print_json(&users)
    }
    UserCommand::Activate { user_id } => {
      let user = store
        .set_user_active(user_id, true)
        .await
        .with_context(|| format!("failed to activate user {user_id}"))?;
      print_json(&user)
    }
    UserCommand::Deactivate { user_id } => {
      let user = store
        .set_user_active(user_id, false)
        .await
        .with_context(|| format!("failed to deactivate user {user_id}"))?;
      print_json(&user)
    }
  }
}

async fn run_oi<S: ParcStore>(store: &S, cmd: OiCommand) -> anyhow::Result<()> {
  match cmd {
    OiCommand::Add { id, value, next_visit } => {
      let oi = store
        .add_oi(NewOi { id, value, next_cycle_visit: next_visit })
        .await
        .context("failed to add OI")?;
      print_json(&oi)
    }
    OiCommand::List => {
      let ois = store.list_ois().await.context("failed to list OIs")?;
      print_json(&ois)
    }
    OiCommand::Show { id } => {
      let oi = store
        .get_oi(id.clone())
        .await
        .with_context(|| format!("failed to load OI {id}"))?
        .with_context(|| format!("OI not found: {id}"))?;
      print_json(&oi)
    }
    OiCommand::Hours { id, hours } => {
      let run = store
        .on_hours_updated(id.clone(), hours)
        .await
        .with_context(|| format!("failed to record hours for OI {id}"))?;
      print_json(&run)
    }
    OiCommand::Visit { id, actor, failed, performed, next } => {
      let visit = CycleVisit {
        accepted:     !failed,
        performed_on: performed.unwrap_or_else(|| Utc::now().date_naive()),
        next_visit:   next,
      };
      let oi = store
        .record_cycle_visit(actor, id.clone(), visit)
        .await
        .with_context(|| format!("failed to record cycle visit for OI {id}"))?;
      print_json(&oi)
    }
  }
}

async fn run_template<S: ParcStore>(store: &S, cmd: TemplateCommand) -> anyhow::Result<()> {
  match cmd {
    TemplateCommand::Add { oi_id, trigger_hours, title, description } => {
      let template = store
        .add_template(NewTemplate { oi_id, trigger_hours, title, description })
        .await
        .context("failed to add template")?;
      print_json(&template)
    }
    TemplateCommand::List { oi_id } => {
      let templates = store
        .list_templates(oi_id.clone())
        .await
        .with_context(|| format!("failed to list templates for OI {oi_id}"))?;
      print_json(&templates)
    }
    TemplateCommand::Delete { template_id } => {
      store
        .delete_template(template_id)
        .await
        .with_context(|| format!("failed to delete template {template_id}"))?;
      print_json(&serde_json::json!({ "deleted": template_id }))
    }
  }
}

async fn run_task<S: ParcStore>(store: &S, cmd: TaskCommand) -> anyhow::Result<()> {
  match cmd {
    TaskCommand::Create {
      actor,
      description,
      oi,
      kind,
      assign,
      hours,
      estimated_hours,
      start,
      end,
    } => {
      let input = NewTask {
        oi_id: oi,
        kind: kind.into(),
        description,
        assigned_to: assign,
        hours_of_work: hours,
        estimated_hours,
        start_date: start,
        end_date: end,
      };
      let saved = store.create_task(actor, input).await.context("failed to create task")?;
      print_json(&saved)
    }
    TaskCommand::Update {
      actor,
      task_id,
      status,
      description,
      hours,
      estimated_hours,
      start,
      end,
    } => {
      let update = TaskUpdate {
        status: status.map(TaskStatus::from),
        description,
        hours_of_work: hours,
        estimated_hours,
        start_date: start,
        end_date: end,
      };
      let saved = store
        .update_task(actor, task_id, update)
        .await
        .with_context(|| format!("failed to update task {task_id}"))?;
      print_json(&saved)
    }
    TaskCommand::Show { task_id } => {
      let task = store
        .get_task(task_id)
        .await
        .with_context(|| format!("failed to load task {task_id}"))?
        .with_context(|| format!("task not found: {task_id}"))?;
      print_json(&task)
    }
    TaskCommand::List { actor } => {
      let tasks = store.list_tasks(actor).await.context("failed to list tasks")?;
      print_json(&tasks)
    }
    TaskCommand::Checklist { oi_id, actor, done, todo, notes } => {
      let submission = ChecklistSubmission {
        oi_id: oi_id.clone(),
        items: checklist_items(done, todo),
        notes,
      };
      let task = store
        .submit_checklist(actor, submission)
        .await
        .with_context(|| format!("failed to submit checklist for OI {oi_id}"))?;
      print_json(&task)
    }
  }
}

async fn run_notifications<S: ParcStore>(
  store: &S,
  cmd: NotificationCommand,
) -> anyhow::Result<()> {
  match cmd {
    NotificationCommand::List { user_id, unread } => {
      let notifications = store
        .list_notifications(user_id, unread)
        .await
        .context("failed to list notifications")?;
      print_json(&notifications)
    }
    NotificationCommand::Read { user_id, notification_id } => {
      let notification = store
        .mark_read(user_id, notification_id)
        .await
        .with_context(|| format!("failed to mark notification {notification_id} read"))?;
      print_json(&notification)
    }
    NotificationCommand::ReadAll { user_id } => {
      let marked = store
        .mark_all_read(user_id)
        .await
        .context("failed to mark notifications read")?;
      print_json(&serde_json::json!({ "marked": marked }))
    }
    NotificationCommand::Send { actor, recipient, message } => {
      let notification = store
        .send_notification(actor, recipient, message)
        .await
        .with_context(|| format!("failed to notify user {recipient}"))?;
      print_json(&notification)
    }
  }
}

/// Checked items first, then unchecked ones, each in the order given.
fn checklist_items(done: Vec<String>, todo: Vec<String>) -> Vec<ChecklistItem> {
  let checked = done.into_iter().map(|description| ChecklistItem { description, completed: true });
  let unchecked =
    todo.into_iter().map(|description| ChecklistItem { description, completed: false });
  checked.chain(unchecked).collect()
}
