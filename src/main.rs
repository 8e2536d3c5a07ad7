//! # crewtask
//!
//! A terminal tracker for work shared between people. Tasks are assigned to
//! one or more users and can be split into ordered steps; composite tasks get
//! one subtask per user and subtask template.
//!
//! ## Usage
//!
//! ```bash
//! crewtask user add ann
//! crewtask user add bob
//!
//! # Single task worked on together: done once both users checked every step
//! crewtask task add "Inventory" -u <ann-id> -u <bob-id> -s Count -s Report
//! crewtask step done <task-id> <step-id> --user <ann-id>
//!
//! # Composite task: one subtask per (user, template)
//! crewtask task add "Release" -u <ann-id> -u <bob-id> --composite \
//!     -s Review --subtask Design --subtask Build
//! crewtask step done <task-id> <step-id> --subtask <subtask-id>
//!
//! crewtask task list --todo
//! crewtask task show <task-id>
//! crewtask task edit <task-id> --due 2025-07-01 --note ""   # empty clears
//! ```
//!
//! Checking the last step of a list checks all the steps before it too.
//!
//! ## Data Storage
//!
//! Everything is saved as one JSON file in your local data directory
//! (`~/.local/share/crewtask/entities.json` on Linux). Override it with the
//! `CREWTASK_DB` environment variable. Set `CREWTASK_LOG` (e.g.
//! `crewtask=debug`) to see diagnostics.

use std::io;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crewtask::clock::SystemClock;
use crewtask::commands::*;
use crewtask::config::Config;
use crewtask::ids::UuidIds;
use crewtask::ordering::{StatusFilter, TaskFilter};
use crewtask::storage::JsonFileStorage;
use crewtask::store::{ProjectUpdate, Store, SubtaskUpdate, TaskUpdate, UserUpdate};

#[derive(Parser)]
#[command(name = "crewtask")]
#[command(about = "Track tasks shared between people", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage tasks
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Check or uncheck steps
    Step {
        #[command(subcommand)]
        command: StepCommands,
    },
    /// Manage subtasks of composite tasks
    Subtask {
        #[command(subcommand)]
        command: SubtaskCommands,
    },
    /// Manage appointments
    Appointment {
        #[command(subcommand)]
        command: AppointmentCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Add a user
    Add {
        nickname: String,
        #[arg(short, long)]
        phone: Option<String>,
        #[arg(short, long)]
        note: Option<String>,
    },
    /// List users
    List,
    /// Edit a user. An empty value clears an optional field
    Edit {
        id: String,
        #[arg(long)]
        nickname: Option<String>,
        #[arg(short, long)]
        phone: Option<String>,
        #[arg(short, long)]
        note: Option<String>,
    },
    /// Remove a user
    Remove { id: String },
}

#[derive(Subcommand)]
enum ProjectCommands {
    /// Add a project
    Add {
        name: String,
        #[arg(short, long)]
        note: Option<String>,
        /// Associated user (repeatable)
        #[arg(short, long = "user")]
        users: Vec<String>,
        /// Repeat frequency (none, daily, weekly, monthly)
        #[arg(short, long, default_value = "none")]
        repeat: String,
    },
    /// List projects
    List,
    /// Edit a project. An empty value clears the note
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(short, long)]
        note: Option<String>,
        /// Replace the associated users (repeatable)
        #[arg(short, long = "user")]
        users: Vec<String>,
        #[arg(short, long)]
        repeat: Option<String>,
    },
    /// Remove a project
    Remove { id: String },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Add a task
    Add {
        /// Task name (quoted if it has spaces)
        name: String,
        /// Assigned user (repeatable, at least one)
        #[arg(short, long = "user")]
        users: Vec<String>,
        #[arg(short, long)]
        project: Option<String>,
        #[arg(short, long)]
        note: Option<String>,
        /// Split into one subtask per user and subtask template
        #[arg(short, long)]
        composite: bool,
        /// Step name, in order (repeatable)
        #[arg(short, long = "step")]
        steps: Vec<String>,
        /// Subtask template name for composite tasks (repeatable)
        #[arg(long = "subtask")]
        subtasks: Vec<String>,
        /// Due time, YYYY-MM-DD [HH:MM] or RFC 3339
        #[arg(short, long)]
        due: Option<String>,
    },
    /// List tasks, open ones first by due time
    List {
        /// Only completed tasks
        #[arg(long, conflicts_with = "todo")]
        done: bool,
        /// Only open tasks
        #[arg(long)]
        todo: bool,
        /// Name contains this text
        #[arg(short, long)]
        query: Option<String>,
        #[arg(short, long)]
        project: Option<String>,
        /// Assigned to this user
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Show a task with its steps and subtasks
    Show { id: String },
    /// Edit a task. An empty value clears an optional field
    Edit {
        id: String,
        #[arg(long)]
        name: Option<String>,
        /// Replace the assigned users (repeatable)
        #[arg(short, long = "user")]
        users: Vec<String>,
        #[arg(short, long)]
        project: Option<String>,
        #[arg(short, long)]
        note: Option<String>,
        /// Due time, YYYY-MM-DD [HH:MM] or RFC 3339
        #[arg(short, long)]
        due: Option<String>,
    },
    /// Mark a task done, or one user's share of it with --user
    Done {
        id: String,
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Reopen a task, or withdraw one user's completion with --user
    Undo {
        id: String,
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Remove a task and its subtasks
    Remove { id: String },
}

#[derive(Subcommand)]
enum StepCommands {
    /// Check a step
    Done {
        task: String,
        step: String,
        /// Subtask holding the step (composite tasks)
        #[arg(short, long)]
        subtask: Option<String>,
        /// User checking the step (multi-user tasks)
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Uncheck a step
    Undo {
        task: String,
        step: String,
        #[arg(short, long)]
        subtask: Option<String>,
        #[arg(short, long)]
        user: Option<String>,
    },
}

#[derive(Subcommand)]
enum SubtaskCommands {
    /// Add a subtask owned by a user
    Add {
        task: String,
        #[arg(short, long)]
        owner: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long)]
        note: Option<String>,
    },
    /// Edit a subtask. An empty note clears it
    Edit {
        task: String,
        subtask: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Explicit completion, for subtasks without steps
        #[arg(long)]
        completed: Option<bool>,
    },
    /// Remove a subtask
    Remove { task: String, subtask: String },
}

#[derive(Subcommand)]
enum AppointmentCommands {
    /// Add an appointment
    Add {
        title: String,
        /// Start time, YYYY-MM-DD [HH:MM] or RFC 3339
        #[arg(short, long)]
        start: String,
        #[arg(short, long, default_value = "")]
        content: String,
        /// User to remind (repeatable)
        #[arg(short, long = "user")]
        users: Vec<String>,
    },
    /// List appointments
    List,
    /// Mark an appointment as completed
    Done { id: String },
    /// Remove an appointment
    Remove { id: String },
}

fn main() -> Result<()> {
    let config = Config::from_env();
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "crewtask", &mut io::stdout());
        return Ok(());
    }

    let mut store = Store::open(JsonFileStorage::new(&config.db_path), UuidIds, SystemClock);

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Add { nickname, phone, note } => cmd_user_add(&mut store, nickname, phone, note),
            UserCommands::List => cmd_user_list(&store),
            UserCommands::Edit { id, nickname, phone, note } => {
                cmd_user_edit(&mut store, &id, UserUpdate { nickname, phone: clearable(phone), note: clearable(note) })
            }
            UserCommands::Remove { id } => cmd_user_remove(&mut store, &id),
        },
        Commands::Project { command } => match command {
            ProjectCommands::Add { name, note, users, repeat } => {
                cmd_project_add(&mut store, name, note, users, parse_repeat(&repeat)?)
            }
            ProjectCommands::List => cmd_project_list(&store),
            ProjectCommands::Edit { id, name, note, users, repeat } => {
                let updates = ProjectUpdate {
                    name,
                    note: clearable(note),
                    user_ids: (!users.is_empty()).then_some(users),
                    repeat: repeat.as_deref().map(parse_repeat).transpose()?,
                };
                cmd_project_edit(&mut store, &id, updates)
            }
            ProjectCommands::Remove { id } => cmd_project_remove(&mut store, &id),
        },
        Commands::Task { command } => match command {
            TaskCommands::Add { name, users, project, note, composite, steps, subtasks, due } => {
                let due_at = due.as_deref().map(parse_time).transpose()?;
                cmd_task_add(&mut store, name, users, project, note, composite, steps, subtasks, due_at)
            }
            TaskCommands::List { done, todo, query, project, user } => {
                let status = match (done, todo) {
                    (true, _) => StatusFilter::Done,
                    (_, true) => StatusFilter::Todo,
                    _ => StatusFilter::All,
                };
                cmd_task_list(&store, &TaskFilter { query, project_id: project, user_id: user, status })
            }
            TaskCommands::Show { id } => cmd_task_show(&store, &id),
            TaskCommands::Edit { id, name, users, project, note, due } => {
                let due_at = clearable(due).map(|d| d.as_deref().map(parse_time).transpose()).transpose()?;
                let updates = TaskUpdate {
                    name,
                    project_id: clearable(project),
                    user_ids: (!users.is_empty()).then_some(users),
                    note: clearable(note),
                    due_at,
                    completed: None,
                };
                cmd_task_edit(&mut store, &id, updates)
            }
            TaskCommands::Done { id, user } => cmd_task_done(&mut store, &id, user.as_deref(), true),
            TaskCommands::Undo { id, user } => cmd_task_done(&mut store, &id, user.as_deref(), false),
            TaskCommands::Remove { id } => cmd_task_remove(&mut store, &id),
        },
        Commands::Step { command } => match command {
            StepCommands::Done { task, step, subtask, user } => {
                cmd_step_done(&mut store, &task, subtask.as_deref(), &step, user.as_deref(), true)
            }
            StepCommands::Undo { task, step, subtask, user } => {
                cmd_step_done(&mut store, &task, subtask.as_deref(), &step, user.as_deref(), false)
            }
        },
        Commands::Subtask { command } => match command {
            SubtaskCommands::Add { task, owner, name, note } => cmd_subtask_add(&mut store, &task, owner, name, note),
            SubtaskCommands::Edit { task, subtask, name, note, completed } => {
                cmd_subtask_edit(&mut store, &task, &subtask, SubtaskUpdate { name, note: clearable(note), completed })
            }
            SubtaskCommands::Remove { task, subtask } => cmd_subtask_remove(&mut store, &task, &subtask),
        },
        Commands::Appointment { command } => match command {
            AppointmentCommands::Add { title, start, content, users } => {
                let start_at = parse_time(&start)?;
                cmd_appointment_add(&mut store, title, content, users, start_at)
            }
            AppointmentCommands::List => cmd_appointment_list(&store),
            AppointmentCommands::Done { id } => cmd_appointment_done(&mut store, &id),
            AppointmentCommands::Remove { id } => cmd_appointment_remove(&mut store, &id),
        },
        Commands::Completions { .. } => {}
    }
    Ok(())
}
