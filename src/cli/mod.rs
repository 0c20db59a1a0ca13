//! Command-line interface for taskdeck
//!
//! This module defines the CLI structure using clap derive macros.
//! Each command group is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{self, Config};
use crate::error::Result;
use crate::output::{HumanOutput, OutputOptions};
use crate::storage::WorkspaceStore;
use crate::sync::{StepOutcome, SyncReport, Synchronizer};

mod event;
mod goal;
mod init;
mod reconcile;
mod sync;
mod task;

/// taskdeck - tasks, goals and calendar in one workspace
///
/// Edits the dashboard's TASKS.md, goals.json and calendar.json together,
/// keeping dated tasks and calendar events in step.
#[derive(Parser, Debug)]
#[command(name = "taskdeck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Workspace root (defaults to $DASHBOARD_WORKSPACE, $OPENCLAW_WORKSPACE or ~/.openclaw/workspace)
    #[arg(long, global = true, env = "TASKDECK_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the stores and a default .taskdeck.toml if missing
    Init,

    /// Task document commands
    #[command(subcommand)]
    Task(TaskCommands),

    /// Calendar commands
    #[command(subcommand)]
    Event(EventCommands),

    /// Goal commands
    #[command(subcommand)]
    Goal(GoalCommands),

    /// Intent journal commands
    #[command(subcommand)]
    Sync(SyncCommands),

    /// Report drift between tasks, events and goals
    Reconcile {
        /// Append missing events and tasks
        #[arg(long)]
        fix: bool,
    },
}

/// Task subcommands
///
/// Tasks are addressed as `<section>:<index>` (e.g. `not-started:0`) or by
/// stable id (`t-...` or `id:t-...`).
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Add a task to "Not Started"
    Add {
        title: String,

        /// Due date (YYYY-MM-DD); also adds a calendar event
        #[arg(long)]
        due: Option<String>,

        /// Goal id to link
        #[arg(long)]
        goal: Option<String>,
    },

    /// List tasks
    List {
        /// Only this section (not-started, in-progress, done)
        #[arg(long)]
        section: Option<String>,

        /// Only tasks linked to this goal
        #[arg(long, conflicts_with = "no_goal")]
        goal: Option<String>,

        /// Only tasks without a goal
        #[arg(long)]
        no_goal: bool,

        /// Group by goal instead of by section
        #[arg(long, conflicts_with_all = ["section", "goal", "no_goal"])]
        by_goal: bool,
    },

    /// Check a task
    Done { task: String },

    /// Uncheck a task
    Undone { task: String },

    /// Change a task's title (the calendar is not updated)
    Rename { task: String, title: String },

    /// Edit title, due date and goal together
    Edit {
        task: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(long, conflicts_with = "clear_due")]
        due: Option<String>,

        #[arg(long)]
        clear_due: bool,

        #[arg(long, conflicts_with = "clear_goal")]
        goal: Option<String>,

        #[arg(long)]
        clear_goal: bool,
    },

    /// Move a task to the end of another section
    Move { task: String, section: String },

    /// Link a task to a goal (omit the goal to unlink)
    Goal { task: String, goal: Option<String> },

    /// Change a task's due date (omit the date to clear it)
    Reschedule { task: String, date: Option<String> },

    /// Remove a task and its calendar events
    Rm { task: String },
}

/// Calendar subcommands
#[derive(Subcommand, Debug)]
pub enum EventCommands {
    /// Add an event and a matching task
    Add {
        title: String,

        /// Date (YYYY-MM-DD)
        date: String,

        /// Free-form event type (e.g. meeting, deadline)
        #[arg(long = "type")]
        event_type: Option<String>,

        #[arg(long)]
        color: Option<String>,

        #[arg(long)]
        goal: Option<String>,
    },

    /// List events, optionally within a date range
    List {
        #[arg(long, conflicts_with = "day")]
        from: Option<String>,

        #[arg(long, conflicts_with = "day")]
        to: Option<String>,

        /// Only events on this date
        #[arg(long)]
        day: Option<String>,
    },

    /// Move an event to another date; its task follows
    Move { id: String, date: String },

    /// Remove an event and its task
    Rm { id: String },
}

/// Goal subcommands
#[derive(Subcommand, Debug)]
pub enum GoalCommands {
    /// Create a goal
    Add {
        name: String,

        /// Target date (YYYY-MM-DD)
        #[arg(long)]
        target: Option<String>,

        /// planning, in-progress or done
        #[arg(long, default_value = "planning")]
        status: String,
    },

    /// List goals
    List {
        #[arg(long)]
        status: Option<String>,
    },

    /// Show a goal with its tasks
    Show { id: String },

    /// Edit a goal's fields
    Edit {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,

        #[arg(long)]
        clear_description: bool,

        #[arg(long, conflicts_with = "clear_target")]
        target: Option<String>,

        #[arg(long)]
        clear_target: bool,

        /// Replace milestones (repeatable)
        #[arg(long = "milestone", conflicts_with = "clear_milestones")]
        milestones: Vec<String>,

        #[arg(long)]
        clear_milestones: bool,
    },

    /// Move a goal to another kanban column
    Status { id: String, status: String },

    /// Remove a goal and its calendar events (tasks keep the goal id)
    Rm { id: String },

    /// Done/total task counts per goal
    Progress { id: Option<String> },

    /// Add a task linked to a goal
    AddTask {
        goal: String,

        title: String,

        #[arg(long)]
        due: Option<String>,
    },
}

/// Intent journal subcommands
#[derive(Subcommand, Debug)]
pub enum SyncCommands {
    /// Show operations left pending by a failed write
    Status,

    /// Finish pending operations
    Replay {
        /// Only this intent (full id or unique prefix)
        intent: Option<String>,

        /// Drop completed intents from the journal afterwards
        #[arg(long)]
        prune: bool,
    },
}

/// Flags shared by every command
#[derive(Debug, Clone)]
pub struct Globals {
    pub workspace: Option<PathBuf>,
    pub output: OutputOptions,
}

/// Resolved workspace for one invocation
pub struct Context {
    pub root: PathBuf,
    pub config: Config,
    pub sync: Synchronizer<WorkspaceStore>,
}

impl Context {
    pub fn load(globals: &Globals) -> Result<Self> {
        let root = config::resolve_workspace_root(globals.workspace.clone())?;
        let config = Config::load_from_workspace(&root);
        let sync = Synchronizer::open(&root, &config)?;
        tracing::debug!(root = %root.display(), "workspace resolved");
        Ok(Self { root, config, sync })
    }
}

/// Applied steps as details, skipped steps as warnings.
pub(crate) fn push_report(human: &mut HumanOutput, report: &SyncReport) {
    for step in &report.steps {
        match &step.outcome {
            StepOutcome::Applied => human.push_detail(format!("{}: {}", step.store, step.description)),
            StepOutcome::Skipped { reason } => {
                human.push_warning(format!("{}: {} skipped ({reason})", step.store, step.description))
            }
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let globals = Globals {
            workspace: self.workspace,
            output: OutputOptions {
                json: self.json,
                quiet: self.quiet,
            },
        };

        match self.command {
            Commands::Init => init::run(&globals),
            Commands::Task(cmd) => match cmd {
                TaskCommands::Add { title, due, goal } => {
                    task::run_add(task::AddOptions { title, due, goal }, &globals)
                }
                TaskCommands::List {
                    section,
                    goal,
                    no_goal,
                    by_goal,
                } => task::run_list(
                    task::ListOptions {
                        section,
                        goal,
                        no_goal,
                        by_goal,
                    },
                    &globals,
                ),
                TaskCommands::Done { task } => task::run_set_done(&task, true, &globals),
                TaskCommands::Undone { task } => task::run_set_done(&task, false, &globals),
                TaskCommands::Rename { task, title } => task::run_rename(&task, &title, &globals),
                TaskCommands::Edit {
                    task,
                    title,
                    due,
                    clear_due,
                    goal,
                    clear_goal,
                } => task::run_edit(
                    task::EditOptions {
                        task,
                        title,
                        due,
                        clear_due,
                        goal,
                        clear_goal,
                    },
                    &globals,
                ),
                TaskCommands::Move { task, section } => task::run_move(&task, &section, &globals),
                TaskCommands::Goal { task, goal } => task::run_goal(&task, goal, &globals),
                TaskCommands::Reschedule { task, date } => task::run_reschedule(&task, date, &globals),
                TaskCommands::Rm { task } => task::run_rm(&task, &globals),
            },
            Commands::Event(cmd) => match cmd {
                EventCommands::Add {
                    title,
                    date,
                    event_type,
                    color,
                    goal,
                } => event::run_add(
                    event::AddOptions {
                        title,
                        date,
                        event_type,
                        color,
                        goal,
                    },
                    &globals,
                ),
                EventCommands::List { from, to, day } => {
                    event::run_list(event::ListOptions { from, to, day }, &globals)
                }
                EventCommands::Move { id, date } => event::run_move(&id, &date, &globals),
                EventCommands::Rm { id } => event::run_rm(&id, &globals),
            },
            Commands::Goal(cmd) => match cmd {
                GoalCommands::Add { name, target, status } => {
                    goal::run_add(goal::AddOptions { name, target, status }, &globals)
                }
                GoalCommands::List { status } => goal::run_list(status.as_deref(), &globals),
                GoalCommands::Show { id } => goal::run_show(&id, &globals),
                GoalCommands::Edit {
                    id,
                    name,
                    description,
                    clear_description,
                    target,
                    clear_target,
                    milestones,
                    clear_milestones,
                } => goal::run_edit(
                    goal::EditOptions {
                        id,
                        name,
                        description,
                        clear_description,
                        target,
                        clear_target,
                        milestones,
                        clear_milestones,
                    },
                    &globals,
                ),
                GoalCommands::Status { id, status } => goal::run_status(&id, &status, &globals),
                GoalCommands::Rm { id } => goal::run_rm(&id, &globals),
                GoalCommands::Progress { id } => goal::run_progress(id.as_deref(), &globals),
                GoalCommands::AddTask { goal, title, due } => {
                    goal::run_add_task(&goal, &title, due, &globals)
                }
            },
            Commands::Sync(cmd) => match cmd {
                SyncCommands::Status => sync::run_status(&globals),
                SyncCommands::Replay { intent, prune } => sync::run_replay(intent.as_deref(), prune, &globals),
            },
            Commands::Reconcile { fix } => reconcile::run(fix, &globals),
        }
    }
}
