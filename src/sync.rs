//! Cross-store synchronizer
//!
//! Every operation is planned as an ordered list of [`Step`]s. A step touches
//! exactly one store: it reads the document fresh, mutates it in memory and
//! writes the whole document back (last write wins). Steps are never rolled
//! back. When a plan spans more than one step it is recorded in the intent
//! journal first, so an interrupted run can be finished with
//! [`Synchronizer::replay_pending`].
//!
//! Tasks and events correlate through [`task_matches_event`]: the stable
//! `id`/`taskId` link when both sides carry one, the natural key otherwise.
//! A correlation miss is reported as a skipped step, never as an error.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calendar::{generate_event_id, CalendarEvent, CalendarStore};
use crate::config::{Config, PathsConfig, Placement, TasksConfig};
use crate::error::{Error, Result};
use crate::goal::{Goal, GoalStatus, GoalStore};
use crate::journal::{Journal, PendingIntent};
use crate::query::{all_task_lines, resolve_task, task_matches_event, NaturalKey, TaskLine, TaskRef};
use crate::storage::{validate_key, Store, WorkspaceStore};
use crate::task_doc::{
    fits_task_line, generate_task_id, parse_task_meta, Section, TaskDocument, TaskEntry, META_SEPARATOR,
    STRIKE,
};

/// The three stores a step can touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Tasks,
    Calendar,
    Goals,
}

impl StoreKind {
    pub const ALL: [StoreKind; 3] = [StoreKind::Tasks, StoreKind::Calendar, StoreKind::Goals];

    pub fn as_str(self) -> &'static str {
        match self {
            StoreKind::Tasks => "tasks",
            StoreKind::Calendar => "calendar",
            StoreKind::Goals => "goals",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One single-store mutation.
///
/// Steps carry snapshots of what the planner saw so they can be replayed
/// later against whatever the store holds by then.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    AppendTask {
        section: Section,
        line: String,
        #[serde(default)]
        front: bool,
    },
    ReplaceTask {
        task: TaskLine,
        line: String,
    },
    MoveTask {
        task: TaskLine,
        to: Section,
    },
    RemoveTask {
        task: TaskLine,
    },
    /// Remove the first task correlated with `event`
    RemoveCorrelatedTask {
        event: CalendarEvent,
    },
    /// Set the due date of the first task correlated with `event`
    RescheduleCorrelatedTask {
        event: CalendarEvent,
        date: String,
    },
    AppendEvent {
        event: CalendarEvent,
    },
    SetEventDate {
        id: String,
        date: String,
    },
    RemoveEvent {
        id: String,
    },
    /// Remove every event correlated with `task`
    RemoveCorrelatedEvents {
        task: TaskLine,
    },
    /// Set the date of the first event correlated with `task`
    RescheduleCorrelatedEvent {
        task: TaskLine,
        date: String,
    },
    /// Copy title, date and goal onto the event correlated with `task`,
    /// appending `event` when there is none
    SyncEventForTask {
        task: TaskLine,
        event: CalendarEvent,
    },
    RemoveGoalEvents {
        goal_id: String,
    },
    PutGoal {
        goal: Goal,
    },
    RemoveGoal {
        goal_id: String,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::AppendTask { .. } => "append_task",
            Step::ReplaceTask { .. } => "replace_task",
            Step::MoveTask { .. } => "move_task",
            Step::RemoveTask { .. } => "remove_task",
            Step::RemoveCorrelatedTask { .. } => "remove_correlated_task",
            Step::RescheduleCorrelatedTask { .. } => "reschedule_correlated_task",
            Step::AppendEvent { .. } => "append_event",
            Step::SetEventDate { .. } => "set_event_date",
            Step::RemoveEvent { .. } => "remove_event",
            Step::RemoveCorrelatedEvents { .. } => "remove_correlated_events",
            Step::RescheduleCorrelatedEvent { .. } => "reschedule_correlated_event",
            Step::SyncEventForTask { .. } => "sync_event_for_task",
            Step::RemoveGoalEvents { .. } => "remove_goal_events",
            Step::PutGoal { .. } => "put_goal",
            Step::RemoveGoal { .. } => "remove_goal",
        }
    }

    pub fn store(&self) -> StoreKind {
        match self {
            Step::AppendTask { .. }
            | Step::ReplaceTask { .. }
            | Step::MoveTask { .. }
            | Step::RemoveTask { .. }
            | Step::RemoveCorrelatedTask { .. }
            | Step::RescheduleCorrelatedTask { .. } => StoreKind::Tasks,
            Step::AppendEvent { .. }
            | Step::SetEventDate { .. }
            | Step::RemoveEvent { .. }
            | Step::RemoveCorrelatedEvents { .. }
            | Step::RescheduleCorrelatedEvent { .. }
            | Step::SyncEventForTask { .. }
            | Step::RemoveGoalEvents { .. } => StoreKind::Calendar,
            Step::PutGoal { .. } | Step::RemoveGoal { .. } => StoreKind::Goals,
        }
    }

    /// One-line human description
    pub fn describe(&self) -> String {
        match self {
            Step::AppendTask { section, line, front } => {
                let end = if *front { "top" } else { "bottom" };
                format!("add '{line}' at the {end} of {section}")
            }
            Step::ReplaceTask { task, line } => format!("rewrite '{}' as '{line}'", task.raw),
            Step::MoveTask { task, to } => format!("move '{}' to {to}", task.title),
            Step::RemoveTask { task } => format!("remove task '{}'", task.title),
            Step::RemoveCorrelatedTask { event } => {
                format!("remove the task matching event '{}' on {}", event.title, event.date)
            }
            Step::RescheduleCorrelatedTask { event, date } => {
                format!("move the task matching '{}' from {} to {date}", event.title, event.date)
            }
            Step::AppendEvent { event } => format!("add event '{}' on {}", event.title, event.date),
            Step::SetEventDate { id, date } => format!("move event {id} to {date}"),
            Step::RemoveEvent { id } => format!("remove event {id}"),
            Step::RemoveCorrelatedEvents { task } => {
                format!("remove events matching task '{}'", task.title)
            }
            Step::RescheduleCorrelatedEvent { task, date } => format!(
                "move the event matching '{}' from {} to {date}",
                task.title,
                task.due.as_deref().unwrap_or("-")
            ),
            Step::SyncEventForTask { event, .. } => {
                format!("update or add event '{}' on {}", event.title, event.date)
            }
            Step::RemoveGoalEvents { goal_id } => format!("remove events linked to goal {goal_id}"),
            Step::PutGoal { goal } => format!("save goal {} '{}'", goal.id, goal.name),
            Step::RemoveGoal { goal_id } => format!("remove goal {goal_id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    /// Nothing to change; the reason is shown to the user
    Skipped { reason: String },
}

impl StepOutcome {
    fn skipped(reason: &str) -> Self {
        StepOutcome::Skipped {
            reason: reason.to_string(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, StepOutcome::Applied)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: &'static str,
    pub store: StoreKind,
    pub description: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// What an operation did, step by step
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub operation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent_id: Option<Uuid>,
    pub steps: Vec<StepReport>,
}

impl SyncReport {
    fn new(operation: &str, intent_id: Option<Uuid>) -> Self {
        Self {
            operation: operation.to_string(),
            intent_id,
            steps: Vec::new(),
        }
    }

    fn push(&mut self, step: &Step, outcome: StepOutcome) {
        self.steps.push(StepReport {
            step: step.name(),
            store: step.store(),
            description: step.describe(),
            outcome,
        });
    }

    /// Steps that found nothing to do
    pub fn skipped(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| !s.outcome.is_applied())
    }
}

/// An operation result together with its report
#[derive(Debug, Clone, Serialize)]
pub struct Synced<T> {
    #[serde(flatten)]
    pub value: T,
    pub report: SyncReport,
}

/// Input for creating a task
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub due: Option<String>,
    pub goal_id: Option<String>,
}

/// Input for creating a calendar event
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub title: String,
    pub date: String,
    pub event_type: Option<String>,
    pub color: Option<String>,
    pub goal_id: Option<String>,
}

/// Edit-dialog changes; `None` leaves a field alone, `Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskEdit {
    pub title: Option<String>,
    pub due: Option<Option<String>>,
    pub goal_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct GoalEdit {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub target_date: Option<Option<String>>,
    pub milestones: Option<Vec<String>>,
}

/// Applies cross-store operations against a [`Store`].
pub struct Synchronizer<S> {
    store: S,
    paths: PathsConfig,
    tasks: TasksConfig,
    journal: Option<Journal>,
}

impl Synchronizer<WorkspaceStore> {
    /// Synchronizer over the workspace directory, journal per config.
    pub fn open(root: &Path, config: &Config) -> Result<Self> {
        let store = WorkspaceStore::new(root).with_lock_timeout(config.storage.lock_timeout_ms);
        let journal = if config.journal.enabled {
            let relative = validate_key(&config.journal.path)?;
            Some(
                Journal::new(root.join(relative))
                    .with_lock_timeout(config.storage.lock_timeout_ms)
                    .with_auto_prune(config.journal.prune_above_bytes),
            )
        } else {
            None
        };
        Ok(Self::new(store, config).with_journal(journal))
    }
}

impl<S: Store> Synchronizer<S> {
    pub fn new(store: S, config: &Config) -> Self {
        Self {
            store,
            paths: config.paths.clone(),
            tasks: config.tasks.clone(),
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: Option<Journal>) -> Self {
        self.journal = journal;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn journal(&self) -> Option<&Journal> {
        self.journal.as_ref()
    }

    pub fn key(&self, kind: StoreKind) -> &str {
        match kind {
            StoreKind::Tasks => &self.paths.tasks,
            StoreKind::Calendar => &self.paths.calendar,
            StoreKind::Goals => &self.paths.goals,
        }
    }

    fn read_content(&self, kind: StoreKind) -> Result<String> {
        let key = self.key(kind);
        match self.store.read(key)? {
            Some(doc) => Ok(doc.content),
            None => {
                tracing::debug!(key, "store missing; reading as empty");
                Ok(String::new())
            }
        }
    }

    pub fn load_tasks(&self) -> Result<TaskDocument> {
        Ok(TaskDocument::parse(&self.read_content(StoreKind::Tasks)?))
    }

    pub fn load_calendar(&self) -> Result<CalendarStore> {
        Ok(CalendarStore::parse(&self.read_content(StoreKind::Calendar)?))
    }

    pub fn load_goals(&self) -> Result<GoalStore> {
        Ok(GoalStore::parse(&self.read_content(StoreKind::Goals)?))
    }

    /// Last-modified time of a store, `None` when it does not exist yet
    pub fn last_modified(&self, kind: StoreKind) -> Result<Option<DateTime<Utc>>> {
        Ok(self.store.read(self.key(kind))?.map(|doc| doc.last_modified))
    }

    fn save_tasks(&self, doc: &TaskDocument) -> Result<()> {
        self.store.write(&self.paths.tasks, &doc.serialize())?;
        Ok(())
    }

    fn save_calendar(&self, calendar: &CalendarStore) -> Result<()> {
        self.store.write(&self.paths.calendar, &calendar.to_json()?)?;
        Ok(())
    }

    fn save_goals(&self, goals: &GoalStore) -> Result<()> {
        self.store.write(&self.paths.goals, &goals.to_json()?)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Add a task to "Not Started"; a due date also adds a matching event.
    pub fn create_task(&self, new: NewTask) -> Result<Synced<TaskLine>> {
        self.create_task_as("task add", new)
    }

    /// Add a task linked to an existing goal.
    pub fn create_task_for_goal(&self, goal_id: &str, title: &str, due: Option<String>) -> Result<Synced<TaskLine>> {
        self.create_task_as(
            "goal add-task",
            NewTask {
                title: title.to_string(),
                due,
                goal_id: Some(goal_id.to_string()),
            },
        )
    }

    fn create_task_as(&self, operation: &str, new: NewTask) -> Result<Synced<TaskLine>> {
        let title = validate_title(&new.title)?;
        let due = clean(new.due).map(|d| validate_date(&d)).transpose()?;
        let goal_id = clean(new.goal_id);
        if let Some(goal) = goal_id.as_deref() {
            self.require_goal(goal)?;
        }

        let entry = TaskEntry {
            done: false,
            title,
            due,
            goal_id,
            id: self.tasks.stable_ids.then(generate_task_id),
        };
        let line = entry.to_line();

        let mut steps = vec![self.append_task_step(line.clone())];
        if let Some(date) = entry.due.as_deref() {
            let mut event = CalendarEvent::new(generate_event_id(), &entry.title, date);
            event.goal_id = entry.goal_id.clone();
            event.task_id = entry.id.clone();
            steps.push(Step::AppendEvent { event });
        }

        let report = self.run(operation, steps)?;
        let value = self.locate_appended(&line)?;
        Ok(Synced { value, report })
    }

    /// Apply edit-dialog changes. When the edited task has a due date, the
    /// event correlated with the old line takes the new title, date and goal;
    /// without a correlated event a new one is added.
    pub fn edit_task(&self, task: &TaskRef, edit: TaskEdit) -> Result<Synced<TaskLine>> {
        let (current, mut entry) = self.read_entry(task)?;
        if let Some(title) = edit.title {
            entry.title = validate_title(&title)?;
        }
        if let Some(due) = edit.due {
            entry.due = clean(due).map(|d| validate_date(&d)).transpose()?;
        }
        if let Some(goal_id) = edit.goal_id {
            entry.goal_id = self.checked_goal(goal_id)?;
        }

        let mut extra = Vec::new();
        if let Some(date) = entry.due.as_deref() {
            let mut event = CalendarEvent::new(generate_event_id(), &entry.title, date);
            event.goal_id = entry.goal_id.clone();
            event.task_id = entry.id.clone();
            extra.push(Step::SyncEventForTask {
                task: current.clone(),
                event,
            });
        }
        self.rewrite("task edit", current, &entry, extra)
    }

    /// Change only the title. The calendar is left alone.
    pub fn rename_task(&self, task: &TaskRef, title: &str) -> Result<Synced<TaskLine>> {
        let (current, mut entry) = self.read_entry(task)?;
        entry.title = validate_title(title)?;
        self.rewrite("task rename", current, &entry, Vec::new())
    }

    /// Change the due date; the correlated event (found with the old date)
    /// moves along when there is one.
    pub fn reschedule_task(&self, task: &TaskRef, due: Option<String>) -> Result<Synced<TaskLine>> {
        let (current, mut entry) = self.read_entry(task)?;
        entry.due = clean(due).map(|d| validate_date(&d)).transpose()?;

        let mut extra = Vec::new();
        if let (Some(old), Some(new)) = (current.due.as_deref(), entry.due.as_deref()) {
            if old != new {
                extra.push(Step::RescheduleCorrelatedEvent {
                    task: current.clone(),
                    date: new.to_string(),
                });
            }
        }
        self.rewrite("task reschedule", current, &entry, extra)
    }

    /// Check or uncheck a task. The calendar is left alone.
    pub fn set_task_done(&self, task: &TaskRef, done: bool) -> Result<Synced<TaskLine>> {
        let (current, mut entry) = self.read_entry(task)?;
        entry.done = done;
        let operation = if done { "task done" } else { "task undone" };
        self.rewrite(operation, current, &entry, Vec::new())
    }

    /// Re-link a task to another goal (or none). The calendar is left alone.
    pub fn set_task_goal(&self, task: &TaskRef, goal_id: Option<String>) -> Result<Synced<TaskLine>> {
        let (current, mut entry) = self.read_entry(task)?;
        entry.goal_id = self.checked_goal(goal_id)?;
        self.rewrite("task goal", current, &entry, Vec::new())
    }

    /// Move a task to the end of another section.
    pub fn move_task(&self, task: &TaskRef, to: Section) -> Result<Synced<TaskLine>> {
        let doc = self.load_tasks()?;
        let current = resolve_task(&doc, task)?;
        let report = self.run(
            "task move",
            vec![Step::MoveTask {
                task: current.clone(),
                to,
            }],
        )?;

        let doc = self.load_tasks()?;
        let index = doc
            .section(to)
            .iter()
            .rposition(|raw| *raw == current.raw)
            .unwrap_or_else(|| doc.section(to).len());
        Ok(Synced {
            value: TaskLine::from_raw(to, index, &current.raw),
            report,
        })
    }

    /// Remove a task and every event correlated with it.
    pub fn delete_task(&self, task: &TaskRef) -> Result<Synced<TaskLine>> {
        let doc = self.load_tasks()?;
        let current = resolve_task(&doc, task)?;
        let report = self.run(
            "task rm",
            vec![
                Step::RemoveCorrelatedEvents { task: current.clone() },
                Step::RemoveTask { task: current.clone() },
            ],
        )?;
        Ok(Synced { value: current, report })
    }

    fn read_entry(&self, task: &TaskRef) -> Result<(TaskLine, TaskEntry)> {
        let doc = self.load_tasks()?;
        let current = resolve_task(&doc, task)?;
        let entry = TaskEntry::parse(&current.raw);
        Ok((current, entry))
    }

    fn rewrite(&self, operation: &str, current: TaskLine, entry: &TaskEntry, extra: Vec<Step>) -> Result<Synced<TaskLine>> {
        let line = entry.to_line();
        let value = TaskLine::from_raw(current.section, current.index, &line);
        let mut steps = vec![Step::ReplaceTask { task: current, line }];
        steps.extend(extra);
        let report = self.run(operation, steps)?;
        Ok(Synced { value, report })
    }

    pub(crate) fn append_task_step(&self, line: String) -> Step {
        Step::AppendTask {
            section: Section::NotStarted,
            line,
            front: self.tasks.placement == Placement::Top,
        }
    }

    fn locate_appended(&self, line: &str) -> Result<TaskLine> {
        let doc = self.load_tasks()?;
        let lines = doc.section(Section::NotStarted);
        let found = match self.tasks.placement {
            Placement::Top => lines.iter().position(|raw| raw == line),
            Placement::Bottom => lines.iter().rposition(|raw| raw == line),
        };
        let index = found.unwrap_or(match self.tasks.placement {
            Placement::Top => 0,
            Placement::Bottom => lines.len(),
        });
        Ok(TaskLine::from_raw(Section::NotStarted, index, line))
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Add an event and an unchecked task mirroring it.
    pub fn create_event(&self, new: NewEvent) -> Result<Synced<CalendarEvent>> {
        let title = validate_title(&new.title)?;
        let date = validate_date(&new.date)?;
        let goal_id = clean(new.goal_id);
        if let Some(goal) = goal_id.as_deref() {
            self.require_goal(goal)?;
        }

        let mut event = CalendarEvent::new(generate_event_id(), &title, &date);
        event.event_type = clean(new.event_type);
        event.color = clean(new.color);
        event.goal_id = goal_id.clone();
        event.task_id = self.tasks.stable_ids.then(generate_task_id);

        let line = TaskEntry {
            done: false,
            title,
            due: Some(date),
            goal_id,
            id: event.task_id.clone(),
        }
        .to_line();

        let report = self.run(
            "event add",
            vec![Step::AppendEvent { event: event.clone() }, self.append_task_step(line)],
        )?;
        Ok(Synced { value: event, report })
    }

    /// Move an event; the correlated task (found with the old date) follows.
    pub fn move_event(&self, id: &str, date: &str) -> Result<Synced<CalendarEvent>> {
        let date = validate_date(date)?;
        let event = self.require_event(id)?;
        let mut moved = event.clone();
        moved.date = date.clone();

        let report = self.run(
            "event move",
            vec![
                Step::SetEventDate {
                    id: event.id.clone(),
                    date: date.clone(),
                },
                Step::RescheduleCorrelatedTask { event, date },
            ],
        )?;
        Ok(Synced { value: moved, report })
    }

    /// Remove an event and the first task correlated with it.
    pub fn delete_event(&self, id: &str) -> Result<Synced<CalendarEvent>> {
        let event = self.require_event(id)?;
        let report = self.run(
            "event rm",
            vec![
                Step::RemoveEvent { id: event.id.clone() },
                Step::RemoveCorrelatedTask { event: event.clone() },
            ],
        )?;
        Ok(Synced { value: event, report })
    }

    fn require_event(&self, id: &str) -> Result<CalendarEvent> {
        self.load_calendar()?
            .get(id)
            .cloned()
            .ok_or_else(|| Error::EventNotFound(id.to_string()))
    }

    // ------------------------------------------------------------------
    // Goals
    // ------------------------------------------------------------------

    pub fn create_goal(&self, name: &str, target_date: Option<String>, status: GoalStatus) -> Result<Synced<Goal>> {
        let target_date = clean(target_date).map(|d| validate_date(&d)).transpose()?;
        let mut goals = self.load_goals()?;
        let goal = goals.create(name, target_date, status)?.clone();
        let report = self.run("goal add", vec![Step::PutGoal { goal: goal.clone() }])?;
        Ok(Synced { value: goal, report })
    }

    pub fn update_goal(&self, id: &str, edit: GoalEdit) -> Result<Synced<Goal>> {
        let mut goal = self.require_goal(id)?;
        if let Some(name) = edit.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidArgument("goal name cannot be empty".to_string()));
            }
            goal.name = name.to_string();
        }
        if let Some(description) = edit.description {
            goal.description = clean(description);
        }
        if let Some(target_date) = edit.target_date {
            goal.target_date = clean(target_date).map(|d| validate_date(&d)).transpose()?;
        }
        if let Some(milestones) = edit.milestones {
            goal.milestones = milestones
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
        }
        let report = self.run("goal edit", vec![Step::PutGoal { goal: goal.clone() }])?;
        Ok(Synced { value: goal, report })
    }

    pub fn set_goal_status(&self, id: &str, status: GoalStatus) -> Result<Synced<Goal>> {
        let mut goal = self.require_goal(id)?;
        goal.status = status;
        let report = self.run("goal status", vec![Step::PutGoal { goal: goal.clone() }])?;
        Ok(Synced { value: goal, report })
    }

    /// Remove a goal and every event linked to it. Tasks keep their goal id.
    pub fn delete_goal(&self, id: &str) -> Result<Synced<Goal>> {
        let goal = self.require_goal(id)?;
        let report = self.run(
            "goal rm",
            vec![
                Step::RemoveGoalEvents { goal_id: goal.id.clone() },
                Step::RemoveGoal { goal_id: goal.id.clone() },
            ],
        )?;
        Ok(Synced { value: goal, report })
    }

    fn require_goal(&self, id: &str) -> Result<Goal> {
        if !fits_task_line(id) {
            return Err(Error::InvalidArgument(format!(
                "goal id '{id}' cannot be stored in a task line"
            )));
        }
        self.load_goals()?
            .get(id)
            .cloned()
            .ok_or_else(|| Error::GoalNotFound(id.to_string()))
    }

    fn checked_goal(&self, goal_id: Option<String>) -> Result<Option<String>> {
        let goal_id = clean(goal_id);
        if let Some(goal) = goal_id.as_deref() {
            self.require_goal(goal)?;
        }
        Ok(goal_id)
    }

    // ------------------------------------------------------------------
    // Journal
    // ------------------------------------------------------------------

    /// Intents left pending by interrupted operations
    pub fn pending(&self) -> Result<Vec<PendingIntent>> {
        match &self.journal {
            Some(journal) => journal.pending(),
            None => Ok(Vec::new()),
        }
    }

    /// Finish pending intents (all, or the one matching `intent`).
    ///
    /// Each remaining step re-reads its store, so a step that already landed
    /// before the interruption is skipped rather than applied twice. An
    /// append of a line without an `id:` counts as landed when an identical
    /// line is already in its section.
    pub fn replay_pending(&self, intent: Option<&str>) -> Result<Vec<SyncReport>> {
        let journal = self
            .journal
            .as_ref()
            .ok_or_else(|| Error::InvalidConfig("the intent journal is disabled".to_string()))?;
        let intents = match intent {
            Some(id) => vec![journal.find_pending(id)?],
            None => journal.pending()?,
        };

        let mut reports = Vec::new();
        for intent in intents {
            tracing::info!(intent_id = %intent.intent_id, operation = %intent.operation, "replaying intent");
            let recorder = Recorder {
                journal,
                intent_id: intent.intent_id,
            };
            let mut report = SyncReport::new(&intent.operation, Some(intent.intent_id));
            for (idx, step) in intent.remaining() {
                if self.unlinked_line_present(step)? {
                    journal.step_done(intent.intent_id, idx)?;
                    report.push(step, StepOutcome::skipped("identical task line already present"));
                    continue;
                }
                self.apply_recorded(Some(&recorder), idx, step, &mut report)?;
            }
            journal.complete(intent.intent_id)?;
            reports.push(report);
        }
        Ok(reports)
    }

    fn unlinked_line_present(&self, step: &Step) -> Result<bool> {
        match step {
            Step::AppendTask { section, line, .. } if parse_task_meta(line).id.is_none() => {
                Ok(self.load_tasks()?.section(*section).iter().any(|raw| raw == line))
            }
            _ => Ok(false),
        }
    }

    /// Apply a plan in order, journaling it when it has more than one step.
    pub(crate) fn run(&self, operation: &str, steps: Vec<Step>) -> Result<SyncReport> {
        let recorder = match &self.journal {
            Some(journal) if steps.len() > 1 => Some(Recorder {
                journal,
                intent_id: journal.begin(operation, &steps)?,
            }),
            _ => None,
        };

        let mut report = SyncReport::new(operation, recorder.as_ref().map(|r| r.intent_id));
        for (idx, step) in steps.iter().enumerate() {
            self.apply_recorded(recorder.as_ref(), idx, step, &mut report)?;
        }
        if let Some(recorder) = &recorder {
            recorder.journal.complete(recorder.intent_id)?;
        }

        for skipped in report.skipped() {
            if let StepOutcome::Skipped { reason } = &skipped.outcome {
                tracing::info!(operation, step = skipped.step, reason = %reason, "step skipped");
            }
        }
        Ok(report)
    }

    fn apply_recorded(&self, recorder: Option<&Recorder<'_>>, idx: usize, step: &Step, report: &mut SyncReport) -> Result<()> {
        match self.apply(step) {
            Ok(outcome) => {
                if let Some(recorder) = recorder {
                    recorder.journal.step_done(recorder.intent_id, idx)?;
                }
                report.push(step, outcome);
                Ok(())
            }
            Err(err) => {
                if let Some(recorder) = recorder {
                    if let Err(journal_err) = recorder.journal.fail(recorder.intent_id, idx, &err.to_string()) {
                        tracing::warn!(error = %journal_err, "could not record failed step");
                    }
                }
                Err(err)
            }
        }
    }

    /// Apply one step against the current store contents.
    pub fn apply(&self, step: &Step) -> Result<StepOutcome> {
        tracing::debug!(step = step.name(), store = %step.store(), "applying step");
        match step {
            Step::AppendTask { section, line, front } => self.update_tasks(|doc| {
                if let Some(id) = parse_task_meta(line).id {
                    if find_by_id(doc, &id).is_some() {
                        return StepOutcome::skipped("task line already present");
                    }
                }
                if *front {
                    doc.push_front(*section, line.clone());
                } else {
                    doc.push(*section, line.clone());
                }
                StepOutcome::Applied
            }),
            Step::ReplaceTask { task, line } => self.update_tasks(|doc| match locate(doc, task) {
                Some((section, index)) => {
                    doc.replace(section, index, line.clone());
                    StepOutcome::Applied
                }
                None if all_task_lines(doc).iter().any(|t| t.raw == *line) => {
                    StepOutcome::skipped("task line already rewritten")
                }
                None => StepOutcome::skipped("task line changed or removed since it was read"),
            }),
            Step::MoveTask { task, to } => self.update_tasks(|doc| match locate(doc, task) {
                Some((section, index)) => {
                    if let Some(raw) = doc.remove(section, index) {
                        doc.push(*to, raw);
                    }
                    StepOutcome::Applied
                }
                None => StepOutcome::skipped("task line changed or removed since it was read"),
            }),
            Step::RemoveTask { task } => self.update_tasks(|doc| match locate(doc, task) {
                Some((section, index)) => {
                    doc.remove(section, index);
                    StepOutcome::Applied
                }
                None => StepOutcome::skipped("task line already removed"),
            }),
            Step::RemoveCorrelatedTask { event } => self.update_tasks(|doc| {
                match all_task_lines(doc).into_iter().find(|t| task_matches_event(t, event)) {
                    Some(task) => {
                        doc.remove(task.section, task.index);
                        StepOutcome::Applied
                    }
                    None => StepOutcome::skipped("no task matches the event"),
                }
            }),
            Step::RescheduleCorrelatedTask { event, date } => self.update_tasks(|doc| {
                match all_task_lines(doc).into_iter().find(|t| task_matches_event(t, event)) {
                    Some(task) => {
                        let mut entry = TaskEntry::parse(&task.raw);
                        entry.due = Some(date.clone());
                        doc.replace(task.section, task.index, entry.to_line());
                        StepOutcome::Applied
                    }
                    None => StepOutcome::skipped("no task matches the event"),
                }
            }),
            Step::AppendEvent { event } => self.update_calendar(|calendar| {
                if calendar.get(&event.id).is_some() {
                    return StepOutcome::skipped("event already present");
                }
                calendar.events.push(event.clone());
                StepOutcome::Applied
            }),
            Step::SetEventDate { id, date } => self.update_calendar(|calendar| match calendar.position(id) {
                Some(pos) => {
                    calendar.events[pos].date = date.clone();
                    StepOutcome::Applied
                }
                None => StepOutcome::skipped("event no longer exists"),
            }),
            Step::RemoveEvent { id } => self.update_calendar(|calendar| match calendar.position(id) {
                Some(pos) => {
                    calendar.events.remove(pos);
                    StepOutcome::Applied
                }
                None => StepOutcome::skipped("event already removed"),
            }),
            Step::RemoveCorrelatedEvents { task } => self.update_calendar(|calendar| {
                let before = calendar.events.len();
                calendar.events.retain(|e| !task_matches_event(task, e));
                if calendar.events.len() == before {
                    StepOutcome::skipped("no event matches the task")
                } else {
                    StepOutcome::Applied
                }
            }),
            Step::RescheduleCorrelatedEvent { task, date } => self.update_calendar(|calendar| {
                match calendar.events.iter_mut().find(|e| task_matches_event(task, e)) {
                    Some(event) => {
                        event.date = date.clone();
                        StepOutcome::Applied
                    }
                    None => StepOutcome::skipped("no event matches the task"),
                }
            }),
            Step::SyncEventForTask { task, event } => self.update_calendar(|calendar| {
                if let Some(existing) = calendar.events.iter_mut().find(|e| task_matches_event(task, e)) {
                    existing.title = event.title.clone();
                    existing.date = event.date.clone();
                    existing.goal_id = event.goal_id.clone();
                    if event.task_id.is_some() {
                        existing.task_id = event.task_id.clone();
                    }
                    return StepOutcome::Applied;
                }
                let key = NaturalKey::of_event(event);
                if calendar.events.iter().any(|e| e.id == event.id || key.matches_event(e)) {
                    return StepOutcome::skipped("event already in sync");
                }
                calendar.events.push(event.clone());
                StepOutcome::Applied
            }),
            Step::RemoveGoalEvents { goal_id } => self.update_calendar(|calendar| {
                if calendar.remove_for_goal(goal_id) == 0 {
                    StepOutcome::skipped("no events linked to the goal")
                } else {
                    StepOutcome::Applied
                }
            }),
            Step::PutGoal { goal } => self.update_goals(|goals| {
                match goals.get_mut(&goal.id) {
                    Some(existing) => *existing = goal.clone(),
                    None => goals.goals.push(goal.clone()),
                }
                StepOutcome::Applied
            }),
            Step::RemoveGoal { goal_id } => self.update_goals(|goals| match goals.remove(goal_id) {
                Some(_) => StepOutcome::Applied,
                None => StepOutcome::skipped("goal already removed"),
            }),
        }
    }

    fn update_tasks(&self, mutate: impl FnOnce(&mut TaskDocument) -> StepOutcome) -> Result<StepOutcome> {
        let mut doc = self.load_tasks()?;
        let outcome = mutate(&mut doc);
        if outcome.is_applied() {
            self.save_tasks(&doc)?;
        }
        Ok(outcome)
    }

    fn update_calendar(&self, mutate: impl FnOnce(&mut CalendarStore) -> StepOutcome) -> Result<StepOutcome> {
        let mut calendar = self.load_calendar()?;
        let outcome = mutate(&mut calendar);
        if outcome.is_applied() {
            self.save_calendar(&calendar)?;
        }
        Ok(outcome)
    }

    fn update_goals(&self, mutate: impl FnOnce(&mut GoalStore) -> StepOutcome) -> Result<StepOutcome> {
        let mut goals = self.load_goals()?;
        let outcome = mutate(&mut goals);
        if outcome.is_applied() {
            self.save_goals(&goals)?;
        }
        Ok(outcome)
    }
}

struct Recorder<'a> {
    journal: &'a Journal,
    intent_id: Uuid,
}

/// Find a snapshot in the current document: recorded position if the line
/// is unchanged there, else the stable id, else the first identical line.
fn locate(doc: &TaskDocument, task: &TaskLine) -> Option<(Section, usize)> {
    if doc.get(task.section, task.index) == Some(task.raw.as_str()) {
        return Some((task.section, task.index));
    }
    if let Some(id) = task.id.as_deref() {
        return find_by_id(doc, id);
    }
    all_task_lines(doc)
        .into_iter()
        .find(|t| t.raw == task.raw)
        .map(|t| (t.section, t.index))
}

fn find_by_id(doc: &TaskDocument, id: &str) -> Option<(Section, usize)> {
    all_task_lines(doc)
        .into_iter()
        .find(|t| t.id.as_deref() == Some(id))
        .map(|t| (t.section, t.index))
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trimmed title with strikethrough markers removed, so the line and its
/// event carry the same text.
fn validate_title(title: &str) -> Result<String> {
    let title = title.replace(STRIKE, "");
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::InvalidArgument("title cannot be empty".to_string()));
    }
    if title.contains('\n') || title.contains('\r') {
        return Err(Error::InvalidArgument("title must be a single line".to_string()));
    }
    if title.contains(META_SEPARATOR) {
        return Err(Error::InvalidArgument(format!(
            "title cannot contain '{}'",
            META_SEPARATOR.trim()
        )));
    }
    if !fits_task_line(title) {
        return Err(Error::InvalidArgument(
            "title cannot start with '| ' or end with ' |'".to_string(),
        ));
    }
    Ok(title.to_string())
}

/// Parse a calendar date and return it as `YYYY-MM-DD`.
pub fn validate_date(date: &str) -> Result<String> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| Error::InvalidArgument(format!("invalid date '{date}' (expected YYYY-MM-DD)")))
}
