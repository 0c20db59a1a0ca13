//! Derived views over a parsed task document.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::calendar::CalendarEvent;
use crate::error::{Error, Result};
use crate::goal::Goal;
use crate::task_doc::{is_task_done, parse_task_meta, task_title, Section, TaskDocument};

/// A task line tagged with its position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLine {
    pub section: Section,
    pub index: usize,
    pub raw: String,
    pub title: String,
    pub done: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
    #[serde(rename = "goalId", skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl TaskLine {
    pub fn from_raw(section: Section, index: usize, raw: &str) -> Self {
        let meta = parse_task_meta(raw);
        Self {
            section,
            index,
            raw: raw.to_string(),
            title: task_title(raw),
            done: is_task_done(raw),
            due: meta.due,
            goal_id: meta.goal_id,
            id: meta.id,
        }
    }

    /// How commands address this line: its stable id, else its position
    pub fn reference(&self) -> TaskRef {
        match &self.id {
            Some(id) => TaskRef::Id(id.clone()),
            None => TaskRef::Position {
                section: self.section,
                index: self.index,
            },
        }
    }

    pub fn natural_key(&self) -> NaturalKey<'_> {
        NaturalKey::new(&self.title, self.due.as_deref(), self.goal_id.as_deref())
    }
}

/// All lines in canonical section order, then index order.
pub fn all_task_lines(doc: &TaskDocument) -> Vec<TaskLine> {
    doc.sections()
        .flat_map(|(section, lines)| {
            lines
                .iter()
                .enumerate()
                .map(move |(index, raw)| TaskLine::from_raw(section, index, raw))
        })
        .collect()
}

/// Tasks linked to `goal_id`, or tasks with no goal when `goal_id` is `None`.
pub fn tasks_for_goal(doc: &TaskDocument, goal_id: Option<&str>) -> Vec<TaskLine> {
    all_task_lines(doc)
        .into_iter()
        .filter(|task| task.goal_id.as_deref() == goal_id)
        .collect()
}

/// Done and total counts for one goal's tasks.
///
/// `total == 0` means "nothing to show", not complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GoalProgress {
    pub done: usize,
    pub total: usize,
}

pub fn goal_progress(doc: &TaskDocument, goal_id: &str) -> GoalProgress {
    let tasks = tasks_for_goal(doc, Some(goal_id));
    GoalProgress {
        done: tasks.iter().filter(|t| t.done).count(),
        total: tasks.len(),
    }
}

/// Correlation key between a task line and a calendar event.
///
/// Titles compare trimmed; an absent goal only equals another absent goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NaturalKey<'a> {
    pub title: &'a str,
    pub date: Option<&'a str>,
    pub goal_id: Option<&'a str>,
}

impl<'a> NaturalKey<'a> {
    pub fn new(title: &'a str, date: Option<&'a str>, goal_id: Option<&'a str>) -> Self {
        Self {
            title: title.trim(),
            date,
            goal_id,
        }
    }

    pub fn of_event(event: &'a CalendarEvent) -> Self {
        Self::new(&event.title, Some(event.date.as_str()), event.goal_id.as_deref())
    }

    pub fn matches_event(&self, event: &CalendarEvent) -> bool {
        *self == NaturalKey::of_event(event)
    }
}

/// Whether a task line and an event are the same logical pair.
///
/// When both sides carry a stable link (task `id`, event `taskId`) only the
/// link is compared; otherwise the natural key decides.
pub fn task_matches_event(task: &TaskLine, event: &CalendarEvent) -> bool {
    match (task.id.as_deref(), event.task_id.as_deref()) {
        (Some(id), Some(task_id)) => id == task_id,
        _ => task.natural_key().matches_event(event),
    }
}

/// How a command addresses a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskRef {
    /// Positional `(section, index)`; may be stale after concurrent edits
    Position { section: Section, index: usize },
    /// Stable line id from the `id:` metadata
    Id(String),
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskRef::Position { section, index } => write!(f, "{}:{index}", section.slug()),
            TaskRef::Id(id) => write!(f, "id:{id}"),
        }
    }
}

impl FromStr for TaskRef {
    type Err = Error;

    /// `<section>:<index>` (e.g. `done:0`), `id:<id>`, or a bare id.
    fn from_str(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidArgument("task reference cannot be empty".to_string()));
        }
        if let Some(id) = value.strip_prefix("id:") {
            return Ok(TaskRef::Id(id.trim().to_string()));
        }
        if let Some((section, index)) = value.rsplit_once(':') {
            if let (Ok(section), Ok(index)) = (section.parse::<Section>(), index.trim().parse::<usize>()) {
                return Ok(TaskRef::Position { section, index });
            }
        }
        if value.contains(char::is_whitespace) {
            return Err(Error::InvalidArgument(format!(
                "invalid task reference '{value}' (expected <section>:<index> or id:<id>)"
            )));
        }
        Ok(TaskRef::Id(value.to_string()))
    }
}

/// Resolve a reference against the current document.
pub fn resolve_task(doc: &TaskDocument, task: &TaskRef) -> Result<TaskLine> {
    match task {
        TaskRef::Position { section, index } => doc
            .get(*section, *index)
            .map(|raw| TaskLine::from_raw(*section, *index, raw))
            .ok_or_else(|| Error::TaskNotFound(format!("{task} (position out of range)"))),
        TaskRef::Id(id) => all_task_lines(doc)
            .into_iter()
            .find(|line| line.id.as_deref() == Some(id.as_str()))
            .ok_or_else(|| Error::TaskNotFound(task.to_string())),
    }
}

/// One column of the goal-grouped board.
#[derive(Debug, Clone, Serialize)]
pub struct GoalColumn {
    #[serde(rename = "goalId", skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    pub name: String,
    pub progress: GoalProgress,
    pub tasks: Vec<TaskLine>,
}

/// Group tasks by goal: one column per goal in store order, then a
/// "No goal" column. Tasks whose goal no longer exists land in a final
/// "Unknown goal" column when there are any.
pub fn goal_columns(doc: &TaskDocument, goals: &[Goal]) -> Vec<GoalColumn> {
    let mut columns: Vec<GoalColumn> = goals
        .iter()
        .map(|goal| {
            let tasks = tasks_for_goal(doc, Some(&goal.id));
            GoalColumn {
                goal_id: Some(goal.id.clone()),
                name: goal.name.clone(),
                progress: progress_of(&tasks),
                tasks,
            }
        })
        .collect();

    let unlinked = tasks_for_goal(doc, None);
    columns.push(GoalColumn {
        goal_id: None,
        name: "No goal".to_string(),
        progress: progress_of(&unlinked),
        tasks: unlinked,
    });

    let known: HashSet<&str> = goals.iter().map(|g| g.id.as_str()).collect();
    let dangling: Vec<TaskLine> = all_task_lines(doc)
        .into_iter()
        .filter(|t| matches!(t.goal_id.as_deref(), Some(id) if !known.contains(id)))
        .collect();
    if !dangling.is_empty() {
        columns.push(GoalColumn {
            goal_id: None,
            name: "Unknown goal".to_string(),
            progress: progress_of(&dangling),
            tasks: dangling,
        });
    }

    columns
}

fn progress_of(tasks: &[TaskLine]) -> GoalProgress {
    GoalProgress {
        done: tasks.iter().filter(|t| t.done).count(),
        total: tasks.len(),
    }
}
