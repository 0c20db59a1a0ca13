//! Drift detection between the task document and the calendar.
//!
//! Multi-store writes are not transactional, so the stores can drift apart
//! (a crash between writes, a hand edit, a rename). `detect_drift` lists the
//! mismatches; `reconcile` can additionally append the missing counterparts.
//! Nothing is ever deleted or rewritten by a fix.

use std::collections::HashSet;

use serde::Serialize;

use crate::calendar::{generate_event_id, CalendarEvent, CalendarStore};
use crate::error::Result;
use crate::goal::GoalStore;
use crate::query::{all_task_lines, task_matches_event, TaskLine};
use crate::storage::Store;
use crate::sync::{Step, SyncReport, Synchronizer};
use crate::task_doc::{Section, TaskDocument, TaskEntry};

#[derive(Debug, Clone, Default, Serialize)]
pub struct DriftReport {
    /// Dated tasks with no correlated event
    pub tasks_without_event: Vec<TaskLine>,
    /// Events with no correlated task
    pub events_without_task: Vec<CalendarEvent>,
    /// Tasks whose goal id is not in the goal store
    pub tasks_with_unknown_goal: Vec<TaskLine>,
    /// Events whose goal id is not in the goal store
    pub events_with_unknown_goal: Vec<CalendarEvent>,
}

impl DriftReport {
    pub fn issue_count(&self) -> usize {
        self.tasks_without_event.len()
            + self.events_without_task.len()
            + self.tasks_with_unknown_goal.len()
            + self.events_with_unknown_goal.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }
}

pub fn detect_drift(doc: &TaskDocument, calendar: &CalendarStore, goals: &GoalStore) -> DriftReport {
    let tasks = all_task_lines(doc);
    let known: HashSet<&str> = goals.goals.iter().map(|g| g.id.as_str()).collect();
    let dangling = |goal_id: Option<&str>| matches!(goal_id, Some(id) if !known.contains(id));

    DriftReport {
        tasks_without_event: tasks
            .iter()
            .filter(|t| t.due.is_some())
            .filter(|t| !calendar.events.iter().any(|e| task_matches_event(t, e)))
            .cloned()
            .collect(),
        events_without_task: calendar
            .events
            .iter()
            .filter(|e| !tasks.iter().any(|t| task_matches_event(t, e)))
            .cloned()
            .collect(),
        tasks_with_unknown_goal: tasks
            .iter()
            .filter(|t| dangling(t.goal_id.as_deref()))
            .cloned()
            .collect(),
        events_with_unknown_goal: calendar
            .events
            .iter()
            .filter(|e| dangling(e.goal_id.as_deref()))
            .cloned()
            .collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub drift: DriftReport,
    /// Present when a fix was requested and there was something to append
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<SyncReport>,
    /// Events a fix left alone because no task line can carry them as is
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unfixable: Vec<CalendarEvent>,
}

/// Detect drift and, with `fix`, append an event for every dated task
/// lacking one and a task for every event lacking one. Unknown goal
/// references are only reported.
pub fn reconcile<S: Store>(sync: &Synchronizer<S>, fix: bool) -> Result<Reconciliation> {
    let drift = detect_drift(&sync.load_tasks()?, &sync.load_calendar()?, &sync.load_goals()?);
    tracing::debug!(issues = drift.issue_count(), "drift detected");

    if !fix {
        return Ok(Reconciliation {
            drift,
            fixed: None,
            unfixable: Vec::new(),
        });
    }

    let mut steps = Vec::new();
    for task in &drift.tasks_without_event {
        let Some(date) = task.due.as_deref() else {
            continue;
        };
        let mut event = CalendarEvent::new(generate_event_id(), &task.title, date);
        event.goal_id = task.goal_id.clone();
        event.task_id = task.id.clone();
        steps.push(Step::AppendEvent { event });
    }
    let mut unfixable = Vec::new();
    for event in &drift.events_without_task {
        match line_for_event(event) {
            Some(line) => steps.push(sync.append_task_step(line)),
            None => {
                tracing::warn!(event = %event.id, title = %event.title, "event cannot be written as a task line");
                unfixable.push(event.clone());
            }
        }
    }

    let fixed = if steps.is_empty() {
        None
    } else {
        Some(sync.run("reconcile", steps)?)
    };
    Ok(Reconciliation {
        drift,
        fixed,
        unfixable,
    })
}

/// Unchecked line mirroring `event`, if it parses back to the same title,
/// date, goal and link.
fn line_for_event(event: &CalendarEvent) -> Option<String> {
    let entry = TaskEntry {
        done: false,
        title: event.title.trim().to_string(),
        due: Some(event.date.clone()),
        goal_id: event.goal_id.clone(),
        id: event.task_id.clone(),
    };
    let line = entry.to_line();
    let read = TaskLine::from_raw(Section::NotStarted, 0, &line);
    let same = read.title == entry.title
        && read.due == entry.due
        && read.goal_id == entry.goal_id
        && read.id == entry.id;
    (same && task_matches_event(&read, event)).then_some(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores() -> (TaskDocument, CalendarStore, GoalStore) {
        let doc = TaskDocument::parse(
            "## Not Started\n\
             - [ ] Paired | due:2024-01-01\n\
             - [ ] Lonely task | due:2024-01-02\n\
             - [ ] Undated | goal:g-gone\n",
        );
        let calendar = CalendarStore::parse(
            r#"{"events":[
                {"id":"e1","title":"Paired","date":"2024-01-01"},
                {"id":"e2","title":"Lonely event","date":"2024-01-03","goalId":"g-1"}
            ]}"#,
        );
        let goals = GoalStore::parse(r#"{"goals":[{"id":"g-1","name":"Kept"}]}"#);
        (doc, calendar, goals)
    }

    #[test]
    fn reports_each_kind_of_drift() {
        let (doc, calendar, goals) = stores();
        let drift = detect_drift(&doc, &calendar, &goals);

        assert_eq!(drift.tasks_without_event.len(), 1);
        assert_eq!(drift.tasks_without_event[0].title, "Lonely task");
        assert_eq!(drift.tasks_without_event[0].section, Section::NotStarted);
        assert_eq!(drift.events_without_task.len(), 1);
        assert_eq!(drift.events_without_task[0].id, "e2");
        assert_eq!(drift.tasks_with_unknown_goal.len(), 1);
        assert!(drift.events_with_unknown_goal.is_empty());
        assert_eq!(drift.issue_count(), 3);
    }

    #[test]
    fn only_events_that_read_back_get_a_line() {
        let plain = CalendarEvent::new("e1", " Standup ", "2024-01-01");
        assert_eq!(line_for_event(&plain).as_deref(), Some("[ ] Standup | due:2024-01-01"));

        let mut linked = CalendarEvent::new("e2", "Review", "2024-01-02");
        linked.goal_id = Some("g-1".to_string());
        linked.task_id = Some("t-1".to_string());
        assert_eq!(
            line_for_event(&linked).as_deref(),
            Some("[ ] Review | due:2024-01-02 | goal:g-1 | id:t-1")
        );

        for title in ["Standup | team", "Pay rent |", "Fix ~~bug", ""] {
            assert_eq!(line_for_event(&CalendarEvent::new("e3", title, "2024-01-03")), None, "{title}");
        }
        let mut odd_goal = CalendarEvent::new("e4", "Fine", "2024-01-04");
        odd_goal.goal_id = Some("g | x".to_string());
        assert_eq!(line_for_event(&odd_goal), None);
    }

    #[test]
    fn consistent_stores_are_clean() {
        let doc = TaskDocument::parse("- [ ] Paired | due:2024-01-01\n");
        let calendar = CalendarStore::parse(r#"{"events":[{"id":"e1","title":"Paired","date":"2024-01-01"}]}"#);
        assert!(detect_drift(&doc, &calendar, &GoalStore::default()).is_clean());
    }
}
