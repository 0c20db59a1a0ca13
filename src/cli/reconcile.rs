//! taskdeck reconcile command implementation.

use crate::cli::task::task_label;
use crate::cli::{push_report, Context, Globals};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::reconcile::reconcile;

pub fn run(fix: bool, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let result = reconcile(&ctx.sync, fix)?;
    let drift = &result.drift;

    let header = if drift.is_clean() {
        "Reconcile: stores agree".to_string()
    } else {
        format!("Reconcile: {} issue(s)", drift.issue_count())
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("Tasks without event", drift.tasks_without_event.len().to_string());
    human.push_summary("Events without task", drift.events_without_task.len().to_string());
    human.push_summary("Unknown goal (tasks)", drift.tasks_with_unknown_goal.len().to_string());
    human.push_summary("Unknown goal (events)", drift.events_with_unknown_goal.len().to_string());

    for task in &drift.tasks_without_event {
        human.push_detail(format!("no event: {}", task_label(task)));
    }
    for event in &drift.events_without_task {
        human.push_detail(format!("no task: {} {} ({})", event.date, event.title, event.id));
    }
    for task in &drift.tasks_with_unknown_goal {
        human.push_warning(format!("unknown goal: {}", task_label(task)));
    }
    for event in &drift.events_with_unknown_goal {
        human.push_warning(format!(
            "unknown goal: event {} ({})",
            event.id,
            event.goal_id.as_deref().unwrap_or_default()
        ));
    }

    for event in &result.unfixable {
        human.push_warning(format!(
            "left alone: event {} '{}' cannot be written as a task line; rename it",
            event.id, event.title
        ));
    }

    match &result.fixed {
        Some(report) => push_report(&mut human, report),
        None if !fix && (!drift.tasks_without_event.is_empty() || !drift.events_without_task.is_empty()) => {
            human.push_next_step("taskdeck reconcile --fix");
        }
        None => {}
    }

    emit_success(globals.output, "reconcile", &result, Some(&human))
}
