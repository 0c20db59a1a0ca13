//! taskdeck event command implementations.

use serde::Serialize;

use crate::calendar::CalendarEvent;
use crate::cli::{push_report, Context, Globals};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::sync::{validate_date, NewEvent, StoreKind, Synced};

pub struct AddOptions {
    pub title: String,
    pub date: String,
    pub event_type: Option<String>,
    pub color: Option<String>,
    pub goal: Option<String>,
}

pub struct ListOptions {
    pub from: Option<String>,
    pub to: Option<String>,
    pub day: Option<String>,
}

#[derive(Serialize)]
struct EventListOutput<'a> {
    total: usize,
    events: Vec<&'a CalendarEvent>,
}

fn event_label(event: &CalendarEvent) -> String {
    let mut label = format!("{} {} ({})", event.date, event.title, event.id);
    if let Some(kind) = &event.event_type {
        label.push_str(&format!(" [{kind}]"));
    }
    if let Some(goal) = &event.goal_id {
        label.push_str(&format!(" goal:{goal}"));
    }
    label
}

pub fn run_add(options: AddOptions, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let created = ctx.sync.create_event(NewEvent {
        title: options.title,
        date: options.date,
        event_type: options.event_type,
        color: options.color,
        goal_id: options.goal,
    })?;
    emit_event(globals, "event add", "Event added", &created)
}

pub fn run_list(options: ListOptions, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let calendar = ctx.sync.load_calendar()?;

    let (from, to) = match options.day {
        Some(day) => {
            let day = validate_date(&day)?;
            (day.clone(), day)
        }
        None => (
            options.from.as_deref().map(validate_date).transpose()?.unwrap_or_default(),
            options
                .to
                .as_deref()
                .map(validate_date)
                .transpose()?
                .unwrap_or_else(|| "9999-12-31".to_string()),
        ),
    };
    let events = calendar.in_range(&from, &to);

    let mut human = HumanOutput::new("Events");
    human.push_summary("Total", events.len().to_string());
    if let Some(updated) = ctx.sync.last_modified(StoreKind::Calendar)? {
        human.push_summary("Updated", updated.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
    for event in &events {
        human.push_detail(event_label(event));
    }

    let output = EventListOutput {
        total: events.len(),
        events,
    };
    emit_success(globals.output, "event list", &output, Some(&human))
}

pub fn run_move(id: &str, date: &str, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let moved = ctx.sync.move_event(id, date)?;
    emit_event(globals, "event move", "Event moved", &moved)
}

pub fn run_rm(id: &str, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let removed = ctx.sync.delete_event(id)?;
    emit_event(globals, "event rm", "Event removed", &removed)
}

fn emit_event(globals: &Globals, command: &str, header: &str, result: &Synced<CalendarEvent>) -> Result<()> {
    let mut human = HumanOutput::new(header);
    human.push_summary("Event", event_label(&result.value));
    push_report(&mut human, &result.report);
    emit_success(globals.output, command, result, Some(&human))
}
