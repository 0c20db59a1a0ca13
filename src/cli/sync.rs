//! taskdeck sync command implementations.

use serde::Serialize;

use crate::cli::{push_report, Context, Globals};
use crate::error::{Error, Result};
use crate::journal::PendingIntent;
use crate::output::{emit_success, HumanOutput};
use crate::sync::SyncReport;

#[derive(Serialize)]
struct SyncStatusOutput {
    journal_enabled: bool,
    pending: Vec<PendingIntent>,
}

#[derive(Serialize)]
struct ReplayOutput {
    replayed: Vec<SyncReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pruned: Option<usize>,
}

pub fn run_status(globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let pending = ctx.sync.pending()?;

    let header = if pending.is_empty() {
        "Sync: nothing pending"
    } else {
        "Sync: pending operations"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("Workspace", ctx.root.display().to_string());
    match ctx.sync.journal() {
        Some(journal) => human.push_summary("Journal", journal.path().display().to_string()),
        None => human.push_summary("Journal", "disabled"),
    }
    human.push_summary("Pending", pending.len().to_string());

    for intent in &pending {
        human.push_detail(format!(
            "{} {} ({}/{} steps, started {})",
            intent.intent_id,
            intent.operation,
            intent.completed.len(),
            intent.steps.len(),
            intent.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        for (_, step) in intent.remaining() {
            human.push_detail(format!("  todo: {}", step.describe()));
        }
        if let Some(error) = &intent.last_error {
            human.push_warning(format!("{}: {error}", intent.intent_id));
        }
    }
    if !pending.is_empty() {
        human.push_next_step("taskdeck sync replay");
    }

    let output = SyncStatusOutput {
        journal_enabled: ctx.config.journal.enabled,
        pending,
    };
    emit_success(globals.output, "sync status", &output, Some(&human))
}

pub fn run_replay(intent: Option<&str>, prune: bool, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let replayed = ctx.sync.replay_pending(intent)?;

    let pruned = if prune {
        let journal = ctx
            .sync
            .journal()
            .ok_or_else(|| Error::InvalidConfig("the intent journal is disabled".to_string()))?;
        Some(journal.prune()?)
    } else {
        None
    };

    let header = if replayed.is_empty() {
        "Sync: nothing to replay".to_string()
    } else {
        format!("Sync: replayed {} operation(s)", replayed.len())
    };
    let mut human = HumanOutput::new(header);
    for report in &replayed {
        human.push_detail(report.operation.clone());
        push_report(&mut human, report);
    }
    if let Some(count) = pruned {
        human.push_summary("Pruned records", count.to_string());
    }

    emit_success(globals.output, "sync replay", &ReplayOutput { replayed, pruned }, Some(&human))
}
