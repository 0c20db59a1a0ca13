//! taskdeck goal command implementations.

use serde::Serialize;

use crate::cli::task::task_label;
use crate::cli::{push_report, Context, Globals};
use crate::error::{Error, Result};
use crate::goal::{Goal, GoalStatus};
use crate::output::{emit_success, HumanOutput};
use crate::query::{goal_progress, tasks_for_goal, GoalProgress, TaskLine};
use crate::sync::{GoalEdit, Synced};

pub struct AddOptions {
    pub name: String,
    pub target: Option<String>,
    pub status: String,
}

pub struct EditOptions {
    pub id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub clear_description: bool,
    pub target: Option<String>,
    pub clear_target: bool,
    pub milestones: Vec<String>,
    pub clear_milestones: bool,
}

#[derive(Serialize)]
struct GoalSummary {
    #[serde(flatten)]
    goal: Goal,
    #[serde(rename = "effectiveColor")]
    effective_color: Option<String>,
    progress: GoalProgress,
}

#[derive(Serialize)]
struct GoalListOutput {
    total: usize,
    goals: Vec<GoalSummary>,
}

#[derive(Serialize)]
struct GoalShowOutput {
    #[serde(flatten)]
    summary: GoalSummary,
    tasks: Vec<TaskLine>,
}

fn goal_label(goal: &Goal, progress: GoalProgress) -> String {
    let mut label = format!("{} {} [{}]", goal.id, goal.name, goal.status);
    if progress.total > 0 {
        label.push_str(&format!(" {}/{}", progress.done, progress.total));
    }
    if let Some(target) = &goal.target_date {
        label.push_str(&format!(" target:{target}"));
    }
    label
}

pub fn run_add(options: AddOptions, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let status: GoalStatus = options.status.parse()?;
    let created = ctx.sync.create_goal(&options.name, options.target, status)?;

    let mut human = HumanOutput::new("Goal added");
    human.push_summary("ID", created.value.id.clone());
    human.push_summary("Name", created.value.name.clone());
    human.push_summary("Color", created.value.color.clone().unwrap_or_default());
    human.push_next_step(format!("taskdeck goal add-task {} <title>", created.value.id));
    emit_success(globals.output, "goal add", &created, Some(&human))
}

pub fn run_list(status: Option<&str>, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let status = status.map(str::parse::<GoalStatus>).transpose()?;
    let store = ctx.sync.load_goals()?;
    let doc = ctx.sync.load_tasks()?;

    let mut human = HumanOutput::new("Goals");
    let mut goals = Vec::new();
    for column in GoalStatus::ALL {
        if status.is_some_and(|s| s != column) {
            continue;
        }
        let members = store.by_status(column);
        if members.is_empty() {
            continue;
        }
        human.push_detail(format!("{column}:"));
        for goal in members {
            let progress = goal_progress(&doc, &goal.id);
            human.push_detail(format!("  {}", goal_label(goal, progress)));
            goals.push(GoalSummary {
                goal: goal.clone(),
                effective_color: store.effective_color(&goal.id).map(str::to_string),
                progress,
            });
        }
    }
    human.push_summary("Total", goals.len().to_string());

    let output = GoalListOutput {
        total: goals.len(),
        goals,
    };
    emit_success(globals.output, "goal list", &output, Some(&human))
}

pub fn run_show(id: &str, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let store = ctx.sync.load_goals()?;
    let goal = store
        .get(id)
        .cloned()
        .ok_or_else(|| Error::GoalNotFound(id.to_string()))?;
    let doc = ctx.sync.load_tasks()?;
    let tasks = tasks_for_goal(&doc, Some(id));
    let progress = goal_progress(&doc, id);

    let mut human = HumanOutput::new(format!("Goal {}", goal.id));
    human.push_summary("Name", goal.name.clone());
    human.push_summary("Status", goal.status.as_str());
    if let Some(description) = &goal.description {
        human.push_summary("Description", description.clone());
    }
    if let Some(target) = &goal.target_date {
        human.push_summary("Target", target.clone());
    }
    human.push_summary("Progress", format!("{}/{}", progress.done, progress.total));
    for milestone in &goal.milestones {
        human.push_detail(format!("milestone: {milestone}"));
    }
    for task in &tasks {
        human.push_detail(task_label(task));
    }

    let output = GoalShowOutput {
        summary: GoalSummary {
            effective_color: store.effective_color(id).map(str::to_string),
            goal,
            progress,
        },
        tasks,
    };
    emit_success(globals.output, "goal show", &output, Some(&human))
}

pub fn run_edit(options: EditOptions, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let edit = GoalEdit {
        name: options.name,
        description: if options.clear_description {
            Some(None)
        } else {
            options.description.map(Some)
        },
        target_date: if options.clear_target {
            Some(None)
        } else {
            options.target.map(Some)
        },
        milestones: if options.clear_milestones {
            Some(Vec::new())
        } else if options.milestones.is_empty() {
            None
        } else {
            Some(options.milestones)
        },
    };
    let updated = ctx.sync.update_goal(&options.id, edit)?;
    emit_goal(globals, "goal edit", "Goal updated", &updated)
}

pub fn run_status(id: &str, status: &str, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let status: GoalStatus = status.parse()?;
    let updated = ctx.sync.set_goal_status(id, status)?;
    emit_goal(globals, "goal status", "Goal moved", &updated)
}

pub fn run_rm(id: &str, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let removed = ctx.sync.delete_goal(id)?;
    let mut human = HumanOutput::new("Goal removed");
    human.push_summary("Goal", removed.value.name.clone());
    push_report(&mut human, &removed.report);

    let dangling = tasks_for_goal(&ctx.sync.load_tasks()?, Some(id)).len();
    if dangling > 0 {
        human.push_warning(format!("{dangling} task(s) still reference {id}"));
        human.push_next_step("taskdeck reconcile");
    }
    emit_success(globals.output, "goal rm", &removed, Some(&human))
}

pub fn run_progress(id: Option<&str>, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let store = ctx.sync.load_goals()?;
    let doc = ctx.sync.load_tasks()?;

    let goals: Vec<&Goal> = match id {
        Some(id) => vec![store.get(id).ok_or_else(|| Error::GoalNotFound(id.to_string()))?],
        None => store.goals.iter().collect(),
    };

    let mut human = HumanOutput::new("Goal progress");
    let mut summaries = Vec::new();
    for goal in goals {
        let progress = goal_progress(&doc, &goal.id);
        let shown = if progress.total == 0 {
            "no tasks".to_string()
        } else {
            format!("{}/{}", progress.done, progress.total)
        };
        human.push_detail(format!("{} {}: {shown}", goal.id, goal.name));
        summaries.push(GoalSummary {
            goal: goal.clone(),
            effective_color: store.effective_color(&goal.id).map(str::to_string),
            progress,
        });
    }

    let output = GoalListOutput {
        total: summaries.len(),
        goals: summaries,
    };
    emit_success(globals.output, "goal progress", &output, Some(&human))
}

pub fn run_add_task(goal: &str, title: &str, due: Option<String>, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let created = ctx.sync.create_task_for_goal(goal, title, due)?;
    let mut human = HumanOutput::new("Task added");
    human.push_summary("Task", task_label(&created.value));
    human.push_summary("Goal", goal);
    push_report(&mut human, &created.report);
    emit_success(globals.output, "goal add-task", &created, Some(&human))
}

fn emit_goal(globals: &Globals, command: &str, header: &str, result: &Synced<Goal>) -> Result<()> {
    let mut human = HumanOutput::new(header);
    human.push_summary("Goal", format!("{} {}", result.value.id, result.value.name));
    human.push_summary("Status", result.value.status.as_str());
    push_report(&mut human, &result.report);
    emit_success(globals.output, command, result, Some(&human))
}
