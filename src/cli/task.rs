//! taskdeck task command implementations.

use serde::Serialize;

use crate::cli::{push_report, Context, Globals};
use crate::error::Result;
use crate::output::{emit_success, HumanOutput};
use crate::query::{all_task_lines, goal_columns, tasks_for_goal, GoalColumn, TaskLine, TaskRef};
use crate::sync::{NewTask, StoreKind, Synced, TaskEdit};
use crate::task_doc::Section;

pub struct AddOptions {
    pub title: String,
    pub due: Option<String>,
    pub goal: Option<String>,
}

pub struct ListOptions {
    pub section: Option<String>,
    pub goal: Option<String>,
    pub no_goal: bool,
    pub by_goal: bool,
}

pub struct EditOptions {
    pub task: String,
    pub title: Option<String>,
    pub due: Option<String>,
    pub clear_due: bool,
    pub goal: Option<String>,
    pub clear_goal: bool,
}

#[derive(Serialize)]
struct TaskListOutput {
    total: usize,
    tasks: Vec<TaskLine>,
}

#[derive(Serialize)]
struct GoalBoardOutput {
    columns: Vec<GoalColumn>,
}

/// `[x] Title (ref) due:... goal:...`
pub(crate) fn task_label(task: &TaskLine) -> String {
    let mut label = format!(
        "[{}] {} ({})",
        if task.done { "x" } else { " " },
        task.title,
        task.reference()
    );
    if let Some(due) = &task.due {
        label.push_str(&format!(" due:{due}"));
    }
    if let Some(goal) = &task.goal_id {
        label.push_str(&format!(" goal:{goal}"));
    }
    label
}

pub fn run_add(options: AddOptions, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let created = ctx.sync.create_task(NewTask {
        title: options.title,
        due: options.due,
        goal_id: options.goal,
    })?;
    emit_task(globals, "task add", "Task added", &created)
}

pub fn run_list(options: ListOptions, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let doc = ctx.sync.load_tasks()?;
    let updated = ctx.sync.last_modified(StoreKind::Tasks)?;

    if options.by_goal {
        let goals = ctx.sync.load_goals()?;
        let columns = goal_columns(&doc, &goals.goals);

        let mut human = HumanOutput::new("Tasks by goal");
        for column in &columns {
            human.push_detail(format!(
                "{} ({}/{})",
                column.name, column.progress.done, column.progress.total
            ));
            for task in &column.tasks {
                human.push_detail(format!("  {}", task_label(task)));
            }
        }
        return emit_success(globals.output, "task list", &GoalBoardOutput { columns }, Some(&human));
    }

    let section = options.section.as_deref().map(str::parse::<Section>).transpose()?;
    let mut tasks = if options.no_goal {
        tasks_for_goal(&doc, None)
    } else if let Some(goal) = options.goal.as_deref() {
        tasks_for_goal(&doc, Some(goal))
    } else {
        all_task_lines(&doc)
    };
    if let Some(section) = section {
        tasks.retain(|t| t.section == section);
    }

    let mut human = HumanOutput::new("Tasks");
    human.push_summary("Total", tasks.len().to_string());
    if let Some(updated) = updated {
        human.push_summary("Updated", updated.format("%Y-%m-%d %H:%M:%S UTC").to_string());
    }
    let mut current = None;
    for task in &tasks {
        if current != Some(task.section) {
            human.push_detail(format!("{}:", task.section));
            current = Some(task.section);
        }
        human.push_detail(format!("  {}", task_label(task)));
    }

    let output = TaskListOutput {
        total: tasks.len(),
        tasks,
    };
    emit_success(globals.output, "task list", &output, Some(&human))
}

pub fn run_set_done(task: &str, done: bool, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let task: TaskRef = task.parse()?;
    let result = ctx.sync.set_task_done(&task, done)?;
    let (command, header) = if done {
        ("task done", "Task checked")
    } else {
        ("task undone", "Task unchecked")
    };
    emit_task(globals, command, header, &result)
}

pub fn run_rename(task: &str, title: &str, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let task: TaskRef = task.parse()?;
    let result = ctx.sync.rename_task(&task, title)?;
    emit_task(globals, "task rename", "Task renamed", &result)
}

pub fn run_edit(options: EditOptions, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let task: TaskRef = options.task.parse()?;
    let edit = TaskEdit {
        title: options.title,
        due: if options.clear_due { Some(None) } else { options.due.map(Some) },
        goal_id: if options.clear_goal { Some(None) } else { options.goal.map(Some) },
    };
    let result = ctx.sync.edit_task(&task, edit)?;
    emit_task(globals, "task edit", "Task updated", &result)
}

pub fn run_move(task: &str, section: &str, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let task: TaskRef = task.parse()?;
    let section: Section = section.parse()?;
    let result = ctx.sync.move_task(&task, section)?;
    emit_task(globals, "task move", "Task moved", &result)
}

pub fn run_goal(task: &str, goal: Option<String>, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let task: TaskRef = task.parse()?;
    let header = if goal.is_some() { "Task linked" } else { "Task unlinked" };
    let result = ctx.sync.set_task_goal(&task, goal)?;
    emit_task(globals, "task goal", header, &result)
}

pub fn run_reschedule(task: &str, date: Option<String>, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let task: TaskRef = task.parse()?;
    let result = ctx.sync.reschedule_task(&task, date)?;
    emit_task(globals, "task reschedule", "Task rescheduled", &result)
}

pub fn run_rm(task: &str, globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    let task: TaskRef = task.parse()?;
    let result = ctx.sync.delete_task(&task)?;
    emit_task(globals, "task rm", "Task removed", &result)
}

fn emit_task(globals: &Globals, command: &str, header: &str, result: &Synced<TaskLine>) -> Result<()> {
    let task = &result.value;
    let mut human = HumanOutput::new(header);
    human.push_summary("Task", task_label(task));
    human.push_summary("Section", task.section.as_str());
    push_report(&mut human, &result.report);
    emit_success(globals.output, command, result, Some(&human))
}
