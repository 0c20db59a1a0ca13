mod support;

use support::{TestWorkspace, CALENDAR_KEY, GOALS_KEY, TASKS_KEY};
use taskdeck::goal::GoalStatus;
use taskdeck::query::{all_task_lines, TaskRef};
use taskdeck::sync::{NewEvent, NewTask, StepOutcome, TaskEdit};
use taskdeck::task_doc::Section;

fn position(section: Section, index: usize) -> TaskRef {
    TaskRef::Position { section, index }
}

#[test]
fn dated_task_creates_linked_event() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    let sync = ws.sync();

    let created = sync.create_task(NewTask {
        title: "Renew passport".to_string(),
        due: Some("2024-05-02".to_string()),
        goal_id: None,
    })?;

    assert_eq!(created.value.section, Section::NotStarted);
    assert_eq!(created.value.due.as_deref(), Some("2024-05-02"));
    let task_id = created.value.id.clone().expect("stable id");
    assert!(task_id.starts_with("t-"));
    assert!(created.report.intent_id.is_some());

    let tasks = ws.tasks();
    assert!(tasks.contains("- [ ] Renew passport | due:2024-05-02 | id:t-"));
    let events = ws.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "Renew passport");
    assert_eq!(events[0]["date"], "2024-05-02");
    assert_eq!(events[0]["taskId"], task_id.as_str());
    assert!(events[0]["id"].as_str().unwrap_or_default().starts_with("e-"));
    Ok(())
}

#[test]
fn undated_task_leaves_calendar_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    let created = ws.sync().create_task(NewTask {
        title: "Read a book".to_string(),
        ..NewTask::default()
    })?;

    assert_eq!(created.report.steps.len(), 1);
    assert!(created.report.intent_id.is_none());
    assert!(!ws.path().join(CALENDAR_KEY).exists());
    Ok(())
}

#[test]
fn existing_document_is_preserved_around_edits() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    ws.write_file(
        TASKS_KEY,
        "# Tasks\n\n## Not Started\n\n- [ ] Call dentist\n\n## In Progress\n\n## Done\n\n- [x] ~~Pay rent~~ | due:2024-01-01\n",
    )?;
    let sync = ws.sync();

    let done = sync.set_task_done(&position(Section::NotStarted, 0), true)?;
    assert!(done.value.done);
    assert_eq!(
        ws.tasks(),
        "# Tasks\n\n## Not Started\n\n- [x] ~~Call dentist~~\n\n## In Progress\n\n\n## Done\n\n- [x] ~~Pay rent~~ | due:2024-01-01\n"
    );

    let doc = sync.load_tasks()?;
    let titles: Vec<String> = all_task_lines(&doc).into_iter().map(|t| t.title).collect();
    assert_eq!(titles, vec!["Call dentist", "Pay rent"]);
    Ok(())
}

#[test]
fn event_move_reschedules_task_found_by_old_date() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    ws.write_config("[tasks]\nstable_ids = false\n")?;
    let sync = ws.sync();

    let event = sync.create_event(NewEvent {
        title: "Dentist".to_string(),
        date: "2024-03-10".to_string(),
        ..NewEvent::default()
    })?;
    assert!(event.value.task_id.is_none());
    assert!(ws.tasks().contains("- [ ] Dentist | due:2024-03-10\n"));

    let moved = sync.move_event(&event.value.id, "2024-03-12")?;
    assert!(moved.report.steps.iter().all(|s| s.outcome == StepOutcome::Applied));
    assert!(ws.tasks().contains("- [ ] Dentist | due:2024-03-12\n"));
    assert_eq!(ws.events()[0]["date"], "2024-03-12");
    Ok(())
}

#[test]
fn stable_link_outlives_rename() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    let sync = ws.sync();
    let created = sync.create_task(NewTask {
        title: "Draft slides".to_string(),
        due: Some("2024-06-01".to_string()),
        goal_id: None,
    })?;
    let reference = created.value.reference();

    sync.rename_task(&reference, "Draft keynote slides")?;
    // Rename does not touch the calendar
    assert_eq!(ws.events()[0]["title"], "Draft slides");

    let rescheduled = sync.reschedule_task(&reference, Some("2024-06-03".to_string()))?;
    assert!(rescheduled.report.steps[1].outcome.is_applied());
    assert_eq!(ws.events()[0]["date"], "2024-06-03");
    Ok(())
}

#[test]
fn edit_propagates_title_and_date_to_event() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    let sync = ws.sync();
    let goal = sync.create_goal("Fitness", None, GoalStatus::InProgress)?.value;
    let created = sync.create_task(NewTask {
        title: "Run 5k".to_string(),
        due: Some("2024-04-01".to_string()),
        goal_id: None,
    })?;

    sync.edit_task(
        &created.value.reference(),
        TaskEdit {
            title: Some("Run 10k".to_string()),
            due: Some(Some("2024-04-08".to_string())),
            goal_id: Some(Some(goal.id.clone())),
        },
    )?;

    let events = ws.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "Run 10k");
    assert_eq!(events[0]["date"], "2024-04-08");
    assert_eq!(events[0]["goalId"], goal.id.as_str());
    assert!(ws.tasks().contains(&format!("Run 10k | due:2024-04-08 | goal:{}", goal.id)));
    Ok(())
}

#[test]
fn deleting_goal_removes_its_events_but_not_tasks() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    let sync = ws.sync();
    let goal = sync.create_goal("Launch", Some("2024-09-01".to_string()), GoalStatus::Planning)?.value;
    sync.create_task_for_goal(&goal.id, "Write copy", Some("2024-08-01".to_string()))?;
    sync.create_event(NewEvent {
        title: "Standup".to_string(),
        date: "2024-08-02".to_string(),
        ..NewEvent::default()
    })?;

    sync.delete_goal(&goal.id)?;

    assert!(ws.goals().is_empty());
    let events = ws.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "Standup");
    assert!(ws.tasks().contains(&format!("Write copy | due:2024-08-01 | goal:{}", goal.id)));
    Ok(())
}

#[test]
fn deleting_task_removes_every_matching_event() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    ws.write_file(TASKS_KEY, "## Not Started\n- [ ] Pay bill | due:2024-02-01\n")?;
    ws.write_file(
        CALENDAR_KEY,
        r#"{"events":[
            {"id":"e-1","title":"Pay bill","date":"2024-02-01"},
            {"id":"e-2","title":"Pay bill","date":"2024-02-01"},
            {"id":"e-3","title":"Pay bill","date":"2024-02-02"}
        ]}"#,
    )?;

    let removed = ws.sync().delete_task(&position(Section::NotStarted, 0))?;
    assert_eq!(removed.value.title, "Pay bill");

    let events = ws.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], "e-3");
    assert!(!ws.tasks().contains("Pay bill"));
    Ok(())
}

#[test]
fn goal_store_keeps_unknown_fields() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    ws.write_file(
        GOALS_KEY,
        r#"{"goals":[{"id":"g-1","name":"Garden","status":"Planning","createdAt":"2024-01-01","emoji":"🌱"}]}"#,
    )?;

    ws.sync().set_goal_status("g-1", GoalStatus::Done)?;

    let goals = ws.goals();
    assert_eq!(goals[0]["status"], "Done");
    assert_eq!(goals[0]["emoji"], "🌱");
    Ok(())
}

#[test]
fn unknown_goal_is_rejected_before_any_write() {
    let ws = TestWorkspace::new();
    let err = ws
        .sync()
        .create_task(NewTask {
            title: "Orphan".to_string(),
            due: Some("2024-01-01".to_string()),
            goal_id: Some("g-missing".to_string()),
        })
        .unwrap_err();

    assert_eq!(err.exit_code(), 3);
    assert!(!ws.path().join(TASKS_KEY).exists());
    assert!(!ws.path().join(CALENDAR_KEY).exists());
}

#[test]
fn unreadable_store_entries_survive_unrelated_writes() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    ws.write_file(
        CALENDAR_KEY,
        r#"{"events":[
            {"id":"e9","title":"Numeric goal","date":"2024-01-01","goalId":7},
            {"id":"e10","title":"NoDate"}
        ]}"#,
    )?;
    ws.write_file(GOALS_KEY, r#"{"goals":[{"name":"no id yet"}]}"#)?;
    let sync = ws.sync();

    sync.create_task(NewTask {
        title: "Numeric goal".to_string(),
        due: Some("2024-01-01".to_string()),
        goal_id: None,
    })?;
    sync.create_goal("Health", None, GoalStatus::Planning)?;

    let events = ws.events();
    let ids: Vec<&str> = events.iter().filter_map(|e| e["id"].as_str()).collect();
    assert_eq!(ids.len(), 3);
    assert!(ids.contains(&"e9") && ids.contains(&"e10"));
    assert!(events.iter().any(|e| e["goalId"] == 7));

    let goals = ws.goals();
    assert_eq!(goals.len(), 2);
    assert!(goals.iter().any(|g| g["name"] == "no id yet"));
    Ok(())
}

#[test]
fn struck_title_stays_correlated_without_stable_ids() -> Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    ws.write_config("[tasks]\nstable_ids = false\n")?;
    let sync = ws.sync();

    sync.create_task(NewTask {
        title: "Fix ~~bug".to_string(),
        due: Some("2024-07-01".to_string()),
        goal_id: None,
    })?;
    assert_eq!(ws.events()[0]["title"], "Fix bug");

    let removed = sync.delete_task(&position(Section::NotStarted, 0))?;
    assert!(removed.report.steps.iter().all(|s| s.outcome.is_applied()));
    assert!(ws.events().is_empty());
    Ok(())
}
