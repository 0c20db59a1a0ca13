use std::fs;

use taskdeck::config::{Config, Placement};

#[test]
fn config_defaults_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = Config::load_from_workspace(dir.path());

    assert_eq!(config.paths.tasks, "Dashboard/TASKS.md");
    assert_eq!(config.paths.calendar, "Dashboard/calendar.json");
    assert_eq!(config.paths.goals, "Dashboard/goals.json");
    assert!(config.tasks.stable_ids);
    assert_eq!(config.tasks.placement, Placement::Bottom);
    assert!(config.journal.enabled);
    assert_eq!(config.journal.path, ".taskdeck/intents.jsonl");
    assert_eq!(config.journal.prune_above_bytes, 256 * 1024);
}

#[test]
fn config_overrides_from_toml() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let toml = r#"
[paths]
tasks = "notes/todo.md"

[storage]
lock_timeout_ms = 250

[tasks]
stable_ids = false
placement = "top"

[journal]
enabled = false
prune_above_bytes = 0
"#;
    fs::write(dir.path().join(".taskdeck.toml"), toml)?;

    let config = Config::load_from_workspace(dir.path());

    assert_eq!(config.paths.tasks, "notes/todo.md");
    assert_eq!(config.paths.calendar, "Dashboard/calendar.json");
    assert_eq!(config.storage.lock_timeout_ms, 250);
    assert!(!config.tasks.stable_ids);
    assert_eq!(config.tasks.placement, Placement::Top);
    assert!(!config.journal.enabled);
    assert_eq!(config.journal.prune_above_bytes, 0);
    Ok(())
}

#[test]
fn invalid_config_falls_back_to_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    fs::write(
        dir.path().join(".taskdeck.toml"),
        "[paths]\ntasks = \"same.json\"\ncalendar = \"same.json\"\n",
    )?;

    assert!(Config::load(&dir.path().join(".taskdeck.toml")).is_err());
    let config = Config::load_from_workspace(dir.path());
    assert_eq!(config.paths.tasks, "Dashboard/TASKS.md");
    Ok(())
}

#[test]
fn saved_config_loads_back() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join(".taskdeck.toml");
    let mut config = Config::default();
    config.tasks.placement = Placement::Top;
    config.save(&path)?;

    let loaded = Config::load(&path)?;
    assert_eq!(loaded.tasks.placement, Placement::Top);
    assert_eq!(loaded.paths.goals, config.paths.goals);
    Ok(())
}
