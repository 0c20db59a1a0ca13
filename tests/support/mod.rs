#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use taskdeck::config::Config;
use taskdeck::storage::WorkspaceStore;
use taskdeck::sync::Synchronizer;
use tempfile::TempDir;

pub const TASKS_KEY: &str = "Dashboard/TASKS.md";
pub const CALENDAR_KEY: &str = "Dashboard/calendar.json";
pub const GOALS_KEY: &str = "Dashboard/goals.json";

pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn read_file(&self, rel_path: &str) -> String {
        fs::read_to_string(self.dir.path().join(rel_path)).unwrap_or_default()
    }

    pub fn write_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file(".taskdeck.toml", contents)
    }

    pub fn config(&self) -> Config {
        Config::load_from_workspace(self.path())
    }

    pub fn sync(&self) -> Synchronizer<WorkspaceStore> {
        Synchronizer::open(self.path(), &self.config()).expect("open synchronizer")
    }

    pub fn tasks(&self) -> String {
        self.read_file(TASKS_KEY)
    }

    pub fn events(&self) -> Vec<Value> {
        self.json_array(CALENDAR_KEY, "events")
    }

    pub fn goals(&self) -> Vec<Value> {
        self.json_array(GOALS_KEY, "goals")
    }

    fn json_array(&self, key: &str, field: &str) -> Vec<Value> {
        let content = self.read_file(key);
        if content.trim().is_empty() {
            return Vec::new();
        }
        let value: Value = serde_json::from_str(&content).expect("store is valid JSON");
        value[field].as_array().cloned().unwrap_or_default()
    }

    /// `taskdeck` pointed at this workspace, with ambient overrides cleared.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("taskdeck").expect("binary");
        cmd.env_remove("TASKDECK_WORKSPACE")
            .env_remove("DASHBOARD_WORKSPACE")
            .env_remove("OPENCLAW_WORKSPACE")
            .env_remove("RUST_LOG")
            .arg("--workspace")
            .arg(self.path());
        cmd
    }

    /// Run a `--json` command that must succeed and return its `data`.
    pub fn json(&self, args: &[&str]) -> Value {
        let output = self.cmd().arg("--json").args(args).output().expect("run taskdeck");
        assert!(
            output.status.success(),
            "taskdeck {args:?} failed: {}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let envelope: Value = serde_json::from_slice(&output.stdout).expect("JSON envelope");
        assert_eq!(envelope["status"], "success");
        envelope["data"].clone()
    }
}
