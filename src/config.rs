//! Configuration loading and management
//!
//! Handles parsing of `.taskdeck.toml` in the workspace root and resolution
//! of the workspace root itself.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

/// Name of the configuration file inside the workspace root
pub const CONFIG_FILE: &str = ".taskdeck.toml";

/// Environment variables consulted for the workspace root, in order
pub const WORKSPACE_ENV_VARS: [&str; 3] =
    ["TASKDECK_WORKSPACE", "DASHBOARD_WORKSPACE", "OPENCLAW_WORKSPACE"];

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store keys
    #[serde(default)]
    pub paths: PathsConfig,

    /// Storage behaviour
    #[serde(default)]
    pub storage: StorageConfig,

    /// Task document behaviour
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Intent journal
    #[serde(default)]
    pub journal: JournalConfig,
}

/// Workspace-relative keys of the three stores
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_tasks_path")]
    pub tasks: String,

    #[serde(default = "default_calendar_path")]
    pub calendar: String,

    #[serde(default = "default_goals_path")]
    pub goals: String,
}

fn default_tasks_path() -> String {
    "Dashboard/TASKS.md".to_string()
}

fn default_calendar_path() -> String {
    "Dashboard/calendar.json".to_string()
}

fn default_goals_path() -> String {
    "Dashboard/goals.json".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            tasks: default_tasks_path(),
            calendar: default_calendar_path(),
            goals: default_goals_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// How long a single write waits for the per-file lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Where new task lines land in "Not Started"
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    Top,
    #[default]
    Bottom,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Stamp new task lines with an `id:` and link their events to it.
    ///
    /// Without ids, pairs correlate on title, date and goal only, and a
    /// replayed append is skipped whenever an identical line already sits
    /// in the section, even one that predates the interrupted operation.
    #[serde(default = "default_true")]
    pub stable_ids: bool,

    /// Placement of newly created tasks
    #[serde(default)]
    pub placement: Placement,
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            stable_ids: true,
            placement: Placement::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    /// Record cross-store intents before applying them
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Journal file, relative to the workspace root
    #[serde(default = "default_journal_path")]
    pub path: String,

    /// Drop completed intents once the file grows past this many bytes
    /// (0 keeps everything until `sync replay --prune`)
    #[serde(default = "default_prune_above_bytes")]
    pub prune_above_bytes: u64,
}

fn default_true() -> bool {
    true
}

fn default_journal_path() -> String {
    ".taskdeck/intents.jsonl".to_string()
}

fn default_prune_above_bytes() -> u64 {
    256 * 1024
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_journal_path(),
            prune_above_bytes: default_prune_above_bytes(),
        }
    }
}

impl Config {
    /// Load configuration from a `.taskdeck.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the workspace root, or return defaults
    pub fn load_from_workspace(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let keys = [
            ("paths.tasks", &self.paths.tasks),
            ("paths.calendar", &self.paths.calendar),
            ("paths.goals", &self.paths.goals),
            ("journal.path", &self.journal.path),
        ];
        for (field, value) in keys {
            if value.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("{field} cannot be empty")));
            }
        }
        if self.paths.tasks == self.paths.calendar
            || self.paths.tasks == self.paths.goals
            || self.paths.calendar == self.paths.goals
        {
            return Err(Error::InvalidConfig(
                "paths.tasks, paths.calendar and paths.goals must be distinct".to_string(),
            ));
        }
        Ok(())
    }
}

/// Resolve the workspace root: explicit flag, then environment, then
/// `~/.openclaw/workspace`.
pub fn resolve_workspace_root(explicit: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }

    for var in WORKSPACE_ENV_VARS {
        if let Ok(value) = std::env::var(var) {
            let value = value.trim();
            if !value.is_empty() {
                return Ok(PathBuf::from(value));
            }
        }
    }

    let base = directories::BaseDirs::new().ok_or_else(|| {
        Error::InvalidConfig("cannot determine home directory; pass --workspace".to_string())
    })?;
    Ok(base.home_dir().join(".openclaw").join("workspace"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_workspace_wins() {
        let root = resolve_workspace_root(Some(PathBuf::from("/tmp/ws"))).unwrap();
        assert_eq!(root, PathBuf::from("/tmp/ws"));
    }

    #[test]
    fn rejects_colliding_store_paths() {
        let mut config = Config::default();
        config.paths.calendar = config.paths.tasks.clone();
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
