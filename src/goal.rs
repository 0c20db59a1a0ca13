//! Goal store model.
//!
//! Goals live in a JSON document `{ "goals": [...] }`. Parsing never fails:
//! a corrupt or mis-shaped payload reads as an empty collection.

use std::fmt;
use std::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use ulid::Ulid;

use crate::error::{Error, Result};

/// Colors assigned to goals, in assignment order
pub const GOAL_COLOR_PALETTE: [&str; 8] = [
    "emerald", "amber", "rose", "cyan", "sky", "fuchsia", "violet", "blue",
];

/// Kanban status of a goal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GoalStatus {
    #[default]
    Planning,
    #[serde(rename = "In Progress")]
    InProgress,
    Done,
}

impl GoalStatus {
    pub const ALL: [GoalStatus; 3] = [GoalStatus::Planning, GoalStatus::InProgress, GoalStatus::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            GoalStatus::Planning => "Planning",
            GoalStatus::InProgress => "In Progress",
            GoalStatus::Done => "Done",
        }
    }

    /// Exact stored value; anything else normalizes to Planning.
    pub fn normalize(value: Option<&str>) -> GoalStatus {
        GoalStatus::ALL
            .into_iter()
            .find(|s| Some(s.as_str()) == value)
            .unwrap_or_default()
    }
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalStatus {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "planning" => Ok(GoalStatus::Planning),
            "inprogress" => Ok(GoalStatus::InProgress),
            "done" => Ok(GoalStatus::Done),
            _ => Err(Error::InvalidArgument(format!(
                "unknown goal status '{value}' (expected planning|in-progress|done)"
            ))),
        }
    }
}

/// A tracked outcome that tasks and events may reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub milestones: Vec<String>,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    #[serde(default)]
    pub status: GoalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Fields this model does not know about, kept for the next save
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Goal {
    pub fn new(id: impl Into<String>, name: impl Into<String>, created_at: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            milestones: Vec::new(),
            created_at: created_at.into(),
            target_date: None,
            status: GoalStatus::Planning,
            color: None,
            extra: Map::new(),
        }
    }
}

/// Fresh goal id (`g-<ulid>`)
pub fn generate_goal_id() -> String {
    format!("g-{}", Ulid::new().to_string().to_lowercase())
}

/// The goals collection, in stored order.
///
/// Entries without a string `id` are kept in `unreadable` and written back
/// after the decoded goals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalStore {
    pub goals: Vec<Goal>,
    pub unreadable: Vec<Value>,
}

impl GoalStore {
    /// Parse a goals payload, failing soft to an empty collection.
    pub fn parse(content: &str) -> Self {
        let value: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(err) => {
                if !content.trim().is_empty() {
                    tracing::warn!(error = %err, "goals payload is not valid JSON; using empty store");
                }
                return Self::default();
            }
        };
        let Some(entries) = value.get("goals").and_then(Value::as_array) else {
            tracing::warn!("goals payload has no goals array; using empty store");
            return Self::default();
        };

        let mut store = Self::default();
        for (idx, entry) in entries.iter().enumerate() {
            match parse_goal(entry) {
                Some(goal) => store.goals.push(goal),
                None => {
                    tracing::warn!(index = idx, "keeping unreadable goal entry as is");
                    store.unreadable.push(entry.clone());
                }
            }
        }
        store
    }

    /// Pretty-printed JSON for storage
    pub fn to_json(&self) -> Result<String> {
        let mut entries = Vec::with_capacity(self.goals.len() + self.unreadable.len());
        for goal in &self.goals {
            entries.push(serde_json::to_value(goal)?);
        }
        entries.extend(self.unreadable.iter().cloned());
        Ok(serde_json::to_string_pretty(&json!({ "goals": entries }))?)
    }

    pub fn get(&self, id: &str) -> Option<&Goal> {
        self.goals.iter().find(|g| g.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Goal> {
        self.goals.iter_mut().find(|g| g.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.goals.iter().position(|g| g.id == id)
    }

    /// Color for the next goal added to this collection.
    pub fn next_color(&self) -> &'static str {
        GOAL_COLOR_PALETTE[self.goals.len() % GOAL_COLOR_PALETTE.len()]
    }

    /// Append a new goal with its color persisted up front.
    pub fn create(&mut self, name: &str, target_date: Option<String>, status: GoalStatus) -> Result<&Goal> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument("goal name cannot be empty".to_string()));
        }
        let mut goal = Goal::new(
            generate_goal_id(),
            name,
            Local::now().date_naive().format("%Y-%m-%d").to_string(),
        );
        goal.target_date = target_date.filter(|d| !d.trim().is_empty());
        goal.status = status;
        goal.color = Some(self.next_color().to_string());
        self.goals.push(goal);
        Ok(&self.goals[self.goals.len() - 1])
    }

    /// Remove a goal, returning it if present.
    pub fn remove(&mut self, id: &str) -> Option<Goal> {
        let idx = self.position(id)?;
        Some(self.goals.remove(idx))
    }

    /// Effective color: stored color, else the positional palette entry.
    ///
    /// The positional fallback shifts when goals ahead are removed or
    /// reordered; goals created here always have a stored color.
    pub fn effective_color(&self, id: &str) -> Option<&str> {
        let idx = self.position(id)?;
        Some(
            self.goals[idx]
                .color
                .as_deref()
                .unwrap_or(GOAL_COLOR_PALETTE[idx % GOAL_COLOR_PALETTE.len()]),
        )
    }

    /// Goals in one kanban column
    pub fn by_status(&self, status: GoalStatus) -> Vec<&Goal> {
        self.goals.iter().filter(|g| g.status == status).collect()
    }
}

/// Decode one entry leniently: a string `id` is the only requirement.
fn parse_goal(entry: &Value) -> Option<Goal> {
    let object = entry.as_object()?;
    let id = object.get("id")?.as_str()?.to_string();
    let text = |key: &str| object.get(key).and_then(Value::as_str).map(str::to_string);

    let milestones = object
        .get("milestones")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();

    const KNOWN: [&str; 8] = [
        "id", "name", "description", "milestones", "createdAt", "targetDate", "status", "color",
    ];
    let extra = object
        .iter()
        .filter(|(key, _)| !KNOWN.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Some(Goal {
        id,
        name: text("name").unwrap_or_default(),
        description: text("description"),
        milestones,
        created_at: text("createdAt").unwrap_or_default(),
        target_date: text("targetDate"),
        status: GoalStatus::normalize(object.get("status").and_then(Value::as_str)),
        color: text("color"),
        extra,
    })
}
