//! Calendar store model: `{ "events": [...] }`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use ulid::Ulid;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    pub date: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<String>,
    /// Stable id of the task line this event mirrors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CalendarEvent {
    pub fn new(id: impl Into<String>, title: impl Into<String>, date: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date: date.into(),
            event_type: None,
            color: None,
            goal_id: None,
            task_id: None,
            extra: Map::new(),
        }
    }
}

/// Fresh event id (`e-<ulid>`)
pub fn generate_event_id() -> String {
    format!("e-{}", Ulid::new().to_string().to_lowercase())
}

/// The events collection, in stored order.
///
/// Entries that do not decode as events stay in `unreadable`; they are
/// written back after the decoded events and take no part in correlation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarStore {
    pub events: Vec<CalendarEvent>,
    pub unreadable: Vec<Value>,
}

impl CalendarStore {
    /// Parse a calendar payload, failing soft to an empty collection.
    ///
    /// Entries missing a string `id`, `title` or `date` (or with a
    /// mistyped optional field) are set aside untouched.
    pub fn parse(content: &str) -> Self {
        let value: Value = match serde_json::from_str(content) {
            Ok(value) => value,
            Err(err) => {
                if !content.trim().is_empty() {
                    tracing::warn!(error = %err, "calendar payload is not valid JSON; using empty store");
                }
                return Self::default();
            }
        };
        let Some(entries) = value.get("events").and_then(Value::as_array) else {
            tracing::warn!("calendar payload has no events array; using empty store");
            return Self::default();
        };

        let mut store = Self::default();
        for (idx, entry) in entries.iter().enumerate() {
            match CalendarEvent::deserialize(entry) {
                Ok(event) => store.events.push(event),
                Err(err) => {
                    tracing::warn!(index = idx, error = %err, "keeping unreadable calendar entry as is");
                    store.unreadable.push(entry.clone());
                }
            }
        }
        store
    }

    pub fn to_json(&self) -> Result<String> {
        let mut entries = Vec::with_capacity(self.events.len() + self.unreadable.len());
        for event in &self.events {
            entries.push(serde_json::to_value(event)?);
        }
        entries.extend(self.unreadable.iter().cloned());
        Ok(serde_json::to_string_pretty(&json!({ "events": entries }))?)
    }

    pub fn get(&self, id: &str) -> Option<&CalendarEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.events.iter().position(|e| e.id == id)
    }

    /// Drop every event linked to `goal_id`; returns how many were removed.
    pub fn remove_for_goal(&mut self, goal_id: &str) -> usize {
        let before = self.events.len();
        self.events.retain(|e| e.goal_id.as_deref() != Some(goal_id));
        before - self.events.len()
    }

    /// Events with `from <= date <= to` (ISO strings compare in date order),
    /// sorted by date then title.
    pub fn in_range(&self, from: &str, to: &str) -> Vec<&CalendarEvent> {
        let mut events: Vec<&CalendarEvent> = self
            .events
            .iter()
            .filter(|e| e.date.as_str() >= from && e.date.as_str() <= to)
            .collect();
        events.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.title.cmp(&b.title)));
        events
    }
}
