//! Intent journal for cross-store operations
//!
//! A synchronizer operation that writes more than one store records its
//! planned steps before the first write, marks each step as it lands, and
//! marks the intent complete after the last one. An intent without a
//! `complete` record is pending; `Synchronizer::replay_pending` re-applies
//! its remaining steps.
//!
//! The journal is append-only JSONL (one [`IntentRecord`] per line) guarded
//! by `<journal>.lock`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::sync::Step;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentPhase {
    Begin,
    StepDone,
    Failed,
    Complete,
}

/// One journal line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IntentRecord {
    pub intent_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub phase: IntentPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IntentRecord {
    fn new(intent_id: Uuid, phase: IntentPhase) -> Self {
        Self {
            intent_id,
            timestamp: Utc::now(),
            phase,
            operation: None,
            steps: Vec::new(),
            step: None,
            message: None,
        }
    }
}

/// An intent that has not been marked complete
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PendingIntent {
    pub intent_id: Uuid,
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub steps: Vec<Step>,
    /// Indices of steps already applied
    pub completed: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingIntent {
    /// Steps still to apply, with their indices
    pub fn remaining(&self) -> impl Iterator<Item = (usize, &Step)> {
        self.steps
            .iter()
            .enumerate()
            .filter(|(idx, _)| !self.completed.contains(idx))
    }
}

#[derive(Debug, Clone)]
pub struct Journal {
    path: PathBuf,
    lock_timeout_ms: u64,
    prune_above_bytes: Option<u64>,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            prune_above_bytes: None,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    /// Prune completed intents whenever a completion leaves the file larger
    /// than `bytes`. Zero turns this off.
    pub fn with_auto_prune(mut self, bytes: u64) -> Self {
        self.prune_above_bytes = (bytes > 0).then_some(bytes);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a new intent and return its id.
    pub fn begin(&self, operation: &str, steps: &[Step]) -> Result<Uuid> {
        let intent_id = Uuid::new_v4();
        let mut record = IntentRecord::new(intent_id, IntentPhase::Begin);
        record.operation = Some(operation.to_string());
        record.steps = steps.to_vec();
        self.append(&record)?;
        tracing::debug!(%intent_id, operation, steps = steps.len(), "intent recorded");
        Ok(intent_id)
    }

    pub fn step_done(&self, intent_id: Uuid, step: usize) -> Result<()> {
        let mut record = IntentRecord::new(intent_id, IntentPhase::StepDone);
        record.step = Some(step);
        self.append(&record)
    }

    pub fn fail(&self, intent_id: Uuid, step: usize, message: &str) -> Result<()> {
        let mut record = IntentRecord::new(intent_id, IntentPhase::Failed);
        record.step = Some(step);
        record.message = Some(message.to_string());
        tracing::warn!(%intent_id, step, message, "intent left pending");
        self.append(&record)
    }

    pub fn complete(&self, intent_id: Uuid) -> Result<()> {
        self.append(&IntentRecord::new(intent_id, IntentPhase::Complete))?;
        tracing::debug!(%intent_id, "intent complete");
        self.prune_if_oversized();
        Ok(())
    }

    /// All records in file order
    pub fn records(&self) -> Result<Vec<IntentRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IntentRecord>(&line) {
                Ok(record) => records.push(record),
                // A torn trailing line from an interrupted append
                Err(err) => tracing::warn!(line = lineno + 1, error = %err, "skipping unreadable journal line"),
            }
        }
        Ok(records)
    }

    /// Intents begun but never completed, oldest first
    pub fn pending(&self) -> Result<Vec<PendingIntent>> {
        Ok(fold_pending(&self.records()?))
    }

    /// Look up one pending intent by full id or unique prefix.
    pub fn find_pending(&self, id: &str) -> Result<PendingIntent> {
        let id = id.trim().to_ascii_lowercase();
        let mut matches: Vec<PendingIntent> = self
            .pending()?
            .into_iter()
            .filter(|intent| intent.intent_id.to_string().starts_with(&id))
            .collect();
        match matches.len() {
            1 => Ok(matches.remove(0)),
            0 => Err(Error::IntentNotFound(id)),
            _ => Err(Error::InvalidArgument(format!("intent id '{id}' is ambiguous"))),
        }
    }

    /// Rewrite the journal keeping only records of pending intents.
    ///
    /// Returns the number of records dropped.
    pub fn prune(&self) -> Result<usize> {
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), self.lock_timeout_ms)?;
        let records = self.records()?;
        let pending: Vec<Uuid> = fold_pending(&records).into_iter().map(|p| p.intent_id).collect();
        let kept: Vec<&IntentRecord> = records
            .iter()
            .filter(|r| pending.contains(&r.intent_id))
            .collect();

        let mut buf = String::new();
        for record in &kept {
            buf.push_str(&serde_json::to_string(record)?);
            buf.push('\n');
        }
        lock::write_atomic(&self.path, buf.as_bytes())?;
        Ok(records.len() - kept.len())
    }

    /// A failed compaction leaves the file as it was; the intent itself
    /// is already recorded as complete.
    fn prune_if_oversized(&self) {
        let Some(limit) = self.prune_above_bytes else {
            return;
        };
        let size = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(_) => return,
        };
        if size <= limit {
            return;
        }
        match self.prune() {
            Ok(dropped) => tracing::info!(size, limit, dropped, "journal pruned"),
            Err(err) => tracing::warn!(error = %err, "could not prune journal"),
        }
    }

    fn append(&self, record: &IntentRecord) -> Result<()> {
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), self.lock_timeout_ms)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string(record)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", json)?;
        file.sync_all()?;
        Ok(())
    }
}

fn fold_pending(records: &[IntentRecord]) -> Vec<PendingIntent> {
    let mut order: Vec<Uuid> = Vec::new();
    let mut intents: HashMap<Uuid, PendingIntent> = HashMap::new();

    for record in records {
        match record.phase {
            IntentPhase::Begin => {
                order.push(record.intent_id);
                intents.insert(
                    record.intent_id,
                    PendingIntent {
                        intent_id: record.intent_id,
                        operation: record.operation.clone().unwrap_or_default(),
                        started_at: record.timestamp,
                        steps: record.steps.clone(),
                        completed: Vec::new(),
                        last_error: None,
                    },
                );
            }
            IntentPhase::StepDone => {
                if let (Some(intent), Some(step)) = (intents.get_mut(&record.intent_id), record.step) {
                    if !intent.completed.contains(&step) {
                        intent.completed.push(step);
                    }
                }
            }
            IntentPhase::Failed => {
                if let Some(intent) = intents.get_mut(&record.intent_id) {
                    intent.last_error = record.message.clone();
                }
            }
            IntentPhase::Complete => {
                intents.remove(&record.intent_id);
            }
        }
    }

    order.into_iter().filter_map(|id| intents.remove(&id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steps() -> Vec<Step> {
        vec![
            Step::RemoveGoalEvents {
                goal_id: "g-1".to_string(),
            },
            Step::RemoveGoal {
                goal_id: "g-1".to_string(),
            },
        ]
    }

    #[test]
    fn completed_intents_are_not_pending() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join(".taskdeck").join("intents.jsonl"));

        let id = journal.begin("goal rm", &steps()).unwrap();
        journal.step_done(id, 0).unwrap();
        journal.step_done(id, 1).unwrap();
        journal.complete(id).unwrap();

        assert!(journal.pending().unwrap().is_empty());
    }

    #[test]
    fn failed_intent_stays_pending_with_remaining_steps() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("intents.jsonl"));

        let id = journal.begin("goal rm", &steps()).unwrap();
        journal.step_done(id, 0).unwrap();
        journal.fail(id, 1, "disk full").unwrap();

        let pending = journal.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].operation, "goal rm");
        assert_eq!(pending[0].last_error.as_deref(), Some("disk full"));
        let remaining: Vec<usize> = pending[0].remaining().map(|(idx, _)| idx).collect();
        assert_eq!(remaining, vec![1]);

        let prefix = &id.to_string()[..8];
        assert_eq!(journal.find_pending(prefix).unwrap().intent_id, id);
    }

    #[test]
    fn prune_keeps_only_pending_records() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("intents.jsonl"));

        let done = journal.begin("task rm", &steps()).unwrap();
        journal.complete(done).unwrap();
        let open = journal.begin("event rm", &steps()).unwrap();

        assert_eq!(journal.prune().unwrap(), 2);
        let records = journal.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].intent_id, open);
    }

    #[test]
    fn completion_past_the_size_limit_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("intents.jsonl")).with_auto_prune(1);

        let open = journal.begin("event rm", &steps()).unwrap();
        let done = journal.begin("task rm", &steps()).unwrap();
        journal.step_done(done, 0).unwrap();
        journal.complete(done).unwrap();

        let records = journal.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].intent_id, open);
    }

    #[test]
    fn small_journal_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("intents.jsonl")).with_auto_prune(1 << 20);

        let done = journal.begin("task rm", &steps()).unwrap();
        journal.complete(done).unwrap();
        assert_eq!(journal.records().unwrap().len(), 2);
    }

    #[test]
    fn torn_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().join("intents.jsonl"));
        journal.begin("task add", &steps()).unwrap();
        let mut file = OpenOptions::new().append(true).open(journal.path()).unwrap();
        write!(file, "{{\"intent_id\":").unwrap();

        assert_eq!(journal.pending().unwrap().len(), 1);
    }
}
