mod support;

use std::cell::Cell;

use chrono::{DateTime, Utc};
use support::{TestWorkspace, CALENDAR_KEY};
use taskdeck::error::{Error, Result};
use taskdeck::journal::Journal;
use taskdeck::storage::{Document, Store, WorkspaceStore};
use taskdeck::sync::{NewTask, StoreKind, Synchronizer};

/// Workspace store whose writes to one key fail while `failing` is set.
struct FlakyStore {
    inner: WorkspaceStore,
    key: &'static str,
    failing: Cell<bool>,
}

impl Store for FlakyStore {
    fn read(&self, key: &str) -> Result<Option<Document>> {
        self.inner.read(key)
    }

    fn write(&self, key: &str, content: &str) -> Result<DateTime<Utc>> {
        if key == self.key && self.failing.get() {
            return Err(Error::OperationFailed(format!("injected write failure for {key}")));
        }
        self.inner.write(key, content)
    }
}

fn flaky_sync(ws: &TestWorkspace, key: &'static str) -> Synchronizer<FlakyStore> {
    let config = ws.config();
    let store = FlakyStore {
        inner: WorkspaceStore::new(ws.path()),
        key,
        failing: Cell::new(true),
    };
    let journal = Journal::new(ws.path().join(&config.journal.path));
    Synchronizer::new(store, &config).with_journal(Some(journal))
}

#[test]
fn failed_calendar_write_leaves_replayable_intent() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    let flaky = flaky_sync(&ws, CALENDAR_KEY);

    let err = flaky
        .create_task(NewTask {
            title: "File taxes".to_string(),
            due: Some("2024-04-15".to_string()),
            goal_id: None,
        })
        .unwrap_err();
    assert_eq!(err.exit_code(), 4);

    // Task landed, event did not
    assert!(ws.tasks().contains("File taxes | due:2024-04-15"));
    assert!(ws.events().is_empty());

    let sync = ws.sync();
    let pending = sync.pending()?;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].operation, "task add");
    assert_eq!(pending[0].completed, vec![0]);
    assert!(pending[0]
        .last_error
        .as_deref()
        .unwrap_or_default()
        .contains("injected write failure"));
    let remaining: Vec<StoreKind> = pending[0].remaining().map(|(_, step)| step.store()).collect();
    assert_eq!(remaining, vec![StoreKind::Calendar]);

    let reports = sync.replay_pending(None)?;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].steps.len(), 1);
    assert!(reports[0].steps[0].outcome.is_applied());

    let events = ws.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["title"], "File taxes");
    assert!(sync.pending()?.is_empty());
    Ok(())
}

#[test]
fn replay_skips_steps_that_already_landed() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    let flaky = flaky_sync(&ws, CALENDAR_KEY);
    let _ = flaky.create_task(NewTask {
        title: "Book flights".to_string(),
        due: Some("2024-07-01".to_string()),
        goal_id: None,
    });

    // The write eventually succeeded outside of the journal
    flaky.store().failing.set(false);
    let pending = flaky.pending()?;
    let (_, step) = pending[0].remaining().next().expect("remaining step");
    assert!(flaky.apply(step)?.is_applied());

    let reports = ws.sync().replay_pending(None)?;
    assert!(!reports[0].steps[0].outcome.is_applied());
    assert_eq!(ws.events().len(), 1);
    Ok(())
}

#[test]
fn replay_by_unknown_intent_is_not_found() {
    let ws = TestWorkspace::new();
    let err = ws.sync().replay_pending(Some("0000")).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn prune_drops_completed_intents() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let ws = TestWorkspace::new();
    let sync = ws.sync();
    sync.create_task(NewTask {
        title: "Water plants".to_string(),
        due: Some("2024-05-05".to_string()),
        goal_id: None,
    })?;

    let journal = sync.journal().expect("journal enabled by default");
    assert!(!journal.records()?.is_empty());
    assert!(journal.prune()? > 0);
    assert!(journal.records()?.is_empty());
    Ok(())
}
