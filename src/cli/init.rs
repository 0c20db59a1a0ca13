//! taskdeck init command implementation
//!
//! Creates the three stores with empty content and a default
//! `.taskdeck.toml`, leaving anything that already exists untouched.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::calendar::CalendarStore;
use crate::cli::{Context, Globals};
use crate::config::{Config, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::goal::GoalStore;
use crate::output::{emit_success, HumanOutput};
use crate::storage::Store;
use crate::sync::StoreKind;
use crate::task_doc::TaskDocument;

#[derive(Serialize)]
struct InitReport {
    workspace: PathBuf,
    created: Vec<String>,
}

pub fn run(globals: &Globals) -> Result<()> {
    let ctx = Context::load(globals)?;
    std::fs::create_dir_all(&ctx.root)?;

    let mut created = Vec::new();
    if ensure_config(&ctx.root)? {
        created.push(CONFIG_FILE.to_string());
    }

    for kind in StoreKind::ALL {
        let key = ctx.sync.key(kind).to_string();
        if ctx.sync.store().exists(&key)? {
            continue;
        }
        let content = match kind {
            StoreKind::Tasks => TaskDocument::new().serialize(),
            StoreKind::Calendar => CalendarStore::default().to_json()?,
            StoreKind::Goals => GoalStore::default().to_json()?,
        };
        ctx.sync.store().write(&key, &content)?;
        created.push(key);
    }

    let header = if created.is_empty() {
        "taskdeck init: nothing to do"
    } else {
        "taskdeck init: initialized workspace"
    };
    let mut human = HumanOutput::new(header);
    human.push_summary("Workspace", ctx.root.display().to_string());
    human.push_summary(
        "Created",
        if created.is_empty() {
            "none".to_string()
        } else {
            created.join(", ")
        },
    );
    human.push_next_step("taskdeck goal add <name>");
    human.push_next_step("taskdeck task add <title> --due YYYY-MM-DD");

    let report = InitReport {
        workspace: ctx.root.clone(),
        created,
    };
    emit_success(globals.output, "init", &report, Some(&human))
}

fn ensure_config(root: &Path) -> Result<bool> {
    let config_path = root.join(CONFIG_FILE);
    if config_path.exists() {
        if !config_path.is_file() {
            return Err(Error::OperationFailed(format!(
                "{CONFIG_FILE} exists but is not a file: {}",
                config_path.display()
            )));
        }
        return Ok(false);
    }

    Config::default().save(&config_path)?;
    Ok(true)
}
