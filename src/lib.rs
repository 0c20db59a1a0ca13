//! taskdeck - task, goal and calendar stores kept in step
//!
//! This library provides the core of the taskdeck CLI: a lossless codec for
//! the markdown task list, models for the goal and calendar JSON stores, and
//! a synchronizer that applies one user action across all three.
//!
//! # Core Concepts
//!
//! - **Task document**: three fixed sections of checkbox lines with
//!   `key:value` metadata (`due`, `goal`, `id`) after ` | ` separators
//! - **Goals**: kanban-style records with a status and a display color
//! - **Events**: dated calendar entries, optionally linked to a goal or task
//! - **Correlation**: a task and an event match on the stable task id when
//!   both carry one, otherwise on title + date + goal
//! - **Intent journal**: multi-store operations are logged step by step so an
//!   interrupted write can be replayed
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.taskdeck.toml`
//! - `error`: Error types and result aliases
//! - `storage`: Key-addressed document store over the workspace directory
//! - `lock`: File locking and atomic writes
//! - `task_doc`: Task document parser and serializer
//! - `query`: Read-side views over the task document
//! - `goal`: Goal store model
//! - `calendar`: Calendar store model
//! - `sync`: Cross-store operations as journaled steps
//! - `journal`: Append-only intent log
//! - `reconcile`: Drift detection between the stores
//! - `output`: Human and JSON output envelopes

pub mod calendar;
pub mod cli;
pub mod config;
pub mod error;
pub mod goal;
pub mod journal;
pub mod lock;
pub mod output;
pub mod query;
pub mod reconcile;
pub mod storage;
pub mod sync;
pub mod task_doc;

pub use error::{Error, Result};
