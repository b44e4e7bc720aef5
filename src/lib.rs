//! Task list core: records, the persisted config, JSON storage and the
//! observable [`TaskStore`]. The `cli` feature adds the `todo-desk` front-end.
#[cfg(feature = "cli")]
mod cli;
pub mod config;
pub mod events;
pub mod logging;
pub mod models;
pub mod storage;
pub mod store;

#[cfg(feature = "cli")]
pub use crate::cli::run;
pub use crate::config::{Config, Theme};
pub use crate::events::{ListenerId, StatePayload, StoreEvent};
pub use crate::models::{Priority, Statistics, Task, TaskId, TaskRecord};
pub use crate::storage::{Storage, StorageError};
pub use crate::store::{StoreError, TaskStore};
