//! Session engine for fewshot.
//!
//! Ties the collections, the compositor, a durable store and a model client
//! together behind a single controller:
//! - `Session`: mutation operations, previews and single-flight sends
//! - `Debouncer`: trailing-edge write coalescing for template edits
//! - `persist`: record keys and migration-aware loading

pub mod debounce;
pub mod persist;
pub mod session;

#[cfg(test)]
mod tests;

pub use debounce::Debouncer;
pub use session::{
    SendOutcome, SendState, Session, SessionOptions, DRAFT_PLACEHOLDER, GENERIC_ERROR_REPLY,
};

use fewshot_core::{AppConfig, AppResult, FileStore, KeyValueStore, SqliteStore, StorageBackend};
use std::sync::Arc;

/// Open the durable store selected by `config.session.storage`.
pub fn open_store(config: &AppConfig) -> AppResult<Arc<dyn KeyValueStore>> {
    config.ensure_fewshot_dir()?;

    let store: Arc<dyn KeyValueStore> = match config.session.storage {
        StorageBackend::File => Arc::new(FileStore::new(config.state_dir())),
        StorageBackend::Sqlite => Arc::new(SqliteStore::open(&config.state_db_path())?),
    };
    tracing::debug!("Using '{}' store", store.name());
    Ok(store)
}
