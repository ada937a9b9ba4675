//! Fewshot Core Library
//!
//! Foundational pieces shared by every fewshot crate:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - Identifier generation and sequence reordering
//! - Best-effort keyed persistence

pub mod config;
pub mod error;
pub mod ids;
pub mod logging;
pub mod store;

// Re-export commonly used types
pub use config::{AppConfig, SessionSettings, StorageBackend, TemplatePolicy};
pub use error::{AppError, AppResult};
pub use ids::{move_item, new_id};
pub use store::{FileStore, KeyValueStore, MemoryStore, SqliteStore};
