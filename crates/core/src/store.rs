//! Keyed durable storage for session state.
//!
//! Backends implement [`KeyValueStore`], a plain string-in/string-out
//! interface. The [`load`] and [`save`] helpers layer JSON on top and are
//! best-effort: a missing, corrupt or unwritable record is logged and
//! reported as "nothing there" / "not written", never as an error. A corrupt
//! record is left in place so it can be inspected.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{AppError, AppResult};

/// A keyed string store.
pub trait KeyValueStore: Send + Sync {
    /// Backend name for diagnostics (e.g., "file", "sqlite").
    fn name(&self) -> &str;

    /// Read the record stored under `key`, if any.
    fn get(&self, key: &str) -> AppResult<Option<String>>;

    /// Replace the record stored under `key`.
    fn put(&self, key: &str, value: &str) -> AppResult<()>;

    /// List stored keys in lexical order.
    fn keys(&self) -> AppResult<Vec<String>>;
}

/// Load the raw JSON value stored under `key`.
///
/// Returns `None` when the record is absent, unreadable or not valid JSON.
pub fn load_value(store: &dyn KeyValueStore, key: &str) -> Option<serde_json::Value> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => {
            tracing::debug!("No stored record for '{}' in {} store", key, store.name());
            return None;
        }
        Err(e) => {
            tracing::warn!("Failed to read '{}' from {} store: {}", key, store.name(), e);
            return None;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(
                "Ignoring corrupt record '{}' in {} store: {}",
                key,
                store.name(),
                e
            );
            None
        }
    }
}

/// Load and deserialize the record stored under `key`.
///
/// A record whose shape does not match `T` is treated as absent.
pub fn load<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let value = load_value(store, key)?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!("Stored record '{}' has an unexpected shape: {}", key, e);
            None
        }
    }
}

/// Serialize `value` and write it under `key`.
///
/// Failures are logged and swallowed. Returns whether the write landed.
pub fn save<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> bool {
    let json = match serde_json::to_string(value) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!("Failed to serialize record '{}': {}", key, e);
            return false;
        }
    };

    match store.put(key, &json) {
        Ok(()) => {
            tracing::debug!("Saved '{}' ({} bytes) to {} store", key, json.len(), store.name());
            true
        }
        Err(e) => {
            tracing::warn!("Failed to save '{}' to {} store: {}", key, store.name(), e);
            false
        }
    }
}

/// In-process store, optionally bounded by a byte quota.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes once the total stored size would
    /// exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }
}

impl KeyValueStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let records = self
            .records
            .lock()
            .map_err(|_| AppError::Storage("memory store lock poisoned".to_string()))?;
        Ok(records.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> AppResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| AppError::Storage("memory store lock poisoned".to_string()))?;

        if let Some(quota) = self.quota_bytes {
            let others: usize = records
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(AppError::Storage(format!(
                    "quota exceeded: {} bytes needed, {} allowed",
                    needed, quota
                )));
            }
        }

        records.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        let records = self
            .records
            .lock()
            .map_err(|_| AppError::Storage("memory store lock poisoned".to_string()))?;
        Ok(records.keys().cloned().collect())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding the record files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{}.json", encode_key(key)))
    }
}

/// Reversible file-name encoding: ASCII alphanumerics, `.` and `-` are kept,
/// every other byte becomes `_XX` (uppercase hex).
fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'.' || byte == b'-' {
            encoded.push(char::from(byte));
        } else {
            encoded.push_str(&format!("_{:02X}", byte));
        }
    }
    encoded
}

/// Inverse of [`encode_key`]. `None` for names this store did not write.
fn decode_key(name: &str) -> Option<String> {
    let bytes = name.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'_' {
            let hex = name.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

impl KeyValueStore for FileStore {
    fn name(&self) -> &str {
        "file"
    }

    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            AppError::Storage(format!("Failed to read record file {:?}: {}", path, e))
        })?;
        Ok(Some(contents))
    }

    fn put(&self, key: &str, value: &str) -> AppResult<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| {
            AppError::Storage(format!("Failed to create store directory {:?}: {}", self.root, e))
        })?;

        // Write next to the target and rename so readers never see a torn file
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|e| {
            AppError::Storage(format!("Failed to write record file {:?}: {}", tmp, e))
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            AppError::Storage(format!("Failed to replace record file {:?}: {}", path, e))
        })?;

        Ok(())
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in walkdir::WalkDir::new(&self.root)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("json") {
                match path.file_stem().and_then(|s| s.to_str()).and_then(decode_key) {
                    Some(key) => keys.push(key),
                    None => tracing::debug!("Skipping foreign file {:?} in store", path),
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}

/// Records kept in a single SQLite table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: &Path) -> AppResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::Storage(format!("Failed to create store directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)?;
        Self::init(conn)
    }

    /// Open a throwaway in-memory database.
    pub fn in_memory() -> AppResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        tracing::debug!("Initialized SQLite store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Storage("sqlite store lock poisoned".to_string()))?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> AppResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Storage("sqlite store lock poisoned".to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn keys(&self) -> AppResult<Vec<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| AppError::Storage("sqlite store lock poisoned".to_string()))?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}
