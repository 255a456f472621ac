//! Key-value persistence for the cumulative result log.

use crate::export::ExportRow;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tmt_core::TmtError;
use tracing::{debug, warn};

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<(), TmtError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), TmtError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }
}

/// A JSON object on disk mapping keys to string values. The whole file is
/// rewritten on every `set`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens `path`; a missing or unreadable file starts an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "store file is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store file unreadable, starting empty");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), TmtError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| TmtError::Store(format!("create {}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| TmtError::Store(format!("serialize store: {e}")))?;
        std::fs::write(&self.path, json)
            .map_err(|e| TmtError::Store(format!("write {}: {e}", self.path.display())))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<(), TmtError> {
        self.entries.insert(key.to_string(), value);
        self.persist()
    }
}

/// Append-only list of exported rows kept under a single store key
pub struct CumulativeLog<'a, S: KeyValueStore + ?Sized> {
    store: &'a mut S,
    key: &'a str,
}

impl<'a, S: KeyValueStore + ?Sized> CumulativeLog<'a, S> {
    pub fn new(store: &'a mut S, key: &'a str) -> Self {
        Self { store, key }
    }

    /// Raw stored entries; a value that is not a list reads as empty
    fn entries(&self) -> Vec<serde_json::Value> {
        let Some(raw) = self.store.get(self.key) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(serde_json::Value::Array(entries)) => entries,
            Ok(_) => {
                warn!(key = self.key, "cumulative log is not a list, discarding");
                Vec::new()
            }
            Err(e) => {
                warn!(key = self.key, error = %e, "cumulative log unparsable, discarding");
                Vec::new()
            }
        }
    }

    /// Readable stored rows in order. Entries that are not rows are skipped
    /// here but stay in the store.
    pub fn rows(&self) -> Vec<ExportRow> {
        readable(&self.entries(), self.key)
    }

    /// Appends `row`, rewrites the stored list and returns its readable rows
    pub fn append(&mut self, row: ExportRow) -> Result<Vec<ExportRow>, TmtError> {
        let mut entries = self.entries();
        let value = serde_json::to_value(&row)
            .map_err(|e| TmtError::Store(format!("serialize export row: {e}")))?;
        entries.push(value);
        let json = serde_json::to_string(&entries)
            .map_err(|e| TmtError::Store(format!("serialize cumulative log: {e}")))?;
        self.store.set(self.key, json)?;
        debug!(key = self.key, entries = entries.len(), "cumulative log updated");
        Ok(readable(&entries, self.key))
    }
}

fn readable(entries: &[serde_json::Value], key: &str) -> Vec<ExportRow> {
    entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| {
            serde_json::from_value(entry.clone())
                .inspect_err(|e| warn!(key, index, error = %e, "skipping unreadable cumulative entry"))
                .ok()
        })
        .collect()
}
