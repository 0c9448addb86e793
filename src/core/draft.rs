//! Wizard drafts and their persistence
//!
//! A [`Draft`] maps every section id to that section's committed data, or
//! `null` while the section is incomplete. Stores keep one draft under a
//! fixed key; unreadable content loads as "no draft".

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Committed section data keyed by section id
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Draft {
    sections: Map<String, Value>,
}

impl Draft {
    /// An empty draft with a `null` entry per section
    pub fn for_sections<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            sections: ids.into_iter().map(|id| (id.to_string(), Value::Null)).collect(),
        }
    }

    /// Committed data for a section; `None` while incomplete
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.sections.get(id).filter(|v| !v.is_null())
    }

    pub fn is_complete(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Replace a section's entry as a whole
    pub fn commit(&mut self, id: &str, data: Value) {
        self.sections.insert(id.to_string(), data);
    }

    /// Reset a section's entry to `null`
    pub fn uncommit(&mut self, id: &str) {
        self.sections.insert(id.to_string(), Value::Null);
    }

    /// Entries in insertion order, including incomplete ones
    pub fn entries(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.sections
            .iter()
            .map(|(id, v)| (id.as_str(), Some(v).filter(|v| !v.is_null())))
    }

    pub fn completed_count(&self) -> usize {
        self.sections.values().filter(|v| !v.is_null()).count()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.sections.clone())
    }
}

#[derive(Debug, Error)]
pub enum DraftStoreError {
    #[error("failed to write draft to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize draft: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistence for the in-progress draft
pub trait DraftStore: Send + Sync {
    /// Overwrite the saved draft
    fn save(&self, draft: &Draft) -> Result<(), DraftStoreError>;

    /// The saved draft, or `None` if nothing usable is stored
    fn load(&self) -> Option<Draft>;

    /// Remove the saved draft; clearing an empty store is a no-op
    fn clear(&self) -> Result<(), DraftStoreError>;
}

/// Parse stored draft text, treating corrupt content as absent
fn decode(raw: &str, origin: &str) -> Option<Draft> {
    match serde_json::from_str::<Draft>(raw) {
        Ok(draft) => Some(draft),
        Err(e) => {
            warn!(origin, error = %e, "ignoring corrupt draft");
            None
        }
    }
}

/// Draft stored as `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    dir: PathBuf,
    key: String,
}

impl FileDraftStore {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    fn io_error(path: &Path, source: std::io::Error) -> DraftStoreError {
        DraftStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl DraftStore for FileDraftStore {
    fn save(&self, draft: &Draft) -> Result<(), DraftStoreError> {
        let path = self.path();
        std::fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        // The temp file is removed on drop unless persisted, so a failed
        // write never leaves a partial draft behind.
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, draft)?;
        tmp.flush().map_err(|e| Self::io_error(tmp.path(), e))?;
        tmp.persist(&path)
            .map_err(|e| Self::io_error(&path, e.error))?;

        debug!(path = %path.display(), sections = draft.completed_count(), "saved draft");
        Ok(())
    }

    fn load(&self) -> Option<Draft> {
        let path = self.path();
        match std::fs::read_to_string(&path) {
            Ok(raw) => decode(&raw, &path.display().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unable to read draft");
                None
            }
        }
    }

    fn clear(&self) -> Result<(), DraftStoreError> {
        let path = self.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(path = %path.display(), "cleared draft");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }
}

/// Process-local store; nothing reaches the disk
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    slot: Mutex<Option<String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw serialized content
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Mutex::new(Some(raw.into())),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl DraftStore for MemoryDraftStore {
    fn save(&self, draft: &Draft) -> Result<(), DraftStoreError> {
        let raw = serde_json::to_string(draft)?;
        *self.slot() = Some(raw);
        Ok(())
    }

    fn load(&self) -> Option<Draft> {
        let raw = self.slot().clone()?;
        decode(&raw, "memory")
    }

    fn clear(&self) -> Result<(), DraftStoreError> {
        *self.slot() = None;
        Ok(())
    }
}
