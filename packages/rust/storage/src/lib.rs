//! Persistent strategy store backed by a single JSON file.
//!
//! The [`StrategyStore`] holds every strategy ever seen, keyed by identifier.
//! It is read wholesale and written wholesale: [`StrategyStore::save`] writes
//! the complete collection to a temporary sibling file and renames it over
//! the target, so a crash mid-write leaves the previous file intact.
//!
//! **Access rules:**
//! - One writer per run. There is no lock; overlapping runs can interleave
//!   load/save and lose `first_seen` history.
//! - Mutation should go through [`StrategyStore::transaction`], which only
//!   saves when the closure succeeds.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use strategy_scout_shared::{Result, STORE_SCHEMA_VERSION, ScoutError, StrategyRecord};

/// On-disk layout of the store file.
#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    schema_version: u32,
    #[serde(default)]
    records: BTreeMap<String, StrategyRecord>,
}

/// Borrowed view used when saving, to avoid cloning the collection.
#[derive(Serialize)]
struct StoreFileRef<'a> {
    schema_version: u32,
    records: &'a BTreeMap<String, StrategyRecord>,
}

/// Whether an upsert created or merged a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Summary statistics over the whole store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub records: usize,
    pub with_duplicate_of: usize,
    pub oldest_first_seen: Option<DateTime<Utc>>,
    pub newest_last_seen: Option<DateTime<Utc>>,
}

/// Identifier-keyed collection of previously seen strategies.
#[derive(Debug)]
pub struct StrategyStore {
    path: PathBuf,
    records: BTreeMap<String, StrategyRecord>,
}

impl StrategyStore {
    /// Load the store at `path`. A missing file yields an empty store.
    ///
    /// An unreadable, unparsable, or inconsistent file is an error: the
    /// caller must not continue with a store whose contents are unknown.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("strategy store not found, starting empty");
            return Ok(Self {
                path: path.to_path_buf(),
                records: BTreeMap::new(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| ScoutError::io(path, e))?;
        let file: StoreFile = serde_json::from_str(&content).map_err(|e| {
            ScoutError::Storage(format!("corrupt store {}: {e}", path.display()))
        })?;

        if file.schema_version != STORE_SCHEMA_VERSION {
            return Err(ScoutError::validation(format!(
                "unsupported store schema_version: {} (expected {})",
                file.schema_version, STORE_SCHEMA_VERSION
            )));
        }

        for (key, record) in &file.records {
            if key != record.id() {
                return Err(ScoutError::Storage(format!(
                    "corrupt store {}: key '{key}' holds record '{}'",
                    path.display(),
                    record.id()
                )));
            }
        }

        info!(records = file.records.len(), "strategy store loaded");

        Ok(Self {
            path: path.to_path_buf(),
            records: file.records,
        })
    }

    /// Load, apply `f`, and save only if `f` succeeds.
    ///
    /// On error nothing is written and the file on disk is untouched.
    pub fn transaction<T>(path: &Path, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let mut store = Self::load(path)?;
        let value = f(&mut store)?;
        store.save()?;
        Ok(value)
    }

    /// Insert a new record or merge into the existing one with the same id.
    ///
    /// Merging keeps the earliest `first_seen`, takes the newest `last_seen`,
    /// replaces the summary with the incoming one, and replaces `duplicate_of`
    /// only when the incoming record carries a value.
    pub fn upsert(&mut self, record: StrategyRecord) -> UpsertOutcome {
        match self.records.get_mut(record.id()) {
            Some(existing) => {
                existing.first_seen = existing.first_seen.min(record.first_seen);
                existing.last_seen = existing.last_seen.max(record.last_seen);
                if record.duplicate_of.is_some() {
                    existing.duplicate_of = record.duplicate_of;
                }
                existing.summary = record.summary;
                debug!(id = %existing.id(), "store record updated");
                UpsertOutcome::Updated
            }
            None => {
                debug!(id = %record.id(), "store record inserted");
                self.records.insert(record.id().to_string(), record);
                UpsertOutcome::Inserted
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&StrategyRecord> {
        self.records.get(id)
    }

    /// Every record, in identifier order.
    pub fn all(&self) -> impl Iterator<Item = &StrategyRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            records: self.records.len(),
            with_duplicate_of: self
                .records
                .values()
                .filter(|r| r.duplicate_of.is_some())
                .count(),
            oldest_first_seen: self.records.values().map(|r| r.first_seen).min(),
            newest_last_seen: self.records.values().map(|r| r.last_seen).max(),
        }
    }

    /// Atomically rewrite the complete store file.
    ///
    /// Writes to a temp file next to the target, syncs it, then renames it
    /// over the target.
    #[instrument(skip_all, fields(path = %self.path.display(), records = self.records.len()))]
    pub fn save(&self) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| ScoutError::io(&parent, e))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                ScoutError::Storage(format!("store path {} has no file name", self.path.display()))
            })?;
        let temp = parent.join(format!(".{file_name}.tmp"));

        let json = serde_json::to_string_pretty(&StoreFileRef {
            schema_version: STORE_SCHEMA_VERSION,
            records: &self.records,
        })
        .map_err(|e| ScoutError::Storage(format!("store serialization failed: {e}")))?;

        {
            let mut file = std::fs::File::create(&temp).map_err(|e| ScoutError::io(&temp, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| ScoutError::io(&temp, e))?;
            file.sync_all().map_err(|e| ScoutError::io(&temp, e))?;
        }

        // Atomic swap
        std::fs::rename(&temp, &self.path).map_err(|e| ScoutError::io(&self.path, e))?;

        info!("strategy store saved");
        Ok(())
    }
}
