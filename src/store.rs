use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::models::{Entry, Scale, Settings};

pub const SETTINGS_KEY: &str = "survey-dashboard.settings";
pub const ENTRIES_KEY: &str = "survey-dashboard.entries";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create data directory {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize {key}")]
    Serialize {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Inserted,
    Replaced,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub replaced: usize,
}

/// Owns the settings and the entry collection and keeps both persisted as
/// JSON documents inside one data directory.
#[derive(Debug)]
pub struct RecordStore {
    dir: PathBuf,
    settings: Settings,
    entries: Vec<Entry>,
}

impl RecordStore {
    /// Opens the store, falling back to defaults for any missing or
    /// malformed document.
    pub fn open(dir: impl Into<PathBuf>, scale: Scale) -> Self {
        let dir = dir.into();
        let (settings, entries) = load(&dir, scale);
        Self {
            dir,
            settings,
            entries,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn find(&self, id: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Replaces the persisted scale bounds with the configured ones.
    pub fn apply_scale(&mut self, scale: Scale) -> Result<(), StoreError> {
        if self.settings.scale() == scale {
            return Ok(());
        }
        debug!(
            "Scale changed from {}..{} to {}..{}",
            self.settings.scale_min, self.settings.scale_max, scale.min, scale.max
        );
        let mut settings = self.settings.clone();
        settings.scale_min = scale.min;
        settings.scale_max = scale.max;
        save_documents(&self.dir, &settings, &self.entries)?;
        self.settings = settings;
        Ok(())
    }

    pub fn save(&self) -> Result<(), StoreError> {
        save_documents(&self.dir, &self.settings, &self.entries)
    }

    pub fn upsert(&mut self, entry: Entry) -> Result<Upserted, StoreError> {
        let mut entries = self.entries.clone();
        let outcome = upsert_into(&mut entries, entry);
        self.commit_entries(entries)?;
        Ok(outcome)
    }

    /// Returns `false` without touching disk when no entry has the id.
    pub fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        let Some(index) = self.entries.iter().position(|e| e.id == id) else {
            debug!("No entry with id {id}, nothing removed");
            return Ok(false);
        };
        let mut entries = self.entries.clone();
        entries.remove(index);
        self.commit_entries(entries)?;
        Ok(true)
    }

    /// Upserts every entry, last write wins on id collisions.
    pub fn merge(&mut self, incoming: Vec<Entry>) -> Result<MergeSummary, StoreError> {
        let mut entries = self.entries.clone();
        let mut summary = MergeSummary::default();
        for entry in incoming {
            match upsert_into(&mut entries, entry) {
                Upserted::Inserted => summary.inserted += 1,
                Upserted::Replaced => summary.replaced += 1,
            }
        }
        self.commit_entries(entries)?;
        Ok(summary)
    }

    pub fn rename_question(&mut self, question_id: &str, label: &str) -> Result<bool, StoreError> {
        let mut settings = self.settings.clone();
        let Some(question) = settings.questions.iter_mut().find(|q| q.id == question_id) else {
            return Ok(false);
        };
        question.label = label.to_string();
        save_documents(&self.dir, &settings, &self.entries)?;
        self.settings = settings;
        Ok(true)
    }

    // The in-memory state only changes once the documents are on disk.
    fn commit_entries(&mut self, entries: Vec<Entry>) -> Result<(), StoreError> {
        save_documents(&self.dir, &self.settings, &entries)?;
        self.entries = entries;
        Ok(())
    }
}

fn upsert_into(entries: &mut Vec<Entry>, entry: Entry) -> Upserted {
    match entries.iter().position(|e| e.id == entry.id) {
        Some(index) => {
            entries[index] = entry;
            Upserted::Replaced
        }
        None => {
            entries.push(entry);
            Upserted::Inserted
        }
    }
}

fn save_documents(dir: &Path, settings: &Settings, entries: &[Entry]) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir).map_err(|source| StoreError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })?;
    write_document(dir, SETTINGS_KEY, settings)?;
    write_document(dir, ENTRIES_KEY, entries)?;
    Ok(())
}

fn document_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

pub fn load(dir: &Path, scale: Scale) -> (Settings, Vec<Entry>) {
    let settings: Settings =
        read_document(dir, SETTINGS_KEY).unwrap_or_else(|| Settings::with_scale(scale));
    let entries: Vec<Entry> = read_document(dir, ENTRIES_KEY).unwrap_or_default();
    info!(
        "Loaded {} entries and {} questions from {}",
        entries.len(),
        settings.questions.len(),
        dir.display()
    );
    (settings, entries)
}

fn read_document<T: DeserializeOwned>(dir: &Path, key: &str) -> Option<T> {
    let path = document_path(dir, key);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!("{} not found, using defaults", path.display());
            return None;
        }
        Err(err) => {
            warn!("Failed to read {}: {err}, using defaults", path.display());
            return None;
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!("Ignoring malformed {}: {err}", path.display());
            None
        }
    }
}

fn write_document<T: serde::Serialize + ?Sized>(
    dir: &Path,
    key: &'static str,
    value: &T,
) -> Result<(), StoreError> {
    let path = document_path(dir, key);
    let json = serde_json::to_string_pretty(value)
        .map_err(|source| StoreError::Serialize { key, source })?;
    std::fs::write(&path, json).map_err(|source| StoreError::Write { path, source })
}
