use std::fs;
use std::path::{Path, PathBuf};

use intellidocs_core::error::AppError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{IndexEntry, VectorIndex};

const ENTRIES_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexStatus {
    pub ready: bool,
    pub model: Option<String>,
    pub dims: Option<u32>,
    pub entry_count: u32,
    #[serde(default)]
    pub documents: Vec<String>,
    pub updated_at: Option<String>,
}

impl IndexStatus {
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            model: None,
            dims: None,
            entry_count: 0,
            documents: Vec::new(),
            updated_at: None,
        }
    }

    pub fn of(index: &VectorIndex, updated_at: Option<String>) -> Self {
        Self {
            ready: !index.is_empty(),
            model: Some(index.model().to_string()),
            dims: index.dims(),
            entry_count: index.len() as u32,
            documents: index.documents(),
            updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedEntries {
    version: u32,
    model: String,
    entries: Vec<IndexEntry>,
}

/// On-disk home of a saved index: `<root>/index/index_entries.json` plus a small status file
/// that can be read without loading any vectors.
#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn index_dir(&self) -> PathBuf {
        self.root.join("index")
    }

    fn status_path(&self) -> PathBuf {
        self.index_dir().join("index_status.json")
    }

    fn entries_path(&self) -> PathBuf {
        self.index_dir().join("index_entries.json")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.index_dir()).map_err(|e| {
            AppError::new("AI_INDEX_STORE_FAILED", "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.index_dir().display(), e))
        })
    }

    pub fn status(&self) -> Result<IndexStatus, AppError> {
        let path = self.status_path();
        if !path.exists() {
            return Ok(IndexStatus::not_ready());
        }
        read_json(&path, "index status")
    }

    /// Persist `index`. Entries are written before the status file so a reader never sees a
    /// status that points at entries which are not there yet.
    pub fn save(&self, index: &VectorIndex, updated_at: &str) -> Result<PathBuf, AppError> {
        self.ensure_dirs()?;
        let persisted = PersistedEntries {
            version: ENTRIES_FORMAT_VERSION,
            model: index.model().to_string(),
            entries: index.entries().to_vec(),
        };
        write_json_atomic(&self.entries_path(), &persisted, "index entries")?;
        write_json_atomic(
            &self.status_path(),
            &IndexStatus::of(index, Some(updated_at.to_string())),
            "index status",
        )?;
        info!(
            path = %self.index_dir().display(),
            entries = index.len(),
            "index saved"
        );
        Ok(self.index_dir())
    }

    pub fn load(&self) -> Result<VectorIndex, AppError> {
        let path = self.entries_path();
        if !path.exists() {
            return Err(AppError::new("AI_INDEX_NOT_FOUND", "No saved index found")
                .with_details(format!("path={}", path.display())));
        }
        let persisted: PersistedEntries = read_json(&path, "index entries")?;
        if persisted.version != ENTRIES_FORMAT_VERSION {
            return Err(AppError::new(
                "AI_INDEX_STORE_FAILED",
                "Saved index uses an unsupported format version",
            )
            .with_details(format!("version={}", persisted.version)));
        }

        let status = self.status()?;
        if status.ready && status.entry_count as usize != persisted.entries.len() {
            return Err(AppError::new(
                "AI_INDEX_STORE_FAILED",
                "Saved index status does not match its entries",
            )
            .with_details(format!(
                "status_entries={}; entries={}",
                status.entry_count,
                persisted.entries.len()
            )));
        }

        VectorIndex::from_entries(persisted.model, persisted.entries).map_err(|e| {
            AppError::new("AI_INDEX_STORE_FAILED", "Saved index is inconsistent")
                .with_details(e.user_message())
        })
    }

    pub fn clear(&self) -> Result<(), AppError> {
        let dir = self.index_dir();
        if !dir.exists() {
            return Ok(());
        }
        fs::remove_dir_all(&dir).map_err(|e| {
            AppError::new("AI_INDEX_STORE_FAILED", "Failed to remove saved index")
                .with_details(format!("path={}; err={}", dir.display(), e))
        })?;
        info!(path = %dir.display(), "saved index removed");
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, AppError> {
    let bytes = fs::read(path).map_err(|e| {
        AppError::new("AI_INDEX_STORE_FAILED", format!("Failed to read {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new("AI_INDEX_STORE_FAILED", format!("Failed to decode {what}"))
            .with_details(format!("path={}; err={}", path.display(), e))
    })
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T, what: &str) -> Result<(), AppError> {
    let tmp = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::new("AI_INDEX_STORE_FAILED", format!("Failed to encode {what}"))
            .with_details(e.to_string())
    })?;
    fs::write(&tmp, json.as_bytes()).map_err(|e| {
        AppError::new("AI_INDEX_STORE_FAILED", format!("Failed to write {what}"))
            .with_details(format!("path={}; err={}", tmp.display(), e))
    })?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::new("AI_INDEX_STORE_FAILED", format!("Failed to finalize {what} write"))
            .with_details(format!(
                "tmp={}; dest={}; err={}",
                tmp.display(),
                path.display(),
                e
            ))
    })
}
