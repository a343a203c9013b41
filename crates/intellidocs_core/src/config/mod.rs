use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chunking::ChunkConfig;
use crate::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub chunking: ChunkConfig,
    pub retrieval: RetrievalConfig,
    pub ingest: IngestConfig,
    pub backend: BackendConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestConfig {
    pub max_file_size_mb: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 50,
        }
    }
}

impl IngestConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    pub embed_model: String,
    pub generate_model: String,
    pub temperature: f32,
    pub embed_timeout_secs: u64,
    pub generate_timeout_secs: u64,
    /// Upper bound on embedding requests in flight during a build.
    pub embed_concurrency: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            generate_model: "llama3.1".to_string(),
            temperature: 0.3,
            embed_timeout_secs: 10,
            generate_timeout_secs: 60,
            embed_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub index_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_dir: PathBuf::from("intellidocs_index"),
        }
    }
}

impl AppConfig {
    /// Load from an optional TOML file, apply environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let base = match path {
            Some(p) => Self::from_toml_file(p)?,
            None => Self::default(),
        };
        let cfg = base.with_overrides(|key| std::env::var(key).ok())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, AppError> {
        if !path.exists() {
            return Err(AppError::new("CONFIG_INVALID", "Config file does not exist")
                .with_details(format!("path={}", path.display())));
        }
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new("CONFIG_INVALID", "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        toml::from_str(raw).map_err(|e| {
            AppError::new("CONFIG_INVALID", "Failed to parse config").with_details(e.to_string())
        })
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_override("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = lookup("CHUNK_OVERLAP") {
            self.chunking.overlap = parse_override("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = lookup("MIN_CHUNK_CHARS") {
            self.chunking.min_chunk_chars = parse_override("MIN_CHUNK_CHARS", &v)?;
        }
        if let Some(v) = lookup("MAX_FILE_SIZE_MB") {
            self.ingest.max_file_size_mb = parse_override("MAX_FILE_SIZE_MB", &v)?;
        }
        if let Some(v) = lookup("TOP_K") {
            self.retrieval.top_k = parse_override("TOP_K", &v)?;
        }
        if let Some(v) = lookup("TEMPERATURE") {
            self.backend.temperature = parse_override("TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("MODEL_NAME") {
            self.backend.generate_model = v;
        }
        if let Some(v) = lookup("EMBED_MODEL") {
            self.backend.embed_model = v;
        }
        if let Some(v) = lookup("OLLAMA_BASE_URL") {
            self.backend.base_url = v;
        }
        if let Some(v) = lookup("INDEX_DIR") {
            self.storage.index_dir = PathBuf::from(v);
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.chunking.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(AppError::new("CONFIG_INVALID", "top_k must be at least 1"));
        }
        if self.ingest.max_file_size_mb == 0 {
            return Err(AppError::new(
                "CONFIG_INVALID",
                "max_file_size_mb must be at least 1",
            ));
        }
        if !(0.0..=2.0).contains(&self.backend.temperature) {
            return Err(AppError::new("CONFIG_INVALID", "temperature must be within 0.0..=2.0")
                .with_details(format!("temperature={}", self.backend.temperature)));
        }
        if self.backend.embed_model.trim().is_empty()
            || self.backend.generate_model.trim().is_empty()
        {
            return Err(AppError::new("CONFIG_INVALID", "Model names must not be empty"));
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        AppError::new("CONFIG_INVALID", "Invalid environment override")
            .with_details(format!("key={key}; value={value}; err={e}"))
    })
}
