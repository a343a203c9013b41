use std::fs;
use std::path::{Path, PathBuf};

use intellidocs_ai::index::{IndexStatus, IndexStore};
use intellidocs_ai::ollama::OllamaClient;
use intellidocs_ai::DocQa;
use intellidocs_core::config::AppConfig;
use intellidocs_core::domain::{Citation, IngestReport, QueryResult, SourceDocument};
use intellidocs_core::error::AppError;
use intellidocs_core::validate::{partition_uploads, RejectedUpload};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{info, warn};

pub mod cli;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Uploads refused before reaching the pipeline.
    pub rejected: Vec<RejectedUpload>,
    pub report: Option<IngestReport>,
    pub saved_to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    #[serde(flatten)]
    pub result: QueryResult,
    /// Citations with duplicates removed, for display.
    pub sources: Vec<Citation>,
}

#[derive(Debug, Serialize)]
pub struct RemoveResponse {
    pub document: String,
    pub removed_chunks: usize,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub ok: bool,
}

#[derive(Debug, Serialize)]
pub struct AiHealthStatus {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    Replace,
    Append,
    Reprocess,
}

pub fn now_rfc3339_utc() -> Result<String, AppError> {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| {
            AppError::new("TIME_FORMAT_FAILED", "Failed to format time").with_details(e.to_string())
        })
}

/// Read upload files from disk, naming each by its file name.
pub fn read_uploads(paths: &[PathBuf]) -> Result<Vec<SourceDocument>, AppError> {
    paths
        .iter()
        .map(|p| {
            let bytes = fs::read(p).map_err(|e| {
                AppError::new("UPLOAD_READ_FAILED", "Failed to read upload")
                    .with_details(format!("path={}; err={}", p.display(), e))
            })?;
            Ok(SourceDocument::new(upload_name(p), bytes))
        })
        .collect()
}

fn upload_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Install the saved index, if any. Returns false when nothing has been saved yet.
pub fn load_saved_index(qa: &DocQa, store: &IndexStore) -> Result<bool, AppError> {
    match qa.load(store) {
        Ok(entries) => {
            info!(entries, "loaded saved index");
            Ok(true)
        }
        Err(e) if e.is("AI_INDEX_NOT_FOUND") => Ok(false),
        Err(e) => Err(e),
    }
}

/// Load the saved index ahead of a full rebuild so unchanged chunks keep their vectors.
/// An index from another embedding model is replaced by the rebuild, so it is not an error.
fn load_rebuild_cache(qa: &DocQa, store: &IndexStore) -> Result<(), AppError> {
    match load_saved_index(qa, store) {
        Ok(_) => Ok(()),
        Err(e) if e.is("AI_INDEX_MODEL_MISMATCH") => {
            warn!(details = ?e.details, "saved index uses another model; rebuilding from scratch");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

pub fn ingest_files(
    qa: &DocQa,
    store: &IndexStore,
    uploads: Vec<SourceDocument>,
    mode: IngestMode,
    now: &str,
) -> Result<IngestResponse, AppError> {
    let (accepted, rejected) = partition_uploads(uploads, &qa.config().ingest);
    for r in rejected.iter() {
        warn!(name = %r.name, code = %r.error.code, "upload rejected");
    }
    if accepted.is_empty() {
        return Ok(IngestResponse {
            rejected,
            report: None,
            saved_to: None,
        });
    }

    let report = match mode {
        IngestMode::Replace => {
            load_rebuild_cache(qa, store)?;
            qa.ingest(&accepted, now)?
        }
        IngestMode::Reprocess => {
            load_rebuild_cache(qa, store)?;
            qa.reprocess(&accepted, now)?
        }
        IngestMode::Append => {
            load_saved_index(qa, store)?;
            qa.ingest_append(&accepted, now)?
        }
    };

    let saved_to = if report.index_updated {
        Some(qa.save(store, now)?.display().to_string())
    } else {
        None
    };

    Ok(IngestResponse {
        rejected,
        report: Some(report),
        saved_to,
    })
}

pub fn ask_question(
    qa: &DocQa,
    store: &IndexStore,
    question: &str,
) -> Result<AskResponse, AppError> {
    load_saved_index(qa, store)?;
    let result = qa.ask(question)?;
    let sources = result.distinct_citations();
    Ok(AskResponse { result, sources })
}

pub fn remove_document(
    qa: &DocQa,
    store: &IndexStore,
    name: &str,
    now: &str,
) -> Result<RemoveResponse, AppError> {
    load_saved_index(qa, store)?;
    let removed_chunks = qa.remove_document(name);
    if removed_chunks > 0 {
        qa.save(store, now)?;
    }
    Ok(RemoveResponse {
        document: name.to_string(),
        removed_chunks,
    })
}

pub fn index_status(store: &IndexStore) -> Result<IndexStatus, AppError> {
    store.status()
}

pub fn reset_index(qa: &DocQa, store: &IndexStore) -> Result<ResetResponse, AppError> {
    qa.reset();
    store.clear()?;
    Ok(ResetResponse { ok: true })
}

pub fn ai_health_check(cfg: &AppConfig) -> Result<AiHealthStatus, AppError> {
    let client = OllamaClient::from_config(&cfg.backend)?;
    client.health_check()?;
    Ok(AiHealthStatus {
        ok: true,
        message: format!("Ollama reachable at {}", client.base_url()),
    })
}

pub fn to_json<T: Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| {
            AppError::new("OUTPUT_ENCODE_FAILED", "Failed to encode output")
                .with_details(e.to_string())
        })
}
