use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::config::IngestConfig;
use crate::domain::SourceDocument;
use crate::error::AppError;
use crate::extract::looks_like_pdf;

/// Caller-side check for one upload. Runs before the core is invoked.
pub fn validate_upload(name: &str, bytes: &[u8], cfg: &IngestConfig) -> Result<(), AppError> {
    if bytes.is_empty() {
        return Err(AppError::new("UPLOAD_EMPTY", "File is empty")
            .with_details(format!("name={name}")));
    }

    let size = bytes.len() as u64;
    if size > cfg.max_file_size_bytes() {
        let size_mb = size as f64 / (1024.0 * 1024.0);
        return Err(AppError::new(
            "UPLOAD_TOO_LARGE",
            format!(
                "File too large ({size_mb:.1} MB). Max size: {} MB",
                cfg.max_file_size_mb
            ),
        )
        .with_details(format!("name={name}; bytes={size}")));
    }

    if !name.to_lowercase().ends_with(".pdf") || !looks_like_pdf(bytes) {
        return Err(AppError::new("UPLOAD_NOT_PDF", "Only PDF files are supported")
            .with_details(format!("name={name}")));
    }

    Ok(())
}

/// Timestamps cross the crate boundary as RFC3339 strings; reject anything else early.
pub fn validate_timestamp(field: &str, value: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(value, &Rfc3339).map_err(|e| {
        AppError::new("TIMESTAMP_INVALID", format!("Failed to parse {field}"))
            .with_details(format!("value={value}; err={e}"))
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RejectedUpload {
    pub name: String,
    pub error: AppError,
}

/// Split a batch into uploads that may be handed to the core and uploads rejected up front.
pub fn partition_uploads(
    uploads: Vec<SourceDocument>,
    cfg: &IngestConfig,
) -> (Vec<SourceDocument>, Vec<RejectedUpload>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for u in uploads {
        match validate_upload(&u.name, &u.bytes, cfg) {
            Ok(()) => accepted.push(u),
            Err(error) => rejected.push(RejectedUpload {
                name: u.name,
                error,
            }),
        }
    }
    (accepted, rejected)
}
