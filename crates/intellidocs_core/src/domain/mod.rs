use serde::{Deserialize, Serialize};

/// An ingested document. Re-ingesting the same name replaces the prior record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub name: String,
    pub page_count: u32,
    pub byte_size: u64,
    /// `byte_size` in MB, rounded to two decimals.
    pub size_mb: f64,
    pub ingested_at: String, // RFC3339
}

impl Document {
    pub fn new(
        name: impl Into<String>,
        page_count: u32,
        byte_size: u64,
        ingested_at: impl Into<String>,
    ) -> Self {
        let mb = byte_size as f64 / (1024.0 * 1024.0);
        Self {
            name: name.into(),
            page_count,
            byte_size,
            size_mb: (mb * 100.0).round() / 100.0,
            ingested_at: ingested_at.into(),
        }
    }
}

/// Extracted text of one page. Page numbers are 1-based.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageSpan {
    pub document: String,
    pub page: u32,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRange {
    pub first: u32,
    pub last: u32,
}

impl PageRange {
    pub fn spans_boundary(&self) -> bool {
        self.last > self.first
    }
}

/// Where a chunk came from. Attached at chunk creation and never re-derived from text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Provenance {
    pub document: String,
    pub pages: PageRange,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: String,
    pub ordinal: u32,
    pub text: String,
    pub text_sha256: String,
    pub provenance: Provenance,
}

impl Chunk {
    /// Citations always point at the first page a chunk contains.
    pub fn citation(&self) -> Citation {
        Citation {
            document: self.provenance.document.clone(),
            page: self.provenance.pages.first.to_string(),
        }
    }

    pub fn document(&self) -> &str {
        self.provenance.document.as_str()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Citation {
    pub document: String,
    pub page: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Answered,
    NoDocuments,
    NoRelevantContext,
    NotInDocuments,
    BackendFailed,
}

/// Answer for a single question. `empty` is set whenever no grounded content backs the answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub empty: bool,
    pub outcome: AnswerOutcome,
}

impl QueryResult {
    pub fn grounded(answer: String, citations: Vec<Citation>) -> Self {
        Self {
            answer,
            citations,
            empty: false,
            outcome: AnswerOutcome::Answered,
        }
    }

    pub fn ungrounded(answer: impl Into<String>, outcome: AnswerOutcome) -> Self {
        Self {
            answer: answer.into(),
            citations: Vec::new(),
            empty: true,
            outcome,
        }
    }

    /// Citations with duplicates collapsed, first occurrence wins. For display only.
    pub fn distinct_citations(&self) -> Vec<Citation> {
        let mut seen = std::collections::BTreeSet::new();
        self.citations
            .iter()
            .filter(|c| seen.insert((*c).clone()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Accepted {
        document: Document,
        chunks: u32,
        skipped_pages: Vec<u32>,
    },
    Rejected {
        code: String,
        reason: String,
    },
    /// A later file in the same batch carried the same name and replaced this one.
    Superseded,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentOutcome {
    pub name: String,
    #[serde(flatten)]
    pub status: DocumentStatus,
}

impl DocumentOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, DocumentStatus::Accepted { .. })
    }

    pub fn chunk_count(&self) -> u32 {
        match &self.status {
            DocumentStatus::Accepted { chunks, .. } => *chunks,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CorpusStats {
    pub documents: u32,
    pub pages: u32,
    pub chunks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    pub documents: Vec<DocumentOutcome>,
    pub stats: CorpusStats,
    /// False when the batch produced no chunks and the previous index was left untouched.
    pub index_updated: bool,
}

impl IngestReport {
    pub fn outcome(&self, name: &str) -> Option<&DocumentOutcome> {
        self.documents.iter().rev().find(|d| d.name == name)
    }
}

/// Raw upload as handed to the core: a name and the file's bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}
