use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use intellidocs_core::chunking::chunk_pages;
use intellidocs_core::config::AppConfig;
use intellidocs_core::domain::{
    AnswerOutcome, Chunk, CorpusStats, Document, DocumentOutcome, DocumentStatus, IngestReport,
    QueryResult, SourceDocument,
};
use intellidocs_core::error::AppError;
use intellidocs_core::extract::{Extractor, PdfExtractor};
use intellidocs_core::validate::validate_timestamp;
use tracing::{info, warn};

use crate::answer::{Answerer, NO_DOCUMENTS_ANSWER};
use crate::embeddings::ollama_embed::OllamaEmbedder;
use crate::embeddings::Embedder;
use crate::index::{BuildSummary, IndexStatus, IndexStore, Indexer};
use crate::llm::ollama_llm::OllamaLlm;
use crate::llm::Llm;
use crate::ollama::OllamaClient;
use crate::retrieve::Retriever;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IndexUpdate {
    Rebuild,
    Reprocess,
    Upsert,
}

/// The question-answering pipeline: extract, chunk, index on ingest; retrieve and answer on
/// ask. Holds only the live index; document registries and chat history stay with the caller.
pub struct DocQa {
    config: AppConfig,
    extractor: Arc<dyn Extractor>,
    indexer: Arc<Indexer>,
    retriever: Retriever,
    answerer: Answerer,
}

impl DocQa {
    pub fn new(
        config: AppConfig,
        extractor: Arc<dyn Extractor>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn Llm>,
    ) -> Result<Self, AppError> {
        config.validate()?;
        let indexer = Arc::new(
            Indexer::new(Arc::clone(&embedder), config.backend.embed_model.clone())
                .with_concurrency(config.backend.embed_concurrency),
        );
        let retriever = Retriever::new(Arc::clone(&indexer), embedder);
        let answerer = Answerer::new(llm, config.backend.generate_model.clone());
        Ok(Self {
            config,
            extractor,
            indexer,
            retriever,
            answerer,
        })
    }

    /// Pipeline wired to a local Ollama for both embeddings and generation.
    pub fn with_ollama(config: AppConfig) -> Result<Self, AppError> {
        let client = OllamaClient::from_config(&config.backend)?;
        let embedder = OllamaEmbedder::new(client.clone())
            .with_timeout(Duration::from_secs(config.backend.embed_timeout_secs));
        let llm = OllamaLlm::new(client)
            .with_temperature(config.backend.temperature)
            .with_timeout(Duration::from_secs(config.backend.generate_timeout_secs));
        Self::new(
            config,
            Arc::new(PdfExtractor::new()),
            Arc::new(embedder),
            Arc::new(llm),
        )
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// Replace the index with the contents of `files`. Documents that fail to extract are
    /// reported and skipped; an embedding failure leaves the previous index in place.
    pub fn ingest(
        &self,
        files: &[SourceDocument],
        ingested_at: &str,
    ) -> Result<IngestReport, AppError> {
        self.ingest_with(files, ingested_at, IndexUpdate::Rebuild)
    }

    /// Add `files` to the existing index, replacing any documents with the same names.
    pub fn ingest_append(
        &self,
        files: &[SourceDocument],
        ingested_at: &str,
    ) -> Result<IngestReport, AppError> {
        self.ingest_with(files, ingested_at, IndexUpdate::Upsert)
    }

    /// Like `ingest`, but every chunk is embedded again even if its content is unchanged.
    pub fn reprocess(
        &self,
        files: &[SourceDocument],
        ingested_at: &str,
    ) -> Result<IngestReport, AppError> {
        self.ingest_with(files, ingested_at, IndexUpdate::Reprocess)
    }

    fn ingest_with(
        &self,
        files: &[SourceDocument],
        ingested_at: &str,
        update: IndexUpdate,
    ) -> Result<IngestReport, AppError> {
        // Fatal configuration errors surface before any document is touched.
        self.config.chunking.validate()?;
        validate_timestamp("ingested_at", ingested_at)?;

        let (documents, chunks_by_doc) = self.prepare(files, ingested_at)?;
        let stats = batch_stats(&documents);
        let accepted: Vec<String> = documents
            .iter()
            .filter(|d| d.is_accepted())
            .map(|d| d.name.clone())
            .collect();
        let chunks: Vec<Chunk> = chunks_by_doc.into_iter().flat_map(|(_, c)| c).collect();

        let summary: Option<BuildSummary> = match update {
            IndexUpdate::Upsert if accepted.is_empty() => None,
            IndexUpdate::Upsert => Some(self.indexer.upsert_documents(&accepted, chunks)?),
            _ if chunks.is_empty() => None,
            IndexUpdate::Rebuild => Some(self.indexer.build(chunks)?),
            IndexUpdate::Reprocess => Some(self.indexer.reprocess(chunks)?),
        };

        match summary {
            Some(s) => info!(
                documents = accepted.len(),
                chunks = stats.chunks,
                entries = s.entries,
                "ingest complete"
            ),
            None => warn!("ingest produced no chunks; index left unchanged"),
        }

        Ok(IngestReport {
            documents,
            stats,
            index_updated: summary.is_some(),
        })
    }

    /// Extract and chunk every file. A later file with the same name supersedes an earlier one.
    fn prepare(
        &self,
        files: &[SourceDocument],
        ingested_at: &str,
    ) -> Result<(Vec<DocumentOutcome>, Vec<(String, Vec<Chunk>)>), AppError> {
        let mut outcomes: Vec<DocumentOutcome> = Vec::with_capacity(files.len());
        let mut chunks_by_doc: Vec<(String, Vec<Chunk>)> = Vec::new();

        for file in files {
            if let Some(prev) = outcomes
                .iter_mut()
                .find(|o| o.name == file.name && o.status != DocumentStatus::Superseded)
            {
                prev.status = DocumentStatus::Superseded;
                chunks_by_doc.retain(|(name, _)| name != &file.name);
            }

            match self.process_document(file, ingested_at) {
                Ok((status, chunks)) => {
                    outcomes.push(DocumentOutcome {
                        name: file.name.clone(),
                        status,
                    });
                    chunks_by_doc.push((file.name.clone(), chunks));
                }
                Err(e) if e.is("CHUNK_CONFIG_INVALID") => return Err(e),
                Err(e) => {
                    warn!(document = %file.name, code = %e.code, "skipping document");
                    outcomes.push(DocumentOutcome {
                        name: file.name.clone(),
                        status: DocumentStatus::Rejected {
                            code: e.code.clone(),
                            reason: e.user_message(),
                        },
                    });
                }
            }
        }

        Ok((outcomes, chunks_by_doc))
    }

    fn process_document(
        &self,
        file: &SourceDocument,
        ingested_at: &str,
    ) -> Result<(DocumentStatus, Vec<Chunk>), AppError> {
        let extraction = self.extractor.extract(&file.bytes, &file.name)?;
        if !extraction.has_text() {
            warn!(document = %file.name, pages = extraction.page_count, "no extractable text");
        }
        let chunks = chunk_pages(&extraction.spans, &self.config.chunking)?;
        info!(
            document = %file.name,
            pages = extraction.page_count,
            chunks = chunks.len(),
            "document processed"
        );
        let document = Document::new(
            file.name.clone(),
            extraction.page_count,
            file.bytes.len() as u64,
            ingested_at,
        );
        Ok((
            DocumentStatus::Accepted {
                document,
                chunks: chunks.len() as u32,
                skipped_pages: extraction.skipped_pages,
            },
            chunks,
        ))
    }

    /// Answer `question` from the indexed documents. Backend failures become a displayable
    /// result; only an empty question is an error.
    pub fn ask(&self, question: &str) -> Result<QueryResult, AppError> {
        let q = question.trim();
        if q.is_empty() {
            return Err(AppError::new("QUESTION_EMPTY", "Question must not be empty"));
        }
        if self.indexer.is_empty() {
            return Ok(QueryResult::ungrounded(
                NO_DOCUMENTS_ANSWER,
                AnswerOutcome::NoDocuments,
            ));
        }

        let k = self.config.retrieval.top_k as usize;
        let hits = match self.retriever.retrieve(q, k) {
            Ok(hits) => hits,
            Err(e) => {
                warn!(code = %e.code, "retrieval failed");
                return Ok(QueryResult::ungrounded(
                    format!("Error processing question: {}", e.user_message()),
                    AnswerOutcome::BackendFailed,
                ));
            }
        };
        Ok(self.answerer.answer(q, &hits))
    }

    pub fn remove_document(&self, name: &str) -> usize {
        self.indexer.retract(name)
    }

    pub fn reset(&self) {
        self.indexer.reset();
    }

    pub fn status(&self) -> IndexStatus {
        IndexStatus::of(&self.indexer.snapshot(), None)
    }

    pub fn save(&self, store: &IndexStore, updated_at: &str) -> Result<PathBuf, AppError> {
        store.save(&self.indexer.snapshot(), updated_at)
    }

    /// Install the index saved in `store`. Returns the number of entries loaded.
    pub fn load(&self, store: &IndexStore) -> Result<usize, AppError> {
        let index = store.load()?;
        let entries = index.len();
        self.indexer.install(index)?;
        Ok(entries)
    }
}

fn batch_stats(documents: &[DocumentOutcome]) -> CorpusStats {
    documents
        .iter()
        .fold(CorpusStats::default(), |mut acc, d| {
            if let DocumentStatus::Accepted {
                document, chunks, ..
            } = &d.status
            {
                acc.documents += 1;
                acc.pages += document.page_count;
                acc.chunks += *chunks;
            }
            acc
        })
}
