use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use intellidocs_core::domain::{Chunk, Citation};
use intellidocs_core::error::AppError;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embeddings::{embed_all, Embedder};

pub mod similarity;
pub mod store;

pub use store::{IndexStatus, IndexStore};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

impl ScoredChunk {
    pub fn citation(&self) -> Citation {
        self.chunk.citation()
    }
}

/// Immutable set of embedded chunks. Queries run against an `Arc` snapshot of this, so a
/// rebuild never exposes a partially populated index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    model: String,
    dims: Option<u32>,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    pub fn empty(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            dims: None,
            entries: Vec::new(),
        }
    }

    pub fn from_entries(
        model: impl Into<String>,
        entries: Vec<IndexEntry>,
    ) -> Result<Self, AppError> {
        let mut dims: Option<u32> = None;
        for e in entries.iter() {
            let this_dims = e.vector.len() as u32;
            if this_dims == 0 {
                return Err(AppError::new("AI_INDEX_BUILD_FAILED", "Empty embedding vector")
                    .with_details(format!("chunk_id={}", e.chunk.chunk_id)));
            }
            match dims {
                Some(d) if d != this_dims => {
                    return Err(AppError::new(
                        "AI_INDEX_BUILD_FAILED",
                        "Embedding dimension mismatch across chunks",
                    )
                    .with_details(format!(
                        "expected={}; got={}; chunk_id={}",
                        d, this_dims, e.chunk.chunk_id
                    )));
                }
                Some(_) => {}
                None => dims = Some(this_dims),
            }
        }
        Ok(Self {
            model: model.into(),
            dims,
            entries,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dims(&self) -> Option<u32> {
        self.dims
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct document names in insertion order.
    pub fn documents(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.entries
            .iter()
            .map(|e| e.chunk.document())
            .filter(|d| seen.insert(*d))
            .map(str::to_string)
            .collect()
    }

    /// Top `k` entries by cosine similarity, highest first, ties in insertion order.
    /// An empty index yields an empty result.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, AppError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if let Some(d) = self.dims {
            if query.len() as u32 != d {
                return Err(AppError::new(
                    "AI_RETRIEVAL_FAILED",
                    "Query embedding dims do not match index dims",
                )
                .with_details(format!("index_dims={d}; query_dims={}", query.len())));
            }
        }

        let qnorm = similarity::l2_norm(query);
        if qnorm == 0.0 {
            debug!("query embedding has zero norm; nothing is similar");
            return Ok(Vec::new());
        }

        let mut hits: Vec<(usize, f32)> = Vec::with_capacity(self.entries.len());
        for (pos, e) in self.entries.iter().enumerate() {
            let vnorm = similarity::l2_norm(&e.vector);
            if vnorm == 0.0 {
                continue;
            }
            hits.push((pos, similarity::cosine_similarity(query, &e.vector, qnorm, vnorm)));
        }

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(pos, score)| ScoredChunk {
                chunk: self.entries[pos].chunk.clone(),
                score,
            })
            .collect())
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildSummary {
    /// Entries in the index after the operation.
    pub entries: usize,
    /// Embedding backend calls made.
    pub embedded: usize,
    /// Chunks whose vector was reused from the previous index.
    pub reused: usize,
}

/// Owns the live index. Writers build a new `VectorIndex` off to the side and swap it in;
/// readers clone the current `Arc` and never block on embedding.
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    model: String,
    concurrency: usize,
    current: RwLock<Arc<VectorIndex>>,
    writer: Mutex<()>,
}

impl Indexer {
    pub fn new(embedder: Arc<dyn Embedder>, model: impl Into<String>) -> Self {
        let model = model.into();
        Self {
            embedder,
            current: RwLock::new(Arc::new(VectorIndex::empty(model.clone()))),
            model,
            concurrency: 1,
            writer: Mutex::new(()),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn snapshot(&self) -> Arc<VectorIndex> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>, AppError> {
        self.snapshot().search(vector, k)
    }

    /// Replace the index with `chunks`. Vectors for unchanged content are reused.
    pub fn build(&self, chunks: Vec<Chunk>) -> Result<BuildSummary, AppError> {
        self.rebuild(chunks, true)
    }

    /// Replace the index with `chunks`, embedding every chunk again.
    pub fn reprocess(&self, chunks: Vec<Chunk>) -> Result<BuildSummary, AppError> {
        self.rebuild(chunks, false)
    }

    fn rebuild(&self, chunks: Vec<Chunk>, reuse: bool) -> Result<BuildSummary, AppError> {
        let _writer = self.lock_writer();
        let current = self.snapshot();
        let cache = if reuse { Some(current.as_ref()) } else { None };

        let (entries, mut summary) = self.embed_chunks(chunks, cache)?;
        let next = VectorIndex::from_entries(self.model.clone(), entries)?;
        summary.entries = next.len();
        self.swap(next);

        info!(
            entries = summary.entries,
            embedded = summary.embedded,
            reused = summary.reused,
            "index rebuilt"
        );
        Ok(summary)
    }

    /// Append `chunks` after the existing entries.
    pub fn extend(&self, chunks: Vec<Chunk>) -> Result<BuildSummary, AppError> {
        let _writer = self.lock_writer();
        let current = self.snapshot();

        let (new_entries, mut summary) = self.embed_chunks(chunks, Some(current.as_ref()))?;
        let mut entries = current.entries().to_vec();
        entries.extend(new_entries);
        let next = VectorIndex::from_entries(self.model.clone(), entries)?;
        summary.entries = next.len();
        self.swap(next);

        info!(entries = summary.entries, embedded = summary.embedded, "index extended");
        Ok(summary)
    }

    /// Atomically drop every entry belonging to `documents` (and to any document named by
    /// `chunks`), then append `chunks`.
    pub fn upsert_documents(
        &self,
        documents: &[String],
        chunks: Vec<Chunk>,
    ) -> Result<BuildSummary, AppError> {
        let _writer = self.lock_writer();
        let current = self.snapshot();

        let mut replaced: BTreeSet<String> = documents.iter().cloned().collect();
        replaced.extend(chunks.iter().map(|c| c.document().to_string()));

        let (new_entries, mut summary) = self.embed_chunks(chunks, Some(current.as_ref()))?;
        let mut entries: Vec<IndexEntry> = current
            .entries()
            .iter()
            .filter(|e| !replaced.contains(e.chunk.document()))
            .cloned()
            .collect();
        entries.extend(new_entries);
        let next = VectorIndex::from_entries(self.model.clone(), entries)?;
        summary.entries = next.len();
        self.swap(next);

        info!(
            documents = replaced.len(),
            entries = summary.entries,
            embedded = summary.embedded,
            "index documents upserted"
        );
        Ok(summary)
    }

    /// Remove a document's entries. Returns how many entries were removed.
    pub fn retract(&self, document: &str) -> usize {
        let _writer = self.lock_writer();
        let current = self.snapshot();
        let entries: Vec<IndexEntry> = current
            .entries()
            .iter()
            .filter(|e| e.chunk.document() != document)
            .cloned()
            .collect();
        let removed = current.len() - entries.len();
        if removed > 0 {
            let dims = if entries.is_empty() { None } else { current.dims() };
            self.swap(VectorIndex {
                model: self.model.clone(),
                dims,
                entries,
            });
            info!(document, removed, "document retracted from index");
        }
        removed
    }

    pub fn reset(&self) {
        let _writer = self.lock_writer();
        self.swap(VectorIndex::empty(self.model.clone()));
        info!("index reset");
    }

    /// Install a previously persisted index. Refuses indexes embedded with another model,
    /// since their vectors are not comparable with this indexer's query embeddings.
    pub fn install(&self, index: VectorIndex) -> Result<(), AppError> {
        if index.model() != self.model {
            return Err(AppError::new(
                "AI_INDEX_MODEL_MISMATCH",
                "Stored index was built with a different embedding model",
            )
            .with_details(format!(
                "configured={}; stored={}",
                self.model,
                index.model()
            )));
        }
        let _writer = self.lock_writer();
        let entries = index.len();
        self.swap(index);
        info!(entries, "index installed");
        Ok(())
    }

    fn lock_writer(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn swap(&self, next: VectorIndex) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(next);
    }

    /// Embed chunks in order. Identical content is embedded once per call, and content already
    /// present in `cache` (same model) is not embedded at all.
    fn embed_chunks(
        &self,
        chunks: Vec<Chunk>,
        cache: Option<&VectorIndex>,
    ) -> Result<(Vec<IndexEntry>, BuildSummary), AppError> {
        let mut cached: HashMap<&str, &[f32]> = HashMap::new();
        if let Some(idx) = cache.filter(|c| c.model() == self.model) {
            for e in idx.entries() {
                cached.insert(e.chunk.text_sha256.as_str(), e.vector.as_slice());
            }
        }

        let mut pending: HashMap<String, usize> = HashMap::new();
        let mut texts: Vec<&str> = Vec::new();
        for c in chunks.iter() {
            let hash = c.text_sha256.as_str();
            if !cached.contains_key(hash) && !pending.contains_key(hash) {
                pending.insert(hash.to_string(), texts.len());
                texts.push(c.text.as_str());
            }
        }

        let vectors = embed_all(self.embedder.as_ref(), &self.model, &texts, self.concurrency)?;
        let embedded = texts.len();

        let mut reused = 0usize;
        let mut entries = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = match pending.get(&chunk.text_sha256) {
                Some(i) => vectors[*i].clone(),
                None => {
                    reused += 1;
                    cached
                        .get(chunk.text_sha256.as_str())
                        .map(|v| v.to_vec())
                        .unwrap_or_default()
                }
            };
            entries.push(IndexEntry { chunk, vector });
        }

        Ok((
            entries,
            BuildSummary {
                entries: 0,
                embedded,
                reused,
            },
        ))
    }
}
