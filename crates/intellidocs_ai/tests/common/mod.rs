#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use intellidocs_ai::answer::NOT_AVAILABLE_ANSWER;
use intellidocs_ai::embeddings::Embedder;
use intellidocs_ai::llm::Llm;
use intellidocs_ai::DocQa;
use intellidocs_core::chunking::{chunk_pages, ChunkConfig};
use intellidocs_core::config::AppConfig;
use intellidocs_core::domain::{Chunk, PageSpan, SourceDocument};
use intellidocs_core::error::AppError;
use intellidocs_core::extract::PdfExtractor;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

pub const NOW: &str = "2026-10-19T09:00:00Z";

pub const DIMS: usize = 512;
const STOP_WORDS: &[&str] = &[
    "what", "the", "is", "are", "was", "who", "how", "which", "does", "did", "and", "for",
    "with", "about", "of",
];

fn words(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
}

/// Word slots shared by every embedding in the test binary, so no two words collide.
fn vocabulary() -> &'static Mutex<HashMap<String, usize>> {
    static VOCAB: OnceLock<Mutex<HashMap<String, usize>>> = OnceLock::new();
    VOCAB.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Bag-of-words embedding with one dimension per distinct word. Texts sharing words point
/// the same way.
pub struct BagOfWordsEmbedder {
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl BagOfWordsEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn vector(input: &str) -> Vec<f32> {
        let mut vocab = vocabulary().lock().unwrap();
        let mut v = vec![0.0f32; DIMS];
        for w in words(input) {
            let next = vocab.len();
            let slot = *vocab.entry(w).or_insert(next);
            assert!(slot < DIMS, "test vocabulary outgrew {DIMS} dimensions");
            v[slot] += 1.0;
        }
        v
    }
}

impl Embedder for BagOfWordsEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(
                AppError::new("AI_EMBEDDINGS_FAILED", "Failed to call embeddings endpoint")
                    .with_details("connection refused")
                    .with_retryable(true),
            );
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(input))
    }
}

fn section<'a>(prompt: &'a str, start: &str, end: &str) -> &'a str {
    match prompt.split_once(start) {
        Some((_, rest)) => rest.split_once(end).map(|(s, _)| s).unwrap_or(rest),
        None => "",
    }
}

/// Answers with the context sentences that mention a question keyword, or with the fallback
/// statement when none do.
pub struct KeywordLlm {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl KeywordLlm {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }
}

impl Llm for KeywordLlm {
    fn generate(&self, _model: &str, prompt: &str) -> Result<String, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());

        let context = section(prompt, "Context:\n", "\n\nQuestion:");
        let question = section(prompt, "Question:\n", "\n\nAnswer:");
        let keywords: Vec<String> = words(question)
            .filter(|w| w.len() >= 3 && !STOP_WORDS.contains(&w.as_str()))
            .collect();

        let supporting: Vec<&str> = context
            .lines()
            .filter(|l| !l.starts_with("[Source") && l.trim() != "---")
            .flat_map(|l| l.split_inclusive('.'))
            .map(str::trim)
            .filter(|s| words(s).any(|w| keywords.contains(&w)))
            .collect();

        if supporting.is_empty() {
            Ok(NOT_AVAILABLE_ANSWER.to_string())
        } else {
            Ok(supporting.join(" "))
        }
    }
}

pub struct FailingLlm;

impl Llm for FailingLlm {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AppError> {
        Err(
            AppError::new("AI_GENERATION_FAILED", "Failed to call generation endpoint")
                .with_details("connection refused")
                .with_retryable(true),
        )
    }
}

/// One chunk holding `text`, attributed to `page` of `document`.
pub fn chunk(document: &str, page: u32, text: &str) -> Chunk {
    let spans = [PageSpan {
        document: document.to_string(),
        page,
        text: text.to_string(),
    }];
    chunk_pages(&spans, &ChunkConfig::new(10_000, 0).with_min_chunk_chars(1))
        .expect("chunk")
        .remove(0)
}

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    // Short single-sentence fixtures would otherwise fall under the 100 char minimum.
    cfg.chunking.min_chunk_chars = 10;
    cfg.backend.embed_model = "mock-embed".to_string();
    cfg.backend.generate_model = "mock-llm".to_string();
    cfg.backend.embed_concurrency = 2;
    cfg
}

pub struct Harness {
    pub qa: DocQa,
    pub embedder: Arc<BagOfWordsEmbedder>,
    pub llm: Arc<KeywordLlm>,
}

pub fn harness(cfg: AppConfig) -> Harness {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let llm = Arc::new(KeywordLlm::new());
    let qa = DocQa::new(
        cfg,
        Arc::new(PdfExtractor::new()),
        embedder.clone(),
        llm.clone(),
    )
    .expect("pipeline");
    Harness { qa, embedder, llm }
}

pub fn upload(name: &str, pages: &[&str]) -> SourceDocument {
    SourceDocument::new(name, build_pdf(pages))
}

/// Build a PDF with one text line per page. An empty string produces a page without text.
pub fn build_pdf(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            vec![]
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let encoded = content.encode().expect("encode");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).expect("save pdf");
    buf
}
