mod common;

use std::sync::Arc;

use common::{chunk, FailingLlm, KeywordLlm};
use intellidocs_ai::answer::{Answerer, NOT_AVAILABLE_ANSWER, NO_RELEVANT_INFO_ANSWER};
use intellidocs_ai::index::ScoredChunk;
use intellidocs_ai::llm::Llm;
use intellidocs_core::domain::{AnswerOutcome, Citation};
use intellidocs_core::error::AppError;
use pretty_assertions::assert_eq;

fn hit(document: &str, page: u32, text: &str, score: f32) -> ScoredChunk {
    ScoredChunk {
        chunk: chunk(document, page, text),
        score,
    }
}

fn citation(document: &str, page: &str) -> Citation {
    Citation {
        document: document.to_string(),
        page: page.to_string(),
    }
}

#[test]
fn no_chunks_means_no_backend_call() {
    let llm = Arc::new(KeywordLlm::new());
    let answerer = Answerer::new(llm.clone(), "mock-llm");

    let out = answerer.answer("What color is the sky?", &[]);
    assert_eq!(out.answer, NO_RELEVANT_INFO_ANSWER);
    assert!(out.empty);
    assert!(out.citations.is_empty());
    assert_eq!(out.outcome, AnswerOutcome::NoRelevantContext);
    assert_eq!(llm.call_count(), 0);
}

#[test]
fn prompt_carries_context_in_retrieval_order() {
    let llm = Arc::new(KeywordLlm::new());
    let answerer = Answerer::new(llm.clone(), "mock-llm");
    let hits = vec![
        hit("b.pdf", 2, "Second ranked passage about tides.", 0.9),
        hit("a.pdf", 1, "Third ranked passage about tides.", 0.4),
    ];

    answerer.answer("Why are there tides?", &hits);
    let prompt = llm.last_prompt().expect("prompt sent");
    let first = prompt.find("Second ranked passage").expect("first block");
    let second = prompt.find("Third ranked passage").expect("second block");
    assert!(first < second);
    assert!(prompt.contains("[Source 1: b.pdf, page 2]"));
    assert!(prompt.contains(NOT_AVAILABLE_ANSWER));
    assert!(prompt.contains("Why are there tides?"));
}

#[test]
fn citations_follow_retrieval_order_and_keep_duplicates() {
    let answerer = Answerer::new(Arc::new(KeywordLlm::new()), "mock-llm");
    let hits = vec![
        hit("guide.pdf", 3, "Backups run nightly at two.", 0.8),
        hit("guide.pdf", 3, "Backups are kept for thirty days.", 0.7),
        hit("faq.pdf", 1, "Restores need a ticket.", 0.2),
    ];

    let out = answerer.answer("When do backups run?", &hits);
    assert_eq!(out.outcome, AnswerOutcome::Answered);
    assert!(!out.empty);
    assert!(out.answer.contains("nightly"));
    assert_eq!(
        out.citations,
        vec![
            citation("guide.pdf", "3"),
            citation("guide.pdf", "3"),
            citation("faq.pdf", "1"),
        ]
    );
    assert_eq!(
        out.distinct_citations(),
        vec![citation("guide.pdf", "3"), citation("faq.pdf", "1")]
    );
}

#[test]
fn fallback_answer_drops_citations() {
    let answerer = Answerer::new(Arc::new(KeywordLlm::new()), "mock-llm");
    let hits = vec![hit("x.pdf", 1, "The sky is blue.", 0.3)];

    let out = answerer.answer("What is the capital of France?", &hits);
    assert_eq!(out.answer, NOT_AVAILABLE_ANSWER);
    assert!(out.empty);
    assert!(out.citations.is_empty());
    assert_eq!(out.outcome, AnswerOutcome::NotInDocuments);
}

/// Answers every prompt with the same text.
struct CannedLlm(&'static str);

impl Llm for CannedLlm {
    fn generate(&self, _model: &str, _prompt: &str) -> Result<String, AppError> {
        Ok(self.0.to_string())
    }
}

#[test]
fn apologetic_fallback_still_drops_citations() {
    let answerer = Answerer::new(
        Arc::new(CannedLlm(
            "I'm sorry, but the answer is not available in the provided documents.",
        )),
        "mock-llm",
    );
    let hits = vec![hit("a.pdf", 1, "The sky is blue.", 0.3)];

    let out = answerer.answer("What is the capital of France?", &hits);
    assert!(out.citations.is_empty());
    assert!(out.empty);
    assert_eq!(out.outcome, AnswerOutcome::NotInDocuments);
}

#[test]
fn partial_gaps_keep_citations() {
    let answerer = Answerer::new(
        Arc::new(CannedLlm("Revenue grew 4%. Details on margins are not available.")),
        "mock-llm",
    );
    let hits = vec![hit("report.pdf", 2, "Revenue grew 4% year over year.", 0.8)];

    let out = answerer.answer("How did revenue and margins change?", &hits);
    assert_eq!(out.outcome, AnswerOutcome::Answered);
    assert_eq!(out.citations, vec![citation("report.pdf", "2")]);
}

#[test]
fn generation_failure_becomes_displayable_result() {
    let answerer = Answerer::new(Arc::new(FailingLlm), "mock-llm");
    let hits = vec![hit("x.pdf", 1, "The sky is blue.", 0.9)];

    let out = answerer.answer("What color is the sky?", &hits);
    assert!(out.answer.starts_with("Error processing question:"));
    assert!(out.answer.contains("connection refused"));
    assert!(out.empty);
    assert!(out.citations.is_empty());
    assert_eq!(out.outcome, AnswerOutcome::BackendFailed);
}
