use std::sync::Arc;

use intellidocs_core::domain::{AnswerOutcome, Citation, QueryResult};
use tracing::{debug, warn};

use crate::guardrails::{enforce_grounding_prompt, is_unsupported_answer};
use crate::index::ScoredChunk;
use crate::llm::Llm;

pub mod prompts;

pub use prompts::{NO_DOCUMENTS_ANSWER, NO_RELEVANT_INFO_ANSWER, NOT_AVAILABLE_ANSWER};

/// Turns retrieved chunks into a grounded answer. Never returns an error: backend failures
/// become a displayable result.
pub struct Answerer {
    llm: Arc<dyn Llm>,
    model: String,
}

impl Answerer {
    pub fn new(llm: Arc<dyn Llm>, model: impl Into<String>) -> Self {
        Self {
            llm,
            model: model.into(),
        }
    }

    pub fn answer(&self, question: &str, hits: &[ScoredChunk]) -> QueryResult {
        if hits.is_empty() {
            return QueryResult::ungrounded(
                NO_RELEVANT_INFO_ANSWER,
                AnswerOutcome::NoRelevantContext,
            );
        }

        let context = prompts::context_blocks(hits);
        let prompt = prompts::grounded_answer_prompt(question.trim(), &context);
        if let Err(e) = enforce_grounding_prompt(&prompt) {
            return QueryResult::ungrounded(
                format!("Error processing question: {}", e.user_message()),
                AnswerOutcome::BackendFailed,
            );
        }

        let answer = match self.llm.generate(&self.model, &prompt) {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                warn!(code = %e.code, retryable = e.retryable, "answer generation failed");
                return QueryResult::ungrounded(
                    format!("Error processing question: {}", e.user_message()),
                    AnswerOutcome::BackendFailed,
                );
            }
        };

        if is_unsupported_answer(&answer) {
            debug!("model reported the answer is not in the documents");
            return QueryResult::ungrounded(answer, AnswerOutcome::NotInDocuments);
        }

        let citations: Vec<Citation> = hits.iter().map(ScoredChunk::citation).collect();
        QueryResult::grounded(answer, citations)
    }
}
