use crate::index::ScoredChunk;

pub const NOT_AVAILABLE_ANSWER: &str = "The answer is not available in the provided documents.";
pub const NO_RELEVANT_INFO_ANSWER: &str = "No relevant information found in the documents.";
pub const NO_DOCUMENTS_ANSWER: &str = "Please upload and process documents first.";

/// Context blocks in retrieval order, each labelled with the page it is cited by.
pub fn context_blocks(hits: &[ScoredChunk]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, h)| {
            let c = h.citation();
            format!(
                "[Source {}: {}, page {}]\n{}",
                i + 1,
                c.document,
                c.page,
                h.chunk.text
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

pub fn grounded_answer_prompt(question: &str, context: &str) -> String {
    format!(
        r#"You are answering questions about a set of uploaded documents.

Rules (non-negotiable):
1) Answer ONLY from the context below. Do not use outside knowledge.
2) Be as detailed as the context allows.
3) If the context does not contain the answer, reply exactly: "{NOT_AVAILABLE_ANSWER}"
4) Preserve structure: use bullet or numbered lists when the answer has several parts.

Context:
{context}

Question:
{question}

Answer:
"#
    )
}
