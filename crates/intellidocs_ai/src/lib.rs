pub mod answer;
pub mod embeddings;
pub mod engine;
pub mod guardrails;
pub mod index;
pub mod llm;
pub mod ollama;
pub mod retrieve;

pub use engine::DocQa;
