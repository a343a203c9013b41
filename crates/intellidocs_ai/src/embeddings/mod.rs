use intellidocs_core::error::AppError;
use rayon::prelude::*;

pub trait Embedder: Send + Sync {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod ollama_embed;

/// Embed `inputs` with at most `concurrency` requests in flight. Output order matches input
/// order regardless of completion order; the first error aborts the batch.
pub fn embed_all(
    embedder: &dyn Embedder,
    model: &str,
    inputs: &[&str],
    concurrency: usize,
) -> Result<Vec<Vec<f32>>, AppError> {
    if concurrency <= 1 || inputs.len() <= 1 {
        return inputs.iter().map(|t| embedder.embed(model, t)).collect();
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .build()
        .map_err(|e| {
            AppError::new("AI_EMBEDDINGS_FAILED", "Failed to start embedding workers")
                .with_details(e.to_string())
        })?;
    pool.install(|| {
        inputs
            .par_iter()
            .map(|t| embedder.embed(model, t))
            .collect::<Result<Vec<_>, _>>()
    })
}
