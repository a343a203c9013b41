mod common;

use std::sync::Arc;

use common::{chunk, BagOfWordsEmbedder};
use intellidocs_ai::embeddings::Embedder;
use intellidocs_ai::index::{BuildSummary, Indexer};
use intellidocs_core::error::AppError;
use pretty_assertions::assert_eq;

fn indexer(embedder: &Arc<BagOfWordsEmbedder>) -> Indexer {
    Indexer::new(embedder.clone(), "mock-embed")
}

#[test]
fn builds_index_and_embeds_only_changed_chunks() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let idx = indexer(&embedder);

    let a = chunk("a.pdf", 1, "Quarterly revenue grew by four percent.");
    let b = chunk("a.pdf", 2, "Operating margin held steady at twelve percent.");
    let c = chunk("a.pdf", 2, "Operating margin fell to nine percent.");

    let first = idx.build(vec![a.clone(), b]).expect("first build");
    assert_eq!(
        first,
        BuildSummary {
            entries: 2,
            embedded: 2,
            reused: 0
        }
    );

    let second = idx.build(vec![a, c]).expect("second build");
    assert_eq!(
        second,
        BuildSummary {
            entries: 2,
            embedded: 1,
            reused: 1
        }
    );
    assert_eq!(embedder.call_count(), 3);
}

#[test]
fn reprocess_embeds_every_chunk_again() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let idx = indexer(&embedder);
    let chunks = vec![
        chunk("a.pdf", 1, "First page text about pricing."),
        chunk("a.pdf", 2, "Second page text about staffing."),
    ];

    idx.build(chunks.clone()).expect("build");
    let st = idx.reprocess(chunks).expect("reprocess");
    assert_eq!(st.embedded, 2);
    assert_eq!(st.reused, 0);
    assert_eq!(embedder.call_count(), 4);
}

#[test]
fn identical_text_is_embedded_once_per_build() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let idx = indexer(&embedder);

    let st = idx
        .build(vec![
            chunk("a.pdf", 1, "Shared boilerplate disclaimer text."),
            chunk("b.pdf", 3, "Shared boilerplate disclaimer text."),
        ])
        .expect("build");
    assert_eq!(st.entries, 2);
    assert_eq!(st.embedded, 1);
    assert_eq!(idx.snapshot().documents(), vec!["a.pdf", "b.pdf"]);
}

#[test]
fn failed_build_keeps_previous_index_queryable() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let idx = indexer(&embedder);
    let sky = chunk("x.pdf", 1, "The sky is blue.");
    idx.build(vec![sky.clone()]).expect("build");

    embedder.set_failing(true);
    let err = idx
        .build(vec![
            chunk("y.pdf", 1, "Grass is green."),
            chunk("y.pdf", 2, "Snow is white."),
        ])
        .expect_err("embedding backend down");
    assert_eq!(err.code, "AI_EMBEDDINGS_FAILED");
    assert!(err.retryable);

    let err = idx
        .extend(vec![chunk("z.pdf", 1, "Coal is black.")])
        .expect_err("extend also fails");
    assert_eq!(err.code, "AI_EMBEDDINGS_FAILED");

    let snapshot = idx.snapshot();
    assert_eq!(snapshot.len(), 1);
    let hits = idx
        .query(&BagOfWordsEmbedder::vector("sky"), 5)
        .expect("query");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].chunk, sky);
}

struct RaggedEmbedder;

impl Embedder for RaggedEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        Ok(vec![1.0; input.len() % 3 + 1])
    }
}

#[test]
fn inconsistent_dimensions_fail_the_build() {
    let idx = Indexer::new(Arc::new(RaggedEmbedder), "ragged");
    let err = idx
        .build(vec![chunk("a.pdf", 1, "a"), chunk("a.pdf", 2, "bb")])
        .expect_err("dims differ");
    assert_eq!(err.code, "AI_INDEX_BUILD_FAILED");
    assert!(idx.is_empty());
}

#[test]
fn extend_appends_after_existing_entries() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let idx = indexer(&embedder);
    idx.build(vec![chunk("a.pdf", 1, "Alpha document body.")])
        .expect("build");
    let st = idx
        .extend(vec![chunk("b.pdf", 1, "Beta document body.")])
        .expect("extend");

    assert_eq!(st.entries, 2);
    assert_eq!(idx.snapshot().documents(), vec!["a.pdf", "b.pdf"]);
}

#[test]
fn upsert_replaces_only_named_documents() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let idx = indexer(&embedder);
    idx.build(vec![
        chunk("a.pdf", 1, "Alpha version one."),
        chunk("b.pdf", 1, "Beta stays as is."),
    ])
    .expect("build");

    let st = idx
        .upsert_documents(
            &["a.pdf".to_string()],
            vec![
                chunk("a.pdf", 1, "Alpha version two."),
                chunk("a.pdf", 2, "Alpha gained a page."),
            ],
        )
        .expect("upsert");
    assert_eq!(st.entries, 3);

    let snapshot = idx.snapshot();
    assert_eq!(snapshot.documents(), vec!["b.pdf", "a.pdf"]);
    let texts: Vec<&str> = snapshot
        .entries()
        .iter()
        .map(|e| e.chunk.text.as_str())
        .collect();
    assert_eq!(
        texts,
        vec!["Beta stays as is.", "Alpha version two.", "Alpha gained a page."]
    );
}

#[test]
fn upsert_with_no_chunks_drops_the_document() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let idx = indexer(&embedder);
    idx.build(vec![
        chunk("a.pdf", 1, "Alpha text."),
        chunk("b.pdf", 1, "Beta text."),
    ])
    .expect("build");

    idx.upsert_documents(&["a.pdf".to_string()], Vec::new())
        .expect("upsert");
    assert_eq!(idx.snapshot().documents(), vec!["b.pdf"]);
}

#[test]
fn retract_and_reset() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let idx = indexer(&embedder);
    idx.build(vec![
        chunk("a.pdf", 1, "Alpha text."),
        chunk("a.pdf", 2, "More alpha text."),
        chunk("b.pdf", 1, "Beta text."),
    ])
    .expect("build");

    assert_eq!(idx.retract("a.pdf"), 2);
    assert_eq!(idx.retract("missing.pdf"), 0);
    assert_eq!(idx.snapshot().documents(), vec!["b.pdf"]);

    idx.reset();
    assert!(idx.is_empty());
    assert_eq!(idx.snapshot().dims(), None);
    assert_eq!(idx.snapshot().model(), "mock-embed");
}

#[test]
fn concurrent_embedding_preserves_chunk_order() {
    let embedder = Arc::new(BagOfWordsEmbedder::new());
    let idx = Indexer::new(embedder.clone(), "mock-embed").with_concurrency(4);

    let chunks: Vec<_> = (1..=24)
        .map(|i| chunk("long.pdf", i, &format!("Page {i} discusses topic number {i}.")))
        .collect();
    let st = idx.build(chunks.clone()).expect("build");
    assert_eq!(st.embedded, 24);

    let snapshot = idx.snapshot();
    for (entry, original) in snapshot.entries().iter().zip(chunks.iter()) {
        assert_eq!(&entry.chunk, original);
        assert_eq!(entry.vector, BagOfWordsEmbedder::vector(&original.text));
    }
}
