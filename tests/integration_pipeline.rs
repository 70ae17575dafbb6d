mod common;

use std::sync::Arc;

use tempfile::TempDir;

use common::{CannedModel, FailingEmbedder, HashEmbedder, build_pdf, test_config};
use manual_qa::ManualQaError;
use manual_qa::answer::answer;
use manual_qa::index::VectorStore;
use manual_qa::pipeline::{IndexProgress, IndexingJob, index_document, staging_dir_for};
use manual_qa::session::{ManualRecord, SessionContext};

const PAGES: [&str; 10] = [
    "Welcome to your new vehicle. This manual covers operation and care.",
    "Seats and mirrors adjust electrically from the door panel controls.",
    "The instrument cluster shows speed, fuel level and coolant temperature.",
    "Headlights switch on automatically when the light sensor detects dusk.",
    "Use only unleaded fuel with an octane rating of 95 or higher.",
    "The climate control system filters pollen when recirculation is off.",
    "The engine oil capacity is 4.5 liters including the oil filter.",
    "Check the tire pressure monthly; the recommended value is 32 psi.",
    "The spare wheel and jack are stored under the trunk floor panel.",
    "Service is due every 15000 kilometers or once a year.",
];

#[tokio::test]
async fn pdf_becomes_a_queryable_index() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let bytes = build_pdf(&PAGES);

    let outcome = index_document(&bytes, "owner-manual.pdf", &HashEmbedder, &config, None)
        .await
        .expect("indexing should succeed");

    assert_eq!(outcome.page_count, 10);
    assert!(outcome.chunk_count >= 10);
    assert_eq!(outcome.collection, format!("manual_{}", outcome.document_id));
    assert_eq!(outcome.document_id.len(), 12);
    assert!(outcome.pdf_path.exists());
    assert!(outcome.index_dir.exists());
    assert!(!staging_dir_for(&config.vector_stores_dir(), &outcome.document_id).exists());

    let store = VectorStore::open(&outcome.index_dir, &outcome.document_id)
        .await
        .expect("should open index");
    assert_eq!(
        store.count_chunks().await.expect("should count") as usize,
        outcome.chunk_count
    );
}

#[tokio::test]
async fn answers_cite_the_page_holding_the_fact() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let bytes = build_pdf(&PAGES);

    let outcome = index_document(&bytes, "owner-manual.pdf", &HashEmbedder, &config, None)
        .await
        .expect("indexing should succeed");

    let store = VectorStore::open(&outcome.index_dir, &outcome.document_id)
        .await
        .expect("should open index");

    let result = answer(
        "What is the engine oil capacity including the filter?",
        &store,
        &HashEmbedder,
        &CannedModel("4.5 liters including the filter."),
        &config.retrieval,
    )
    .await;

    assert_eq!(result.text, "4.5 liters including the filter.");
    assert!(!result.sources.is_empty());
    assert!(
        result.sources.iter().any(|s| s.page == 7),
        "expected a citation from page 7, got pages {:?}",
        result.sources.iter().map(|s| s.page).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn repeated_questions_cite_the_same_sources_in_the_same_order() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let bytes = build_pdf(&PAGES);

    let outcome = index_document(&bytes, "owner-manual.pdf", &HashEmbedder, &config, None)
        .await
        .expect("indexing should succeed");

    let question = "What is the recommended tire pressure?";
    let mut runs = Vec::new();
    for _ in 0..2 {
        // A fresh store handle each time, so the fetch order itself is
        // exercised rather than a cached result.
        let store = VectorStore::open(&outcome.index_dir, &outcome.document_id)
            .await
            .expect("should open index");
        let result = answer(
            question,
            &store,
            &HashEmbedder,
            &CannedModel("32 psi, checked monthly."),
            &config.retrieval,
        )
        .await;
        assert!(!result.sources.is_empty());
        runs.push(result.sources);
    }

    assert_eq!(runs[0], runs[1]);
}

#[tokio::test]
async fn document_id_is_stable_across_rebuilds() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let bytes = build_pdf(&PAGES);

    let first = index_document(&bytes, "owner-manual.pdf", &HashEmbedder, &config, None)
        .await
        .expect("first indexing should succeed");
    let second = index_document(&bytes, "renamed-copy.pdf", &HashEmbedder, &config, None)
        .await
        .expect("second indexing should succeed");

    assert_eq!(first.document_id, second.document_id);
    assert_eq!(first.index_dir, second.index_dir);
    assert_eq!(first.chunk_count, second.chunk_count);
}

#[tokio::test]
async fn failed_rebuild_leaves_the_old_index_intact() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let bytes = build_pdf(&PAGES);

    let outcome = index_document(&bytes, "owner-manual.pdf", &HashEmbedder, &config, None)
        .await
        .expect("initial indexing should succeed");

    let result = index_document(&bytes, "owner-manual.pdf", &FailingEmbedder, &config, None).await;
    assert!(matches!(result, Err(ManualQaError::Embedding(_))));

    // The previous index survives the failed rebuild.
    assert!(outcome.index_dir.exists());
    // Only the first run's upload remains; the failed run cleaned up its own.
    assert!(outcome.pdf_path.exists());
    let uploads: Vec<_> = std::fs::read_dir(config.uploads_dir())
        .expect("uploads dir should exist")
        .collect();
    assert_eq!(uploads.len(), 1);
    let store = VectorStore::open(&outcome.index_dir, &outcome.document_id)
        .await
        .expect("should reopen index");
    assert_eq!(
        store.count_chunks().await.expect("should count") as usize,
        outcome.chunk_count
    );
}

#[tokio::test]
async fn background_job_streams_progress() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let bytes = build_pdf(&PAGES);

    let mut job = IndexingJob::spawn(
        bytes,
        "owner-manual.pdf".to_string(),
        Arc::new(HashEmbedder),
        config,
    );

    let mut events = Vec::new();
    while let Some(event) = job.progress.recv().await {
        events.push(event);
    }
    let outcome = job
        .handle
        .await
        .expect("task should not panic")
        .expect("indexing should succeed");

    assert_eq!(events.first(), Some(&IndexProgress::Saving));
    assert!(events.contains(&IndexProgress::Extracting));
    assert!(events.contains(&IndexProgress::Chunking));
    assert!(events.contains(&IndexProgress::Writing));
    assert!(events.contains(&IndexProgress::Embedding {
        done: outcome.chunk_count,
        total: outcome.chunk_count,
    }));
}

#[tokio::test]
async fn session_round_trip_through_the_pipeline() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);
    let bytes = build_pdf(&PAGES);

    let outcome = index_document(&bytes, "owner-manual.pdf", &HashEmbedder, &config, None)
        .await
        .expect("indexing should succeed");

    let mut session = SessionContext::load(config.clone()).expect("should load session");
    session
        .set_manual(ManualRecord::from_outcome(&outcome, "owner-manual.pdf"))
        .expect("should persist manual");

    let mut reloaded = SessionContext::load(config).expect("should reload session");
    let manual = reloaded.manual().cloned().expect("manual should persist");
    assert_eq!(manual.document_id, outcome.document_id);
    assert_eq!(manual.chunk_count, outcome.chunk_count);

    let store = reloaded.vector_store().await.expect("should open store");
    assert!(store.count_chunks().await.expect("should count") > 0);

    let discarded = reloaded.discard_manual().expect("should discard");
    assert!(discarded.is_some());
    assert!(!outcome.index_dir.exists());
    assert!(!outcome.pdf_path.exists());
}
