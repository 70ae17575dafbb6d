use super::*;
use tempfile::TempDir;

fn test_record(id: u32, vector: Vec<f32>) -> ChunkRecord {
    ChunkRecord {
        id: format!("record-{}", id),
        vector,
        content: format!("Test chunk {}", id),
        page: id,
        chunk_index: id,
        created_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn open_creates_empty_store() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let store = VectorStore::open(temp_dir.path(), "abc123def456")
        .await
        .expect("should open store");

    assert_eq!(store.table_name(), "manual_abc123def456");
    assert!(!store.is_populated().await.expect("should check population"));
}

#[tokio::test]
async fn first_batch_fixes_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), "abc123def456")
        .await
        .expect("should open store");

    store
        .store_chunks(vec![test_record(1, vec![0.1, 0.2, 0.3])])
        .await
        .expect("should store first batch");

    let result = store
        .store_chunks(vec![test_record(2, vec![0.1, 0.2, 0.3, 0.4])])
        .await;
    assert!(matches!(result, Err(ManualQaError::Index(_))));
}

#[tokio::test]
async fn rejects_zero_dimension_vectors() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), "abc123def456")
        .await
        .expect("should open store");

    let result = store.store_chunks(vec![test_record(1, vec![])]).await;
    assert!(matches!(result, Err(ManualQaError::Index(_))));
}

#[tokio::test]
async fn stores_and_counts_chunks() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), "abc123def456")
        .await
        .expect("should open store");

    let records = vec![
        test_record(1, vec![1.0, 0.0, 0.0]),
        test_record(2, vec![0.0, 1.0, 0.0]),
        test_record(3, vec![0.0, 0.0, 1.0]),
    ];
    store.store_chunks(records).await.expect("should store");

    assert_eq!(store.count_chunks().await.expect("should count"), 3);
    assert!(store.is_populated().await.expect("should check population"));
}

#[tokio::test]
async fn search_returns_nearest_chunk_first() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), "abc123def456")
        .await
        .expect("should open store");

    store
        .store_chunks(vec![
            test_record(1, vec![1.0, 0.0, 0.0]),
            test_record(2, vec![0.0, 1.0, 0.0]),
            test_record(3, vec![0.9, 0.1, 0.0]),
        ])
        .await
        .expect("should store");

    let hits = store
        .search_similar(&[1.0, 0.0, 0.0], 2)
        .await
        .expect("should search");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].content, "Test chunk 1");
    assert_eq!(hits[0].page, 1);
    assert_eq!(hits[0].vector, vec![1.0, 0.0, 0.0]);
    assert!(hits[0].distance <= hits[1].distance);
}

#[tokio::test]
async fn reopen_detects_existing_dimension() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    {
        let mut store = VectorStore::open(temp_dir.path(), "abc123def456")
            .await
            .expect("should open store");
        store
            .store_chunks(vec![test_record(1, vec![0.5, 0.5])])
            .await
            .expect("should store");
    }

    let mut reopened = VectorStore::open(temp_dir.path(), "abc123def456")
        .await
        .expect("should reopen store");

    assert!(reopened.is_populated().await.expect("should check"));

    // A mismatched batch is still rejected after reopening.
    let result = reopened
        .store_chunks(vec![test_record(2, vec![0.1, 0.2, 0.3])])
        .await;
    assert!(matches!(result, Err(ManualQaError::Index(_))));
}

#[tokio::test]
async fn drop_collection_clears_the_table() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let mut store = VectorStore::open(temp_dir.path(), "abc123def456")
        .await
        .expect("should open store");

    store
        .store_chunks(vec![test_record(1, vec![1.0, 0.0])])
        .await
        .expect("should store");
    store.drop_collection().await.expect("should drop");

    assert!(!store.is_populated().await.expect("should check population"));
}
