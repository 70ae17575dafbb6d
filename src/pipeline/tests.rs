use super::*;
use tempfile::TempDir;

struct FixedEmbedder;

impl Embedder for FixedEmbedder {
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }

    fn embed_query(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }

    fn model_name(&self) -> &str {
        "fixed-test-embedder"
    }
}

fn test_config(temp_dir: &TempDir) -> Config {
    Config::load(temp_dir.path()).expect("should load defaults")
}

#[test]
fn index_paths_are_siblings() {
    let base = Path::new("/data/vector_stores");

    assert_eq!(
        index_dir_for(base, "abc123"),
        Path::new("/data/vector_stores/abc123")
    );
    assert_eq!(
        staging_dir_for(base, "abc123"),
        Path::new("/data/vector_stores/abc123.staging")
    );
}

#[tokio::test]
async fn rejects_empty_upload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);

    let result = index_document(b"", "empty.pdf", &FixedEmbedder, &config, None).await;

    assert!(matches!(result, Err(ManualQaError::Storage(_))));
}

#[tokio::test]
async fn rejects_non_pdf_upload() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = test_config(&temp_dir);

    let result =
        index_document(b"plain text, not a pdf", "notes.txt", &FixedEmbedder, &config, None).await;

    assert!(matches!(result, Err(ManualQaError::Extraction(_))));
    // Nothing half-built left behind
    assert!(!config.vector_stores_dir().exists());
    let leftover_uploads = fs::read_dir(config.uploads_dir())
        .map(|entries| entries.count())
        .unwrap_or(0);
    assert_eq!(leftover_uploads, 0);
}
