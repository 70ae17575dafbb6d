use super::*;

#[test]
fn collection_name_embeds_document_id() {
    assert_eq!(collection_name("a9993e364706"), "manual_a9993e364706");
}

#[test]
fn chunk_record_carries_chunk_fields() {
    let chunk = DocumentChunk {
        content: "Check tire pressure monthly.".to_string(),
        page: 12,
        chunk_index: 3,
    };

    let record = ChunkRecord::new(chunk, vec![0.1, 0.2, 0.3]);

    assert_eq!(record.content, "Check tire pressure monthly.");
    assert_eq!(record.page, 12);
    assert_eq!(record.chunk_index, 3);
    assert_eq!(record.vector, vec![0.1, 0.2, 0.3]);
    assert!(!record.id.is_empty());
    assert!(!record.created_at.is_empty());
}

#[test]
fn chunk_record_ids_are_unique() {
    let chunk = DocumentChunk {
        content: "x".to_string(),
        page: 1,
        chunk_index: 0,
    };

    let a = ChunkRecord::new(chunk.clone(), vec![0.0]);
    let b = ChunkRecord::new(chunk, vec![0.0]);

    assert_ne!(a.id, b.id);
}
