#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use tracing::{debug, info};

use super::{ChunkRecord, collection_name};
use crate::retrieval::ScoredChunk;
use crate::{ManualQaError, Result};

/// LanceDB-backed vector index for a single document.
///
/// Each document gets its own database directory and a single table named
/// after the document id. The vector dimension is fixed by the first batch
/// of records inserted.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: Option<usize>,
}

impl VectorStore {
    /// Open (or create) the index directory for a document.
    #[inline]
    pub async fn open(index_dir: &Path, document_id: &str) -> Result<Self> {
        debug!("Opening LanceDB index at {:?}", index_dir);

        std::fs::create_dir_all(index_dir).map_err(|e| {
            ManualQaError::Index(format!("Failed to create index directory: {}", e))
        })?;

        let uri = format!("file://{}", index_dir.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

        let table_name = collection_name(document_id);

        let mut store = Self {
            connection,
            table_name,
            vector_dimension: None,
        };

        if store.table_exists().await? {
            store.vector_dimension = Some(store.detect_vector_dimension().await?);
            debug!(
                "Opened existing table {} with dimension {:?}",
                store.table_name, store.vector_dimension
            );
        }

        Ok(store)
    }

    /// Whether this index already holds a populated table.
    #[inline]
    pub async fn is_populated(&self) -> Result<bool> {
        if !self.table_exists().await? {
            return Ok(false);
        }
        Ok(self.count_chunks().await? > 0)
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.contains(&self.table_name))
    }

    /// Detect vector dimension from the existing table schema
    async fn detect_vector_dimension(&self) -> Result<usize> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to open table: {}", e)))?;

        let schema = table
            .schema()
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(ManualQaError::Index(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("page", DataType::UInt32, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    /// Insert a batch of embedded chunks.
    ///
    /// The first batch fixes the table's vector dimension; later batches
    /// must match it.
    #[inline]
    pub async fn store_chunks(&mut self, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No chunks to store");
            return Ok(());
        }

        let vector_dim = records[0].vector.len();
        if vector_dim == 0 {
            return Err(ManualQaError::Index(
                "Refusing to store zero-dimension vectors".to_string(),
            ));
        }

        match self.vector_dimension {
            None => {
                debug!(
                    "Creating table {} with dimension {}",
                    self.table_name, vector_dim
                );
                self.connection
                    .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
                    .execute()
                    .await
                    .map_err(|e| ManualQaError::Index(format!("Failed to create table: {}", e)))?;
                self.vector_dimension = Some(vector_dim);
            }
            Some(existing) if existing != vector_dim => {
                return Err(ManualQaError::Index(format!(
                    "Vector dimension mismatch: table has {}, batch has {}",
                    existing, vector_dim
                )));
            }
            Some(_) => {}
        }

        let record_batch = self.create_record_batch(&records)?;

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to open table: {}", e)))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to insert chunks: {}", e)))?;

        debug!("Stored {} chunks in {}", records.len(), self.table_name);
        Ok(())
    }

    fn create_record_batch(&self, records: &[ChunkRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let vector_dim = self
            .vector_dimension
            .ok_or_else(|| ManualQaError::Index("Vector dimension not set".to_string()))?;

        let mut ids = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for record in records {
            if record.vector.len() != vector_dim {
                return Err(ManualQaError::Index(format!(
                    "Vector dimension mismatch within batch: expected {}, got {}",
                    vector_dim,
                    record.vector.len()
                )));
            }
            ids.push(record.id.as_str());
            contents.push(record.content.as_str());
            pages.push(record.page);
            chunk_indices.push(record.chunk_index);
            created_ats.push(record.created_at.as_str());
            flat_values.extend_from_slice(&record.vector);
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    ManualQaError::Index(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| ManualQaError::Index(format!("Failed to create record batch: {}", e)))
    }

    /// Fetch the `limit` nearest chunks to a query vector.
    ///
    /// Stored vectors are returned alongside each chunk so the caller can
    /// rerank the pool.
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredChunk>> {
        debug!("Searching {} with limit {}", self.table_name, limit);

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to open table: {}", e)))?;

        let mut results = table
            .vector_search(query_vector)
            .map_err(|e| ManualQaError::Index(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(Self::parse_search_batch(&batch)?);
        }

        debug!("Search returned {} chunks", hits.len());
        Ok(hits)
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
        let num_rows = batch.num_rows();

        let contents = batch
            .column_by_name("content")
            .ok_or_else(|| ManualQaError::Index("Missing content column".to_string()))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| ManualQaError::Index("Invalid content column type".to_string()))?;

        let pages = batch
            .column_by_name("page")
            .ok_or_else(|| ManualQaError::Index("Missing page column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| ManualQaError::Index("Invalid page column type".to_string()))?;

        let chunk_indices = batch
            .column_by_name("chunk_index")
            .ok_or_else(|| ManualQaError::Index("Missing chunk_index column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| ManualQaError::Index("Invalid chunk_index column type".to_string()))?;

        let vectors = batch
            .column_by_name("vector")
            .ok_or_else(|| ManualQaError::Index("Missing vector column".to_string()))?
            .as_any()
            .downcast_ref::<FixedSizeListArray>()
            .ok_or_else(|| ManualQaError::Index("Invalid vector column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut hits = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            let values = vectors.value(row);
            let values = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| {
                    ManualQaError::Index("Invalid vector element type".to_string())
                })?;
            let vector: Vec<f32> = (0..values.len()).map(|i| values.value(i)).collect();

            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            hits.push(ScoredChunk {
                content: contents.value(row).to_string(),
                page: pages.value(row),
                chunk_index: chunk_indices.value(row),
                vector,
                distance,
            });
        }

        Ok(hits)
    }

    /// Total number of chunks stored in this index.
    #[inline]
    pub async fn count_chunks(&self) -> Result<u64> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| ManualQaError::Index(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Drop the document's table if present.
    #[inline]
    pub async fn drop_collection(&mut self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping table {}", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| ManualQaError::Index(format!("Failed to drop table: {}", e)))?;
        }
        self.vector_dimension = None;
        Ok(())
    }

    /// Name of the LanceDB table this store operates on.
    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}
