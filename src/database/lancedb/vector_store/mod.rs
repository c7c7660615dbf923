
use super::{EmbeddingRecord, sql_literal};
use crate::{Result, WardError, config::Config};
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use itertools::Itertools;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Ward description vectors in a single LanceDB table
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    vector_dimension: usize,
}

/// One nearest-neighbour match
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    /// Cosine distance, 0.0 for identical direction
    pub distance: f32,
    pub similarity_score: f32,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("table_name", &self.table_name)
            .field("vector_dimension", &self.vector_dimension)
            .finish_non_exhaustive()
    }
}

impl VectorStore {
    /// Open (or create) the ward table under the configured base directory
    #[inline]
    pub async fn new(config: &Config) -> Result<Self> {
        let db_path = config.vector_database_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(&db_path).map_err(|e| {
            WardError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = format!("file://{}", db_path.display());

        let connection = match lancedb::connect(&uri).execute().await {
            Ok(conn) => conn,
            Err(e) => {
                error!("Failed to connect to LanceDB: {}", e);

                let error_msg = e.to_string().to_lowercase();
                if error_msg.contains("corrupt") || error_msg.contains("malformed") {
                    warn!("Database corruption detected, attempting recovery");
                    Self::attempt_corruption_recovery(&db_path)?;

                    lancedb::connect(&uri).execute().await.map_err(|e| {
                        WardError::Database(format!(
                            "Failed to connect to LanceDB after recovery: {}",
                            e
                        ))
                    })?
                } else {
                    return Err(WardError::Database(format!(
                        "Failed to connect to LanceDB: {}",
                        e
                    )));
                }
            }
        };

        let mut store = Self {
            connection,
            table_name: config.boundaries.table_name.clone(),
            vector_dimension: config.ollama.embedding_dimension as usize,
        };

        store.initialize_table().await?;

        info!(
            "Vector store ready (table {}, {} dimensions)",
            store.table_name, store.vector_dimension
        );
        Ok(store)
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.vector_dimension
    }

    async fn initialize_table(&mut self) -> Result<()> {
        if self.table_exists().await? {
            match self.detect_existing_vector_dimension().await {
                Ok(dim) => {
                    if dim != self.vector_dimension {
                        info!(
                            "Existing table uses {} dimensions (configured {}), it will be recreated on the next write",
                            dim, self.vector_dimension
                        );
                    }
                    self.vector_dimension = dim;
                    return Ok(());
                }
                Err(e) => {
                    warn!("Existing table is unusable, recreating it: {}", e);
                    self.drop_table_if_exists().await?;
                }
            }
        }

        info!(
            "Creating table {} with {} dimensions",
            self.table_name, self.vector_dimension
        );
        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(self.vector_dimension))
            .execute()
            .await
            .map_err(|e| WardError::Database(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| WardError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| WardError::Database(format!("Failed to open table: {}", e)))
    }

    async fn detect_existing_vector_dimension(&self) -> Result<usize> {
        let schema = self
            .open_table()
            .await?
            .schema()
            .await
            .map_err(|e| WardError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(WardError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("text", DataType::Utf8, false),
        ]))
    }

    /// Insert or replace one record
    #[inline]
    pub async fn upsert(&mut self, record: EmbeddingRecord) -> Result<()> {
        self.upsert_batch(vec![record]).await
    }

    /// Insert or replace records keyed by `id`
    ///
    /// A single merge-insert on `id`, so a failed write leaves the previous
    /// rows intact and repeated runs never duplicate a ward. A batch whose
    /// dimension differs from the table's drops and recreates the table.
    #[inline]
    pub async fn upsert_batch(&mut self, records: Vec<EmbeddingRecord>) -> Result<()> {
        if records.is_empty() {
            debug!("No embeddings to store");
            return Ok(());
        }

        let vector_dim = records[0].dimension();
        if vector_dim == 0 {
            return Err(WardError::StoreWriteError(format!(
                "record '{}' has an empty vector",
                records[0].id
            )));
        }
        if let Some(bad) = records.iter().find(|r| r.dimension() != vector_dim) {
            return Err(WardError::StoreWriteError(format!(
                "record '{}' has {} dimensions, expected {}",
                bad.id,
                bad.dimension(),
                vector_dim
            )));
        }
        if let Some(duplicate) = records.iter().map(|r| r.id.as_str()).duplicates().next() {
            return Err(WardError::StoreWriteError(format!(
                "record '{}' appears twice in one batch",
                duplicate
            )));
        }

        if self.vector_dimension != vector_dim {
            info!(
                "Vector dimension changed from {} to {}, recreating table",
                self.vector_dimension, vector_dim
            );
            self.recreate_table_with_dimension(vector_dim)
                .await
                .map_err(|e| WardError::StoreWriteError(e.to_string()))?;
            self.vector_dimension = vector_dim;
        }

        let record_batch = Self::create_record_batch(&records, vector_dim)
            .map_err(|e| WardError::StoreWriteError(e.to_string()))?;

        let table = self
            .open_table()
            .await
            .map_err(|e| WardError::StoreWriteError(e.to_string()))?;

        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        // One commit: matched ids are rewritten in place, new ids appended
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge.execute(Box::new(reader)).await.map_err(|e| {
            WardError::StoreWriteError(format!("Failed to upsert embeddings: {}", e))
        })?;

        debug!("Stored {} embeddings", records.len());
        Ok(())
    }

    async fn recreate_table_with_dimension(&self, vector_dim: usize) -> Result<()> {
        self.drop_table_if_exists().await?;

        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
            .execute()
            .await
            .map_err(|e| {
                WardError::Database(format!("Failed to create table with new dimensions: {}", e))
            })?;

        info!("Table recreated with {} dimensions", vector_dim);
        Ok(())
    }

    fn create_record_batch(records: &[EmbeddingRecord], vector_dim: usize) -> Result<RecordBatch> {
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let texts: Vec<&str> = records.iter().map(|r| r.text.as_str()).collect();

        let mut flat_values = Vec::with_capacity(records.len() * vector_dim);
        for record in records {
            flat_values.extend_from_slice(&record.vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    WardError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| WardError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// The `limit` records nearest to `query_vector` by cosine distance
    #[inline]
    pub async fn search_similar(&self, query_vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        if query_vector.len() != self.vector_dimension {
            return Err(WardError::Database(format!(
                "Query vector has {} dimensions, the table stores {}",
                query_vector.len(),
                self.vector_dimension
            )));
        }

        debug!("Searching for similar vectors with limit: {}", limit);

        let stream = self
            .open_table()
            .await?
            .vector_search(query_vector)
            .map_err(|e| WardError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit.max(1))
            .execute()
            .await
            .map_err(|e| WardError::Database(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| WardError::Database(format!("Failed to read result stream: {}", e)))?;

        let mut hits = Vec::new();
        for batch in &batches {
            let ids = string_column(batch, "id")?;
            let texts = string_column(batch, "text")?;
            let distances = batch
                .column_by_name("_distance")
                .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

            for row in 0..batch.num_rows() {
                let distance = distances
                    .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
                hits.push(SearchHit {
                    id: ids.value(row).to_string(),
                    text: texts.value(row).to_string(),
                    distance,
                    similarity_score: 1.0 - distance,
                });
            }
        }

        debug!("Search returned {} hits", hits.len());
        Ok(hits)
    }

    /// The stored record for one ward, if any
    #[inline]
    pub async fn get(&self, id: &str) -> Result<Option<EmbeddingRecord>> {
        let batches = self
            .query_rows(Some(format!("id = {}", sql_literal(id))))
            .await?;

        for batch in &batches {
            if batch.num_rows() == 0 {
                continue;
            }

            let ids = string_column(batch, "id")?;
            let texts = string_column(batch, "text")?;
            let vectors = batch
                .column_by_name("vector")
                .and_then(|col| col.as_any().downcast_ref::<FixedSizeListArray>())
                .ok_or_else(|| WardError::Database("Invalid vector column".to_string()))?;

            let values = vectors.value(0);
            let values = values
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| WardError::Database("Invalid vector values".to_string()))?;

            return Ok(Some(EmbeddingRecord {
                id: ids.value(0).to_string(),
                vector: values.values().to_vec(),
                text: texts.value(0).to_string(),
            }));
        }

        Ok(None)
    }

    /// Every stored identifier, sorted
    #[inline]
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        let batches = self.query_rows(None).await?;

        let mut ids = Vec::new();
        for batch in &batches {
            let column = string_column(batch, "id")?;
            ids.extend((0..batch.num_rows()).map(|row| column.value(row).to_string()));
        }

        ids.sort();
        Ok(ids)
    }

    #[inline]
    pub async fn count(&self) -> Result<u64> {
        let count = self
            .open_table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| WardError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Delete every record whose identifier is not in `ids`
    ///
    /// Returns how many records were removed.
    #[inline]
    pub async fn retain(&self, ids: &[String]) -> Result<u64> {
        let before = self.count().await?;

        let predicate = if ids.is_empty() {
            "true".to_string()
        } else {
            format!("id NOT IN ({})", ids.iter().map(|id| sql_literal(id)).join(", "))
        };

        self.open_table()
            .await
            .map_err(|e| WardError::StoreWriteError(e.to_string()))?
            .delete(&predicate)
            .await
            .map_err(|e| WardError::StoreWriteError(format!("Failed to prune records: {}", e)))?;

        let removed = before.saturating_sub(self.count().await?);
        if removed > 0 {
            info!("Removed {} records for wards no longer in the source", removed);
        }
        Ok(removed)
    }

    /// Delete the records with these identifiers, returning how many existed
    #[inline]
    pub async fn remove(&self, ids: &[String]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let before = self.count().await?;
        let predicate = format!("id IN ({})", ids.iter().map(|id| sql_literal(id)).join(", "));

        self.open_table()
            .await
            .map_err(|e| WardError::StoreWriteError(e.to_string()))?
            .delete(&predicate)
            .await
            .map_err(|e| WardError::StoreWriteError(format!("Failed to delete records: {}", e)))?;

        Ok(before.saturating_sub(self.count().await?))
    }

    async fn query_rows(&self, filter: Option<String>) -> Result<Vec<RecordBatch>> {
        let table = self.open_table().await?;
        let total = table
            .count_rows(None)
            .await
            .map_err(|e| WardError::Database(format!("Failed to count rows: {}", e)))?;

        let mut query = table.query().limit(total.max(1));
        if let Some(filter) = filter {
            query = query.only_if(filter);
        }

        query
            .execute()
            .await
            .map_err(|e| WardError::Database(format!("Failed to execute query: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| WardError::Database(format!("Failed to read query results: {}", e)))
    }

    fn attempt_corruption_recovery(db_path: &Path) -> Result<()> {
        warn!("Attempting database corruption recovery at {:?}", db_path);

        if db_path.exists() {
            let backup_path = db_path.with_extension("corrupted_backup");
            if let Err(e) = std::fs::rename(db_path, &backup_path) {
                error!("Failed to backup corrupted database: {}", e);
            } else {
                info!("Corrupted database backed up to {:?}", backup_path);
            }
        }

        if db_path.exists() {
            std::fs::remove_dir_all(db_path).map_err(|e| {
                WardError::Database(format!("Failed to remove corrupted database: {}", e))
            })?;
        }

        Ok(())
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping table {}", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| WardError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    /// True when the table exists and can be counted
    #[inline]
    pub async fn validate_integrity(&self) -> bool {
        match self.table_exists().await {
            Ok(true) => match self.count().await {
                Ok(count) => {
                    debug!("Vector store integrity check passed, {} rows found", count);
                    true
                }
                Err(e) => {
                    error!("Failed to count rows during integrity check: {}", e);
                    false
                }
            },
            Ok(false) => {
                warn!("Table {} missing during integrity check", self.table_name);
                false
            }
            Err(e) => {
                error!("Failed to list tables during integrity check: {}", e);
                false
            }
        }
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| WardError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| WardError::Database(format!("Invalid {} column type", name)))
}
