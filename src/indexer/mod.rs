// Indexer module
// Runs the offline pipeline: boundaries, descriptions, embeddings, vector store

pub mod consistency;
pub mod lock;

use std::time::{Duration, Instant};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::boundaries::{BoundaryLoader, Ward, WardSet};
use crate::config::Config;
use crate::database::lancedb::{EmbeddingRecord, VectorStore};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::RunCounts;
use crate::description::describe_ward;
use crate::embeddings::ollama::OllamaClient;
use crate::http::HttpClient;
use crate::{Result, WardError};

pub use consistency::{ConsistencyReport, validate_consistency};
pub use lock::IngestLock;

/// What to do when one ward cannot be embedded or stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ItemErrorPolicy {
    /// Stop the run at the first failure
    #[default]
    Abort,
    /// Log the ward, leave it out and continue
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IngestOptions {
    /// Download the boundary source again even if a cached copy exists
    pub refresh: bool,
    pub on_error: ItemErrorPolicy,
}

/// Outcome of one ingestion run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestStats {
    pub run_id: String,
    pub ward_count: usize,
    pub embedded: usize,
    pub skipped: Vec<String>,
    /// Records deleted: wards gone from the source plus outdated records of skipped wards
    pub pruned: u64,
    pub duration: Duration,
}

impl IngestStats {
    fn counts(&self) -> RunCounts {
        RunCounts {
            ward_count: self.ward_count as i64,
            embedded_count: self.embedded as i64,
            skipped_count: self.skipped.len() as i64,
            pruned_count: self.pruned as i64,
        }
    }
}

/// Embeds ward descriptions and upserts them keyed by ward identifier
pub struct EmbeddingIndexer<'a> {
    ollama: &'a OllamaClient,
    store: &'a mut VectorStore,
}

impl<'a> EmbeddingIndexer<'a> {
    #[inline]
    pub fn new(ollama: &'a OllamaClient, store: &'a mut VectorStore) -> Self {
        Self { ollama, store }
    }

    /// Embed and store a single ward description
    #[inline]
    pub async fn index(&mut self, id: &str, description: &str) -> Result<()> {
        let vector = self.ollama.generate_embedding(description)?;
        self.store
            .upsert(EmbeddingRecord::new(id, vector, description))
            .await
    }

    /// Embed and store a batch of `(id, description)` pairs with one model call
    #[inline]
    pub async fn index_batch(&mut self, items: &[(String, String)]) -> Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = items.iter().map(|(_, text)| text.clone()).collect();
        let vectors = self.ollama.generate_embeddings_batch(&texts)?;

        let records: Vec<EmbeddingRecord> = items
            .iter()
            .zip(vectors)
            .map(|((id, text), vector)| EmbeddingRecord::new(id.as_str(), vector, text.as_str()))
            .collect();

        let stored = records.len();
        self.store.upsert_batch(records).await?;
        Ok(stored)
    }
}

/// The exclusive ingestion job
pub struct Ingestor {
    config: Config,
    database: Database,
    store: VectorStore,
    ollama: OllamaClient,
    boundary_http: Option<HttpClient>,
}

impl Ingestor {
    /// Open the ledger, the vector store and the embedding client from config
    #[inline]
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let database = Database::initialize_from_config_dir(config.get_base_dir())
            .await
            .context("Failed to initialize SQLite database")?;

        let store = VectorStore::new(&config)
            .await
            .context("Failed to initialize LanceDB vector store")?;

        let ollama = OllamaClient::new(&config).context("Failed to initialize Ollama client")?;

        Ok(Self::from_parts(config, database, store, ollama))
    }

    #[inline]
    pub fn from_parts(
        config: Config,
        database: Database,
        store: VectorStore,
        ollama: OllamaClient,
    ) -> Self {
        Self {
            config,
            database,
            store,
            ollama,
            boundary_http: None,
        }
    }

    /// Use a specific HTTP client for downloading boundaries
    #[inline]
    pub fn with_boundary_http(mut self, http: HttpClient) -> Self {
        self.boundary_http = Some(http);
        self
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn into_store(self) -> VectorStore {
        self.store
    }

    /// Run the whole pipeline once under the ingestion lock
    ///
    /// The ledger row is marked `failed` with the error text when any fatal
    /// error stops the run.
    #[inline]
    pub async fn run(&mut self, options: IngestOptions) -> Result<IngestStats> {
        let _lock = IngestLock::acquire(&self.config.ingest_lock_path())?;

        self.database
            .fail_abandoned_runs()
            .await
            .map_err(|e| WardError::Database(e.to_string()))?;

        let run = self
            .database
            .start_run(&self.config.boundaries.source)
            .await
            .map_err(|e| WardError::Database(e.to_string()))?;

        info!("Starting ingestion run {}", run.id);
        let started = Instant::now();

        match self.ingest(&run.id, options, started).await {
            Ok(stats) => {
                self.database
                    .complete_run(&run.id, stats.counts())
                    .await
                    .map_err(|e| WardError::Database(e.to_string()))?;

                info!(
                    "Ingestion run {} finished: {} wards, {} embedded, {} skipped, {} pruned in {:.1?}",
                    run.id,
                    stats.ward_count,
                    stats.embedded,
                    stats.skipped.len(),
                    stats.pruned,
                    stats.duration
                );
                Ok(stats)
            }
            Err(e) => {
                error!("Ingestion run {} failed: {}", run.id, e);
                if let Err(ledger_error) = self.database.fail_run(&run.id, &e.to_string()).await {
                    warn!("Could not record the failure in the ledger: {}", ledger_error);
                }
                Err(e)
            }
        }
    }

    async fn ingest(
        &mut self,
        run_id: &str,
        options: IngestOptions,
        started: Instant,
    ) -> Result<IngestStats> {
        let mut loader = BoundaryLoader::new(&self.config).with_refresh(options.refresh);
        if let Some(http) = &self.boundary_http {
            loader = loader.with_http(http.clone());
        }

        let wards = loader.load()?;
        let city = wards.city.clone();

        let descriptions = wards
            .wards
            .iter()
            .map(|ward| describe_ward(ward, &city).map(|text| (ward.id.clone(), text)))
            .collect::<Result<Vec<_>>>()?;

        let (embedded, skipped) = self
            .embed_all(&wards.wards, &descriptions, options.on_error)
            .await?;

        // A skipped ward must not keep a record embedded from older text
        let cleared = self.store.remove(&skipped).await?;
        if cleared > 0 {
            warn!(
                "Removed {} outdated records for skipped wards, answers will use rebuilt descriptions",
                cleared
            );
        }

        let pruned = cleared + self.store.retain(&wards.ids()).await?;

        wards.save(&self.config.processed_wards_path())?;

        Ok(IngestStats {
            run_id: run_id.to_string(),
            ward_count: wards.len(),
            embedded,
            skipped,
            pruned,
            duration: started.elapsed(),
        })
    }

    async fn embed_all(
        &mut self,
        wards: &[Ward],
        descriptions: &[(String, String)],
        policy: ItemErrorPolicy,
    ) -> Result<(usize, Vec<String>)> {
        let batch_size = (self.config.ollama.batch_size as usize).max(1);
        let bar = progress_bar(wards.len() as u64);

        let mut embedded = 0;
        let mut skipped = Vec::new();
        let mut indexer = EmbeddingIndexer::new(&self.ollama, &mut self.store);

        for batch in descriptions.chunks(batch_size) {
            if let Some((id, _)) = batch.first() {
                bar.set_message(format!("ward {}", id));
            }

            match indexer.index_batch(batch).await {
                Ok(count) => embedded += count,
                Err(e) if policy == ItemErrorPolicy::Skip && is_item_error(&e) => {
                    warn!("Batch failed ({}), retrying ward by ward", e);
                    for (id, text) in batch {
                        match indexer.index(id, text).await {
                            Ok(()) => embedded += 1,
                            Err(item_error) => {
                                warn!("Skipping ward {}: {}", id, item_error);
                                skipped.push(id.clone());
                            }
                        }
                    }
                }
                Err(e) => {
                    bar.abandon();
                    return Err(e);
                }
            }

            bar.inc(batch.len() as u64);
        }

        bar.finish_and_clear();
        debug!("Embedded {} wards, skipped {}", embedded, skipped.len());
        Ok((embedded, skipped))
    }
}

fn is_item_error(error: &WardError) -> bool {
    matches!(
        error,
        WardError::EmbeddingServiceError(_) | WardError::StoreWriteError(_)
    )
}

fn progress_bar(len: u64) -> ProgressBar {
    if !console::user_attended_stderr() {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding {msg}") {
        bar.set_style(style);
    }
    bar
}

/// Load the processed ward snapshot written by the last successful run
#[inline]
pub fn load_processed_wards(config: &Config) -> Result<WardSet> {
    WardSet::load(&config.processed_wards_path())
}
