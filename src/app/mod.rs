// Process-wide state shared by query handling

#[cfg(test)]
mod tests;

use anyhow::Context;
use std::sync::Arc;
use tracing::{debug, info};

use crate::boundaries::WardSet;
use crate::config::Config;
use crate::database::lancedb::VectorStore;
use crate::indexer::load_processed_wards;
use crate::query::{QueryPipeline, QueryResult};

/// Loaded once per process and read-only afterwards
pub struct AppContext {
    config: Config,
    wards: Arc<WardSet>,
    store: Arc<VectorStore>,
    pipeline: QueryPipeline,
}

impl AppContext {
    /// Load the processed wards and open the vector store
    ///
    /// Fails when ingestion has never completed for this base directory.
    #[inline]
    pub async fn initialize(config: Config) -> anyhow::Result<Self> {
        let wards = Arc::new(
            load_processed_wards(&config).context("Failed to load processed ward boundaries")?,
        );

        let store = Arc::new(
            VectorStore::new(&config)
                .await
                .context("Failed to open LanceDB vector store")?,
        );

        let pipeline = QueryPipeline::new(&config, Arc::clone(&wards), Some(Arc::clone(&store)))
            .context("Failed to build query pipeline")?;

        info!(
            "Loaded {} wards for {} from {}",
            wards.len(),
            wards.city,
            wards.source
        );

        Ok(Self {
            config,
            wards,
            store,
            pipeline,
        })
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn wards(&self) -> &WardSet {
        &self.wards
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn pipeline(&self) -> &QueryPipeline {
        &self.pipeline
    }

    #[inline]
    pub async fn ask(&self, question: &str) -> QueryResult {
        self.pipeline.answer(question).await
    }

    /// Release the store connection
    #[inline]
    pub fn shutdown(self) {
        debug!(
            "Closing vector store table {} ({} references)",
            self.store.table_name(),
            Arc::strong_count(&self.store)
        );
    }
}
