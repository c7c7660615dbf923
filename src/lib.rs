use thiserror::Error;

pub type Result<T> = std::result::Result<T, WardError>;

#[derive(Error, Debug)]
pub enum WardError {
    #[error("Boundary data unavailable from {location}: {message}")]
    DataUnavailable { location: String, message: String },

    #[error("Schema error in feature #{index}: {message}")]
    SchemaError { index: usize, message: String },

    #[error("Ward {ward_id} is missing required field '{field}'")]
    IncompleteRecord { ward_id: String, field: String },

    #[error("Embedding service error: {0}")]
    EmbeddingServiceError(String),

    #[error("Vector store write failed: {0}")]
    StoreWriteError(String),

    #[error("Could not extract a landmark: {0}")]
    ExtractionFailed(String),

    #[error("No location found for '{landmark}': {detail}")]
    NotFound { landmark: String, detail: String },

    #[error("'{landmark}' matched {candidates} equally ranked places")]
    AmbiguousMatch { landmark: String, candidates: usize },

    #[error("No ward contains ({latitude}, {longitude})")]
    NoContainingWard { latitude: f64, longitude: f64 },

    #[error("Point ({latitude}, {longitude}) lies in several wards: {ward_ids:?}")]
    AmbiguousContainment {
        latitude: f64,
        longitude: f64,
        ward_ids: Vec<String>,
    },

    #[error("Answer generation failed: {0}")]
    GenerationFailed(String),

    #[error("Another ingestion run is in progress (lock file {0})")]
    IngestLocked(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl WardError {
    /// The query-time failure kind this error maps to, if it is one.
    #[inline]
    pub fn failure_kind(&self) -> Option<query::FailureKind> {
        use query::FailureKind;

        match self {
            Self::ExtractionFailed(_) => Some(FailureKind::ExtractionFailed),
            Self::NotFound { .. } => Some(FailureKind::NotFound),
            Self::AmbiguousMatch { .. } => Some(FailureKind::AmbiguousMatch),
            Self::NoContainingWard { .. } => Some(FailureKind::NoContainingWard),
            Self::AmbiguousContainment { .. } => Some(FailureKind::AmbiguousContainment),
            Self::GenerationFailed(_) => Some(FailureKind::GenerationFailed),
            _ => None,
        }
    }
}

pub mod app;
pub mod boundaries;
pub mod commands;
pub mod config;
pub mod database;
pub mod description;
pub mod embeddings;
pub mod geocoder;
pub mod http;
pub mod indexer;
pub mod llm;
pub mod query;
pub mod spatial;
