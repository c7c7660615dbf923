// LanceDB vector database module
// One row per ward: identifier, description embedding and the description text


pub mod vector_store;

pub use vector_store::{SearchHit, VectorStore};

use serde::{Deserialize, Serialize};

/// Embedding record stored in LanceDB, keyed by ward identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    /// The description the vector was computed from
    pub text: String,
}

impl EmbeddingRecord {
    #[inline]
    pub fn new(id: impl Into<String>, vector: Vec<f32>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            vector,
            text: text.into(),
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Quote a string literal for a LanceDB filter expression
#[inline]
pub(crate) fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
