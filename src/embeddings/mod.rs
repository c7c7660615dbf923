// Embeddings module
// Ollama integration for turning ward descriptions into vectors

pub mod ollama;

pub use ollama::{DEFAULT_EMBEDDING_DIMENSION, OllamaClient};
