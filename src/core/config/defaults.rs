use serde_json::{json, Value};

pub const DEFAULT_COLLECTION: &str = "programming_docs";
pub const DEFAULT_PERSIST_DIRECTORY: &str = "data/vector_db";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_CHUNK_MAX_LENGTH: usize = 800;
pub const DEFAULT_CHUNK_THRESHOLD: usize = 1000;

pub const DEFAULT_REMOTE_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_DIMENSION: usize = 384;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;

pub const DEFAULT_LANGUAGE: &str = "Python";
pub const DEFAULT_LEVEL: &str = "Intermediate";
pub const DEFAULT_N_CONTEXT_DOCS: usize = 5;
pub const DEFAULT_MAX_SOURCES: usize = 3;
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

/// Template written by `codementor init` when no config file exists yet.
pub fn default_config() -> Value {
    json!({
        "rag": {
            "collection_name": DEFAULT_COLLECTION,
            "persist_directory": DEFAULT_PERSIST_DIRECTORY,
            "distance_metric": "cosine",
            "batch_size": DEFAULT_BATCH_SIZE,
            "chunk_max_length": DEFAULT_CHUNK_MAX_LENGTH,
            "chunk_threshold": DEFAULT_CHUNK_THRESHOLD,
            "hard_split": false
        },
        "embedding": {
            "provider": "hashing",
            "dimension": DEFAULT_EMBEDDING_DIMENSION
        },
        "llm": {
            "base_url": DEFAULT_LLM_BASE_URL,
            "model": DEFAULT_LLM_MODEL,
            "temperature": DEFAULT_TEMPERATURE,
            "max_tokens": DEFAULT_MAX_TOKENS,
            "timeout_secs": 60,
            "retry": {
                "max_attempts": 3,
                "multiplier_secs": 1,
                "min_delay_secs": 2,
                "max_delay_secs": 10
            }
        },
        "qa": {
            "language": DEFAULT_LANGUAGE,
            "level": DEFAULT_LEVEL,
            "include_examples": true,
            "n_context_docs": DEFAULT_N_CONTEXT_DOCS,
            "max_sources": DEFAULT_MAX_SOURCES,
            "preview_chars": DEFAULT_PREVIEW_CHARS
        }
    })
}
