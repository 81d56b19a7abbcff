//! Retrieval-augmented generation core.
//!
//! - `DocumentChunker`: paragraph-aligned chunking for long documents
//! - `SqliteVectorStore`: persistent named collections with brute-force search
//! - `Retriever`: query embedding plus nearest-neighbour lookup
//! - `RagEngine`: batched ingestion, retrieval and stats over one collection

pub mod chunker;
pub mod distance;
pub mod document;
mod engine;
mod retriever;
pub mod sqlite;
mod store;

pub use chunker::{ChunkerConfig, DocumentChunker};
pub use distance::DistanceMetric;
pub use document::{
    relevance_from_distance, Chunk, Document, EmbeddingRecord, Metadata, MetadataValue,
    RetrievalResult,
};
pub use engine::{EngineStats, IngestReport, RagEngine};
pub use retriever::Retriever;
pub use sqlite::SqliteVectorStore;
pub use store::{CollectionStats, QueryMatch, VectorStore};
