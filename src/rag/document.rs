//! Documents, chunks and the records derived from them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A metadata value outside the recognised keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Integer(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

/// Document metadata: a few well-known keys plus an open bag for the rest.
///
/// Serialises flat, so `{"title": "...", "type": "tutorial", "chunk": 2,
/// "difficulty": 3}` round-trips with `difficulty` landing in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// 1-based position of the chunk inside its source document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<u32>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, MetadataValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.doc_type = Some(doc_type.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Raw text handed to ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }
}

/// A paragraph-aligned passage cut from a [`Document`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// 0-based sequence index within the source document.
    pub index: usize,
    pub metadata: Metadata,
}

impl From<Chunk> for Document {
    fn from(chunk: Chunk) -> Self {
        Document {
            text: chunk.text,
            metadata: chunk.metadata,
        }
    }
}

/// What the vector store persists for every embedded passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: Metadata,
}

/// A passage returned for a query. Owns copies of the stored text and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    pub metadata: Metadata,
    pub distance: f32,
    pub relevance: f32,
}

impl RetrievalResult {
    pub fn from_distance(content: String, metadata: Metadata, distance: f32) -> Self {
        Self {
            content,
            metadata,
            distance,
            relevance: relevance_from_distance(distance),
        }
    }

    /// Relevance limited to `[0, 1]` for display. L2 distances above 2 would
    /// otherwise go negative.
    pub fn clamped_relevance(&self) -> f32 {
        self.relevance.clamp(0.0, 1.0)
    }
}

pub fn relevance_from_distance(distance: f32) -> f32 {
    1.0 - distance / 2.0
}
