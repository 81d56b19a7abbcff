//! Paragraph-aligned document chunking.
//!
//! Text is split on blank lines and paragraphs are packed greedily into
//! chunks shorter than `max_length` characters. A paragraph that is already
//! too long becomes a chunk of its own unless `hard_split` is enabled.

use serde::{Deserialize, Serialize};

use super::document::{Chunk, Document};

const PARAGRAPH_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub max_length: usize,
    /// Documents at or below this many characters are kept whole
    pub threshold: usize,
    /// Split oversized paragraphs on character boundaries
    pub hard_split: bool,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_length: 800,
            threshold: 1000,
            hard_split: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentChunker {
    config: ChunkerConfig,
}

impl DocumentChunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Splits `text` into ordered, non-empty chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if self.config.hard_split {
            chunk_with_hard_split(text, self.config.max_length)
        } else {
            chunk_by_paragraphs(text, self.config.max_length)
        }
    }

    /// Chunks a document if it is longer than the threshold. Each piece keeps
    /// the document's metadata and gets a 1-based `chunk` number.
    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        if document.text.chars().count() <= self.config.threshold {
            return vec![Chunk {
                text: document.text.clone(),
                index: 0,
                metadata: document.metadata.clone(),
            }];
        }

        self.chunk(&document.text)
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let mut metadata = document.metadata.clone();
                metadata.chunk = Some(index as u32 + 1);
                Chunk {
                    text,
                    index,
                    metadata,
                }
            })
            .collect()
    }

    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunk_document(doc))
            .collect()
    }
}

pub fn chunk_by_paragraphs(text: &str, max_length: usize) -> Vec<String> {
    pack_paragraphs(text.split(PARAGRAPH_SEPARATOR), max_length)
}

fn chunk_with_hard_split(text: &str, max_length: usize) -> Vec<String> {
    let limit = max_length.max(1);
    let mut pieces: Vec<String> = Vec::new();
    for para in text.split(PARAGRAPH_SEPARATOR) {
        let chars: Vec<char> = para.chars().collect();
        if chars.len() < limit {
            pieces.push(para.to_string());
            continue;
        }
        pieces.extend(chars.chunks(limit).map(|piece| piece.iter().collect::<String>()));
    }
    pack_paragraphs(pieces.iter().map(String::as_str), max_length)
}

fn pack_paragraphs<'a, I>(paragraphs: I, max_length: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for para in paragraphs {
        let para_len = para.chars().count();
        if current_len + para_len < max_length {
            current.push_str(para);
            current.push_str(PARAGRAPH_SEPARATOR);
            current_len += para_len + PARAGRAPH_SEPARATOR.len();
        } else {
            flush(&mut chunks, &current);
            current.clear();
            current.push_str(para);
            current.push_str(PARAGRAPH_SEPARATOR);
            current_len = para_len + PARAGRAPH_SEPARATOR.len();
        }
    }
    flush(&mut chunks, &current);

    chunks
}

fn flush(chunks: &mut Vec<String>, buffer: &str) {
    let trimmed = buffer.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
