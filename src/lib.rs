pub mod core;
pub mod embedding;
pub mod llm;
pub mod qa;
pub mod rag;
pub mod seed;
pub mod state;

pub use crate::core::errors::{RagError, Result, StoreError};
