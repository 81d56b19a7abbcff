//! Question answering over the documentation collection.

pub mod prompt;
mod system;
mod types;

pub use system::{parse_numbered_lines, QaSystem, MAX_DISPLAYED_SOURCES};
pub use types::{QaAnswer, QaRequest, RelatedQuestions, RequestStage, Source, StreamingAnswer};
