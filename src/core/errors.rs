use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

/// Vector store failures. Kept separate so the retriever can hand them to the
/// orchestrator untouched.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate record id '{0}'")]
    DuplicateId(String),
    #[error("dimension mismatch: collection expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("collection '{collection}' was created with metric '{stored}', not '{requested}'")]
    MetricMismatch {
        collection: String,
        stored: String,
        requested: String,
    },
    #[error("column length mismatch: {0}")]
    ColumnMismatch(String),
    #[error("database error: {0}")]
    Database(String),
    #[error("corrupt record '{id}': {reason}")]
    Corrupt { id: String, reason: String },
}

impl StoreError {
    pub fn database<E: std::fmt::Display>(err: E) -> Self {
        StoreError::Database(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum RagError {
    #[error("provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("vector store error: {0}")]
    Store(#[from] StoreError),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        RagError::Internal(err.to_string())
    }

    pub fn unavailable<E: std::fmt::Display>(err: E) -> Self {
        RagError::ProviderUnavailable(err.to_string())
    }

    /// Whether a generation call failing with this error may be attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::ProviderUnavailable(_) | RagError::Internal(_))
    }

    /// Authentication and quota failures never resolve by waiting.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RagError::Auth(_) | RagError::QuotaExceeded(_))
    }

    /// Message shown to the person asking the question.
    pub fn user_message(&self) -> String {
        match self {
            RagError::Auth(_) => {
                "Authentication with the language model provider failed. Check your API key."
                    .to_string()
            }
            RagError::QuotaExceeded(_) => {
                "The language model quota has been exceeded. Please check your plan and billing details."
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for RagError {
    fn from(err: sqlx::Error) -> Self {
        RagError::Store(StoreError::database(err))
    }
}

impl From<reqwest::Error> for RagError {
    fn from(err: reqwest::Error) -> Self {
        RagError::ProviderUnavailable(err.to_string())
    }
}
