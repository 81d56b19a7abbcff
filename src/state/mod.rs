use std::sync::Arc;

use crate::core::config::service::settings_from_value;
use crate::core::config::{AppPaths, AppSettings, ConfigService};
use crate::embedding;
use crate::llm;
use crate::qa::QaSystem;
use crate::rag::{ChunkerConfig, DocumentChunker, RagEngine, SqliteVectorStore};

pub mod error;

use error::InitializationError;

/// Application state shared by every command.
///
/// Holds:
/// - Configuration and paths
/// - The vector store for the configured collection
/// - The ingestion/retrieval engine and the QA system built on it
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: AppSettings,
    pub store: Arc<SqliteVectorStore>,
    pub engine: Arc<RagEngine>,
    pub qa: Arc<QaSystem>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Loading configuration for the given paths
    /// 2. Opening (or creating) the vector collection
    /// 3. Building the embedding provider and the LLM client
    /// 4. Wiring the engine and the QA system
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let raw = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;
        tracing::debug!(
            "Effective config from {}: {}",
            config.config_path().display(),
            config.redact_sensitive_values(&raw)
        );
        let settings =
            settings_from_value(raw).map_err(|e| InitializationError::Config(e.into()))?;

        Self::build(paths, config, settings).await
    }

    /// Same wiring with explicit settings instead of the config files.
    pub async fn with_settings(
        paths: Arc<AppPaths>,
        settings: AppSettings,
    ) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        Self::build(paths, config, settings).await
    }

    async fn build(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: AppSettings,
    ) -> Result<Arc<Self>, InitializationError> {
        let rag = &settings.rag;
        let persist_directory = paths.resolve(&rag.persist_directory);

        let store = Arc::new(
            SqliteVectorStore::create_or_open(
                &persist_directory,
                &rag.collection_name,
                rag.distance_metric,
            )
            .await
            .map_err(|e| InitializationError::Store(e.into()))?,
        );

        let embedder = embedding::from_settings(&settings.embedding)
            .map_err(|e| InitializationError::Embedding(e.into()))?;

        let llm = llm::from_settings(&settings.llm).map_err(|e| InitializationError::Llm(e.into()))?;

        let chunker = DocumentChunker::new(ChunkerConfig {
            max_length: rag.chunk_max_length,
            threshold: rag.chunk_threshold,
            hard_split: rag.hard_split,
        });

        let engine = Arc::new(
            RagEngine::new(store.clone(), embedder)
                .with_chunker(chunker)
                .with_batch_size(rag.batch_size),
        );

        let qa = Arc::new(QaSystem::new(
            engine.retriever().clone(),
            llm,
            settings.qa.clone(),
        ));

        tracing::info!(
            "Collection {} ready at {}",
            rag.collection_name,
            persist_directory.display()
        );

        Ok(Arc::new(AppState {
            paths,
            config,
            settings,
            store,
            engine,
            qa,
        }))
    }
}
