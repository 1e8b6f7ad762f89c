//! Search tuning knobs and the command-line arguments shared by the binaries.

use std::time::Duration;

use clap::Args;

use crate::store::postgres::PgStoreConfig;

/// Defaults and bounds applied to incoming search requests.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchSettings {
    /// Window size when the request does not set one.
    pub default_limit: usize,
    /// Largest window a request may ask for.
    pub max_limit: usize,
    /// Similarity threshold when the request does not set one.
    pub default_threshold: f64,
    /// Window size for similar-page lookups.
    pub similar_limit: usize,
    /// Snippet length in characters.
    pub snippet_chars: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            default_threshold: 0.1,
            similar_limit: 5,
            snippet_chars: 200,
        }
    }
}

/// Postgres connection and table arguments.
#[derive(Args, Debug, Clone)]
pub struct DatabaseArgs {
    /// Postgres connection string (postgres://...)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Schema holding the book and page tables
    #[arg(long, env = "SEARCHKU_SCHEMA", default_value = "public")]
    pub schema: String,

    /// Book table name
    #[arg(long, env = "SEARCHKU_BOOKS_TABLE", default_value = "books")]
    pub books_table: String,

    /// Page table name
    #[arg(long, env = "SEARCHKU_PAGES_TABLE", default_value = "pages")]
    pub pages_table: String,

    /// HNSW candidate list size (hnsw.ef_search); raise it for deep pagination
    #[arg(long, env = "SEARCHKU_EF_SEARCH")]
    pub ef_search: Option<u32>,

    /// Create the vector extension, tables and index if missing
    #[arg(long, env = "SEARCHKU_PREPARE_SCHEMA", default_value_t = false)]
    pub prepare_schema: bool,
}

impl DatabaseArgs {
    /// Converts the parsed arguments into store settings.
    pub fn store_config(&self) -> PgStoreConfig {
        PgStoreConfig {
            database_url: self.database_url.clone(),
            schema: self.schema.clone(),
            books_table: self.books_table.clone(),
            pages_table: self.pages_table.clone(),
            ef_search: self.ef_search,
        }
    }
}

/// OpenAI-compatible embedding endpoint arguments.
#[derive(Args, Debug, Clone)]
pub struct OpenAiArgs {
    /// OpenAI API key used for embeddings and translations
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: String,

    /// Embedding model identifier
    #[arg(
        long,
        env = "SEARCHKU_EMBEDDING_MODEL",
        default_value = "text-embedding-3-small"
    )]
    pub embedding_model: String,

    /// Optional embedding dimension override
    #[arg(long, env = "SEARCHKU_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Base URL for OpenAI-compatible endpoints
    #[arg(
        long,
        env = "SEARCHKU_OPENAI_BASE",
        default_value = "https://api.openai.com/v1"
    )]
    pub openai_base_url: String,

    /// Seconds before provider requests time out
    #[arg(long, env = "SEARCHKU_OPENAI_TIMEOUT_SECS", default_value_t = 30)]
    pub openai_timeout_secs: u64,

    /// Retry attempts for transient errors during batch embedding
    #[arg(long, env = "SEARCHKU_OPENAI_MAX_RETRIES", default_value_t = 5)]
    pub max_retries: usize,

    /// Max inputs per embedding request
    #[arg(long, env = "SEARCHKU_OPENAI_BATCH", default_value_t = 32)]
    pub batch_size: usize,
}

impl OpenAiArgs {
    /// Provider request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.openai_timeout_secs.max(1))
    }
}

/// Request defaults for the search endpoints.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Default number of results per page
    #[arg(long, env = "SEARCHKU_DEFAULT_LIMIT", default_value_t = 10)]
    pub default_limit: usize,

    /// Maximum number of results per page
    #[arg(long, env = "SEARCHKU_MAX_LIMIT", default_value_t = 100)]
    pub max_limit: usize,

    /// Default minimum cosine similarity
    #[arg(long, env = "SEARCHKU_DEFAULT_THRESHOLD", default_value_t = 0.1)]
    pub default_threshold: f64,

    /// Default number of similar pages returned
    #[arg(long, env = "SEARCHKU_SIMILAR_LIMIT", default_value_t = 5)]
    pub similar_limit: usize,

    /// Snippet length in characters
    #[arg(long, env = "SEARCHKU_SNIPPET_CHARS", default_value_t = 200)]
    pub snippet_chars: usize,
}

impl SearchArgs {
    /// Converts the parsed arguments into [`SearchSettings`], clamping nonsense values.
    pub fn build_settings(&self) -> SearchSettings {
        let max_limit = self.max_limit.max(1);
        SearchSettings {
            default_limit: self.default_limit.clamp(1, max_limit),
            max_limit,
            default_threshold: if self.default_threshold.is_finite() {
                self.default_threshold.clamp(0.0, 1.0)
            } else {
                SearchSettings::default().default_threshold
            },
            similar_limit: self.similar_limit.clamp(1, max_limit),
            snippet_chars: self.snippet_chars.max(16),
        }
    }
}

/// Translation model arguments.
#[derive(Args, Debug, Clone)]
pub struct TranslationArgs {
    /// Chat model used to translate pages (empty disables translation)
    #[arg(long, env = "SEARCHKU_TRANSLATION_MODEL", default_value = "gpt-4o-mini")]
    pub translation_model: String,

    /// Sampling temperature for translations
    #[arg(long, env = "SEARCHKU_TRANSLATION_TEMPERATURE", default_value_t = 0.1)]
    pub translation_temperature: f32,
}
