#![warn(missing_docs)]
//! Core library entry points for the searchku page search backend.

pub mod api;
pub mod embedder;
pub mod error;
pub mod indexer;
pub mod language;
pub mod models;
pub mod search;
pub mod settings;
pub mod store;
pub mod translator;
pub mod vector_store;

pub use api::{router, AppState};
pub use embedder::{EmbeddingProvider, OpenAiEmbedder, QueryEmbedding};
pub use error::{ProviderError, ServiceError, ServiceResult, StoreError};
pub use indexer::{index_pending_pages, IndexReport};
pub use language::{detect as detect_language, Language};
pub use models::{Book, Page, PendingPage};
pub use search::{SearchRequest, SearchResponse, SearchResult, SearchService};
pub use settings::{DatabaseArgs, OpenAiArgs, SearchArgs, SearchSettings, TranslationArgs};
pub use store::{MemoryStore, PageStore, PgStore};
pub use translator::{translate_page, OpenAiTranslator, PageTranslation, Translator};
pub use vector_store::TableName;
