//! Page/book storage backends consumed by the services.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::language::Language;
use crate::models::{Book, Page, PendingPage};
use crate::search::ranker::{NearestQuery, RankedWindow};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage collaborator behind search, indexing and translation.
#[async_trait]
pub trait PageStore: Send + Sync {
    /// Dimensionality of the stored page vectors, `None` when not yet fixed.
    async fn vector_dimensions(&self) -> Result<Option<usize>, StoreError>;

    /// Ranks indexed pages against `query` and returns the requested window.
    async fn nearest(&self, query: &NearestQuery<'_>) -> Result<RankedWindow, StoreError>;

    /// Loads a page by primary key.
    async fn page(&self, page_id: i64) -> Result<Option<Page>, StoreError>;

    /// Loads a book by primary key.
    async fn book(&self, book_id: i64) -> Result<Option<Book>, StoreError>;

    /// Stored embedding of a page, if it has one.
    async fn page_vector(&self, page_id: i64) -> Result<Option<Vec<f32>>, StoreError>;

    /// Pages whose original text contains `needle` (case-insensitive),
    /// ordered by page id, plus the total match count.
    async fn text_matches(
        &self,
        needle: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<i64>, usize), StoreError>;

    /// Up to `limit` pages without an embedding whose id is above `after_id`,
    /// by page id. Stores may leave out pages whose text is blank.
    async fn pages_missing_embeddings(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<PendingPage>, StoreError>;

    /// Records a page's embedding and the model that produced it.
    async fn store_embedding(
        &self,
        page_id: i64,
        vector: &[f32],
        model: &str,
    ) -> Result<(), StoreError>;

    /// Records a translation of a page; `language` must be English or Indonesian.
    async fn store_translation(
        &self,
        page_id: i64,
        language: Language,
        text: &str,
    ) -> Result<(), StoreError>;
}
