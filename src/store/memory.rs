//! In-process store with exact ranking, used by tests and local experiments.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::PageStore;
use crate::error::StoreError;
use crate::language::Language;
use crate::models::{Book, Page, PendingPage};
use crate::search::ranker::{rank_exact, NearestQuery, RankedWindow};

#[derive(Default)]
struct Tables {
    books: BTreeMap<i64, Book>,
    pages: BTreeMap<i64, Page>,
    next_book_id: i64,
    next_page_id: i64,
}

/// Store holding books and pages in memory.
///
/// The index dimensionality is fixed at construction. Vectors of other
/// lengths can still be stored; they are simply never ranked, like rows that
/// slipped past a column constraint.
pub struct MemoryStore {
    dimensions: Option<usize>,
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store whose index expects `dimensions`-long vectors.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: Some(dimensions),
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Creates an empty store that accepts any query dimensionality.
    pub fn unsized_index() -> Self {
        Self {
            dimensions: None,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Adds a book and returns it with its assigned id.
    pub async fn insert_book(&self, title: &str, author: Option<&str>) -> Book {
        let mut tables = self.tables.write().await;
        tables.next_book_id += 1;
        let now = Utc::now();
        let book = Book {
            id: tables.next_book_id,
            title: title.to_string(),
            author: author.map(str::to_string),
            language: Language::Arabic.code().to_string(),
            cover_image_url: None,
            created_at: now,
            updated_at: now,
        };
        tables.books.insert(book.id, book.clone());
        book
    }

    /// Adds an unindexed page; `(book_id, page_number)` must be unique.
    pub async fn insert_page(
        &self,
        book_id: i64,
        page_number: i32,
        original_text: &str,
    ) -> Result<Page, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.books.contains_key(&book_id) {
            return Err(StoreError::MissingBook(book_id));
        }
        let duplicate = tables
            .pages
            .values()
            .any(|page| page.book_id == book_id && page.page_number == page_number);
        if duplicate {
            return Err(StoreError::Invalid(format!(
                "page {page_number} already exists in book {book_id}"
            )));
        }
        tables.next_page_id += 1;
        let now = Utc::now();
        let page = Page {
            id: tables.next_page_id,
            book_id,
            page_number,
            original_text: original_text.to_string(),
            embedding_vector: None,
            embedding_model: None,
            en_translation: None,
            id_translation: None,
            page_image_url: None,
            created_at: now,
            updated_at: now,
        };
        tables.pages.insert(page.id, page.clone());
        Ok(page)
    }

    /// Attaches a scanned image to a page.
    pub async fn set_page_image_url(&self, page_id: i64, url: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let page = tables
            .pages
            .get_mut(&page_id)
            .ok_or(StoreError::MissingPage(page_id))?;
        page.page_image_url = Some(url.to_string());
        page.updated_at = Utc::now();
        Ok(())
    }

        /// Deletes a book and, by cascade, its pages.
    pub async fn delete_book(&self, book_id: i64) -> bool {
        let mut tables = self.tables.write().await;
        let removed = tables.books.remove(&book_id).is_some();
        tables.pages.retain(|_, page| page.book_id != book_id);
        removed
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn vector_dimensions(&self) -> Result<Option<usize>, StoreError> {
        Ok(self.dimensions)
    }

    async fn nearest(&self, query: &NearestQuery<'_>) -> Result<RankedWindow, StoreError> {
        let tables = self.tables.read().await;
        let candidates = tables.pages.values().filter_map(|page| {
            page.embedding_vector
                .as_deref()
                .filter(|_| page.embedding_model.is_some())
                .filter(|vector| self.dimensions.map_or(true, |dims| vector.len() == dims))
                .map(|vector| (page.id, vector))
        });
        Ok(rank_exact(candidates, query))
    }

    async fn page(&self, page_id: i64) -> Result<Option<Page>, StoreError> {
        Ok(self.tables.read().await.pages.get(&page_id).cloned())
    }

    async fn book(&self, book_id: i64) -> Result<Option<Book>, StoreError> {
        Ok(self.tables.read().await.books.get(&book_id).cloned())
    }

    async fn page_vector(&self, page_id: i64) -> Result<Option<Vec<f32>>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .pages
            .get(&page_id)
            .and_then(|page| page.embedding_vector.clone()))
    }

    async fn text_matches(
        &self,
        needle: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<i64>, usize), StoreError> {
        let needle = needle.to_lowercase();
        let tables = self.tables.read().await;
        let hits: Vec<i64> = tables
            .pages
            .values()
            .filter(|page| page.original_text.to_lowercase().contains(&needle))
            .map(|page| page.id)
            .collect();
        let total = hits.len();
        Ok((hits.into_iter().skip(offset).take(limit).collect(), total))
    }

    async fn pages_missing_embeddings(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<PendingPage>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .pages
            .range(after_id.saturating_add(1)..)
            .map(|(_, page)| page)
            .filter(|page| page.embedding_vector.is_none())
            .take(limit)
            .map(|page| PendingPage {
                id: page.id,
                original_text: page.original_text.clone(),
            })
            .collect())
    }

    async fn store_embedding(
        &self,
        page_id: i64,
        vector: &[f32],
        model: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let page = tables
            .pages
            .get_mut(&page_id)
            .ok_or(StoreError::MissingPage(page_id))?;
        page.embedding_vector = Some(vector.to_vec());
        page.embedding_model = Some(model.to_string());
        page.updated_at = Utc::now();
        Ok(())
    }

    async fn store_translation(
        &self,
        page_id: i64,
        language: Language,
        text: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let page = tables
            .pages
            .get_mut(&page_id)
            .ok_or(StoreError::MissingPage(page_id))?;
        match language {
            Language::English => page.en_translation = Some(text.to_string()),
            Language::Indonesian => page.id_translation = Some(text.to_string()),
            other => {
                return Err(StoreError::Invalid(format!(
                    "no translation column for language {other}"
                )))
            }
        }
        page.updated_at = Utc::now();
        Ok(())
    }
}
