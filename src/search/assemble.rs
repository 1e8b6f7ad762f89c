//! Joins ranked page ids back to page text and book metadata.

use std::collections::HashMap;

use super::snippet::snippet;
use super::SearchResult;
use crate::error::{ServiceResult, StoreError};
use crate::models::Book;
use crate::search::ranker::RankedMatch;
use crate::store::PageStore;

/// Builds one [`SearchResult`] per ranked match, preserving order.
///
/// A page or book that cannot be loaded fails the whole assembly.
pub async fn assemble(
    store: &dyn PageStore,
    matches: &[RankedMatch],
    query: &str,
    snippet_chars: usize,
) -> ServiceResult<Vec<SearchResult>> {
    let mut books: HashMap<i64, Book> = HashMap::new();
    let mut results = Vec::with_capacity(matches.len());
    for ranked in matches {
        let page = store
            .page(ranked.page_id)
            .await?
            .ok_or(StoreError::MissingPage(ranked.page_id))?;
        if !books.contains_key(&page.book_id) {
            let book = store
                .book(page.book_id)
                .await?
                .ok_or(StoreError::MissingBook(page.book_id))?;
            books.insert(page.book_id, book);
        }
        let book = &books[&page.book_id];
        results.push(SearchResult {
            page_id: page.id,
            book_id: page.book_id,
            page_number: page.page_number,
            snippet: snippet(&page.original_text, query, snippet_chars),
            original_text: page.original_text,
            en_translation: page.en_translation,
            id_translation: page.id_translation,
            page_image_url: page.page_image_url,
            similarity_score: ranked.similarity,
            book_title: book.title.clone(),
            book_author: book.author.clone(),
        });
    }
    Ok(results)
}
