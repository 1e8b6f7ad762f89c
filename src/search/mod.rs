//! Multilingual semantic search over indexed book pages.
//!
//! A request flows through four stages: the query language is resolved, the
//! query is embedded by the injected provider, pages are ranked by cosine
//! similarity above a threshold, and the ranked window is joined back to page
//! and book records. Every stage failure aborts the request.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::embedder::{clean_input, EmbeddingProvider};
use crate::error::{ServiceError, ServiceResult};
use crate::language::{self, Language};
use crate::settings::SearchSettings;
use crate::store::PageStore;

pub mod assemble;
pub mod ranker;
pub mod snippet;

use ranker::{ensure_dimensions, NearestQuery, RankedMatch};

/// Score reported for lexical matches, which carry no similarity.
pub const TEXT_MATCH_SCORE: f64 = 0.5;

/// Model label reported by the lexical fallback.
pub const TEXT_MATCH_MODEL: &str = "text-match";

/// Search request as accepted by the HTTP API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query; required, non-empty after trimming.
    pub query: String,
    /// Window size; defaults to the configured limit.
    #[serde(default)]
    pub limit: Option<i64>,
    /// Number of results to skip; defaults to 0.
    #[serde(default)]
    pub offset: Option<i64>,
    /// Minimum similarity in `[0, 1]`; defaults to the configured threshold.
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
    /// Optional language hint.
    #[serde(default)]
    pub query_language: Option<Language>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Page primary key.
    pub page_id: i64,
    /// Owning book.
    pub book_id: i64,
    /// Page number within the book.
    pub page_number: i32,
    /// Full source text of the page.
    pub original_text: String,
    /// English translation, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub en_translation: Option<String>,
    /// Indonesian translation, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_translation: Option<String>,
    /// Scanned page image, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_image_url: Option<String>,
    /// `1 - cosine_distance` to the query, floored at 0.
    pub similarity_score: f64,
    /// Excerpt around the best textual match.
    pub snippet: String,
    /// Title of the owning book.
    pub book_title: String,
    /// Author of the owning book.
    pub book_author: Option<String>,
}

/// Paginated search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Hits inside the requested window, best first.
    pub results: Vec<SearchResult>,
    /// Size of the whole filtered result set.
    pub total_results: usize,
    /// Whether results exist past this window.
    pub has_more: bool,
    /// Model used to embed the query.
    pub query_embedding_model: String,
    /// Echo of the trimmed query.
    pub query: String,
    /// Language the query was treated as.
    pub query_language: Language,
    /// Applied window size.
    pub limit: usize,
    /// Applied offset.
    pub offset: usize,
}

/// Request after defaults and validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    /// Trimmed query text.
    pub query: String,
    /// Window size.
    pub limit: usize,
    /// Offset.
    pub offset: usize,
    /// Similarity threshold.
    pub threshold: f64,
}

impl SearchRequest {
    /// Applies defaults and rejects out-of-range values before any external call.
    pub fn validate(&self, settings: &SearchSettings) -> ServiceResult<ValidatedRequest> {
        let query = self.query.trim();
        if query.is_empty() {
            return Err(ServiceError::invalid("query text must not be empty"));
        }
        let limit = validate_limit(self.limit, settings.default_limit, settings.max_limit)?;
        let offset = match self.offset {
            None => 0,
            Some(value) if value >= 0 => value as usize,
            Some(value) => {
                return Err(ServiceError::invalid(format!(
                    "offset must be >= 0, got {value}"
                )))
            }
        };
        let threshold = validate_threshold(self.similarity_threshold, settings.default_threshold)?;
        Ok(ValidatedRequest {
            query: query.to_string(),
            limit,
            offset,
            threshold,
        })
    }
}

fn validate_limit(limit: Option<i64>, default: usize, max: usize) -> ServiceResult<usize> {
    match limit {
        None => Ok(default),
        Some(value) if value >= 1 && value as u64 <= max as u64 => Ok(value as usize),
        Some(value) => Err(ServiceError::invalid(format!(
            "limit must be between 1 and {max}, got {value}"
        ))),
    }
}

fn validate_threshold(threshold: Option<f64>, default: f64) -> ServiceResult<f64> {
    match threshold {
        None => Ok(default),
        Some(value) if value.is_finite() && (0.0..=1.0).contains(&value) => Ok(value),
        Some(value) => Err(ServiceError::invalid(format!(
            "similarity_threshold must be within [0, 1], got {value}"
        ))),
    }
}

/// Stateless search pipeline over injected collaborators.
#[derive(Clone)]
pub struct SearchService {
    store: Arc<dyn PageStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    settings: SearchSettings,
}

impl SearchService {
    /// Wires the pipeline to a store and an embedding provider.
    pub fn new(
        store: Arc<dyn PageStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        settings: SearchSettings,
    ) -> Self {
        Self {
            store,
            embedder,
            settings,
        }
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn PageStore> {
        &self.store
    }

    /// Embeds the query and ranks pages by similarity, across languages.
    pub async fn multilingual_search(&self, request: SearchRequest) -> ServiceResult<SearchResponse> {
        let validated = request.validate(&self.settings)?;
        let query_language = language::resolve(request.query_language, &validated.query);
        info!(
            query_len = validated.query.chars().count(),
            language = %query_language,
            limit = validated.limit,
            offset = validated.offset,
            threshold = validated.threshold,
            "semantic search"
        );

        let embedding = self.embedder.embed(&clean_input(&validated.query)).await?;
        let index_dims = self.store.vector_dimensions().await?;
        ensure_dimensions(index_dims, embedding.vector.len())?;

        let window = self
            .store
            .nearest(&NearestQuery {
                vector: &embedding.vector,
                threshold: validated.threshold,
                limit: validated.limit,
                offset: validated.offset,
                exclude_page: None,
            })
            .await?;
        debug!(
            returned = window.matches.len(),
            total = window.total,
            "ranked pages"
        );
        let has_more = window.has_more(validated.offset);
        let results = assemble::assemble(
            self.store.as_ref(),
            &window.matches,
            &validated.query,
            self.settings.snippet_chars,
        )
        .await?;

        Ok(SearchResponse {
            results,
            total_results: window.total,
            has_more,
            query_embedding_model: embedding.model,
            query: validated.query,
            query_language,
            limit: validated.limit,
            offset: validated.offset,
        })
    }

    /// Same pipeline as [`Self::multilingual_search`], ignoring the language hint.
    pub async fn semantic_search(&self, mut request: SearchRequest) -> ServiceResult<SearchResponse> {
        request.query_language = None;
        self.multilingual_search(request).await
    }

    /// Case-insensitive substring search over the original text.
    pub async fn text_search(&self, request: SearchRequest) -> ServiceResult<SearchResponse> {
        let validated = request.validate(&self.settings)?;
        let query_language = language::resolve(request.query_language, &validated.query);
        info!(
            query_len = validated.query.chars().count(),
            limit = validated.limit,
            offset = validated.offset,
            "text search"
        );
        let (ids, total) = self
            .store
            .text_matches(&validated.query, validated.limit, validated.offset)
            .await?;
        let matches: Vec<RankedMatch> = ids
            .into_iter()
            .map(|page_id| RankedMatch {
                page_id,
                similarity: TEXT_MATCH_SCORE,
            })
            .collect();
        let results = assemble::assemble(
            self.store.as_ref(),
            &matches,
            &validated.query,
            self.settings.snippet_chars,
        )
        .await?;
        Ok(SearchResponse {
            has_more: validated.offset + results.len() < total,
            results,
            total_results: total,
            query_embedding_model: TEXT_MATCH_MODEL.to_string(),
            query: validated.query,
            query_language,
            limit: validated.limit,
            offset: validated.offset,
        })
    }

    /// Pages closest to an existing page's stored vector, excluding the page itself.
    ///
    /// A page without an embedding yields an empty response.
    pub async fn similar_pages(
        &self,
        page_id: i64,
        limit: Option<i64>,
    ) -> ServiceResult<SearchResponse> {
        let limit = validate_limit(limit, self.settings.similar_limit, self.settings.max_limit)?;
        let page = self
            .store
            .page(page_id)
            .await?
            .ok_or(ServiceError::PageNotFound(page_id))?;
        let query = format!("Similar to page {page_id}");
        let mut response = SearchResponse {
            results: Vec::new(),
            total_results: 0,
            has_more: false,
            query_embedding_model: page.embedding_model.clone().unwrap_or_default(),
            query,
            query_language: Language::Auto,
            limit,
            offset: 0,
        };
        let Some(vector) = self.store.page_vector(page_id).await? else {
            debug!(page_id, "reference page has no embedding");
            return Ok(response);
        };
        ensure_dimensions(self.store.vector_dimensions().await?, vector.len())?;
        let window = self
            .store
            .nearest(&NearestQuery {
                vector: &vector,
                threshold: 0.0,
                limit,
                offset: 0,
                exclude_page: Some(page_id),
            })
            .await?;
        response.has_more = window.has_more(0);
        response.total_results = window.total;
        response.results = assemble::assemble(
            self.store.as_ref(),
            &window.matches,
            "",
            self.settings.snippet_chars.min(150),
        )
        .await?;
        Ok(response)
    }
}
