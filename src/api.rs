//! HTTP surface for search and translation.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::ServiceError;
use crate::language::Language;
use crate::search::{SearchRequest, SearchResponse, SearchService};
use crate::store::PageStore;
use crate::translator::{translate_page, Translator};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// Search pipeline.
    pub search: SearchService,
    /// Translation provider; translation requests fail when absent.
    pub translator: Option<Arc<dyn Translator>>,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/search/health", get(search_health))
        .route("/api/search/multilingual", post(multilingual_handler))
        .route("/api/search/semantic", post(semantic_handler))
        .route("/api/search/text", post(text_handler))
        .route("/api/search/similar/{page_id}", get(similar_handler))
        .route("/api/translate", post(translate_handler))
        .route("/api/translate/{page_id}", get(page_translations_handler))
        .with_state(state)
}

/// JSON error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error class.
    pub kind: String,
    /// Human-readable description.
    pub message: String,
}

/// Service error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl ApiError {
    /// Status code for the wrapped error.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::PageNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Provider(_) => StatusCode::BAD_GATEWAY,
            ServiceError::DimensionMismatch { .. } | ServiceError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.0.kind(), err = %self.0, "request failed");
        } else {
            warn!(kind = self.0.kind(), err = %self.0, "request rejected");
        }
        let body = ErrorBody {
            kind: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn search_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "search" }))
}

async fn multilingual_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    Ok(Json(state.search.multilingual_search(request).await?))
}

async fn semantic_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    Ok(Json(state.search.semantic_search(request).await?))
}

async fn text_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    Ok(Json(state.search.text_search(request).await?))
}

#[derive(Debug, Default, Deserialize)]
struct SimilarParams {
    #[serde(default)]
    limit: Option<i64>,
}

async fn similar_handler(
    State(state): State<AppState>,
    Path(page_id): Path<i64>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    Ok(Json(state.search.similar_pages(page_id, params.limit).await?))
}

/// Body of a translation request.
#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    /// Page to translate.
    pub page_id: i64,
    /// `en` or `id`.
    pub target_language: Language,
    /// Translate the scanned page image when the page has one.
    #[serde(default)]
    pub use_image: bool,
}

/// Body of a translation response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateResponse {
    /// Translated page.
    pub page_id: i64,
    /// Source text of the page.
    pub original_text: String,
    /// Language translated into.
    pub target_language: Language,
    /// The stored translation.
    pub translated_text: String,
    /// Whether the page image was translated instead of its text.
    pub used_image: bool,
}

/// Translations currently stored for a page.
#[derive(Debug, Serialize, Deserialize)]
pub struct PageTranslations {
    /// Page primary key.
    pub page_id: i64,
    /// Source text of the page.
    pub original_text: String,
    /// English translation, when present.
    pub en_translation: Option<String>,
    /// Indonesian translation, when present.
    pub id_translation: Option<String>,
}

async fn translate_handler(
    State(state): State<AppState>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let translator = state
        .translator
        .as_ref()
        .ok_or_else(|| ServiceError::invalid("translation is not configured"))?;
    let translation = translate_page(
        state.search.store().as_ref(),
        translator.as_ref(),
        request.page_id,
        request.target_language,
        request.use_image,
    )
    .await?;
    Ok(Json(TranslateResponse {
        page_id: translation.page.id,
        original_text: translation.page.original_text,
        target_language: request.target_language,
        translated_text: translation.translated_text,
        used_image: translation.used_image,
    }))
}

async fn page_translations_handler(
    State(state): State<AppState>,
    Path(page_id): Path<i64>,
) -> Result<Json<PageTranslations>, ApiError> {
    let page = state
        .search
        .store()
        .page(page_id)
        .await
        .map_err(ServiceError::from)?
        .ok_or(ServiceError::PageNotFound(page_id))?;
    Ok(Json(PageTranslations {
        page_id: page.id,
        original_text: page.original_text,
        en_translation: page.en_translation,
        id_translation: page.id_translation,
    }))
}
