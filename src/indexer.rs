//! Backfills embeddings for pages that are not yet search-eligible.

use tracing::{debug, info, warn};

use crate::embedder::{clean_input, EmbeddingProvider};
use crate::error::{ProviderError, ServiceError, ServiceResult};
use crate::models::PendingPage;
use crate::search::ranker::ensure_dimensions;
use crate::store::PageStore;

/// Outcome of one backfill run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexReport {
    /// Pages embedded and stored.
    pub indexed: usize,
    /// Pages left unindexed because they have no text to embed.
    pub skipped: usize,
    /// Provider round trips made.
    pub batches: usize,
}

/// Embeds pending pages in batches of `batch_size` until none remain or
/// `max_pages` have been indexed.
///
/// Pending pages are walked once in id order, so a page that cannot be
/// embedded never blocks the pages after it. Blank pages are skipped; any
/// other failure stops the run and pages stored before it stay indexed.
pub async fn index_pending_pages(
    store: &dyn PageStore,
    embedder: &dyn EmbeddingProvider,
    batch_size: usize,
    max_pages: Option<usize>,
) -> ServiceResult<IndexReport> {
    if batch_size == 0 {
        return Err(ServiceError::invalid("batch size must be positive"));
    }
    let mut index_dims = store.vector_dimensions().await?;
    let mut report = IndexReport::default();
    let mut cursor = 0i64;
    loop {
        let remaining = max_pages.map_or(batch_size, |max| max.saturating_sub(report.indexed));
        if remaining == 0 {
            break;
        }
        let pending = store
            .pages_missing_embeddings(cursor, batch_size.min(remaining))
            .await?;
        let Some(last) = pending.last() else {
            break;
        };
        cursor = last.id;

        let (pages, blank): (Vec<PendingPage>, Vec<PendingPage>) = pending
            .into_iter()
            .partition(|page| !clean_input(&page.original_text).is_empty());
        for page in &blank {
            warn!(page_id = page.id, "skipping page without text");
        }
        report.skipped += blank.len();
        if pages.is_empty() {
            continue;
        }

        let texts: Vec<String> = pages
            .iter()
            .map(|page| page.original_text.clone())
            .collect();
        let vectors = embedder.embed_batch(&texts).await?;
        report.batches += 1;
        if vectors.len() != pages.len() {
            return Err(ProviderError::Empty("embedding for every page").into());
        }
        for (page, vector) in pages.iter().zip(&vectors) {
            ensure_dimensions(index_dims, vector.len())?;
            index_dims.get_or_insert(vector.len());
            store
                .store_embedding(page.id, vector, embedder.model_name())
                .await?;
            report.indexed += 1;
        }
        debug!(batch = report.batches, indexed = report.indexed, "stored embeddings");
    }
    info!(
        indexed = report.indexed,
        skipped = report.skipped,
        batches = report.batches,
        "embedding backfill finished"
    );
    Ok(report)
}
