use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use searchku::{
    index_pending_pages, EmbeddingProvider, MemoryStore, PageStore, ProviderError,
    QueryEmbedding, SearchRequest, SearchService, SearchSettings, ServiceError,
};

/// Deterministic embedder: known texts map to fixed vectors, anything else
/// falls back to `default`.
struct TableEmbedder {
    model: String,
    vectors: HashMap<String, Vec<f32>>,
    default: Vec<f32>,
    calls: AtomicUsize,
}

impl TableEmbedder {
    fn new(model: &str, default: Vec<f32>) -> Self {
        Self {
            model: model.to_string(),
            vectors: HashMap::new(),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn embed(&self, text: &str) -> Result<QueryEmbedding, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let vector = self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.default.clone());
        Ok(QueryEmbedding {
            vector,
            model: self.model.clone(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

fn unit(cos: f32) -> Vec<f32> {
    vec![cos, (1.0 - cos * cos).sqrt()]
}

fn request(query: &str, threshold: f64, limit: i64, offset: i64) -> SearchRequest {
    SearchRequest {
        query: query.to_string(),
        limit: Some(limit),
        offset: Some(offset),
        similarity_threshold: Some(threshold),
        query_language: None,
    }
}

/// Three pages whose similarity to the query direction `[1, 0]` is 0.9, 0.5 and 0.05.
async fn three_page_store() -> (Arc<MemoryStore>, [i64; 3]) {
    let store = Arc::new(MemoryStore::new(2));
    let book = store
        .insert_book("Al-Arbain An-Nawawiyyah", Some("Imam An-Nawawi"))
        .await;
    let mut ids = [0i64; 3];
    for (slot, (number, text, cos)) in [
        (1, "إنما الأعمال بالنيات", 0.9f32),
        (2, "الدين النصيحة", 0.5),
        (3, "من حسن إسلام المرء تركه ما لا يعنيه", 0.05),
    ]
    .into_iter()
    .enumerate()
    {
        let page = store.insert_page(book.id, number, text).await.unwrap();
        store
            .store_embedding(page.id, &unit(cos), "test-embed")
            .await
            .unwrap();
        ids[slot] = page.id;
    }
    (store, ids)
}

fn service(store: Arc<MemoryStore>, embedder: Arc<TableEmbedder>) -> SearchService {
    SearchService::new(store, embedder, SearchSettings::default())
}

#[tokio::test(flavor = "current_thread")]
async fn threshold_filters_and_orders_results() {
    let (store, [a, b, _c]) = three_page_store().await;
    let embedder = Arc::new(TableEmbedder::new("test-embed", vec![1.0, 0.0]));
    let search = service(store, embedder);

    let response = search
        .multilingual_search(request("hadith about intention", 0.1, 10, 0))
        .await
        .expect("search succeeds");

    let ids: Vec<i64> = response.results.iter().map(|r| r.page_id).collect();
    assert_eq!(ids, vec![a, b]);
    assert_eq!(response.total_results, 2);
    assert!(!response.has_more);
    assert_eq!(response.query_embedding_model, "test-embed");
    assert!((response.results[0].similarity_score - 0.9).abs() < 1e-4);
    assert!((response.results[1].similarity_score - 0.5).abs() < 1e-4);
    assert_eq!(response.results[0].book_title, "Al-Arbain An-Nawawiyyah");
    assert_eq!(
        response.results[0].book_author.as_deref(),
        Some("Imam An-Nawawi")
    );
}

#[tokio::test(flavor = "current_thread")]
async fn zero_threshold_counts_every_indexed_page_of_matching_dimension() {
    let (store, _) = three_page_store().await;
    let book = store.insert_book("Riyad as-Salihin", None).await;
    let unindexed = store.insert_page(book.id, 1, "لم يفهرس بعد").await.unwrap();
    let wrong_dims = store.insert_page(book.id, 2, "بعد آخر").await.unwrap();
    store
        .store_embedding(wrong_dims.id, &[1.0, 0.0, 0.0], "other-model")
        .await
        .unwrap();

    let embedder = Arc::new(TableEmbedder::new("test-embed", vec![1.0, 0.0]));
    let search = service(Arc::clone(&store), embedder);
    let response = search
        .multilingual_search(request("niat", 0.0, 100, 0))
        .await
        .unwrap();

    assert_eq!(response.total_results, 3);
    assert!(response
        .results
        .iter()
        .all(|r| r.page_id != unindexed.id && r.page_id != wrong_dims.id));
}

#[tokio::test(flavor = "current_thread")]
async fn zero_threshold_keeps_pages_pointing_away_from_the_query() {
    let store = Arc::new(MemoryStore::new(2));
    let book = store.insert_book("Sahih Muslim", None).await;
    let mut ids = Vec::new();
    for (number, vector) in [
        (1, vec![-1.0f32, 0.0]),
        (2, vec![1.0, 0.0]),
        (3, vec![-0.6, 0.8]),
    ] {
        let page = store
            .insert_page(book.id, number, "حديث")
            .await
            .unwrap();
        store
            .store_embedding(page.id, &vector, "test-embed")
            .await
            .unwrap();
        ids.push(page.id);
    }
    let embedder = Arc::new(TableEmbedder::new("test-embed", vec![1.0, 0.0]));
    let search = service(store, embedder);

    let response = search
        .multilingual_search(request("niat", 0.0, 10, 0))
        .await
        .unwrap();
    assert_eq!(response.total_results, 3);
    let ranked: Vec<(i64, f64)> = response
        .results
        .iter()
        .map(|r| (r.page_id, r.similarity_score))
        .collect();
    assert_eq!(ranked, vec![(ids[1], 1.0), (ids[0], 0.0), (ids[2], 0.0)]);

    let above_zero = search
        .multilingual_search(request("niat", 0.01, 10, 0))
        .await
        .unwrap();
    assert_eq!(above_zero.total_results, 1);
}

#[tokio::test(flavor = "current_thread")]
async fn unsized_index_ranks_only_vectors_of_the_query_length() {
    let store = Arc::new(MemoryStore::unsized_index());
    let book = store.insert_book("Mixed", None).await;
    let short = store.insert_page(book.id, 1, "قصير").await.unwrap();
    let long = store.insert_page(book.id, 2, "طويل").await.unwrap();
    store
        .store_embedding(short.id, &[1.0, 0.0], "small")
        .await
        .unwrap();
    store
        .store_embedding(long.id, &[0.0, 1.0, 0.0], "large")
        .await
        .unwrap();

    let two = service(
        Arc::clone(&store),
        Arc::new(TableEmbedder::new("small", vec![1.0, 0.0])),
    );
    let response = two
        .multilingual_search(request("niat", 0.0, 10, 0))
        .await
        .expect("no fixed dimensionality to mismatch");
    assert_eq!(response.total_results, 1);
    assert_eq!(response.results[0].page_id, short.id);

    let three = service(
        Arc::clone(&store),
        Arc::new(TableEmbedder::new("large", vec![0.0, 1.0, 0.0])),
    );
    let response = three
        .multilingual_search(request("niat", 0.0, 10, 0))
        .await
        .expect("no fixed dimensionality to mismatch");
    assert_eq!(response.total_results, 1);
    assert_eq!(response.results[0].page_id, long.id);
    assert_eq!(response.results[0].similarity_score, 1.0);
}

#[tokio::test(flavor = "current_thread")]
async fn ties_break_on_ascending_page_id() {
    let store = Arc::new(MemoryStore::new(2));
    let book = store.insert_book("Bulugh al-Maram", None).await;
    let mut ids = Vec::new();
    for number in 1..=4 {
        let page = store
            .insert_page(book.id, number, "نص مكرر")
            .await
            .unwrap();
        store
            .store_embedding(page.id, &unit(0.7), "test-embed")
            .await
            .unwrap();
        ids.push(page.id);
    }
    let embedder = Arc::new(TableEmbedder::new("test-embed", vec![1.0, 0.0]));
    let search = service(store, embedder);

    let response = search
        .multilingual_search(request("tied", 0.1, 10, 0))
        .await
        .unwrap();
    let got: Vec<i64> = response.results.iter().map(|r| r.page_id).collect();
    assert_eq!(got, ids);
    assert!(response
        .results
        .windows(2)
        .all(|w| w[0].similarity_score >= w[1].similarity_score));
}

#[tokio::test(flavor = "current_thread")]
async fn pagination_reports_has_more_until_last_window() {
    let (store, [a, b, c]) = three_page_store().await;
    let embedder = Arc::new(TableEmbedder::new("test-embed", vec![1.0, 0.0]));
    let search = service(store, embedder);

    let first = search
        .multilingual_search(request("q", 0.0, 2, 0))
        .await
        .unwrap();
    assert_eq!(
        first.results.iter().map(|r| r.page_id).collect::<Vec<_>>(),
        vec![a, b]
    );
    assert_eq!(first.total_results, 3);
    assert!(first.has_more);

    let last = search
        .multilingual_search(request("q", 0.0, 2, 2))
        .await
        .unwrap();
    assert_eq!(
        last.results.iter().map(|r| r.page_id).collect::<Vec<_>>(),
        vec![c]
    );
    assert_eq!(last.total_results, 3);
    assert!(!last.has_more);

    let past_end = search
        .multilingual_search(request("q", 0.0, 2, 10))
        .await
        .unwrap();
    assert!(past_end.results.is_empty());
    assert_eq!(past_end.total_results, 3);
    assert!(!past_end.has_more);
}

#[tokio::test(flavor = "current_thread")]
async fn repeated_requests_are_identical_and_always_re_embed() {
    let (store, _) = three_page_store().await;
    let embedder = Arc::new(TableEmbedder::new("test-embed", vec![1.0, 0.0]));
    let search = service(store, Arc::clone(&embedder));

    let first = search
        .multilingual_search(request("hadis tentang niat", 0.1, 10, 0))
        .await
        .unwrap();
    let second = search
        .multilingual_search(request("hadis tentang niat", 0.1, 10, 0))
        .await
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn full_threshold_keeps_only_exact_direction() {
    let (store, [a, _, _]) = three_page_store().await;
    let page = store.page(a).await.unwrap().unwrap();
    let exact_vector = page.embedding_vector.expect("indexed");
    let embedder = Arc::new(
        TableEmbedder::new("test-embed", vec![1.0, 0.0]).with("exact", exact_vector),
    );
    let search = service(store, embedder);

    let none = search
        .multilingual_search(request("other", 1.0, 10, 0))
        .await
        .unwrap();
    assert!(none.results.is_empty());
    assert_eq!(none.total_results, 0);

    let hit = search
        .multilingual_search(request("exact", 1.0, 10, 0))
        .await
        .unwrap();
    assert_eq!(hit.results.len(), 1);
    assert_eq!(hit.results[0].page_id, a);
    assert_eq!(hit.results[0].similarity_score, 1.0);
}

#[tokio::test(flavor = "current_thread")]
async fn mismatched_query_dimensions_fail_without_results() {
    let store = Arc::new(MemoryStore::new(1536));
    let book = store.insert_book("Sahih", None).await;
    let page = store.insert_page(book.id, 1, "text").await.unwrap();
    store
        .store_embedding(page.id, &[0.01f32; 1536], "text-embedding-3-small")
        .await
        .unwrap();

    let embedder = Arc::new(TableEmbedder::new("small-768", vec![0.02; 768]));
    let search = SearchService::new(store, embedder, SearchSettings::default());
    let err = search
        .multilingual_search(request("hadith", 0.1, 10, 0))
        .await
        .expect_err("dimension mismatch");
    match err {
        ServiceError::DimensionMismatch { expected, actual } => {
            assert_eq!((expected, actual), (1536, 768));
        }
        other => panic!("expected dimension mismatch, got {other:?}"),
    }
}

#[tokio::test(flavor = "current_thread")]
async fn invalid_requests_never_reach_the_provider() {
    let (store, _) = three_page_store().await;
    let embedder = Arc::new(TableEmbedder::new("test-embed", vec![1.0, 0.0]));
    let search = service(store, Arc::clone(&embedder));

    for bad in [
        request("   ", 0.1, 10, 0),
        request("q", 0.1, 0, 0),
        request("q", 0.1, 10, -1),
        request("q", -0.1, 10, 0),
    ] {
        let err = search.multilingual_search(bad).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "current_thread")]
async fn query_language_is_detected_or_taken_from_hint() {
    let (store, _) = three_page_store().await;
    let embedder = Arc::new(TableEmbedder::new("test-embed", vec![1.0, 0.0]));
    let search = service(store, embedder);

    let detected = search
        .multilingual_search(request("hadis tentang niat", 0.1, 10, 0))
        .await
        .unwrap();
    assert_eq!(detected.query_language, searchku::Language::Indonesian);

    let mut hinted = request("hadis tentang niat", 0.1, 10, 0);
    hinted.query_language = Some(searchku::Language::Arabic);
    let hinted = search.multilingual_search(hinted).await.unwrap();
    assert_eq!(hinted.query_language, searchku::Language::Arabic);
}

#[tokio::test(flavor = "current_thread")]
async fn similar_pages_exclude_the_reference_page() {
    let (store, [a, b, c]) = three_page_store().await;
    let embedder = Arc::new(TableEmbedder::new("test-embed", vec![1.0, 0.0]));
    let search = service(Arc::clone(&store), embedder);

    let response = search.similar_pages(a, None).await.unwrap();
    let ids: Vec<i64> = response.results.iter().map(|r| r.page_id).collect();
    assert_eq!(ids, vec![b, c]);
    assert!(!ids.contains(&a));

    let book = store.insert_book("Unindexed", None).await;
    let bare = store.insert_page(book.id, 1, "no vector").await.unwrap();
    let empty = search.similar_pages(bare.id, None).await.unwrap();
    assert!(empty.results.is_empty());

    assert!(matches!(
        search.similar_pages(9_999, None).await,
        Err(ServiceError::PageNotFound(9_999))
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn indexer_makes_pages_search_eligible() {
    let store = Arc::new(MemoryStore::new(2));
    let book = store.insert_book("Adab al-Mufrad", None).await;
    for number in 1..=5 {
        store
            .insert_page(book.id, number, &format!("صفحة {number}"))
            .await
            .unwrap();
    }
    store.insert_page(book.id, 6, "  ").await.unwrap();
    let embedder = TableEmbedder::new("test-embed", vec![0.6, 0.8]);

    let report = index_pending_pages(store.as_ref(), &embedder, 2, None)
        .await
        .unwrap();
    assert_eq!(report.indexed, 5);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.batches, 3);
    let pending = store.pages_missing_embeddings(0, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].original_text, "  ");

    let limited = Arc::new(MemoryStore::new(2));
    let book = limited.insert_book("Limited", None).await;
    for number in 1..=5 {
        limited.insert_page(book.id, number, "text").await.unwrap();
    }
    let report = index_pending_pages(limited.as_ref(), &embedder, 2, Some(3))
        .await
        .unwrap();
    assert_eq!(report.indexed, 3);
    assert_eq!(limited.pages_missing_embeddings(0, 10).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "current_thread")]
async fn whitespace_only_pages_do_not_block_the_backfill() {
    let store = Arc::new(MemoryStore::new(2));
    let book = store.insert_book("Bulugh al-Maram", None).await;
    let tabs = store.insert_page(book.id, 1, "\t\n").await.unwrap();
    let first = store.insert_page(book.id, 2, "باب المياه").await.unwrap();
    let breaks = store.insert_page(book.id, 3, "\r\n  ").await.unwrap();
    let second = store.insert_page(book.id, 4, "باب الآنية").await.unwrap();
    let embedder = TableEmbedder::new("test-embed", vec![0.6, 0.8]);

    let report = index_pending_pages(store.as_ref(), &embedder, 2, None)
        .await
        .expect("blank pages are skipped");
    assert_eq!(report.indexed, 2);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.batches, 2);
    for id in [first.id, second.id] {
        assert!(store.page(id).await.unwrap().unwrap().is_indexed());
    }

    let rerun = index_pending_pages(store.as_ref(), &embedder, 2, None)
        .await
        .expect("rerun succeeds");
    assert_eq!(rerun.indexed, 0);
    assert_eq!(rerun.skipped, 2);
    assert_eq!(rerun.batches, 0);
    for id in [tabs.id, breaks.id] {
        assert!(!store.page(id).await.unwrap().unwrap().is_indexed());
    }
}

#[tokio::test(flavor = "current_thread")]
async fn indexer_rejects_vectors_that_do_not_fit_the_index() {
    let store = Arc::new(MemoryStore::new(3));
    let book = store.insert_book("Mismatch", None).await;
    store.insert_page(book.id, 1, "text").await.unwrap();
    let embedder = TableEmbedder::new("test-embed", vec![1.0, 0.0]);
    let err = index_pending_pages(store.as_ref(), &embedder, 4, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::DimensionMismatch { .. }));
}
