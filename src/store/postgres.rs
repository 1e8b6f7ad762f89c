//! pgvector-backed store over the `books` and `pages` tables.

use async_trait::async_trait;
use pgvector::Vector;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{debug, error, info};

use super::PageStore;
use crate::error::StoreError;
use crate::language::Language;
use crate::models::{Book, Page, PendingPage};
use crate::search::ranker::{NearestQuery, RankedMatch, RankedWindow};
use crate::vector_store::TableName;

/// Connection settings for [`PgStore`].
#[derive(Debug, Clone)]
pub struct PgStoreConfig {
    /// Postgres connection string (postgres://...).
    pub database_url: String,
    /// Schema holding both tables.
    pub schema: String,
    /// Book table name.
    pub books_table: String,
    /// Page table name.
    pub pages_table: String,
    /// Candidate list size for HNSW scans; the server default applies when `None`.
    pub ef_search: Option<u32>,
}

struct Statements {
    nearest: String,
    nearest_floor: String,
    nearest_count: String,
    page: String,
    book: String,
    page_vector: String,
    text_matches: String,
    text_count: String,
    pending: String,
    store_embedding: String,
    typmod: String,
    sample_dims: String,
}

impl Statements {
    fn new(books: &TableName, pages: &TableName) -> Self {
        let pages_q = pages.qualified();
        let books_q = books.qualified();
        let score = "GREATEST(0, 1 - (p.embedding_vector <=> $1))::float8";
        let ranked_filter = format!(
            "p.embedding_vector IS NOT NULL \
            AND p.embedding_model IS NOT NULL \
            AND vector_dims(p.embedding_vector) = $2 \
            AND {score} >= $3 \
            AND ($4::bigint IS NULL OR p.id <> $4::bigint)"
        );
        Self {
            nearest: format!(
                "SELECT p.id::bigint AS id, {score} AS similarity \
                FROM {pages_q} p \
                WHERE {ranked_filter} \
                ORDER BY p.embedding_vector <=> $1 ASC, p.id ASC \
                LIMIT $5 OFFSET $6"
            ),
            nearest_floor: format!(
                "SELECT p.id::bigint AS id, {score} AS similarity \
                FROM {pages_q} p \
                WHERE {ranked_filter} \
                ORDER BY similarity DESC, p.id ASC \
                LIMIT $5 OFFSET $6"
            ),
            nearest_count: format!(
                "SELECT COUNT(*) AS total FROM {pages_q} p WHERE {ranked_filter}"
            ),
            page: format!(
                "SELECT id::bigint AS id, book_id::bigint AS book_id, page_number, original_text, \
                    embedding_vector, embedding_model, en_translation, id_translation, \
                    page_image_url, created_at, updated_at \
                FROM {pages_q} WHERE id = $1::bigint"
            ),
            book: format!(
                "SELECT id::bigint AS id, title, author, language, cover_image_url, created_at, updated_at \
                FROM {books_q} WHERE id = $1::bigint"
            ),
            page_vector: format!(
                "SELECT embedding_vector FROM {pages_q} WHERE id = $1::bigint"
            ),
            text_matches: format!(
                "SELECT id::bigint AS id FROM {pages_q} \
                WHERE original_text ILIKE $1 ESCAPE '\\' \
                ORDER BY id ASC LIMIT $2 OFFSET $3"
            ),
            text_count: format!(
                "SELECT COUNT(*) AS total FROM {pages_q} WHERE original_text ILIKE $1 ESCAPE '\\'"
            ),
            pending: format!(
                "SELECT id::bigint AS id, original_text FROM {pages_q} \
                WHERE id > $1::bigint AND embedding_vector IS NULL AND original_text ~ '\\S' \
                ORDER BY id ASC LIMIT $2"
            ),
            store_embedding: format!(
                "UPDATE {pages_q} SET embedding_vector = $2, embedding_model = $3, updated_at = now() \
                WHERE id = $1::bigint"
            ),
            typmod: "SELECT a.atttypmod FROM pg_attribute a \
                WHERE a.attrelid = $1::text::regclass AND a.attname = 'embedding_vector' \
                AND NOT a.attisdropped"
                .to_string(),
            sample_dims: format!(
                "SELECT vector_dims(embedding_vector) AS dims FROM {pages_q} \
                WHERE embedding_vector IS NOT NULL ORDER BY id ASC LIMIT 1"
            ),
        }
    }
}

/// Page store backed by Postgres with the `vector` extension.
pub struct PgStore {
    client: Client,
    books: TableName,
    pages: TableName,
    sql: Statements,
}

impl PgStore {
    /// Connects and applies session settings.
    pub async fn connect(config: &PgStoreConfig) -> Result<Self, StoreError> {
        let books = TableName::new(config.schema.clone(), config.books_table.clone())?;
        let pages = TableName::new(config.schema.clone(), config.pages_table.clone())?;
        let (client, connection) = tokio_postgres::connect(&config.database_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                error!(%err, "postgres connection error");
            }
        });
        if let Some(ef_search) = config.ef_search {
            client
                .batch_execute(&format!("SET hnsw.ef_search = {}", ef_search.max(1)))
                .await?;
            debug!(ef_search, "configured hnsw candidate list size");
        }
        let sql = Statements::new(&books, &pages);
        Ok(Self {
            client,
            books,
            pages,
            sql,
        })
    }

    /// Creates the extension, tables and HNSW index when they are missing.
    pub async fn ensure_schema(&self, dims: usize) -> Result<(), StoreError> {
        if dims == 0 {
            return Err(StoreError::Invalid(
                "embedding dimension must be positive".into(),
            ));
        }
        let books = self.books.qualified();
        let pages = self.pages.qualified();
        let statements = [
            "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
            format!(
                "CREATE TABLE IF NOT EXISTS {books} (
                    id BIGSERIAL PRIMARY KEY,
                    title VARCHAR(500) NOT NULL,
                    author VARCHAR(300),
                    language VARCHAR(10) NOT NULL DEFAULT 'ar',
                    cover_image_url TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
                )"
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {pages} (
                    id BIGSERIAL PRIMARY KEY,
                    book_id BIGINT NOT NULL REFERENCES {books} (id) ON DELETE CASCADE,
                    page_number INTEGER NOT NULL,
                    original_text TEXT NOT NULL,
                    embedding_vector VECTOR({dims}),
                    embedding_model VARCHAR(100),
                    en_translation TEXT,
                    id_translation TEXT,
                    page_image_url VARCHAR(500),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    CONSTRAINT {unique} UNIQUE (book_id, page_number)
                )",
                unique = self.pages.constraint_name("book_page")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {pages} (book_id)",
                self.pages.index_name("book_id")
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {} ON {pages} USING hnsw (embedding_vector vector_cosine_ops)",
                self.pages.index_name("embedding_hnsw")
            ),
        ];
        for statement in &statements {
            self.client.batch_execute(statement).await?;
        }
        info!(schema = self.pages.schema(), dims, "page schema ready");
        Ok(())
    }
}

#[async_trait]
impl PageStore for PgStore {
    async fn vector_dimensions(&self) -> Result<Option<usize>, StoreError> {
        let qualified = self.pages.qualified();
        let declared = self
            .client
            .query_opt(self.sql.typmod.as_str(), &[&qualified])
            .await?
            .map(|row| row.get::<_, i32>("atttypmod"))
            .filter(|typmod| *typmod > 0);
        if let Some(dims) = declared {
            return Ok(Some(dims as usize));
        }
        let sampled = self
            .client
            .query_opt(self.sql.sample_dims.as_str(), &[])
            .await?
            .map(|row| row.get::<_, i32>("dims"));
        Ok(sampled.map(|dims| dims as usize))
    }

    async fn nearest(&self, query: &NearestQuery<'_>) -> Result<RankedWindow, StoreError> {
        let vector = Vector::from(query.vector.to_vec());
        let dims = as_i32(query.vector.len(), "vector dimension")?;
        let limit = as_i64(query.limit, "limit")?;
        let offset = as_i64(query.offset, "offset")?;
        let threshold = query.threshold;
        let exclude = query.exclude_page;

        let total_row = self
            .client
            .query_one(
                self.sql.nearest_count.as_str(),
                &[&vector, &dims, &threshold, &exclude],
            )
            .await?;
        let total: i64 = total_row.get("total");
        // Scores floored at 0 tie regardless of distance; only a threshold
        // above 0 keeps index order equal to score order.
        let statement = if threshold > 0.0 {
            self.sql.nearest.as_str()
        } else {
            self.sql.nearest_floor.as_str()
        };
        let rows = self
            .client
            .query(
                statement,
                &[&vector, &dims, &threshold, &exclude, &limit, &offset],
            )
            .await?;
        let matches = rows
            .iter()
            .map(|row| RankedMatch {
                page_id: row.get("id"),
                similarity: row.get("similarity"),
            })
            .collect();
        Ok(RankedWindow {
            matches,
            total: total.max(0) as usize,
        })
    }

    async fn page(&self, page_id: i64) -> Result<Option<Page>, StoreError> {
        let row = self
            .client
            .query_opt(self.sql.page.as_str(), &[&page_id])
            .await?;
        Ok(row.as_ref().map(page_from_row))
    }

    async fn book(&self, book_id: i64) -> Result<Option<Book>, StoreError> {
        let row = self
            .client
            .query_opt(self.sql.book.as_str(), &[&book_id])
            .await?;
        Ok(row.as_ref().map(book_from_row))
    }

    async fn page_vector(&self, page_id: i64) -> Result<Option<Vec<f32>>, StoreError> {
        let row = self
            .client
            .query_opt(self.sql.page_vector.as_str(), &[&page_id])
            .await?;
        Ok(row
            .and_then(|row| row.get::<_, Option<Vector>>("embedding_vector"))
            .map(|vector| vector.to_vec()))
    }

    async fn text_matches(
        &self,
        needle: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<i64>, usize), StoreError> {
        let pattern = format!("%{}%", escape_like(needle));
        let limit = as_i64(limit, "limit")?;
        let offset = as_i64(offset, "offset")?;
        let total: i64 = self
            .client
            .query_one(self.sql.text_count.as_str(), &[&pattern])
            .await?
            .get("total");
        let ids = self
            .client
            .query(self.sql.text_matches.as_str(), &[&pattern, &limit, &offset])
            .await?
            .iter()
            .map(|row| row.get::<_, i64>("id"))
            .collect();
        Ok((ids, total.max(0) as usize))
    }

    async fn pages_missing_embeddings(
        &self,
        after_id: i64,
        limit: usize,
    ) -> Result<Vec<PendingPage>, StoreError> {
        let limit = as_i64(limit, "limit")?;
        let rows = self
            .client
            .query(self.sql.pending.as_str(), &[&after_id, &limit])
            .await?;
        Ok(rows
            .iter()
            .map(|row| PendingPage {
                id: row.get("id"),
                original_text: row.get("original_text"),
            })
            .collect())
    }

    async fn store_embedding(
        &self,
        page_id: i64,
        vector: &[f32],
        model: &str,
    ) -> Result<(), StoreError> {
        let vector = Vector::from(vector.to_vec());
        let updated = self
            .client
            .execute(self.sql.store_embedding.as_str(), &[&page_id, &vector, &model])
            .await?;
        if updated == 0 {
            return Err(StoreError::MissingPage(page_id));
        }
        Ok(())
    }

    async fn store_translation(
        &self,
        page_id: i64,
        language: Language,
        text: &str,
    ) -> Result<(), StoreError> {
        let column = match language {
            Language::English => "en_translation",
            Language::Indonesian => "id_translation",
            other => {
                return Err(StoreError::Invalid(format!(
                    "no translation column for language {other}"
                )))
            }
        };
        let sql = format!(
            "UPDATE {} SET {column} = $2, updated_at = now() WHERE id = $1::bigint",
            self.pages.qualified()
        );
        let updated = self.client.execute(sql.as_str(), &[&page_id, &text]).await?;
        if updated == 0 {
            return Err(StoreError::MissingPage(page_id));
        }
        Ok(())
    }
}

fn page_from_row(row: &Row) -> Page {
    Page {
        id: row.get("id"),
        book_id: row.get("book_id"),
        page_number: row.get("page_number"),
        original_text: row.get("original_text"),
        embedding_vector: row
            .get::<_, Option<Vector>>("embedding_vector")
            .map(|vector| vector.to_vec()),
        embedding_model: row.get("embedding_model"),
        en_translation: row.get("en_translation"),
        id_translation: row.get("id_translation"),
        page_image_url: row.get("page_image_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn book_from_row(row: &Row) -> Book {
    Book {
        id: row.get("id"),
        title: row.get("title"),
        author: row.get("author"),
        language: row.get("language"),
        cover_image_url: row.get("cover_image_url"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Escapes `%`, `_` and the escape character itself for an `ILIKE ... ESCAPE '\'` pattern.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn as_i64(value: usize, field: &str) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Invalid(format!("{field} value {value} exceeds i64 range")))
}

fn as_i32(value: usize, field: &str) -> Result<i32, StoreError> {
    i32::try_from(value)
        .map_err(|_| StoreError::Invalid(format!("{field} value {value} exceeds i32 range")))
}
