//! Book and page records shared by the stores and the services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A digitized book; the owner of its pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Primary key.
    pub id: i64,
    /// Book title.
    pub title: String,
    /// Author, when known.
    pub author: Option<String>,
    /// Language tag of the source text (usually `ar`).
    pub language: String,
    /// Public URL of the cover image.
    pub cover_image_url: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A single page of a book together with its embedding and translations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Primary key.
    pub id: i64,
    /// Owning book.
    pub book_id: i64,
    /// Page number, unique within the book.
    pub page_number: i32,
    /// Source text as digitized.
    pub original_text: String,
    /// Embedding of `original_text`; absent until the page is indexed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_vector: Option<Vec<f32>>,
    /// Name of the model that produced `embedding_vector`.
    pub embedding_model: Option<String>,
    /// English translation, filled on demand.
    pub en_translation: Option<String>,
    /// Indonesian translation, filled on demand.
    pub id_translation: Option<String>,
    /// Public URL of the scanned page image.
    pub page_image_url: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Page {
    /// Whether the page has completed embedding and can appear in similarity search.
    pub fn is_indexed(&self) -> bool {
        self.embedding_model.is_some() && self.embedding_vector.is_some()
    }
}

/// A page waiting for its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingPage {
    /// Page primary key.
    pub id: i64,
    /// Text to embed.
    pub original_text: String,
}
