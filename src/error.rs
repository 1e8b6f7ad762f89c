//! Error taxonomy shared by the search, indexing and translation services.

use thiserror::Error;

/// Failures surfaced by the embedding and translation providers.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Transport-level failure, including timeouts.
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {body}")]
    Status {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Response body, kept for diagnostics.
        body: String,
    },
    /// The provider returned a vector of an unexpected length.
    #[error("provider returned a {actual}-dimensional vector, expected {expected}")]
    Dimensions {
        /// Configured dimensionality.
        expected: usize,
        /// Length of the returned vector.
        actual: usize,
    },
    /// The provider answered successfully but without usable content.
    #[error("provider returned no {0}")]
    Empty(&'static str),
    /// Input rejected before any network call.
    #[error("invalid provider input: {0}")]
    Input(String),
}

impl ProviderError {
    /// Whether the caller may reasonably retry the same call later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(err) => {
                err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
            }
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Failures raised by a page/book store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Postgres query or connection failure.
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
    /// A ranked page disappeared before it could be assembled.
    #[error("page {0} is missing from the store")]
    MissingPage(i64),
    /// A page refers to a book that does not exist.
    #[error("book {0} is missing from the store")]
    MissingBook(i64),
    /// A stored value could not be interpreted.
    #[error("invalid stored value: {0}")]
    Invalid(String),
}

/// Request-level failure reported by the services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The request was rejected before any external call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// The embedding or translation provider failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The query vector does not match the dimensionality of the page index.
    #[error("query vector has {actual} dimensions but the page index stores {expected}")]
    DimensionMismatch {
        /// Dimensionality of the stored page vectors.
        expected: usize,
        /// Dimensionality of the query vector.
        actual: usize,
    },
    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The referenced page does not exist.
    #[error("page {0} not found")]
    PageNotFound(i64),
}

impl ServiceError {
    /// Shorthand for [`ServiceError::InvalidRequest`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Stable machine-readable label for the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Provider(_) => "provider_error",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::Store(_) => "store_error",
            Self::PageNotFound(_) => "page_not_found",
        }
    }
}

/// Result alias used across the service layer.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;
