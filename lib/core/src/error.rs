use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Query dimension mismatch: catalog embeddings have {expected} components, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Query vector has zero norm and cannot be normalized")]
    ZeroNormQuery,

    #[error("Invalid query vector: {0}")]
    InvalidQuery(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Errors caused by the query itself rather than by the service.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Error::DimensionMismatch { .. } | Error::ZeroNormQuery | Error::InvalidQuery(_)
        )
    }
}
