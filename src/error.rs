use thiserror::Error;

/// Classified failure for a single ingestion or enrichment operation.
///
/// Every variant is caught at the smallest scope that produced it (one
/// record, one fixture) and turned into a logged outcome; none of them
/// aborts an in-progress batch.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Non-success HTTP status or an undeserializable response body.
    #[error("provider request failed (status {status}): {message}")]
    Provider { status: u16, message: String },

    /// An otherwise-successful response was missing a field the record
    /// requires. Record-level, never fatal to the batch.
    #[error("record mapping failed: {0}")]
    Mapping(String),

    /// The store rejected a write or read.
    #[error("store operation failed: {0}")]
    Store(#[from] sqlx::Error),

    /// The generation service returned something that does not match the
    /// expected schema. Terminal for that invocation; nothing is stored.
    #[error("generation response did not match expected schema: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        IngestError::Provider {
            status: err.status().map(|s| s.as_u16()).unwrap_or(0),
            message: err.to_string(),
        }
    }
}
