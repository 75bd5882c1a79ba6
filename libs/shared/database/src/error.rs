use thiserror::Error;

/// Failure reported by a persistence backend.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication error: {0}")]
    Unauthorized(String),

    #[error("Store rejected request: {0}")]
    Rejected(String),

    #[error("Malformed store response: {0}")]
    Decode(String),
}

impl DatabaseError {
    /// Transient failures where retrying the whole operation is safe.
    pub fn is_transient(&self) -> bool {
        matches!(self, DatabaseError::Unavailable(_))
    }
}

impl From<reqwest::Error> for DatabaseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DatabaseError::Decode(err.to_string())
        } else {
            DatabaseError::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DatabaseError {
    fn from(err: serde_json::Error) -> Self {
        DatabaseError::Decode(err.to_string())
    }
}
