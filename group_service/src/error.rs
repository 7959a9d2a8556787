#[derive(Debug, thiserror::Error)]
pub enum GroupServiceError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("An unknown error occurred: {0}")]
    Other(anyhow::Error),
}

impl GroupServiceError {
    /// Lookup misses are reported separately so callers can treat them as
    /// "already absent".
    pub fn is_not_found(&self) -> bool {
        matches!(self, GroupServiceError::NotFound(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("No account configured for the session")]
    MissingAccount,
    #[error("Session rejected: {0}")]
    Rejected(String),
}
