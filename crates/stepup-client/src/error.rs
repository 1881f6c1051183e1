/// Errors surfaced by the verification client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx answer. `message` is the server's `error` field when present.
    #[error("{message}")]
    Rejected {
        status: u16,
        message: String,
        retry_after: Option<u64>,
    },
    #[error("operation already in flight")]
    InFlight,
    /// The server granted access that had already expired by the local clock.
    #[error("Sensitive data access expired before it could be used")]
    GrantExpired,
    #[error("token store error: {0}")]
    Store(#[from] std::io::Error),
}

impl ClientError {
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            Self::Rejected { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
