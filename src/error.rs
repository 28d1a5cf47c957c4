use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure the core can surface to a caller. All variants are
/// recoverable except that a chain change (not an error) forces a full
/// restart of the client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("no signing agent is reachable; start your wallet bridge and try again")]
    AgentUnavailable,

    #[error("wallet connection rejected: {0}")]
    ConnectionRejected(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("submission rejected by the signing agent: {0}")]
    SubmissionRejected(String),

    #[error("transaction failed: {0}")]
    ConfirmationFailed(String),

    #[error("state sync failed: {0}")]
    SyncFailed(#[source] Box<Error>),

    #[error("invalid color '{0}': expected #RRGGBB")]
    InvalidColorFormat(String),

    #[error("wallet bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("wallet bridge returned an unusable response: {0}")]
    Bridge(String),

    #[error("session store error: {0}")]
    Store(String),
}

impl Error {
    pub fn sync(cause: Error) -> Self {
        Error::SyncFailed(Box::new(cause))
    }
}
