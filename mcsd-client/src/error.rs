use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("resource gone (410): {0}")]
    Gone(String),

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{0} returned unexpected status {1}")]
    UnexpectedStatus(String, u16),

    #[error("search result exceeded the safety limit of {0} entries")]
    TooManyEntries(usize),

    #[error("failed to obtain bearer token: {0}")]
    TokenUnavailable(String),

    #[error("invalid response body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error(transparent)]
    Core(#[from] mcsd_core::CoreError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// §4.A: "a 410-Gone signal distinctly (string '410' or 'gone' in error
    /// message suffices for the caller to detect)".
    pub fn is_gone(&self) -> bool {
        match self {
            ClientError::Gone(_) => true,
            ClientError::UnexpectedStatus(_, status) => *status == 410,
            other => {
                let msg = other.to_string().to_ascii_lowercase();
                msg.contains("410") || msg.contains("gone")
            }
        }
    }
}
