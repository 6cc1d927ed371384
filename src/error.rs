use thiserror::Error;

/// Network or status failure while retrieving a document. Always recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("could not decode body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        if err.is_timeout() {
            RetrievalError::Timeout { url, secs: 0 }
        } else if let Some(status) = err.status() {
            RetrievalError::Status {
                url,
                status: status.as_u16(),
            }
        } else if err.is_decode() {
            RetrievalError::Decode(err.to_string())
        } else {
            RetrievalError::Transport(err.to_string())
        }
    }
}

/// Markup or payload did not have the shape an adapter expects.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFault {
    #[error("expected structure not found: {0}")]
    MissingStructure(&'static str),

    #[error("invalid JSON: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ParseFault {
    fn from(err: serde_json::Error) -> Self {
        ParseFault::Json(err.to_string())
    }
}

/// Anything that can go wrong inside an adapter. Never crosses the adapter boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Parse(#[from] ParseFault),
}
