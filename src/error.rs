use thiserror::Error;

/// Failures of a single network call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status} for url {url}")]
    Status { status: u16, url: String },

    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: wreq::Error,
    },

    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("exceeded {max} redirects starting from {url}")]
    TooManyRedirects { url: String, max: usize },

    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("could not build HTTP client: {0}")]
    Client(String),
}

#[derive(Debug, Error)]
pub enum Error {
    /// The marketplace denied access. Retrying with the same session is pointless.
    #[error("403 Forbidden: access blocked ({url})")]
    Blocked { url: String },

    #[error("No product found for '{query}'")]
    NotFound { query: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
