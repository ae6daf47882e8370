//! Proxy error types

use thiserror::Error;

/// A fetch that produced no response. Any HTTP status, including 4xx and 5xx, is a
/// successful fetch and never shows up here.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Refusing to fetch outside the application origin: {0}")]
    ForeignOrigin(String),

    #[error("Network unavailable: {0}")]
    Offline(String),
}
