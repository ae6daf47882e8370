//! Request classification and response provenance

use http::StatusCode;
use pwa_proxy::InterceptedRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Origin;

/// Which strategy governs an intercepted request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RequestClass {
    /// Top-level document load: network first, offline shell fallback
    Navigation,
    /// Static resource on our own origin: cache first, write-through
    SameOrigin,
    /// Anything else is left to default network handling
    Foreign,
}

impl RequestClass {
    /// Classify a request against the controller's origin
    pub fn of(request: &InterceptedRequest, origin: &Origin) -> Self {
        if request.is_navigation() {
            RequestClass::Navigation
        } else if request.url.origin() == *origin {
            RequestClass::SameOrigin
        } else {
            RequestClass::Foreign
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestClass::Navigation => "navigation",
            RequestClass::SameOrigin => "same-origin",
            RequestClass::Foreign => "foreign",
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an answered response came from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Network,
    Cache,
    /// Offline shell served in place of a failed navigation
    Fallback,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::Fallback => "fallback",
        }
    }
}

/// Whether a network response may be written through to the bucket.
/// Any status is kept except partial content.
pub fn is_cacheable(status: StatusCode) -> bool {
    status != StatusCode::PARTIAL_CONTENT
}
