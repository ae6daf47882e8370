//! Intercepted request and fetched response types

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use std::fmt;
use std::str::FromStr;
use url::Url;

/// How the requester issued the request, after `Sec-Fetch-Mode`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
    /// Top-level document load
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    NoCors,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Navigate => "navigate",
            RequestMode::SameOrigin => "same-origin",
            RequestMode::Cors => "cors",
            RequestMode::NoCors => "no-cors",
        }
    }
}

impl fmt::Display for RequestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for parsing a request mode
#[derive(Debug, Clone)]
pub struct ParseRequestModeError(String);

impl fmt::Display for ParseRequestModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid request mode: {}", self.0)
    }
}

impl std::error::Error for ParseRequestModeError {}

impl FromStr for RequestMode {
    type Err = ParseRequestModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "cors" => Ok(RequestMode::Cors),
            "no-cors" => Ok(RequestMode::NoCors),
            _ => Err(ParseRequestModeError(s.to_string())),
        }
    }
}

/// A request seen by the agent before it reaches the network
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl InterceptedRequest {
    pub fn new(method: Method, url: Url, mode: RequestMode) -> Self {
        Self {
            method,
            url,
            mode,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// A GET with the given mode
    pub fn get(url: Url, mode: RequestMode) -> Self {
        Self::new(Method::GET, url, mode)
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A response obtained from the network or the cache
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// 200 with no headers
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, HeaderMap::new(), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("navigate".parse::<RequestMode>().unwrap(), RequestMode::Navigate);
        assert_eq!("NO-CORS".parse::<RequestMode>().unwrap(), RequestMode::NoCors);
        assert!("websocket".parse::<RequestMode>().is_err());
    }

    #[test]
    fn test_navigation_flag() {
        let url = Url::parse("https://app.local/").unwrap();
        assert!(InterceptedRequest::get(url.clone(), RequestMode::Navigate).is_navigation());
        assert!(!InterceptedRequest::get(url, RequestMode::Cors).is_navigation());
    }
}
