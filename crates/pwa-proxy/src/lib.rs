//! PWA Cache Network Layer
//!
//! This crate provides the request and response types the offline agent
//! intercepts, the [`Fetcher`] seam used for every network access, and a
//! client that forwards requests for the application origin to its
//! upstream server.

pub mod client;
pub mod error;
pub mod fetcher;
pub mod request;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use client::{OriginClient, OriginClientConfig};
pub use error::ProxyError;
pub use fetcher::Fetcher;
pub use request::{FetchedResponse, InterceptedRequest, RequestMode};

#[cfg(any(test, feature = "test-util"))]
pub use testing::ScriptedFetcher;
