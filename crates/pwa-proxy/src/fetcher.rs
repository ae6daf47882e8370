//! Network fetcher trait

use async_trait::async_trait;

use crate::error::ProxyError;
use crate::request::{FetchedResponse, InterceptedRequest};

/// Fetcher trait
///
/// Every network access the agent makes goes through this seam. An `Err`
/// means the network could not be reached; HTTP error statuses are `Ok`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<FetchedResponse, ProxyError>;
}
