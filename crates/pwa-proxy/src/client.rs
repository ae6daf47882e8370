//! Origin client

use async_trait::async_trait;
use http::header::{self, HeaderMap, HeaderName};
use reqwest::Client;
use tracing::{debug, info};
use url::{Origin, Url};

use crate::error::ProxyError;
use crate::fetcher::Fetcher;
use crate::request::{FetchedResponse, InterceptedRequest};

/// Headers that only make sense for a single hop
const HOP_BY_HOP: [HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Origin client configuration
#[derive(Clone, Debug)]
pub struct OriginClientConfig {
    /// Origin the application is served under, as seen by its pages
    pub public_origin: Url,
    /// Base URL of the server actually hosting the application
    pub upstream: Url,
    /// Skip TLS certificate verification
    pub skip_tls_verify: bool,
}

/// HTTP client that reaches the network on behalf of the agent
///
/// Requests for the public origin are sent to the upstream server. Any
/// other URL is refused: the agent never relays traffic to other hosts.
pub struct OriginClient {
    config: OriginClientConfig,
    public_origin: Origin,
    client: Client,
}

impl OriginClient {
    /// Create a new origin client
    pub fn new(config: OriginClientConfig) -> Result<Self, ProxyError> {
        let mut builder = Client::builder().redirect(reqwest::redirect::Policy::none());

        if config.skip_tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build()?;

        info!(
            "Created origin client for {} -> {}",
            config.public_origin, config.upstream
        );

        Ok(Self {
            public_origin: config.public_origin.origin(),
            config,
            client,
        })
    }

    /// Map a request URL on the public origin to the upstream URL
    pub fn target_url(&self, url: &Url) -> Result<Url, ProxyError> {
        if url.origin() != self.public_origin {
            return Err(ProxyError::ForeignOrigin(url.to_string()));
        }

        let mut target = format!("{}{}", self.config.upstream.as_str().trim_end_matches('/'), url.path());
        if let Some(query) = url.query() {
            target.push('?');
            target.push_str(query);
        }
        Url::parse(&target).map_err(|e| ProxyError::InvalidUrl(format!("{}: {}", target, e)))
    }

    /// Check if the upstream is reachable
    pub async fn ping(&self) -> bool {
        match self.client.head(self.config.upstream.clone()).send().await {
            Ok(_) => true,
            Err(e) => {
                debug!("Upstream ping failed: {}", e);
                false
            }
        }
    }
}

/// Copy headers, leaving out hop-by-hop ones and `Host`
fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut out = headers.clone();
    for name in HOP_BY_HOP.iter() {
        out.remove(name);
    }
    out.remove(header::HOST);
    out.remove(header::CONTENT_LENGTH);
    out
}

#[async_trait]
impl Fetcher for OriginClient {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<FetchedResponse, ProxyError> {
        let target = self.target_url(&request.url)?;
        debug!("Fetching {} {} ({})", request.method, target, request.mode);

        let mut builder = self
            .client
            .request(request.method.clone(), target)
            .headers(forwardable(&request.headers));

        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = forwardable(response.headers());
        let body = response.bytes().await?;

        Ok(FetchedResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> OriginClient {
        OriginClient::new(OriginClientConfig {
            public_origin: Url::parse("https://app.example.org").unwrap(),
            upstream: Url::parse("http://127.0.0.1:8000/").unwrap(),
            skip_tls_verify: false,
        })
        .unwrap()
    }

    #[test]
    fn test_same_origin_is_rewritten_to_upstream() {
        let client = client();
        let target = client
            .target_url(&Url::parse("https://app.example.org/static/app.js?v=3").unwrap())
            .unwrap();
        assert_eq!(target.as_str(), "http://127.0.0.1:8000/static/app.js?v=3");
    }

    #[test]
    fn test_foreign_origin_is_refused() {
        let client = client();
        let url = Url::parse("https://cdn.jsdelivr.net/npm/bootstrap.css").unwrap();
        assert!(matches!(
            client.target_url(&url),
            Err(ProxyError::ForeignOrigin(_))
        ));

        let metadata = Url::parse("http://169.254.169.254/latest/meta-data/").unwrap();
        assert!(client.target_url(&metadata).is_err());

        // Same host, other port
        let other_port = Url::parse("https://app.example.org:8443/static/app.js").unwrap();
        assert!(client.target_url(&other_port).is_err());
    }

    #[tokio::test]
    async fn test_fetch_outside_origin_never_reaches_network() {
        let client = client();
        let request = InterceptedRequest::get(
            Url::parse("http://127.0.0.1:5080/loop").unwrap(),
            crate::request::RequestMode::Navigate,
        );
        assert!(matches!(
            client.fetch(&request).await,
            Err(ProxyError::ForeignOrigin(_))
        ));
    }

    #[test]
    fn test_hop_by_hop_headers_are_dropped() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, "keep-alive".parse().unwrap());
        headers.insert(header::HOST, "app.example.org".parse().unwrap());
        headers.insert(header::ACCEPT, "text/html".parse().unwrap());

        let out = forwardable(&headers);
        assert!(out.get(header::CONNECTION).is_none());
        assert!(out.get(header::HOST).is_none());
        assert_eq!(out.get(header::ACCEPT).unwrap(), "text/html");
    }
}
