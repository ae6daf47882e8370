//! Request interception
//!
//! Turns an incoming HTTP request into an [`InterceptedRequest`], hands it
//! to the registration and renders whatever the controller decided.
//! Requests addressed to any authority other than the configured origin
//! are answered `421 Misdirected Request` without touching the network.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use pwa_core::InterceptOutcome;
use pwa_proxy::{FetchedResponse, InterceptedRequest, RequestMode};
use tracing::debug;
use url::Url;

use super::metrics::record_outcome;
use crate::error::ApiError;
use crate::state::AppState;

/// Response header naming where an answer came from
pub const SOURCE_HEADER: &str = "x-pwa-cache";

/// Fallback handler for every non-agent route
pub async fn intercept(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let origin = &state.controller.config().origin;
    let url = request_url(&uri, &headers, origin)?;
    // Only the application origin is served
    if url.origin() != origin.origin() {
        return Err(ApiError::Misdirected(format!(
            "{} is not served by this agent",
            &url[..url::Position::AfterPort]
        )));
    }
    let mode = request_mode(&method, &headers);

    let request = InterceptedRequest {
        method,
        url,
        mode,
        headers,
        body,
    };
    let class = state.controller.classify(&request);
    debug!("{} {} ({}, {})", request.method, request.url, request.mode, class);

    let outcome = state.registration.dispatch_fetch(request.clone()).await?;
    record_outcome(class, &outcome);

    match outcome {
        InterceptOutcome::Respond { response, source } => {
            let mut response = render(response);
            response
                .headers_mut()
                .insert(SOURCE_HEADER, HeaderValue::from_static(source.as_str()));
            Ok(response)
        }
        InterceptOutcome::NetworkError => Ok(StatusCode::BAD_GATEWAY.into_response()),
        InterceptOutcome::Passthrough => {
            let response = state.fetcher.fetch(&request).await?;
            Ok(render(response))
        }
    }
}

/// Absolute URL of the request as the page issued it
///
/// Absolute-form targets are taken as-is; otherwise the scheme comes from
/// the configured origin and the authority from `Host`.
fn request_url(uri: &Uri, headers: &HeaderMap, origin: &Url) -> Result<Url, ApiError> {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return Url::parse(&uri.to_string()).map_err(|e| ApiError::BadRequest(e.to_string()));
    }

    let host = match headers.get(header::HOST).and_then(|h| h.to_str().ok()) {
        Some(host) => host.to_string(),
        None => origin[url::Position::BeforeHost..url::Position::AfterPort].to_string(),
    };
    let path = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    Url::parse(&format!("{}://{}{}", origin.scheme(), host, path))
        .map_err(|e| ApiError::BadRequest(format!("invalid request target: {}", e)))
}

/// `Sec-Fetch-Mode` when present; otherwise a GET asking for HTML counts
/// as a navigation
fn request_mode(method: &Method, headers: &HeaderMap) -> RequestMode {
    if let Some(mode) = headers
        .get("sec-fetch-mode")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.parse::<RequestMode>().ok())
    {
        return mode;
    }

    let wants_html = headers
        .get(header::ACCEPT)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));

    if *method == Method::GET && wants_html {
        RequestMode::Navigate
    } else {
        RequestMode::NoCors
    }
}

fn render(fetched: FetchedResponse) -> Response {
    let mut response = Response::new(Body::from(fetched.body));
    *response.status_mut() = fetched.status;
    *response.headers_mut() = fetched.headers;
    response
}
