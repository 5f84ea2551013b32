//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so any library
//! (reqwest, hyper, a browser fetch binding) can be plugged in.

use crate::transport::{Transport, TransportError, TransportResult};
use pagesync_protocol::{ApiRequest, ErrorBody, Method};
use std::future::Future;
use tracing::{debug, warn};
use url::Url;

/// Raw HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implementations perform the request and report any status as `Ok`.
/// `Err` is reserved for failures where no response arrived.
pub trait HttpClient: Send + Sync {
    /// Executes a request. `body` is JSON when present.
    fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> impl Future<Output = Result<HttpResponse, String>> + Send;
}

/// HTTP-based transport.
///
/// Uses JSON for request and response bodies.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the absolute URL for a request, query string included.
    pub fn url_for(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            request.path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| TransportError::Network(format!("invalid url {joined}: {e}")))?;
        if !request.params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &request.params {
                pairs.append_pair(name, value);
            }
        }
        Ok(url)
    }

    async fn send_inner(&self, request: ApiRequest) -> TransportResult {
        let url = self.url_for(&request)?;
        let body = request
            .body
            .as_ref()
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| TransportError::Network(format!("failed to encode body: {e}")))?;

        debug!(method = %request.method, %url, "http request");
        let response = self.client.execute(request.method, url, body).await.map_err(|e| {
            warn!(method = %request.method, path = %request.path, error = %e, "http request failed");
            TransportError::Network(e)
        })?;

        if response.is_success() {
            Ok(response.body)
        } else {
            warn!(
                method = %request.method,
                path = %request.path,
                status = response.status,
                "http request rejected"
            );
            Err(TransportError::Rejected {
                status: response.status,
                message: ErrorBody::message_from(&response.body),
            })
        }
    }
}

impl<C: HttpClient> Transport for HttpTransport<C> {
    fn send(&self, request: ApiRequest) -> impl Future<Output = TransportResult> + Send {
        self.send_inner(request)
    }
}
