//! `reqwest`-backed HTTP client.

use pagesync_engine::{HttpClient, HttpResponse};
use pagesync_protocol::Method;
use reqwest::header::CONTENT_TYPE;
use std::future::Future;
use std::time::Duration;
use url::Url;

/// HTTP client executing engine requests with `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let inner = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { inner })
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl HttpClient for ReqwestClient {
    fn execute(
        &self,
        verb: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> impl Future<Output = Result<HttpResponse, String>> + Send {
        let mut request = self.inner.request(method(verb), url);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        async move {
            let response = request.send().await.map_err(|e| e.to_string())?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(|e| e.to_string())?;
            Ok(HttpResponse::new(status, body.to_vec()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_map_to_reqwest() {
        assert_eq!(method(Method::Get), reqwest::Method::GET);
        assert_eq!(method(Method::Patch), reqwest::Method::PATCH);
        assert_eq!(method(Method::Delete), reqwest::Method::DELETE);
    }

    #[test]
    fn builds_with_timeout() {
        assert!(ReqwestClient::new(Duration::from_secs(5)).is_ok());
    }
}
