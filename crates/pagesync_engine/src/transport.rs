//! Transport layer abstraction.

use crate::error::EngineError;
use pagesync_protocol::ApiRequest;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Outcome of a transport call: the raw success body or a typed failure.
pub type TransportResult = Result<Vec<u8>, TransportError>;

/// Failure reported by a transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Server unreachable, connection dropped, timeout.
    #[error("network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("rejected with status {status}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Server `message` field, if the body carried one.
        message: Option<String>,
    },
}

impl TransportError {
    /// Converts to an engine error, using `fallback` when the server sent
    /// no message.
    pub fn into_engine_error(self, fallback: &str) -> EngineError {
        match self {
            TransportError::Network(message) if message.is_empty() => {
                EngineError::Network(fallback.to_string())
            }
            TransportError::Network(message) => EngineError::Network(message),
            TransportError::Rejected { status, message } => EngineError::rejected(
                Some(status),
                message.unwrap_or_else(|| fallback.to_string()),
            ),
        }
    }
}

/// A transport turns an [`ApiRequest`] into a response body or a failure.
///
/// The engine knows nothing about headers, auth or transport-level retry.
/// Implementations exist for HTTP ([`crate::HttpTransport`]), tests
/// ([`MockTransport`]) and scripted integration tests (`pagesync_testkit`).
pub trait Transport: Send + Sync {
    /// Sends a request.
    fn send(&self, request: ApiRequest) -> impl Future<Output = TransportResult> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, request: ApiRequest) -> impl Future<Output = TransportResult> + Send {
        (**self).send(request)
    }
}

/// A mock transport for testing.
///
/// Responses are returned in FIFO order. Every request is recorded.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<TransportResult>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    /// Creates a new mock transport with no queued responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a JSON success body.
    pub fn push_json(&self, body: serde_json::Value) {
        self.responses
            .lock()
            .push_back(Ok(body.to_string().into_bytes()));
    }

    /// Queues a raw success body, such as a CSV export.
    pub fn push_bytes(&self, body: impl Into<Vec<u8>>) {
        self.responses.lock().push_back(Ok(body.into()));
    }

    /// Queues a failure.
    pub fn push_error(&self, error: TransportError) {
        self.responses.lock().push_back(Err(error));
    }

    /// Returns every request sent so far.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    /// Returns the number of requests sent so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: ApiRequest) -> impl Future<Output = TransportResult> + Send {
        self.calls.lock().push(request);
        let response = self
            .responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("no mock response set".into())));
        std::future::ready(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fallback_message_used_when_server_silent() {
        let err = TransportError::Rejected {
            status: 500,
            message: None,
        }
        .into_engine_error("Failed to fetch clients");
        assert_eq!(err.user_message(), "Failed to fetch clients");

        let err = TransportError::Rejected {
            status: 404,
            message: Some("Client not found".into()),
        }
        .into_engine_error("Failed to delete client");
        assert_eq!(err.user_message(), "Client not found");
    }

    #[tokio::test]
    async fn mock_transport_fifo() {
        let transport = MockTransport::new();
        transport.push_json(json!({"count": 1}));
        transport.push_error(TransportError::Network("offline".into()));

        let first = transport.send(ApiRequest::get("a")).await;
        assert_eq!(first.unwrap(), br#"{"count":1}"#.to_vec());
        let second = transport.send(ApiRequest::get("b")).await;
        assert!(matches!(second, Err(TransportError::Network(_))));
        let third = transport.send(ApiRequest::get("c")).await;
        assert!(third.is_err());

        assert_eq!(transport.call_count(), 3);
        assert_eq!(transport.calls()[1].path, "b");
    }
}
