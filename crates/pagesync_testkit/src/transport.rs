//! Scripted transport.
//!
//! Responses are consumed in request order. A response can be queued
//! ready-made, or as a [`Gate`] that holds the request open until the
//! test releases it. Gates make completion order independent of issue
//! order, which is how stale-response races are reproduced.

use pagesync_engine::{Transport, TransportError, TransportResult};
use pagesync_protocol::ApiRequest;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use tokio::sync::{oneshot, Notify};

enum Scripted {
    Ready(TransportResult),
    Gated(oneshot::Receiver<TransportResult>),
}

/// Holds one scripted request open until released.
#[derive(Debug)]
pub struct Gate {
    tx: oneshot::Sender<TransportResult>,
}

impl Gate {
    /// Releases the request with a JSON success body.
    pub fn respond_json(self, body: Value) {
        let _ = self.tx.send(Ok(body.to_string().into_bytes()));
    }

    /// Releases the request with a raw success body.
    pub fn respond_bytes(self, body: impl Into<Vec<u8>>) {
        let _ = self.tx.send(Ok(body.into()));
    }

    /// Releases the request with a failure.
    pub fn fail(self, error: TransportError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Transport driven by a script of responses.
///
/// A request with nothing scripted fails with a network error.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<ApiRequest>>,
    called: Notify,
}

impl ScriptedTransport {
    /// Creates a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a JSON success body.
    pub fn push_json(&self, body: Value) {
        self.push_result(Ok(body.to_string().into_bytes()));
    }

    /// Queues a raw success body.
    pub fn push_bytes(&self, body: impl Into<Vec<u8>>) {
        self.push_result(Ok(body.into()));
    }

    /// Queues a failure.
    pub fn push_error(&self, error: TransportError) {
        self.push_result(Err(error));
    }

    /// Queues a rejection with an optional server message.
    pub fn push_rejection(&self, status: u16, message: Option<&str>) {
        self.push_error(TransportError::Rejected {
            status,
            message: message.map(str::to_string),
        });
    }

    /// Queues a response released later through the returned gate.
    pub fn push_gate(&self) -> Gate {
        let (tx, rx) = oneshot::channel();
        self.script.lock().push_back(Scripted::Gated(rx));
        Gate { tx }
    }

    fn push_result(&self, result: TransportResult) {
        self.script.lock().push_back(Scripted::Ready(result));
    }

    /// Every request received so far.
    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().clone()
    }

    /// Number of requests received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Last request received.
    pub fn last_call(&self) -> Option<ApiRequest> {
        self.calls.lock().last().cloned()
    }

    /// Number of scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().len()
    }

    /// Waits until at least `count` requests have been received.
    pub async fn wait_for_calls(&self, count: usize) {
        loop {
            let notified = self.called.notified();
            if self.call_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: ApiRequest) -> impl Future<Output = TransportResult> + Send {
        self.calls.lock().push(request);
        self.called.notify_waiters();
        let next = self.script.lock().pop_front();
        async move {
            match next {
                Some(Scripted::Ready(result)) => result,
                Some(Scripted::Gated(rx)) => rx
                    .await
                    .unwrap_or_else(|_| Err(TransportError::Network("gate dropped".into()))),
                None => Err(TransportError::Network("no scripted response".into())),
            }
        }
    }
}
