// src/test_support.rs
// Scripted transports for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Notify, oneshot};

use crate::error::ClientError;
use crate::graphql::Operation;
use crate::transport::GraphQLTransport;

/// Returns a scripted sequence of results, then falls back to a fixed
/// result. Records every call and the operation names it saw.
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<Value, ClientError>>>,
    fallback: Result<Value, ClientError>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<&'static str>>,
}

impl ScriptedTransport {
    pub fn always(value: Value) -> Self {
        ScriptedTransport {
            responses: Mutex::new(VecDeque::new()),
            fallback: Ok(value),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn script(responses: Vec<Result<Value, ClientError>>) -> Self {
        ScriptedTransport {
            responses: Mutex::new(responses.into()),
            fallback: Err(ClientError::transport("scripted responses exhausted")),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_ops(&self) -> Vec<&'static str> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphQLTransport for ScriptedTransport {
    async fn execute(&self, op: &Operation) -> Result<Value, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(op.name);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Parks every call until released, to hold a request in flight.
pub(crate) struct GatedTransport {
    value: Value,
    pub calls: AtomicUsize,
    started: Notify,
    release: Notify,
}

impl GatedTransport {
    pub fn new(value: Value) -> Self {
        GatedTransport {
            value,
            calls: AtomicUsize::new(0),
            started: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Wait until a call has reached the transport and parked.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release_one(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl GraphQLTransport for GatedTransport {
    async fn execute(&self, _op: &Operation) -> Result<Value, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.started.notify_one();
        self.release.notified().await;
        Ok(self.value.clone())
    }
}

/// Hands each call a one-shot gate so tests control resolution order.
pub(crate) struct SequencedTransport {
    gates: Mutex<VecDeque<oneshot::Receiver<Result<Value, ClientError>>>>,
    pub calls: AtomicUsize,
}

impl SequencedTransport {
    pub fn new(gates: Vec<oneshot::Receiver<Result<Value, ClientError>>>) -> Self {
        SequencedTransport {
            gates: Mutex::new(gates.into()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GraphQLTransport for SequencedTransport {
    async fn execute(&self, _op: &Operation) -> Result<Value, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self
            .gates
            .lock()
            .unwrap()
            .pop_front()
            .expect("more calls than gates");
        gate.await
            .unwrap_or_else(|_| Err(ClientError::transport("gate dropped")))
    }
}

/// Minimal `loadTest` response payload for poller and cache tests.
pub(crate) fn load_test_payload(id: &str, status: &str) -> Value {
    json!({
        "loadTest": {
            "id": id,
            "name": "smoke",
            "targetUrl": "https://example.com",
            "method": "GET",
            "concurrentUsers": 10,
            "totalRequests": 100,
            "durationSeconds": 60,
            "requestsPerSecond": 10,
            "status": status,
        }
    })
}
