// src/transport/mod.rs
// Outbound request pipeline: credentials come from the session store,
// routing is decided by the operation's kind tag. Queries and mutations go
// over HTTP, subscriptions over a single lazily-opened WebSocket channel.

pub mod http;
pub mod ws;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::graphql::{Operation, OperationKind};
use crate::session::SessionStore;

pub use http::HttpTransport;
pub use ws::{SubscriptionStream, WsTransport};

/// The request/response seam. The production implementation is
/// [`HttpTransport`]; tests substitute scripted transports.
#[async_trait]
pub trait GraphQLTransport: Send + Sync {
    async fn execute(&self, op: &Operation) -> Result<Value, ClientError>;
}

/// Composes the outbound pipeline and routes each operation to the right
/// transport based on its kind.
pub struct TransportLink {
    http: Arc<dyn GraphQLTransport>,
    session: Arc<SessionStore>,
    ws_url: String,
    /// At most one streaming channel per process, opened lazily on first
    /// subscription and closed only on full session teardown.
    channel: std::sync::Mutex<Option<Arc<WsTransport>>>,
    connect_guard: tokio::sync::Mutex<()>,
}

impl TransportLink {
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> Result<Self, ClientError> {
        let http = Arc::new(HttpTransport::new(config, session.clone())?);
        Ok(Self::with_transport(http, session, config.ws_url.clone()))
    }

    /// Build a link around an arbitrary request/response transport.
    pub fn with_transport(
        http: Arc<dyn GraphQLTransport>,
        session: Arc<SessionStore>,
        ws_url: String,
    ) -> Self {
        TransportLink {
            http,
            session,
            ws_url,
            channel: std::sync::Mutex::new(None),
            connect_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Execute a query or mutation over the request/response transport.
    pub async fn execute(&self, op: &Operation) -> Result<Value, ClientError> {
        if op.kind == OperationKind::Subscription {
            return Err(ClientError::transport(format!(
                "operation {} is a subscription and cannot use the request/response transport",
                op.name
            )));
        }
        self.http.execute(op).await
    }

    /// Open a subscription over the shared streaming channel.
    pub async fn subscribe(&self, op: &Operation) -> Result<SubscriptionStream, ClientError> {
        if op.kind != OperationKind::Subscription {
            return Err(ClientError::transport(format!(
                "operation {} is not a subscription and cannot use the streaming transport",
                op.name
            )));
        }
        let channel = self.channel().await?;
        channel.subscribe(op).await
    }

    /// Tear the streaming channel down. Any active subscription streams end.
    pub fn shutdown_channel(&self) {
        let taken = self
            .channel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(channel) = taken {
            debug!("closing shared subscription channel");
            channel.close();
        }
    }

    async fn channel(&self) -> Result<Arc<WsTransport>, ClientError> {
        if let Some(channel) = self.current_channel() {
            return Ok(channel);
        }
        // serialize connection attempts so only one channel is ever opened
        let _guard = self.connect_guard.lock().await;
        if let Some(channel) = self.current_channel() {
            return Ok(channel);
        }
        debug!(url = %self.ws_url, "opening subscription channel");
        let channel = Arc::new(WsTransport::connect(&self.ws_url, self.session.token()).await?);
        *self.channel.lock().unwrap_or_else(|e| e.into_inner()) = Some(channel.clone());
        Ok(channel)
    }

    fn current_channel(&self) -> Option<Arc<WsTransport>> {
        let guard = self.channel.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().filter(|c| !c.is_closed()).cloned()
    }
}
