// src/transport/http.rs
// Request/response transport. Reads the bearer token from the session store
// per call; an anonymous session simply sends no credential header and the
// API decides whether the operation required one.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use tracing::debug;

use super::GraphQLTransport;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::graphql::{GraphQLResponse, Operation};
use crate::session::SessionStore;

pub struct HttpTransport {
    client: Client,
    endpoint: String,
    session: Arc<SessionStore>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::transport(format!("failed to build http client: {e}")))?;
        Ok(HttpTransport {
            client,
            endpoint: config.api_url.clone(),
            session,
        })
    }
}

#[async_trait]
impl GraphQLTransport for HttpTransport {
    async fn execute(&self, op: &Operation) -> Result<Value, ClientError> {
        let body = json!({
            "operationName": op.name,
            "query": op.document,
            "variables": op.variables,
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = self.session.token() {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        debug!(operation = op.name, "executing operation over http");
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::Unauthorized {
                message: format!("request rejected with status {status}"),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::transport(format!(
                "unexpected status {status}: {body}"
            )));
        }

        let envelope: GraphQLResponse = response
            .json()
            .await
            .map_err(|e| ClientError::transport(format!("malformed response envelope: {e}")))?;
        envelope.into_data()
    }
}
