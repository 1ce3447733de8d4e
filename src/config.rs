// src/config.rs

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::ClientError;

pub const DEFAULT_API_URL: &str = "http://localhost:4000/graphql";
pub const DEFAULT_WS_URL: &str = "ws://localhost:4000/graphql";

/// Interval used by detail views while a test is in progress.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// Configuration for the data layer. Both endpoint addresses are externally
/// configured; the library never reads ambient environment itself, the
/// binary builds one of these with [`ClientConfig::from_env`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// GraphQL endpoint for queries and mutations.
    pub api_url: String,
    /// GraphQL endpoint for subscriptions (graphql-transport-ws).
    pub ws_url: String,
    /// Durable session record, read at startup and written on every change.
    pub session_file: PathBuf,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            ws_url: DEFAULT_WS_URL.to_string(),
            session_file: default_session_file(),
            request_timeout: Duration::from_secs(30),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl ClientConfig {
    /// Read endpoints from `LOADMASTER_API_URL`, `LOADMASTER_WS_URL` and
    /// `LOADMASTER_SESSION_FILE`, falling back to localhost defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(api_url) = env::var("LOADMASTER_API_URL") {
            config.api_url = api_url;
        }
        if let Ok(ws_url) = env::var("LOADMASTER_WS_URL") {
            config.ws_url = ws_url;
        }
        if let Ok(path) = env::var("LOADMASTER_SESSION_FILE") {
            config.session_file = PathBuf::from(path);
        }
        config
    }

    /// Check that both endpoints are well-formed before any request is made.
    pub fn validate(&self) -> Result<(), ClientError> {
        Url::parse(&self.api_url)
            .map_err(|e| ClientError::transport(format!("invalid api url {}: {e}", self.api_url)))?;
        let ws = Url::parse(&self.ws_url)
            .map_err(|e| ClientError::transport(format!("invalid ws url {}: {e}", self.ws_url)))?;
        if ws.scheme() != "ws" && ws.scheme() != "wss" {
            return Err(ClientError::transport(format!(
                "subscription endpoint must use ws:// or wss://, got {}",
                self.ws_url
            )));
        }
        Ok(())
    }
}

fn default_session_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".loadmaster")
        .join("session.json")
}
