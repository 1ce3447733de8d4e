// src/error.rs
// Error taxonomy for the data layer. Transport and API field errors are
// surfaced to call sites verbatim; authorization failures are handled
// centrally by the session lifecycle (see client::Client).

use thiserror::Error;

use crate::graphql::GraphQLError;

/// Errors produced by the data/session layer.
///
/// Callers match on the variant to show the right message: a form displays
/// `Api` field errors inline, while `Transport` means the endpoint itself
/// was unreachable or returned garbage. The type is `Clone` so a single
/// in-flight result can be handed to every de-duplicated caller.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Endpoint unreachable, timeout, non-2xx with no usable body, or a
    /// malformed response envelope.
    #[error("transport failure: {message}")]
    Transport { message: String },

    /// The API rejected the request for missing or invalid credentials.
    /// Receiving this tears the session down.
    #[error("unauthorized: {message}")]
    Unauthorized { message: String },

    /// The API was reachable and responded with structured field errors.
    #[error("api error: {}", .0.iter().map(|e| e.message.as_str()).collect::<Vec<_>>().join("; "))]
    Api(Vec<GraphQLError>),
}

impl ClientError {
    pub fn transport(message: impl Into<String>) -> Self {
        ClientError::Transport {
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ClientError::Unauthorized { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport {
            message: err.to_string(),
        }
    }
}
