// src/graphql/mod.rs
// Operation model and response envelope. Each outbound operation carries an
// explicit kind tag set at construction time; transports never inspect the
// document text to decide routing.

pub mod ops;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

/// A single typed request to the GraphQL endpoint. Immutable per call;
/// constructed by call sites via [`ops`], consumed by the transport link.
#[derive(Debug, Clone)]
pub struct Operation {
    pub kind: OperationKind,
    pub name: &'static str,
    pub document: &'static str,
    /// Top-level field of the response `data` object this operation selects.
    pub root_field: &'static str,
    pub variables: Value,
}

impl Operation {
    pub fn new(
        kind: OperationKind,
        name: &'static str,
        document: &'static str,
        root_field: &'static str,
        variables: Value,
    ) -> Self {
        Self {
            kind,
            name,
            document,
            root_field,
            variables,
        }
    }

    /// Normalized identity used by the operation cache. `serde_json` keeps
    /// object keys sorted, so identical variables always produce the same
    /// key regardless of construction order.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.name, self.variables)
    }
}

/// One entry of the response `errors` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl GraphQLError {
    pub fn code(&self) -> Option<&str> {
        self.extensions.as_ref()?.get("code")?.as_str()
    }

    /// Whether this error means the credentials were missing or invalid,
    /// as opposed to an ordinary field error.
    fn is_auth_failure(&self) -> bool {
        match self.code() {
            Some("UNAUTHENTICATED") | Some("FORBIDDEN") => true,
            _ => {
                let msg = self.message.to_ascii_lowercase();
                msg.contains("not authenticated") || msg.contains("invalid token")
            }
        }
    }
}

/// The `{data, errors}` response envelope.
#[derive(Debug, Deserialize)]
pub struct GraphQLResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQLError>>,
}

impl GraphQLResponse {
    /// Fold the envelope into data or a classified error. Credential
    /// rejections become `Unauthorized` so the session lifecycle can react;
    /// everything else in `errors` is an application-level `Api` error.
    pub fn into_data(self) -> Result<Value, ClientError> {
        if let Some(errors) = self.errors.filter(|errs| !errs.is_empty()) {
            if errors.iter().any(GraphQLError::is_auth_failure) {
                return Err(ClientError::Unauthorized {
                    message: errors[0].message.clone(),
                });
            }
            return Err(ClientError::Api(errors));
        }
        self.data
            .ok_or_else(|| ClientError::transport("response envelope had neither data nor errors"))
    }
}
