// src/types.rs
// Wire types for the LoadMaster GraphQL schema. Field names follow the
// schema's camelCase; anything the API may omit is Option with a default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
    pub plan: String,
    #[serde(default)]
    pub cloud_enabled: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Result of the `login` and `register` mutations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadTestStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl LoadTestStatus {
    /// A terminal status has no further transitions; pollers and
    /// subscriptions stop once one is observed.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoadTestStatus::Completed | LoadTestStatus::Failed | LoadTestStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadTestStatus::Pending => "pending",
            LoadTestStatus::Queued => "queued",
            LoadTestStatus::Running => "running",
            LoadTestStatus::Completed => "completed",
            LoadTestStatus::Failed => "failed",
            LoadTestStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for LoadTestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTest {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub target_url: String,
    pub method: String,
    pub concurrent_users: i32,
    pub total_requests: i32,
    pub duration_seconds: i32,
    pub requests_per_second: i32,
    #[serde(default)]
    pub headers: Option<Value>,
    #[serde(default)]
    pub body: Option<String>,
    pub status: LoadTestStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Present only on the detail query, newest first.
    #[serde(default)]
    pub results: Option<Vec<TestResult>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub total_requests: i64,
    pub successful_requests: i64,
    pub failed_requests: i64,
    pub average_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub p50_response_time: f64,
    pub p95_response_time: f64,
    pub p99_response_time: f64,
    pub requests_per_second: f64,
    pub error_rate: f64,
    #[serde(default)]
    pub status_code_distribution: Option<Value>,
    #[serde(default)]
    pub error_distribution: Option<Value>,
    #[serde(default)]
    pub time_series_data: Option<Value>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestStatistics {
    pub total_tests: i64,
    pub completed_tests: i64,
    pub running_tests: i64,
    pub failed_tests: i64,
    pub success_rate: f64,
}

/// Payload pushed by the `loadTestUpdated` subscription on every status
/// transition.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestUpdate {
    pub id: String,
    pub status: LoadTestStatus,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

// ── Mutation inputs

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoadTestInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub target_url: String,
    pub method: String,
    pub concurrent_users: i32,
    pub total_requests: i32,
    pub duration_seconds: i32,
    pub requests_per_second: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLoadTestInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrent_users: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_requests: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_second: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_terminality() {
        assert!(LoadTestStatus::Completed.is_terminal());
        assert!(LoadTestStatus::Failed.is_terminal());
        assert!(LoadTestStatus::Cancelled.is_terminal());
        assert!(!LoadTestStatus::Pending.is_terminal());
        assert!(!LoadTestStatus::Queued.is_terminal());
        assert!(!LoadTestStatus::Running.is_terminal());
    }

    #[test]
    fn status_uses_lowercase_wire_form() {
        assert_eq!(
            serde_json::to_string(&LoadTestStatus::Running).unwrap(),
            "\"running\""
        );
        let parsed: LoadTestStatus = serde_json::from_str("\"cancelled\"").unwrap();
        assert_eq!(parsed, LoadTestStatus::Cancelled);
    }

    #[test]
    fn update_input_skips_unset_fields() {
        let input = UpdateLoadTestInput {
            name: Some("smoke".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&input).unwrap();
        assert_eq!(json, serde_json::json!({"name": "smoke"}));
    }
}
