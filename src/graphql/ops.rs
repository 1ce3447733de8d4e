// src/graphql/ops.rs
// Constructors for every operation the dashboard issues. Documents mirror
// the LoadMaster schema; the `root_field` names the selection each caller
// decodes.

use serde_json::json;

use super::{Operation, OperationKind};
use crate::types::{CreateLoadTestInput, LoginInput, RegisterInput, UpdateLoadTestInput};

// ── Queries

pub const LOAD_TESTS: &str = "query GetLoadTests { loadTests { id name description targetUrl \
     method concurrentUsers totalRequests durationSeconds requestsPerSecond status startedAt \
     completedAt createdAt } }";

pub const LOAD_TEST: &str = "query GetLoadTest($id: String!) { loadTest(id: $id) { id name \
     description targetUrl method concurrentUsers totalRequests durationSeconds \
     requestsPerSecond headers body status startedAt completedAt createdAt results { id \
     totalRequests successfulRequests failedRequests averageResponseTime minResponseTime \
     maxResponseTime p50ResponseTime p95ResponseTime p99ResponseTime requestsPerSecond \
     errorRate statusCodeDistribution errorDistribution timeSeriesData createdAt } } }";

pub const TEST_RESULTS: &str = "query GetTestResults($testId: String!) { testResults(testId: \
     $testId) { id totalRequests successfulRequests failedRequests averageResponseTime \
     minResponseTime maxResponseTime p50ResponseTime p95ResponseTime p99ResponseTime \
     requestsPerSecond errorRate statusCodeDistribution errorDistribution timeSeriesData \
     createdAt } }";

pub const LOAD_TEST_STATISTICS: &str = "query GetLoadTestStatistics { loadTestStatistics { \
     totalTests completedTests runningTests failedTests successRate } }";

pub const ME: &str =
    "query GetMe { me { id email name plan cloudEnabled createdAt } }";

// ── Mutations

pub const LOGIN: &str = "mutation Login($input: LoginInput!) { login(input: $input) { user { \
     id email name plan cloudEnabled createdAt } token } }";

pub const REGISTER: &str = "mutation Register($input: RegisterInput!) { register(input: \
     $input) { user { id email name plan cloudEnabled createdAt } token } }";

pub const UPDATE_PLAN: &str = "mutation UpdatePlan($plan: String!) { updatePlan(plan: $plan) \
     { id email name plan cloudEnabled createdAt } }";

pub const CREATE_LOAD_TEST: &str = "mutation CreateLoadTest($input: CreateLoadTestInput!) { \
     createLoadTest(input: $input) { id name description targetUrl method concurrentUsers \
     totalRequests durationSeconds requestsPerSecond status createdAt } }";

pub const UPDATE_LOAD_TEST: &str = "mutation UpdateLoadTest($id: String!, $input: \
     UpdateLoadTestInput!) { updateLoadTest(id: $id, input: $input) { id name description \
     targetUrl method concurrentUsers totalRequests durationSeconds requestsPerSecond \
     status } }";

pub const DELETE_LOAD_TEST: &str =
    "mutation DeleteLoadTest($id: String!) { deleteLoadTest(id: $id) }";

pub const START_LOAD_TEST: &str = "mutation StartLoadTest($id: String!) { startLoadTest(id: \
     $id) { id status startedAt } }";

pub const STOP_LOAD_TEST: &str = "mutation StopLoadTest($id: String!) { stopLoadTest(id: \
     $id) { id status completedAt } }";

// ── Subscriptions

pub const LOAD_TEST_UPDATED: &str = "subscription LoadTestUpdated($userId: String!) { \
     loadTestUpdated(userId: $userId) { id status startedAt completedAt } }";

pub fn load_tests() -> Operation {
    Operation::new(
        OperationKind::Query,
        "GetLoadTests",
        LOAD_TESTS,
        "loadTests",
        json!({}),
    )
}

pub fn load_test(id: &str) -> Operation {
    Operation::new(
        OperationKind::Query,
        "GetLoadTest",
        LOAD_TEST,
        "loadTest",
        json!({ "id": id }),
    )
}

pub fn test_results(test_id: &str) -> Operation {
    Operation::new(
        OperationKind::Query,
        "GetTestResults",
        TEST_RESULTS,
        "testResults",
        json!({ "testId": test_id }),
    )
}

pub fn load_test_statistics() -> Operation {
    Operation::new(
        OperationKind::Query,
        "GetLoadTestStatistics",
        LOAD_TEST_STATISTICS,
        "loadTestStatistics",
        json!({}),
    )
}

pub fn me() -> Operation {
    Operation::new(OperationKind::Query, "GetMe", ME, "me", json!({}))
}

pub fn login(input: LoginInput) -> Operation {
    Operation::new(
        OperationKind::Mutation,
        "Login",
        LOGIN,
        "login",
        json!({ "input": input }),
    )
}

pub fn register(input: RegisterInput) -> Operation {
    Operation::new(
        OperationKind::Mutation,
        "Register",
        REGISTER,
        "register",
        json!({ "input": input }),
    )
}

pub fn update_plan(plan: &str) -> Operation {
    Operation::new(
        OperationKind::Mutation,
        "UpdatePlan",
        UPDATE_PLAN,
        "updatePlan",
        json!({ "plan": plan }),
    )
}

pub fn create_load_test(input: CreateLoadTestInput) -> Operation {
    Operation::new(
        OperationKind::Mutation,
        "CreateLoadTest",
        CREATE_LOAD_TEST,
        "createLoadTest",
        json!({ "input": input }),
    )
}

pub fn update_load_test(id: &str, input: UpdateLoadTestInput) -> Operation {
    Operation::new(
        OperationKind::Mutation,
        "UpdateLoadTest",
        UPDATE_LOAD_TEST,
        "updateLoadTest",
        json!({ "id": id, "input": input }),
    )
}

pub fn delete_load_test(id: &str) -> Operation {
    Operation::new(
        OperationKind::Mutation,
        "DeleteLoadTest",
        DELETE_LOAD_TEST,
        "deleteLoadTest",
        json!({ "id": id }),
    )
}

pub fn start_load_test(id: &str) -> Operation {
    Operation::new(
        OperationKind::Mutation,
        "StartLoadTest",
        START_LOAD_TEST,
        "startLoadTest",
        json!({ "id": id }),
    )
}

pub fn stop_load_test(id: &str) -> Operation {
    Operation::new(
        OperationKind::Mutation,
        "StopLoadTest",
        STOP_LOAD_TEST,
        "stopLoadTest",
        json!({ "id": id }),
    )
}

pub fn load_test_updated(user_id: &str) -> Operation {
    Operation::new(
        OperationKind::Subscription,
        "LoadTestUpdated",
        LOAD_TEST_UPDATED,
        "loadTestUpdated",
        json!({ "userId": user_id }),
    )
}
