// tests/graphql_http.rs
// End-to-end tests against an in-process GraphQL stub: credential
// injection, session persistence across restart, and error classification.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{Json, Router, extract::State, http::HeaderMap, routing::post};
use serde_json::{Value, json};

use loadmaster_client::auth::AuthController;
use loadmaster_client::client::Client;
use loadmaster_client::config::ClientConfig;
use loadmaster_client::error::ClientError;
use loadmaster_client::graphql::ops;
use loadmaster_client::session::SessionStore;
use loadmaster_client::types::{LoadTest, LoginInput, User};

#[derive(Default)]
struct Recorded {
    auth_headers: Mutex<Vec<Option<String>>>,
}

impl Recorded {
    fn headers(&self) -> Vec<Option<String>> {
        self.auth_headers.lock().unwrap().clone()
    }
}

fn user_json() -> Value {
    json!({
        "id": "u-1",
        "email": "dev@example.com",
        "name": "Dev",
        "plan": "free",
        "cloudEnabled": false,
    })
}

fn load_test_json() -> Value {
    json!({
        "id": "t-1",
        "name": "homepage smoke",
        "targetUrl": "https://example.com",
        "method": "GET",
        "concurrentUsers": 10,
        "totalRequests": 100,
        "durationSeconds": 60,
        "requestsPerSecond": 10,
        "status": "running",
    })
}

async fn graphql(
    State(recorded): State<Arc<Recorded>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    recorded.auth_headers.lock().unwrap().push(auth.clone());

    let operation = body["operationName"].as_str().unwrap_or("");
    let response = match operation {
        "Login" => {
            if body["variables"]["input"]["password"] == "hunter2" {
                json!({"data": {"login": {"user": user_json(), "token": "tok-abc"}}})
            } else {
                json!({"data": null, "errors": [{"message": "Invalid credentials"}]})
            }
        }
        "GetLoadTests" => {
            if auth.as_deref() == Some("Bearer tok-abc") {
                json!({"data": {"loadTests": [load_test_json()]}})
            } else {
                json!({"errors": [{
                    "message": "Not authenticated",
                    "extensions": {"code": "UNAUTHENTICATED"},
                }]})
            }
        }
        "GetMe" => json!({"data": {"me": user_json()}}),
        other => json!({"errors": [{"message": format!("unknown operation {other}")}]}),
    };
    Json(response)
}

async fn spawn_server(recorded: Arc<Recorded>) -> SocketAddr {
    let app = Router::new()
        .route("/graphql", post(graphql))
        .with_state(recorded);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn config_for(addr: SocketAddr, dir: &tempfile::TempDir) -> ClientConfig {
    ClientConfig {
        api_url: format!("http://{addr}/graphql"),
        ws_url: format!("ws://{addr}/graphql"),
        session_file: dir.path().join("session.json"),
        ..ClientConfig::default()
    }
}

#[tokio::test]
async fn login_persists_session_and_attaches_bearer_token() {
    let recorded = Arc::new(Recorded::default());
    let addr = spawn_server(recorded.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(addr, &dir);

    let client = Arc::new(Client::new(&config).unwrap());
    let auth = AuthController::new(client.clone());
    auth.login(LoginInput {
        email: "dev@example.com".to_string(),
        password: "hunter2".to_string(),
    })
    .await
    .unwrap();
    assert!(client.session().is_authenticated());

    let tests: Vec<LoadTest> = client.query(&ops::load_tests()).await.unwrap();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].id, "t-1");

    let headers = recorded.headers();
    // the login itself went out without credentials
    assert_eq!(headers[0], None);
    assert_eq!(headers[1].as_deref(), Some("Bearer tok-abc"));

    // a process restart reads the persisted session back
    let restarted = SessionStore::load(&config.session_file);
    assert_eq!(restarted.token().as_deref(), Some("tok-abc"));
    assert!(restarted.is_authenticated());
}

#[tokio::test]
async fn invalid_credentials_surface_as_field_errors() {
    let recorded = Arc::new(Recorded::default());
    let addr = spawn_server(recorded).await;
    let dir = tempfile::tempdir().unwrap();

    let client = Arc::new(Client::new(&config_for(addr, &dir)).unwrap());
    let auth = AuthController::new(client.clone());
    let err = auth
        .login(LoginInput {
            email: "dev@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        ClientError::Api(errors) => assert_eq!(errors[0].message, "Invalid credentials"),
        other => panic!("expected api error, got {other:?}"),
    }
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn unauthenticated_read_reports_unauthorized() {
    let recorded = Arc::new(Recorded::default());
    let addr = spawn_server(recorded).await;
    let dir = tempfile::tempdir().unwrap();

    let client = Client::new(&config_for(addr, &dir)).unwrap();
    let err = client
        .query::<Vec<LoadTest>>(&ops::load_tests())
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());
}

#[tokio::test]
async fn rejected_token_clears_the_persisted_session() {
    let recorded = Arc::new(Recorded::default());
    let addr = spawn_server(recorded).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(addr, &dir);

    let client = Client::new(&config).unwrap();
    let user: User = serde_json::from_value(user_json()).unwrap();
    client.session().set_session(user, "tok-stale".to_string());
    assert!(config.session_file.exists());

    let err = client
        .query::<Vec<LoadTest>>(&ops::load_tests())
        .await
        .unwrap_err();
    assert!(err.is_unauthorized());

    // central teardown: session cleared in memory and on disk
    assert!(!client.session().is_authenticated());
    assert!(!config.session_file.exists());
}
