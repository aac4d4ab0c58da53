//! Engine-level egress scenarios: the guard, the response bound, and the
//! redirect policy as seen through `http` nodes.

use lattice_core::{ErrorClass, Limits};
use lattice_engine::{Engine, ExecutionStatus};
use lattice_workflow::WorkflowPayload;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn payload(value: serde_json::Value) -> WorkflowPayload {
    serde_json::from_value(value).expect("test payload parses")
}

fn http_node(url: &str) -> WorkflowPayload {
    payload(json!({
        "nodes": [{"id": "fetch", "data": {"url": url}}],
        "edges": []
    }))
}

/// Limits that can reach a loopback mock server.
fn local_limits() -> Limits {
    Limits {
        allow_http: true,
        block_localhost: false,
        block_private_ips: false,
        block_link_local: false,
        max_http_calls_per_exec: 10,
        ..Limits::default()
    }
}

#[tokio::test]
async fn default_preset_blocks_http_outright() {
    let engine = Engine::new(Limits::default()).unwrap();
    let result = engine
        .execute(&http_node("http://127.0.0.1:8080/x"))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    let failure = result.first_error().unwrap();
    assert_eq!(failure.class, ErrorClass::Security);
    assert!(failure.message.contains("allow_http"));
}

#[tokio::test]
async fn loopback_is_blocked_by_category_when_http_is_allowed() {
    let limits = Limits {
        allow_http: true,
        max_http_calls_per_exec: 10,
        ..Limits::default()
    };
    let engine = Engine::new(limits).unwrap();
    let result = engine
        .execute(&http_node("http://127.0.0.1:8080/x"))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    let failure = result.first_error().unwrap();
    assert_eq!(failure.class, ErrorClass::Security);
    assert!(failure.message.contains("loopback"));
}

#[tokio::test]
async fn metadata_endpoint_is_blocked_even_in_development() {
    let engine = Engine::new(Limits::development()).unwrap();
    let result = engine
        .execute(&http_node("http://169.254.169.254/latest/meta-data/"))
        .await
        .unwrap();

    let failure = result.first_error().unwrap();
    assert_eq!(failure.class, ErrorClass::Security);
    assert!(failure.message.contains("cloud metadata"));
}

#[tokio::test]
async fn domain_allow_list_applies_to_http_nodes() {
    let mut limits = local_limits();
    limits.allowed_domains = vec!["example.com".into()];
    let engine = Engine::new(limits).unwrap();
    let result = engine
        .execute(&http_node("http://127.0.0.1:9/x"))
        .await
        .unwrap();

    let failure = result.first_error().unwrap();
    assert_eq!(failure.class, ErrorClass::Security);
    assert!(failure.message.contains("allow-listed"));
}

#[tokio::test]
async fn response_at_the_size_limit_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 256]))
        .mount(&server)
        .await;

    let mut limits = local_limits();
    limits.max_response_size = 256;
    let engine = Engine::new(limits).unwrap();
    let result = engine.execute(&http_node(&server.uri())).await.unwrap();

    assert!(result.is_success());
    assert_eq!(result.final_output, json!("x".repeat(256)));
}

#[tokio::test]
async fn response_one_byte_over_the_limit_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 257]))
        .mount(&server)
        .await;

    let mut limits = local_limits();
    limits.max_response_size = 256;
    let engine = Engine::new(limits).unwrap();
    let result = engine.execute(&http_node(&server.uri())).await.unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    let failure = result.first_error().unwrap();
    assert_eq!(failure.class, ErrorClass::Limit);
    assert!(failure.message.contains("response too large"));
}

#[tokio::test]
async fn redirect_chains_respect_the_hop_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/b"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/c"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/c"))
        .respond_with(ResponseTemplate::new(200).set_body_string("end"))
        .mount(&server)
        .await;

    let mut limits = local_limits();
    limits.max_http_redirects = 2;
    let engine = Engine::new(limits).unwrap();
    let result = engine
        .execute(&http_node(&format!("{}/a", server.uri())))
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(result.final_output, json!("end"));

    let mut limits = local_limits();
    limits.max_http_redirects = 1;
    let engine = Engine::new(limits).unwrap();
    let result = engine
        .execute(&http_node(&format!("{}/a", server.uri())))
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert!(
        result
            .first_error()
            .unwrap()
            .message
            .contains("max_http_redirects")
    );
}

#[tokio::test]
async fn redirect_to_a_blocked_destination_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bounce"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "http://169.254.169.254/latest/meta-data/"),
        )
        .mount(&server)
        .await;

    let engine = Engine::new(local_limits()).unwrap();
    let result = engine
        .execute(&http_node(&format!("{}/bounce", server.uri())))
        .await
        .unwrap();

    let failure = result.first_error().unwrap();
    assert_eq!(failure.class, ErrorClass::Security);
    assert!(failure.message.contains("cloud metadata"));
}

#[tokio::test]
async fn http_call_cap_limits_a_chain_of_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let mut limits = local_limits();
    limits.max_http_calls_per_exec = 1;
    let engine = Engine::new(limits).unwrap();
    let result = engine
        .execute(&payload(json!({
            "nodes": [
                {"id": "first", "data": {"url": server.uri()}},
                {"id": "second", "data": {"url": server.uri()}}
            ],
            "edges": [{"source": "first", "target": "second"}]
        })))
        .await
        .unwrap();

    assert_eq!(result.status, ExecutionStatus::Failed);
    let failure = result.first_error().unwrap();
    assert_eq!(failure.class, ErrorClass::Limit);
    assert!(failure.message.contains("max_http_calls_per_exec"));
    assert_eq!(failure.node_id.as_deref(), Some("second"));
}

#[tokio::test]
async fn retry_node_recovers_through_the_engine() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let engine = Engine::new(local_limits()).unwrap();
    let result = engine
        .execute(&payload(json!({
            "nodes": [{"id": "r", "type": "retry", "data": {
                "url": server.uri(),
                "max_attempts": 3,
                "backoff_strategy": "fixed",
                "initial_delay": 0.01
            }}],
            "edges": []
        })))
        .await
        .unwrap();

    assert!(result.is_success());
    assert_eq!(result.final_output, json!("recovered"));
}
