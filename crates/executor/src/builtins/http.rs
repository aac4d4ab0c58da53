//! Guarded HTTP fetch node.

use async_trait::async_trait;
use lattice_workflow::{Node, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::Executor;

/// GETs the configured `url` through the egress guard and the shared
/// client pool. `client_name` selects a pre-authenticated client.
pub struct HttpExecutor;

#[async_trait]
impl Executor for HttpExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Http
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        match node.data.str_field("url") {
            None => Err(ExecutorError::Config(
                "http node requires a string `url` field".into(),
            )),
            Some(url) if url.is_empty() => {
                Err(ExecutorError::Config("http node `url` is empty".into()))
            }
            Some(_) => Ok(()),
        }
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        ctx.check_interrupted()?;

        let url = node
            .data
            .str_field("url")
            .ok_or_else(|| ExecutorError::Config("http node requires a string `url` field".into()))?;
        let client_name = node.data.str_field("client_name");
        let pool = ctx
            .http()
            .ok_or_else(|| ExecutorError::Execution("engine was built without HTTP support".into()))?;

        // Guard first: a rejected destination never issues a request, so
        // it does not count against the HTTP budget either.
        pool.policy().check(url).await.map_err(ExecutorError::from)?;
        ctx.count_http_call()?;

        tracing::debug!(node_id = %node.id, %url, "http node fetching");
        let response = tokio::select! {
            result = pool.fetch(url, client_name) => result?,
            () = ctx.cancellation.cancelled() => return Err(ExecutorError::Cancelled),
        };

        if !response.is_success() {
            return Err(ExecutorError::Execution(format!(
                "http request returned status {}",
                response.status
            )));
        }
        Ok(response.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::testkit::node;
    use crate::context::ExecutionContext;
    use lattice_core::{LimitError, Limits};
    use lattice_egress::ClientPool;
    use lattice_workflow::{DependencyGraph, WorkflowPayload};
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http_ctx(limits: Limits) -> ExecutionContext {
        let payload: WorkflowPayload = serde_json::from_value(
            json!({"nodes": [{"id": "h", "type": "http", "data": {"url": "http://x/"}}], "edges": []}),
        )
        .unwrap();
        let graph = Arc::new(DependencyGraph::from_payload(&payload, &limits).unwrap());
        let pool = Arc::new(ClientPool::new(&limits).unwrap());
        ExecutionContext::new(Arc::new(limits), graph, Some(pool))
    }

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
    async fn fetches_json_through_the_pool() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_string(r#"{"ok": true}"#),
            )
            .mount(&server)
            .await;

        let ctx = http_ctx(local_limits());
        let n = node(json!({"id": "h", "data": {"url": server.uri()}}));
        let out = HttpExecutor.execute(&ctx, &n).await.unwrap();
        assert_eq!(out, json!({"ok": true}));
        assert_eq!(ctx.http_call_count(), 1);
    }

    #[tokio::test]
    async fn call_cap_of_zero_forbids_http_outright() {
        // Guard checks pass here; the zero call cap still rejects before
        // any transport activity.
        let ctx = http_ctx(Limits {
            allow_http: true,
            block_localhost: false,
            block_private_ips: false,
            block_link_local: false,
            ..Limits::default()
        });
        let n = node(json!({"id": "h", "data": {"url": "http://127.0.0.1:1/"}}));
        let err = HttpExecutor.execute(&ctx, &n).await.unwrap_err();
        assert!(matches!(
            err,
            ExecutorError::Limit(LimitError::HttpCalls { limit: 0, .. })
        ));
    }

    #[tokio::test]
    async fn http_disabled_preset_names_the_flag_and_counts_nothing() {
        let ctx = http_ctx(Limits::default());
        let n = node(json!({"id": "h", "data": {"url": "http://127.0.0.1:8080/x"}}));
        let err = HttpExecutor.execute(&ctx, &n).await.unwrap_err();
        assert_eq!(err.class(), lattice_core::ErrorClass::Security);
        assert!(err.to_string().contains("allow_http"));
        // Guard rejections never consume HTTP budget.
        assert_eq!(ctx.http_call_count(), 0);
    }

    #[tokio::test]
    async fn guard_rejection_surfaces_as_security() {
        let ctx = http_ctx(Limits {
            allow_http: true,
            max_http_calls_per_exec: 10,
            ..Limits::default()
        });
        let n = node(json!({"id": "h", "data": {"url": "http://127.0.0.1:8080/x"}}));
        let err = HttpExecutor.execute(&ctx, &n).await.unwrap_err();
        assert_eq!(err.class(), lattice_core::ErrorClass::Security);
    }

    #[tokio::test]
    async fn non_success_status_is_an_execution_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let ctx = http_ctx(local_limits());
        let n = node(json!({"id": "h", "data": {"url": server.uri()}}));
        let err = HttpExecutor.execute(&ctx, &n).await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }

    #[test]
    fn validate_requires_a_url() {
        let n = node(json!({"id": "h", "data": {}}));
        assert!(HttpExecutor.validate(&n).is_err());
        let n = node(json!({"id": "h", "data": {"url": ""}}));
        assert!(HttpExecutor.validate(&n).is_err());
        let n = node(json!({"id": "h", "data": {"url": "https://example.com"}}));
        assert!(HttpExecutor.validate(&n).is_ok());
    }
}
