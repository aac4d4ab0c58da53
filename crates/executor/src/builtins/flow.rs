//! Flow-control nodes: delay, retry, repeat.
//!
//! These loop or sleep internally, bounded by the execution limits; they
//! never re-enter the scheduler, so the state graph stays acyclic.

use std::time::Duration;

use async_trait::async_trait;
use lattice_core::{BackoffStrategy, LimitError};
use lattice_workflow::{Node, NodeKind};
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::error::ExecutorError;
use crate::executor::Executor;

/// Sleeps `timeout` seconds, then passes its input through.
///
/// The sleep is cancellation-aware: arming the shared token wakes the
/// node immediately.
pub struct DelayExecutor;

#[async_trait]
impl Executor for DelayExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Delay
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        match node.data.num_field("timeout") {
            None => Err(ExecutorError::Config(
                "delay node requires a numeric `timeout` field (seconds)".into(),
            )),
            Some(secs) if secs < 0.0 => {
                Err(ExecutorError::Config("delay `timeout` is negative".into()))
            }
            Some(_) => Ok(()),
        }
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let secs = node
            .data
            .num_field("timeout")
            .ok_or_else(|| ExecutorError::Config("delay node requires a numeric `timeout` field".into()))?;

        tokio::select! {
            () = tokio::time::sleep(Duration::from_secs_f64(secs)) => {}
            () = ctx.cancellation.cancelled() => return Err(ExecutorError::Cancelled),
        }
        ctx.check_interrupted()?;
        Ok(ctx.first_input(&node.id)?.unwrap_or(Value::Null))
    }
}

/// Retried HTTP fetch with backoff.
///
/// Re-runs the guarded fetch of `url` up to `max_attempts` times,
/// sleeping per `backoff_strategy` between attempts. `retry_on_errors`
/// restricts which failures are retried (substring match on the error
/// text); `fallback_value` turns final exhaustion into a success.
pub struct RetryExecutor;

#[async_trait]
impl Executor for RetryExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Retry
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        if node.data.str_field("url").is_none_or(str::is_empty) {
            return Err(ExecutorError::Config(
                "retry node requires a non-empty `url` field".into(),
            ));
        }
        if let Some(strategy) = node.data.str_field("backoff_strategy") {
            parse_strategy(strategy)?;
        }
        if node.data.u32_field("max_attempts") == Some(0) {
            return Err(ExecutorError::Config("retry `max_attempts` is zero".into()));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let url = node
            .data
            .str_field("url")
            .ok_or_else(|| ExecutorError::Config("retry node requires a `url` field".into()))?;
        let client_name = node.data.str_field("client_name");
        let pool = ctx
            .http()
            .ok_or_else(|| ExecutorError::Execution("engine was built without HTTP support".into()))?;

        // Policy rejection is final; attempts would all fail the same way.
        pool.policy().check(url).await.map_err(ExecutorError::from)?;

        let limits = ctx.limits();
        let requested = node
            .data
            .u32_field("max_attempts")
            .unwrap_or(limits.default_max_attempts)
            .max(1);
        // Same bound as the repeat node: `max_iterations = 0` forbids
        // any attempt at all.
        if limits.max_iterations == 0 {
            return Err(ExecutorError::Limit(LimitError::Iterations {
                observed: requested,
                limit: 0,
            }));
        }
        let attempts = requested.min(limits.max_iterations);
        let strategy = match node.data.str_field("backoff_strategy") {
            Some(tag) => parse_strategy(tag)?,
            None => limits.default_backoff,
        };
        let initial_delay = Duration::from_secs_f64(node.data.num_field("initial_delay").unwrap_or(1.0));
        let max_delay = Duration::from_secs_f64(node.data.num_field("max_delay").unwrap_or(30.0));
        let multiplier = node.data.num_field("multiplier").unwrap_or(2.0);
        let retry_on: Vec<String> = node
            .data
            .str_list_field("retry_on_errors")
            .map(|list| list.into_iter().map(str::to_owned).collect())
            .unwrap_or_default();

        let mut last_error: Option<ExecutorError> = None;
        for attempt in 1..=attempts {
            ctx.check_interrupted()?;
            ctx.count_http_call()?;

            let outcome = tokio::select! {
                result = pool.fetch(url, client_name) => result,
                () = ctx.cancellation.cancelled() => return Err(ExecutorError::Cancelled),
            };

            let error = match outcome {
                Ok(response) if response.is_success() => return Ok(response.into_value()),
                Ok(response) => ExecutorError::Execution(format!(
                    "http request returned status {}",
                    response.status
                )),
                Err(e) => ExecutorError::from(e),
            };

            let retryable = retry_on.is_empty()
                || retry_on.iter().any(|needle| error.to_string().contains(needle));
            tracing::debug!(
                node_id = %node.id,
                attempt,
                attempts,
                retryable,
                error = %error,
                "retry attempt failed"
            );
            last_error = Some(error);
            if !retryable || attempt == attempts {
                break;
            }

            let delay = strategy.delay(attempt, initial_delay, max_delay, multiplier);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = ctx.cancellation.cancelled() => return Err(ExecutorError::Cancelled),
            }
        }

        if let Some(fallback) = node.data.get("fallback_value") {
            return Ok(fallback.clone());
        }
        Err(last_error.unwrap_or_else(|| ExecutorError::Execution("retry produced no attempts".into())))
    }
}

fn parse_strategy(tag: &str) -> Result<BackoffStrategy, ExecutorError> {
    match tag {
        "fixed" => Ok(BackoffStrategy::Fixed),
        "linear" => Ok(BackoffStrategy::Linear),
        "exponential" => Ok(BackoffStrategy::Exponential),
        other => Err(ExecutorError::Config(format!(
            "unsupported backoff strategy `{other}`"
        ))),
    }
}

/// Emits an array of `repeat_n` copies of the input.
pub struct RepeatExecutor;

#[async_trait]
impl Executor for RepeatExecutor {
    fn kind(&self) -> NodeKind {
        NodeKind::Repeat
    }

    fn validate(&self, node: &Node) -> Result<(), ExecutorError> {
        if node.data.u32_field("repeat_n").is_none() {
            return Err(ExecutorError::Config(
                "repeat node requires a numeric `repeat_n` field".into(),
            ));
        }
        Ok(())
    }

    async fn execute(&self, ctx: &ExecutionContext, node: &Node) -> Result<Value, ExecutorError> {
        ctx.count_node_execution()?;
        let n = node
            .data
            .u32_field("repeat_n")
            .ok_or_else(|| ExecutorError::Config("repeat node requires a numeric `repeat_n` field".into()))?;
        let limit = ctx.limits().max_iterations;
        if n > limit {
            return Err(ExecutorError::Limit(LimitError::Iterations {
                observed: n,
                limit,
            }));
        }
        let item = match ctx.first_input(&node.id)? {
            Some(input) => input,
            None => node.data.get("value").cloned().unwrap_or(Value::Null),
        };
        Ok(Value::Array(vec![item; n as usize]))
    }
}
