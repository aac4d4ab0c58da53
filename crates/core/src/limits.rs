//! Engine configuration: quantitative limits and the three presets.
//!
//! Every limit is enforced cooperatively by the scheduler and the
//! executors; the presets encode the intended postures:
//!
//! - [`Limits::default`] -- zero-trust production: HTTP disabled, moderate
//!   caps.
//! - [`Limits::zero_trust`] -- stricter still: short deadline, tiny caps.
//! - [`Limits::development`] -- HTTP and localhost allowed, large caps.
//!
//! A limit of `0` means "reject everything" unless the field documents
//! otherwise (`max_concurrency`, where `0` means unlimited, and the
//! [`Limits::UNLIMITED_HTTP_CALLS`] sentinel).

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Backoff strategy for the retry executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Same delay before every attempt.
    Fixed,
    /// Delay grows by the initial delay each attempt.
    Linear,
    /// Delay multiplies each attempt.
    #[default]
    Exponential,
}

impl BackoffStrategy {
    /// Delay before retry attempt `attempt` (1-based), capped at `max_delay`.
    #[must_use]
    pub fn delay(self, attempt: u32, initial: Duration, max_delay: Duration, multiplier: f64) -> Duration {
        let base = initial.as_secs_f64();
        let secs = match self {
            Self::Fixed => base,
            Self::Linear => base * f64::from(attempt),
            Self::Exponential => base * multiplier.powi(attempt.saturating_sub(1) as i32),
        };
        Duration::from_secs_f64(secs).min(max_delay)
    }
}

/// Authentication for a named, pre-built HTTP client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum HttpAuth {
    /// No authentication.
    #[default]
    None,
    /// HTTP basic authentication.
    Basic {
        /// Username sent in the `Authorization` header.
        username: String,
        /// Password sent in the `Authorization` header.
        password: String,
    },
    /// Bearer-token authentication.
    Bearer {
        /// Token sent as `Authorization: Bearer <token>`.
        token: String,
    },
}

/// Configuration for one named HTTP client in the pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Name executors use to select this client (`client_name`).
    pub name: String,
    /// Authentication applied to every request.
    #[serde(default)]
    pub auth: HttpAuth,
    /// Headers added to every request.
    #[serde(default)]
    pub default_headers: HashMap<String, String>,
    /// Per-request timeout; falls back to `http_timeout` when absent.
    #[serde(default, with = "humantime_serde::option")]
    pub timeout: Option<Duration>,
}

/// Quantitative limits governing one engine instance.
///
/// Field groups follow the sections of the configuration surface:
/// execution, structure, counting, data size, HTTP/egress, parallelism,
/// and retry defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    // Execution
    /// Wall-clock budget for a whole execution.
    #[serde(with = "humantime_serde")]
    pub max_execution_time: Duration,
    /// Advisory per-node budget; exceeding it is logged, not fatal.
    #[serde(with = "humantime_serde")]
    pub max_node_execution_time: Duration,

    // Structure
    /// Maximum node count in a payload.
    pub max_nodes: usize,
    /// Maximum edge count in a payload.
    pub max_edges: usize,

    // Counting
    /// Cap on `count_node_execution` per execution.
    pub max_node_executions: u32,
    /// Cap on `count_http_call` per execution. `0` forbids HTTP calls;
    /// [`Limits::UNLIMITED_HTTP_CALLS`] lifts the cap.
    pub max_http_calls_per_exec: u32,
    /// Bound on internal loops (retry bodies, repeat counts).
    pub max_iterations: u32,
    /// Cap on the execution variable map.
    pub max_variables: usize,

    // Data size
    /// Byte length cap for any string stored into the context.
    pub max_string_length: usize,
    /// Element-count cap for any sequence, applied recursively.
    pub max_array_length: usize,
    /// Nesting-depth cap for mappings and sequences.
    pub max_context_depth: usize,
    /// Byte cap on one node's serialized configuration.
    pub max_input_size: usize,
    /// Byte cap on the whole serialized payload.
    pub max_payload_size: usize,
    /// Byte cap on an HTTP response body.
    pub max_response_size: usize,

    // HTTP / egress
    /// Master switch for outbound HTTP.
    pub allow_http: bool,
    /// When non-empty, hosts must suffix-match one entry (case-insensitive).
    pub allowed_domains: Vec<String>,
    /// Block RFC 1918 IPv4 and IPv6 ULA destinations.
    pub block_private_ips: bool,
    /// Block loopback destinations and the `localhost` hostname.
    pub block_localhost: bool,
    /// Block link-local destinations.
    pub block_link_local: bool,
    /// Block cloud metadata endpoints.
    pub block_cloud_metadata: bool,
    /// Per-request HTTP timeout.
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
    /// Maximum redirect hops per request; the egress guard re-runs per hop.
    pub max_http_redirects: u32,
    /// Named, pre-authenticated clients available to executors.
    pub http_clients: Vec<HttpClientConfig>,

    // Parallelism
    /// Concurrent workers per level; `0` means unlimited.
    pub max_concurrency: usize,
    /// When `false`, `execute` degrades to sequential order.
    pub enable_parallel: bool,

    // Retry defaults
    /// Attempts used by the retry executor when `max_attempts` is absent.
    pub default_max_attempts: u32,
    /// Backoff used by the retry executor when `backoff_strategy` is absent.
    pub default_backoff: BackoffStrategy,
}

impl Limits {
    /// Sentinel for `max_http_calls_per_exec` meaning "no cap".
    ///
    /// `0` deliberately means "forbidden" to stay consistent with the
    /// zero-trust posture.
    pub const UNLIMITED_HTTP_CALLS: u32 = u32::MAX;

    /// Even stricter posture than the default: short deadline, tiny caps,
    /// HTTP forbidden outright.
    #[must_use]
    pub fn zero_trust() -> Self {
        Self {
            max_execution_time: Duration::from_secs(10),
            max_node_execution_time: Duration::from_secs(2),
            max_nodes: 20,
            max_edges: 40,
            max_node_executions: 50,
            max_http_calls_per_exec: 0,
            max_iterations: 20,
            max_variables: 16,
            max_string_length: 16 * 1024,
            max_array_length: 256,
            max_context_depth: 8,
            max_input_size: 16 * 1024,
            max_payload_size: 64 * 1024,
            max_response_size: 64 * 1024,
            allow_http: false,
            allowed_domains: Vec::new(),
            block_private_ips: true,
            block_localhost: true,
            block_link_local: true,
            block_cloud_metadata: true,
            http_timeout: Duration::from_secs(3),
            max_http_redirects: 0,
            http_clients: Vec::new(),
            max_concurrency: 2,
            enable_parallel: true,
            default_max_attempts: 1,
            default_backoff: BackoffStrategy::Fixed,
        }
    }

    /// Relaxed posture for local development: HTTP and localhost allowed,
    /// large caps everywhere.
    #[must_use]
    pub fn development() -> Self {
        Self {
            max_execution_time: Duration::from_secs(600),
            max_node_execution_time: Duration::from_secs(120),
            max_nodes: 1000,
            max_edges: 4000,
            max_node_executions: 10_000,
            max_http_calls_per_exec: 1000,
            max_iterations: 10_000,
            max_variables: 1024,
            max_string_length: 16 * 1024 * 1024,
            max_array_length: 100_000,
            max_context_depth: 64,
            max_input_size: 4 * 1024 * 1024,
            max_payload_size: 32 * 1024 * 1024,
            max_response_size: 32 * 1024 * 1024,
            allow_http: true,
            allowed_domains: Vec::new(),
            block_private_ips: false,
            block_localhost: false,
            block_link_local: false,
            block_cloud_metadata: true,
            http_timeout: Duration::from_secs(60),
            max_http_redirects: 10,
            http_clients: Vec::new(),
            max_concurrency: 0,
            enable_parallel: true,
            default_max_attempts: 3,
            default_backoff: BackoffStrategy::Exponential,
        }
    }
}

impl Default for Limits {
    /// Zero-trust production posture: HTTP disabled, every block enabled,
    /// moderate caps.
    fn default() -> Self {
        Self {
            max_execution_time: Duration::from_secs(60),
            max_node_execution_time: Duration::from_secs(10),
            max_nodes: 100,
            max_edges: 400,
            max_node_executions: 1000,
            max_http_calls_per_exec: 0,
            max_iterations: 1000,
            max_variables: 128,
            max_string_length: 1024 * 1024,
            max_array_length: 10_000,
            max_context_depth: 16,
            max_input_size: 256 * 1024,
            max_payload_size: 1024 * 1024,
            max_response_size: 1024 * 1024,
            allow_http: false,
            allowed_domains: Vec::new(),
            block_private_ips: true,
            block_localhost: true,
            block_link_local: true,
            block_cloud_metadata: true,
            http_timeout: Duration::from_secs(10),
            max_http_redirects: 3,
            http_clients: Vec::new(),
            max_concurrency: 8,
            enable_parallel: true,
            default_max_attempts: 3,
            default_backoff: BackoffStrategy::Exponential,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_zero_trust_for_http() {
        let limits = Limits::default();
        assert!(!limits.allow_http);
        assert_eq!(limits.max_http_calls_per_exec, 0);
        assert!(limits.block_localhost);
        assert!(limits.block_private_ips);
        assert!(limits.block_link_local);
        assert!(limits.block_cloud_metadata);
    }

    #[test]
    fn zero_trust_is_stricter_than_default() {
        let default = Limits::default();
        let zt = Limits::zero_trust();
        assert!(zt.max_execution_time < default.max_execution_time);
        assert!(zt.max_nodes < default.max_nodes);
        assert!(zt.max_string_length < default.max_string_length);
        assert!(!zt.allow_http);
    }

    #[test]
    fn development_allows_http_and_localhost() {
        let dev = Limits::development();
        assert!(dev.allow_http);
        assert!(!dev.block_localhost);
        assert!(!dev.block_private_ips);
        // Metadata endpoints stay blocked even in development.
        assert!(dev.block_cloud_metadata);
    }

    #[test]
    fn backoff_fixed_is_constant() {
        let d = |attempt| {
            BackoffStrategy::Fixed.delay(
                attempt,
                Duration::from_secs(2),
                Duration::from_secs(60),
                2.0,
            )
        };
        assert_eq!(d(1), Duration::from_secs(2));
        assert_eq!(d(5), Duration::from_secs(2));
    }

    #[test]
    fn backoff_linear_grows_by_initial() {
        let d = |attempt| {
            BackoffStrategy::Linear.delay(
                attempt,
                Duration::from_secs(2),
                Duration::from_secs(60),
                2.0,
            )
        };
        assert_eq!(d(1), Duration::from_secs(2));
        assert_eq!(d(3), Duration::from_secs(6));
    }

    #[test]
    fn backoff_exponential_multiplies_and_caps() {
        let d = |attempt| {
            BackoffStrategy::Exponential.delay(
                attempt,
                Duration::from_secs(1),
                Duration::from_secs(8),
                2.0,
            )
        };
        assert_eq!(d(1), Duration::from_secs(1));
        assert_eq!(d(2), Duration::from_secs(2));
        assert_eq!(d(4), Duration::from_secs(8));
        // Capped at max_delay.
        assert_eq!(d(10), Duration::from_secs(8));
    }

    #[test]
    fn limits_serde_roundtrip() {
        let limits = Limits::development();
        let json = serde_json::to_string(&limits).unwrap();
        let back: Limits = serde_json::from_str(&json).unwrap();
        assert_eq!(back.max_nodes, limits.max_nodes);
        assert_eq!(back.http_timeout, limits.http_timeout);
        assert_eq!(back.default_backoff, limits.default_backoff);
    }

    #[test]
    fn limits_deserialize_fills_defaults() {
        let limits: Limits = serde_json::from_str(r#"{"max_nodes": 7}"#).unwrap();
        assert_eq!(limits.max_nodes, 7);
        assert_eq!(limits.max_edges, Limits::default().max_edges);
    }

    #[test]
    fn http_auth_serde_tagged() {
        let auth = HttpAuth::Bearer {
            token: "t0ken".into(),
        };
        let json = serde_json::to_value(&auth).unwrap();
        assert_eq!(json["type"], "bearer");
        let back: HttpAuth = serde_json::from_value(json).unwrap();
        assert_eq!(back, auth);
    }
}
