//! Engine-lifetime HTTP clients with guarded fetches.
//!
//! One keep-alive client is shared by every execution; named clients add
//! pre-configured authentication and default headers. Automatic redirects
//! are disabled at the transport: the pool follows them manually so the
//! egress policy re-runs on every hop.

use std::collections::HashMap;
use std::time::Duration;

use lattice_core::{HttpAuth, HttpClientConfig, Limits};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION};
use reqwest::redirect::Policy;
use url::Url;

use crate::error::EgressError;
use crate::policy::EgressPolicy;

/// Idle keep-alive connections retained per host.
const POOL_IDLE_PER_HOST: usize = 8;

/// A fetched response with its body fully read (within bounds).
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Final URL after any redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response headers (string-valued ones only).
    pub headers: HashMap<String, String>,
    /// Body bytes, at most `max_response_size` long.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// True for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as a JSON value when the content type says JSON and the body
    /// parses; otherwise the body as a (lossy) string.
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        let is_json = self
            .headers
            .get("content-type")
            .is_some_and(|ct| ct.contains("application/json"));
        if is_json {
            if let Ok(value) = serde_json::from_slice(&self.body) {
                return value;
            }
        }
        serde_json::Value::String(String::from_utf8_lossy(&self.body).into_owned())
    }
}

struct PooledClient {
    client: reqwest::Client,
    auth: HttpAuth,
    timeout: Duration,
}

/// Shared transport plus the named, pre-authenticated clients.
pub struct ClientPool {
    policy: EgressPolicy,
    default: PooledClient,
    named: HashMap<String, PooledClient>,
    max_redirects: u32,
    max_response_size: usize,
}

impl ClientPool {
    /// Build the pool from the engine limits. Named clients come from
    /// `limits.http_clients`.
    pub fn new(limits: &Limits) -> Result<Self, EgressError> {
        let default = PooledClient {
            client: build_client(limits.http_timeout, None)?,
            auth: HttpAuth::None,
            timeout: limits.http_timeout,
        };

        let mut named = HashMap::with_capacity(limits.http_clients.len());
        for config in &limits.http_clients {
            named.insert(config.name.clone(), build_named(config, limits)?);
        }

        Ok(Self {
            policy: EgressPolicy::from_limits(limits),
            default,
            named,
            max_redirects: limits.max_http_redirects,
            max_response_size: limits.max_response_size,
        })
    }

    /// The policy applied to every fetch.
    #[must_use]
    pub fn policy(&self) -> &EgressPolicy {
        &self.policy
    }

    /// GET `raw_url` through the guard, following redirects manually.
    ///
    /// `client_name` selects a named client; `None` uses the default. The
    /// guard validates the initial URL and every redirect target; the body
    /// is read through the size-bounded reader.
    pub async fn fetch(
        &self,
        raw_url: &str,
        client_name: Option<&str>,
    ) -> Result<HttpResponse, EgressError> {
        let pooled = match client_name {
            None => &self.default,
            Some(name) => self.named.get(name).ok_or_else(|| EgressError::UnknownClient {
                name: name.to_owned(),
            })?,
        };

        let mut url = self.policy.check(raw_url).await?;
        let mut hops = 0u32;

        loop {
            let mut request = pooled.client.get(url.clone()).timeout(pooled.timeout);
            request = match &pooled.auth {
                HttpAuth::None => request,
                HttpAuth::Basic { username, password } => {
                    request.basic_auth(username, Some(password))
                }
                HttpAuth::Bearer { token } => request.bearer_auth(token),
            };

            let response = request
                .send()
                .await
                .map_err(|e| EgressError::Transport(e.to_string()))?;

            if response.status().is_redirection() {
                hops += 1;
                if hops > self.max_redirects {
                    return Err(EgressError::TooManyRedirects {
                        limit: self.max_redirects,
                    });
                }
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or(EgressError::MissingRedirectLocation)?;
                let target = url.join(location).map_err(|e| EgressError::InvalidUrl {
                    url: location.to_owned(),
                    reason: e.to_string(),
                })?;
                tracing::debug!(from = %url, to = %target, hop = hops, "following redirect");
                url = self.policy.check(target.as_str()).await?;
                continue;
            }

            return self.read_bounded(url, response).await;
        }
    }

    /// Drain the body through the size bound.
    ///
    /// Exactly `max_response_size` bytes pass; one more byte fails with
    /// "response too large" rather than returning truncated data.
    async fn read_bounded(
        &self,
        url: Url,
        mut response: reqwest::Response,
    ) -> Result<HttpResponse, EgressError> {
        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_owned()))
            })
            .collect();

        let mut body: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| EgressError::Transport(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_response_size {
                return Err(EgressError::ResponseTooLarge {
                    limit: self.max_response_size,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            url: url.to_string(),
            status,
            headers,
            body,
        })
    }
}

impl std::fmt::Debug for ClientPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPool")
            .field("named", &self.named.keys().collect::<Vec<_>>())
            .field("max_redirects", &self.max_redirects)
            .field("max_response_size", &self.max_response_size)
            .finish_non_exhaustive()
    }
}

fn build_client(timeout: Duration, headers: Option<HeaderMap>) -> Result<reqwest::Client, EgressError> {
    let mut builder = reqwest::Client::builder()
        .redirect(Policy::none())
        .timeout(timeout)
        .pool_max_idle_per_host(POOL_IDLE_PER_HOST);
    if let Some(headers) = headers {
        builder = builder.default_headers(headers);
    }
    builder.build().map_err(|e| EgressError::Build(e.to_string()))
}

fn build_named(config: &HttpClientConfig, limits: &Limits) -> Result<PooledClient, EgressError> {
    let mut headers = HeaderMap::with_capacity(config.default_headers.len());
    for (name, value) in &config.default_headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| EgressError::Build(format!("header `{name}`: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| EgressError::Build(format!("header value for `{name:?}`: {e}")))?;
        headers.insert(name, value);
    }
    let timeout = config.timeout.unwrap_or(limits.http_timeout);
    Ok(PooledClient {
        client: build_client(timeout, Some(headers))?,
        auth: config.auth.clone(),
        timeout,
    })
}
