//! URL validation: the egress policy itself.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use lattice_core::Limits;
use tokio::net::lookup_host;
use url::Url;

use crate::error::{BlockedCategory, EgressError};

/// Hostnames that reach cloud metadata services without a link-local IP.
const METADATA_HOSTS: [&str; 2] = ["metadata.google.internal", "metadata.azure.com"];

/// AWS IMDS endpoints (IPv4 and IPv6).
const METADATA_V4: Ipv4Addr = Ipv4Addr::new(169, 254, 169, 254);
const METADATA_V6: Ipv6Addr = Ipv6Addr::new(0xfd00, 0x0ec2, 0, 0, 0, 0, 0, 0x254);

/// The zero-trust URL validation policy.
///
/// Rules run in a fixed order on every outgoing URL and every redirect
/// target: parse + scheme + host, the `allow_http` master switch, address
/// category blocks against every resolved IP, then the domain
/// allow-list. DNS failure counts as blocked.
#[derive(Debug, Clone)]
pub struct EgressPolicy {
    allow_http: bool,
    /// Lowercased allow-list entries; empty means "any domain".
    allowed_domains: Vec<String>,
    block_private_ips: bool,
    block_localhost: bool,
    block_link_local: bool,
    block_cloud_metadata: bool,
}

impl EgressPolicy {
    /// Extract the egress posture from `limits`.
    #[must_use]
    pub fn from_limits(limits: &Limits) -> Self {
        Self {
            allow_http: limits.allow_http,
            allowed_domains: limits
                .allowed_domains
                .iter()
                .map(|d| d.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            block_private_ips: limits.block_private_ips,
            block_localhost: limits.block_localhost,
            block_link_local: limits.block_link_local,
            block_cloud_metadata: limits.block_cloud_metadata,
        }
    }

    /// Validate `raw` and return the parsed URL on success.
    ///
    /// Resolves the hostname and checks every returned address; a single
    /// blocked address rejects the whole URL.
    pub async fn check(&self, raw: &str) -> Result<Url, EgressError> {
        let url = Url::parse(raw).map_err(|e| EgressError::InvalidUrl {
            url: raw.to_owned(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(EgressError::UnsupportedScheme {
                    scheme: other.to_owned(),
                });
            }
        }
        let host = url.host_str().ok_or(EgressError::EmptyHost)?.to_owned();

        if !self.allow_http {
            return Err(EgressError::HttpDisabled);
        }

        let lowered = host.to_ascii_lowercase();
        if self.block_cloud_metadata && METADATA_HOSTS.contains(&lowered.as_str()) {
            return Err(EgressError::BlockedAddress {
                host,
                category: BlockedCategory::CloudMetadata,
            });
        }
        if self.block_localhost && lowered == "localhost" {
            return Err(EgressError::BlockedAddress {
                host,
                category: BlockedCategory::Loopback,
            });
        }

        for ip in self.resolve(&url, &host).await? {
            if let Some(category) = self.blocked_category(ip) {
                tracing::warn!(%host, %ip, %category, "egress guard rejected destination");
                return Err(EgressError::BlockedAddress { host, category });
            }
        }

        if !self.domain_allowed(&lowered) {
            return Err(EgressError::DomainNotAllowed { host });
        }

        Ok(url)
    }

    /// Resolve `host` to all of its addresses. Literal IPs skip DNS.
    async fn resolve(&self, url: &Url, host: &str) -> Result<Vec<IpAddr>, EgressError> {
        if let Ok(ip) = host.trim_matches(['[', ']']).parse::<IpAddr>() {
            return Ok(vec![ip]);
        }
        let port = url.port_or_known_default().unwrap_or(443);
        let addrs: Vec<IpAddr> = lookup_host((host, port))
            .await
            .map_err(|_| EgressError::ResolutionFailed {
                host: host.to_owned(),
            })?
            .map(|sock| sock.ip())
            .collect();
        if addrs.is_empty() {
            return Err(EgressError::ResolutionFailed {
                host: host.to_owned(),
            });
        }
        Ok(addrs)
    }

    /// The first enabled category `ip` falls into.
    ///
    /// Metadata is checked before link-local so `169.254.169.254` reports
    /// as metadata when both flags are on.
    fn blocked_category(&self, ip: IpAddr) -> Option<BlockedCategory> {
        if self.block_cloud_metadata && is_metadata(ip) {
            return Some(BlockedCategory::CloudMetadata);
        }
        if self.block_localhost && is_loopback_like(ip) {
            return Some(BlockedCategory::Loopback);
        }
        if self.block_private_ips && is_private(ip) {
            return Some(BlockedCategory::PrivateRange);
        }
        if self.block_link_local && is_link_local(ip) {
            return Some(BlockedCategory::LinkLocal);
        }
        None
    }

    /// Suffix match, case-insensitive: `host` equals an entry or ends with
    /// `.<entry>`. An empty allow-list admits any domain.
    fn domain_allowed(&self, lowered_host: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }
        self.allowed_domains.iter().any(|domain| {
            lowered_host == domain
                || lowered_host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

fn is_metadata(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4 == METADATA_V4,
        IpAddr::V6(v6) => v6 == METADATA_V6,
    }
}

fn is_loopback_like(ip: IpAddr) -> bool {
    ip.is_loopback() || ip.is_unspecified()
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private(),
        // Unique-local: fc00::/7.
        IpAddr::V6(v6) => (v6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

fn is_link_local(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_link_local(),
        // fe80::/10.
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_policy() -> EgressPolicy {
        EgressPolicy {
            allow_http: true,
            allowed_domains: Vec::new(),
            block_private_ips: true,
            block_localhost: true,
            block_link_local: true,
            block_cloud_metadata: true,
        }
    }

    #[tokio::test]
    async fn rejects_unparseable_url() {
        let err = open_policy().check("http://[::broken").await.unwrap_err();
        assert!(matches!(err, EgressError::InvalidUrl { .. }));
    }

    #[tokio::test]
    async fn rejects_non_http_schemes() {
        let err = open_policy().check("ftp://example.com/file").await.unwrap_err();
        assert!(matches!(err, EgressError::UnsupportedScheme { .. }));

        let err = open_policy().check("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, EgressError::UnsupportedScheme { .. }));
    }

    #[tokio::test]
    async fn http_disabled_wins_over_everything_after_parsing() {
        let policy = EgressPolicy {
            allow_http: false,
            ..open_policy()
        };
        let err = policy.check("https://example.com/").await.unwrap_err();
        assert!(matches!(err, EgressError::HttpDisabled));
    }

    #[tokio::test]
    async fn blocks_loopback_and_unspecified() {
        let policy = open_policy();
        for url in [
            "http://127.0.0.1:8080/x",
            "http://127.1.2.3/",
            "http://[::1]/",
            "http://0.0.0.0/",
            "http://localhost:3000/",
        ] {
            let err = policy.check(url).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    EgressError::BlockedAddress {
                        category: BlockedCategory::Loopback,
                        ..
                    }
                ),
                "expected loopback block for {url}, got {err}"
            );
        }
    }

    #[tokio::test]
    async fn loopback_allowed_when_flag_off() {
        let policy = EgressPolicy {
            block_localhost: false,
            ..open_policy()
        };
        assert!(policy.check("http://127.0.0.1:8080/x").await.is_ok());
    }

    #[tokio::test]
    async fn blocks_private_ranges() {
        let policy = open_policy();
        for url in ["http://10.0.0.1/", "http://172.16.5.5/", "http://192.168.1.1/", "http://[fc00::1]/"] {
            let err = policy.check(url).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    EgressError::BlockedAddress {
                        category: BlockedCategory::PrivateRange,
                        ..
                    }
                ),
                "expected private block for {url}, got {err}"
            );
        }
    }

    #[tokio::test]
    async fn blocks_link_local() {
        let policy = open_policy();
        for url in ["http://169.254.0.99/", "http://[fe80::1]/"] {
            let err = policy.check(url).await.unwrap_err();
            assert!(matches!(
                err,
                EgressError::BlockedAddress {
                    category: BlockedCategory::LinkLocal,
                    ..
                }
            ));
        }
    }

    #[tokio::test]
    async fn metadata_reported_as_metadata_not_link_local() {
        let policy = open_policy();
        for url in [
            "http://169.254.169.254/latest/meta-data/",
            "http://[fd00:ec2::254]/",
            "http://metadata.google.internal/computeMetadata/v1/",
            "https://metadata.azure.com/metadata/instance",
        ] {
            let err = policy.check(url).await.unwrap_err();
            assert!(
                matches!(
                    err,
                    EgressError::BlockedAddress {
                        category: BlockedCategory::CloudMetadata,
                        ..
                    }
                ),
                "expected metadata block for {url}, got {err}"
            );
        }
    }

    #[tokio::test]
    async fn category_flags_gate_independently() {
        // Metadata flag off, link-local flag on: IMDS reports link-local.
        let policy = EgressPolicy {
            block_cloud_metadata: false,
            ..open_policy()
        };
        let err = policy.check("http://169.254.169.254/").await.unwrap_err();
        assert!(matches!(
            err,
            EgressError::BlockedAddress {
                category: BlockedCategory::LinkLocal,
                ..
            }
        ));
    }

    #[test]
    fn domain_allow_list_is_suffix_based() {
        let policy = EgressPolicy {
            allowed_domains: vec!["example.com".into()],
            ..open_policy()
        };
        assert!(policy.domain_allowed("example.com"));
        assert!(policy.domain_allowed("api.example.com"));
        // Suffix matching is label-aware: no partial-label bypass.
        assert!(!policy.domain_allowed("evilexample.com"));
        assert!(!policy.domain_allowed("example.com.evil.net"));
    }

    #[test]
    fn domain_allow_list_case_insensitive() {
        let policy = EgressPolicy {
            allowed_domains: vec!["Example.COM".into()],
            ..open_policy()
        };
        // Hosts are lowercased before the check.
        assert!(policy.domain_allowed("api.example.com"));
    }

    #[tokio::test]
    async fn domain_not_allowed_error_for_literal_ip() {
        let policy = EgressPolicy {
            allowed_domains: vec!["example.com".into()],
            block_localhost: false,
            ..open_policy()
        };
        let err = policy.check("http://127.0.0.1/").await.unwrap_err();
        assert!(matches!(err, EgressError::DomainNotAllowed { .. }));
    }
}
