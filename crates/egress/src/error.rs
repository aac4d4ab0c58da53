//! Egress failures.

use lattice_core::ErrorClass;

/// Category of a blocked destination address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedCategory {
    /// Loopback addresses, `0.0.0.0`, or the `localhost` hostname.
    Loopback,
    /// RFC 1918 IPv4 ranges or IPv6 unique-local addresses.
    PrivateRange,
    /// `169.254/16` or `fe80::/10`.
    LinkLocal,
    /// Cloud metadata endpoints.
    CloudMetadata,
}

impl std::fmt::Display for BlockedCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Loopback => "loopback",
            Self::PrivateRange => "private range",
            Self::LinkLocal => "link-local",
            Self::CloudMetadata => "cloud metadata",
        };
        f.write_str(s)
    }
}

/// Failure raised by the egress guard or the HTTP client.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum EgressError {
    /// The URL does not parse.
    #[error("invalid url `{url}`: {reason}")]
    InvalidUrl {
        /// The offending URL text.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Scheme outside the `http`/`https` allow-list.
    #[error("unsupported scheme `{scheme}`: only http and https are allowed")]
    UnsupportedScheme {
        /// The rejected scheme.
        scheme: String,
    },

    /// The URL carries no hostname.
    #[error("url has no hostname")]
    EmptyHost,

    /// Outbound HTTP is switched off.
    #[error("outbound HTTP is disabled; enable the allow_http configuration flag to permit it")]
    HttpDisabled,

    /// The destination resolved into a blocked address category.
    #[error("destination `{host}` is blocked: {category} address")]
    BlockedAddress {
        /// Hostname that was checked.
        host: String,
        /// Category that matched.
        category: BlockedCategory,
    },

    /// DNS resolution failed; treated as blocked.
    #[error("destination `{host}` could not be resolved; unresolvable hosts are blocked")]
    ResolutionFailed {
        /// Hostname that failed to resolve.
        host: String,
    },

    /// Host did not match the domain allow-list.
    #[error(
        "domain `{host}` is not allow-listed (hosts must equal an allowed \
         domain or end with `.<domain>`, case-insensitive)"
    )]
    DomainNotAllowed {
        /// Hostname that was checked.
        host: String,
    },

    /// Redirect chain exceeded `max_http_redirects`.
    #[error("redirect chain exceeds max_http_redirects {limit}")]
    TooManyRedirects {
        /// Configured hop limit.
        limit: u32,
    },

    /// A redirect response carried no usable `Location` header.
    #[error("redirect response without a Location header")]
    MissingRedirectLocation,

    /// `client_name` does not match a configured client.
    #[error("unknown HTTP client `{name}`")]
    UnknownClient {
        /// The requested client name.
        name: String,
    },

    /// The response body exceeded `max_response_size`.
    #[error("response too large: body exceeds max_response_size {limit} bytes")]
    ResponseTooLarge {
        /// Configured byte bound.
        limit: usize,
    },

    /// Transport-level failure (connect, timeout, TLS, read).
    #[error("http transport error: {0}")]
    Transport(String),

    /// Client construction failed (bad header name, TLS setup).
    #[error("http client build error: {0}")]
    Build(String),
}

impl EgressError {
    /// Taxonomy class of this failure.
    ///
    /// Policy rejections are security errors, the body bound is a resource
    /// limit, and transport problems are plain execution failures.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ResponseTooLarge { .. } => ErrorClass::Limit,
            Self::Transport(_) | Self::MissingRedirectLocation => ErrorClass::Execution,
            Self::UnknownClient { .. } | Self::Build(_) => ErrorClass::Validation,
            _ => ErrorClass::Security,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_disabled_names_the_flag() {
        assert!(EgressError::HttpDisabled.to_string().contains("allow_http"));
    }

    #[test]
    fn blocked_address_names_the_category() {
        let err = EgressError::BlockedAddress {
            host: "169.254.169.254".into(),
            category: BlockedCategory::CloudMetadata,
        };
        assert!(err.to_string().contains("cloud metadata"));
    }

    #[test]
    fn domain_error_documents_the_matching_policy() {
        let err = EgressError::DomainNotAllowed {
            host: "evil.test".into(),
        };
        assert!(err.to_string().contains("end with"));
    }

    #[test]
    fn classes() {
        assert_eq!(EgressError::HttpDisabled.class(), ErrorClass::Security);
        assert_eq!(
            EgressError::ResponseTooLarge { limit: 1 }.class(),
            ErrorClass::Limit
        );
        assert_eq!(
            EgressError::Transport("reset".into()).class(),
            ErrorClass::Execution
        );
        assert_eq!(
            EgressError::UnknownClient { name: "x".into() }.class(),
            ErrorClass::Validation
        );
    }
}
