//! URL validation for SSRF protection.
//!
//! Candidate URLs from search results are validated twice: a cheap
//! synchronous pass when filtering candidates (scheme, host, CIDR,
//! domain blocklist), and a DNS-resolving pass at the fetch boundary
//! that re-checks the resolved addresses. The second pass catches
//! DNS rebinding attacks where a hostname resolves to an internal IP.

use async_trait::async_trait;
use std::collections::HashSet;
use std::net::IpAddr;
use url::Url;

use super::blocklist;
use crate::error::{SearchError, SearchResult, SecurityError, SecurityResult};
use crate::traits::fetch::{DocumentFetcher, FetchedPage};

/// Validates candidate URLs before any fetch.
///
/// Blocks non-http(s) schemes, hostless URLs, internal and metadata
/// hosts, private and link-local address ranges, and everything on
/// the bundled domain blocklist.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    blocked_hosts: HashSet<String>,
    blocked_cidrs: Vec<ipnet::IpNet>,
    /// Hosts that bypass validation entirely (tests, trusted proxies).
    allowed_hosts: HashSet<String>,
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlValidator {
    pub fn new() -> Self {
        Self {
            blocked_hosts: [
                "localhost",
                "0.0.0.0",
                "::1",
                "[::1]",
                "metadata.google.internal",
                "instance-data",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            blocked_cidrs: vec![
                "10.0.0.0/8".parse().unwrap(),
                "172.16.0.0/12".parse().unwrap(),
                "192.168.0.0/16".parse().unwrap(),
                "169.254.0.0/16".parse().unwrap(), // Link-local / cloud metadata
                "127.0.0.0/8".parse().unwrap(),    // Loopback
                "::1/128".parse().unwrap(),        // IPv6 loopback
                "fc00::/7".parse().unwrap(),       // IPv6 private
                "fe80::/10".parse().unwrap(),      // IPv6 link-local
            ],
            allowed_hosts: HashSet::new(),
        }
    }

    /// Add a host that bypasses validation.
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into());
        self
    }

    /// Validate a URL for fetching (no network access).
    pub fn validate(&self, url: &Url) -> SecurityResult<()> {
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(SecurityError::DisallowedScheme(other.to_string())),
        }

        let host = url.host_str().ok_or(SecurityError::NoHost)?;

        if self.allowed_hosts.contains(host) {
            return Ok(());
        }

        if self.blocked_hosts.contains(host) || host.ends_with(".local") {
            return Err(SecurityError::BlockedHost(host.to_string()));
        }

        if let Ok(ip) = host.parse::<IpAddr>() {
            self.check_cidrs(&ip)?;
        }

        if blocklist::is_blocked(host) {
            return Err(SecurityError::BlockedHost(host.to_string()));
        }

        Ok(())
    }

    /// Validate a URL and resolve DNS to check the actual addresses.
    ///
    /// Hostnames are resolved and every returned address is checked
    /// against the blocked ranges, so a public-looking name cannot be
    /// rebound onto an internal service.
    pub async fn validate_with_dns(&self, url: &Url) -> SecurityResult<()> {
        self.validate(url)?;

        let host = url.host_str().ok_or(SecurityError::NoHost)?;

        // Allowed hosts and IP literals are already settled above.
        if self.allowed_hosts.contains(host) || host.parse::<IpAddr>().is_ok() {
            return Ok(());
        }

        let port = url.port().unwrap_or(match url.scheme() {
            "https" => 443,
            _ => 80,
        });

        let addrs = tokio::net::lookup_host(format!("{host}:{port}"))
            .await
            .map_err(|e| SecurityError::DnsResolution(e.to_string()))?;

        for addr in addrs {
            if self.check_cidrs(&addr.ip()).is_err() {
                return Err(SecurityError::BlockedCidr(format!(
                    "DNS for {host} resolved to blocked IP {}",
                    addr.ip()
                )));
            }
        }

        Ok(())
    }

    fn check_cidrs(&self, ip: &IpAddr) -> SecurityResult<()> {
        for cidr in &self.blocked_cidrs {
            if cidr.contains(ip) {
                return Err(SecurityError::BlockedCidr(ip.to_string()));
            }
        }
        Ok(())
    }
}

/// A fetcher that validates URLs (including DNS resolution) before
/// delegating to the inner implementation.
///
/// Wrap the real HTTP fetcher with this in production; mocks in tests
/// stay unwrapped and never resolve anything.
pub struct ValidatedFetcher<F: DocumentFetcher> {
    inner: F,
    validator: UrlValidator,
}

impl<F: DocumentFetcher> ValidatedFetcher<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            validator: UrlValidator::new(),
        }
    }

    /// Create with a custom validator.
    pub fn with_validator(inner: F, validator: UrlValidator) -> Self {
        Self { inner, validator }
    }
}

#[async_trait]
impl<F: DocumentFetcher> DocumentFetcher for ValidatedFetcher<F> {
    async fn fetch(&self, url: &Url) -> SearchResult<FetchedPage> {
        self.validator
            .validate_with_dns(url)
            .await
            .map_err(SearchError::Security)?;
        self.inner.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::fetch::MockFetcher;

    fn check(url: &str) -> SecurityResult<()> {
        UrlValidator::new().validate(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_allows_public_https() {
        assert!(check("https://nasa.gov/voyager").is_ok());
        assert!(check("http://britannica.com/topic").is_ok());
    }

    #[test]
    fn test_rejects_bad_schemes() {
        assert!(matches!(
            check("ftp://example.com/file"),
            Err(SecurityError::DisallowedScheme(_))
        ));
        assert!(matches!(
            check("file:///etc/passwd"),
            Err(SecurityError::DisallowedScheme(_))
        ));
    }

    #[test]
    fn test_rejects_local_hosts() {
        assert!(check("http://localhost:8080/").is_err());
        assert!(check("http://127.0.0.1/").is_err());
        assert!(check("http://10.0.0.5/admin").is_err());
        assert!(check("http://172.16.0.1/").is_err());
        assert!(check("http://192.168.1.1/").is_err());
    }

    #[test]
    fn test_rejects_metadata_services() {
        assert!(matches!(
            check("http://169.254.169.254/latest/meta-data"),
            Err(SecurityError::BlockedCidr(_))
        ));
        assert!(check("http://metadata.google.internal/").is_err());
    }

    #[test]
    fn test_rejects_blocklisted() {
        assert!(matches!(
            check("https://www.facebook.com/page"),
            Err(SecurityError::BlockedHost(_))
        ));
    }

    #[test]
    fn test_allowed_hosts_bypass() {
        let validator = UrlValidator::new().allow_host("localhost");
        let url = Url::parse("http://localhost:3000/fixture").unwrap();
        assert!(validator.validate(&url).is_ok());
    }

    #[tokio::test]
    async fn test_dns_check_short_circuits_on_ip_literals() {
        // IP literals never hit the resolver; the CIDR check settles
        // them synchronously.
        let validator = UrlValidator::new();
        let url = Url::parse("http://169.254.169.254/").unwrap();
        assert!(validator.validate_with_dns(&url).await.is_err());
    }

    #[tokio::test]
    async fn test_validated_fetcher_blocks_internal_targets() {
        let fetcher = ValidatedFetcher::new(
            MockFetcher::new().with_page("http://127.0.0.1/secrets", "<html>internal</html>"),
        );

        let url = Url::parse("http://127.0.0.1/secrets").unwrap();
        let err = fetcher.fetch(&url).await.unwrap_err();
        assert!(matches!(err, SearchError::Security(_)));
    }

    #[tokio::test]
    async fn test_validated_fetcher_passes_allowed_hosts_without_dns() {
        // Allowed hosts skip the resolver, so this runs offline.
        let fetcher = ValidatedFetcher::with_validator(
            MockFetcher::new().with_page("http://fixture.test/page", "<html>ok</html>"),
            UrlValidator::new().allow_host("fixture.test"),
        );

        let url = Url::parse("http://fixture.test/page").unwrap();
        let page = fetcher.fetch(&url).await.unwrap();
        assert!(page.html.contains("ok"));
    }
}
