//! Static domain blocklist bundled with the binary.
//!
//! Social media walls, low-quality aggregators, and paywalled news
//! fronts produce no extractable evidence; their URLs are dropped
//! before any fetch.

use crate::types::document::registered_domain;

/// Domains never fetched.
pub const BLOCKED_DOMAINS: &[&str] = &[
    // Social walls
    "facebook.com",
    "instagram.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "linkedin.com",
    "threads.net",
    // Q&A / content farms
    "pinterest.com",
    "quora.com",
    "answers.com",
    "ehow.com",
    "wikihow.com",
    "fandom.com",
    // Paywalled news fronts
    "wsj.com",
    "ft.com",
    "bloomberg.com",
    "economist.com",
    // Aggregators
    "news.google.com",
    "flipboard.com",
];

/// Whether a host falls under the blocklist.
///
/// Matches the registered domain (so subdomains of blocked sites are
/// blocked too) as well as explicit subdomain entries like
/// `news.google.com`.
pub fn is_blocked(host: &str) -> bool {
    let bare = host.trim_start_matches("www.").to_ascii_lowercase();
    let domain = registered_domain(host);
    BLOCKED_DOMAINS.contains(&bare.as_str()) || BLOCKED_DOMAINS.contains(&domain.as_str())
}
