//! Route dispatch: ordered predicate rules mapping requests to a
//! (strategy, namespace) pair.
//!
//! Rules are evaluated top to bottom and the first match wins; overlapping
//! rules are never merged. Predicates intentionally overlap (an asset URL
//! can be same-origin, path-prefixed, and image-typed at once), so
//! declaration order is the determinism mechanism. Do not reorder rules
//! for performance.

use chrono::Duration;
use regex::Regex;

use crate::namespace::{ExpirationPolicy, NamespaceSpec};
use crate::request::{Destination, RequestDescriptor};

/// Pure predicate over request attributes.
#[derive(Debug, Clone)]
pub enum RoutePredicate {
    /// Exact origin match, e.g. `https://fonts.gstatic.com`.
    Origin(String),
    /// Regex over the request host.
    HostMatches(Regex),
    /// URL path starts with the given prefix.
    PathPrefix(String),
    /// Regex over the full URL.
    UrlMatches(Regex),
    /// The request destination type.
    Destination(Destination),
    /// The request targets the application's own origin.
    SameOrigin,
    /// Every sub-predicate matches.
    All(Vec<RoutePredicate>),
}

impl RoutePredicate {
    pub fn matches(&self, req: &RequestDescriptor) -> bool {
        match self {
            RoutePredicate::Origin(origin) => req.url.origin().ascii_serialization() == *origin,
            RoutePredicate::HostMatches(re) => req.url.host_str().is_some_and(|h| re.is_match(h)),
            RoutePredicate::PathPrefix(prefix) => req.url.path().starts_with(prefix),
            RoutePredicate::UrlMatches(re) => re.is_match(req.url.as_str()),
            RoutePredicate::Destination(dest) => req.destination == *dest,
            RoutePredicate::SameOrigin => req.same_origin,
            RoutePredicate::All(preds) => preds.iter().all(|p| p.matches(req)),
        }
    }
}

/// The read/write/fallback policy applied to a matched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    CacheFirst,
    NetworkFirst,
    StaleWhileRevalidate,
}

/// One ordered (predicate, namespace, strategy) triple.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub predicate: RoutePredicate,
    pub namespace: String,
    pub strategy: StrategyKind,
}

impl RouteRule {
    pub fn new(predicate: RoutePredicate, namespace: &str, strategy: StrategyKind) -> Self {
        Self { predicate, namespace: namespace.to_string(), strategy }
    }
}

/// Ordered rule list; first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    rules: Vec<RouteRule>,
}

impl RouteTable {
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self { rules }
    }

    /// First rule whose predicate matches, or None for pass-through.
    pub fn matched(&self, req: &RequestDescriptor) -> Option<&RouteRule> {
        self.rules.iter().find(|rule| rule.predicate.matches(req))
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }
}

/// The education platform's route table.
///
/// Declaration order is load-bearing: avatar model files would also match
/// the image and same-origin rules on some hosts, and navigations are the
/// final same-origin catch-all.
pub fn platform_rules() -> RouteTable {
    RouteTable::new(vec![
        RouteRule::new(
            RoutePredicate::Origin("https://fonts.googleapis.com".into()),
            "font-stylesheets",
            StrategyKind::StaleWhileRevalidate,
        ),
        RouteRule::new(
            RoutePredicate::Origin("https://fonts.gstatic.com".into()),
            "webfonts",
            StrategyKind::CacheFirst,
        ),
        RouteRule::new(
            RoutePredicate::UrlMatches(Regex::new(r"\.glb(\?|$)").unwrap()),
            "avatar-models",
            StrategyKind::CacheFirst,
        ),
        RouteRule::new(
            RoutePredicate::HostMatches(Regex::new(r"^api\.readyplayer\.me$").unwrap()),
            "avatar-presets",
            StrategyKind::StaleWhileRevalidate,
        ),
        RouteRule::new(
            RoutePredicate::All(vec![RoutePredicate::SameOrigin, RoutePredicate::PathPrefix("/api/".into())]),
            "api-cache",
            StrategyKind::StaleWhileRevalidate,
        ),
        RouteRule::new(
            RoutePredicate::Destination(Destination::Image),
            "images",
            StrategyKind::CacheFirst,
        ),
        RouteRule::new(
            RoutePredicate::All(vec![
                RoutePredicate::SameOrigin,
                RoutePredicate::Destination(Destination::Document),
            ]),
            "pages",
            StrategyKind::NetworkFirst,
        ),
    ])
}

/// The education platform's namespace set, reproduced exactly for
/// interop with caches written by other clients of the same origin.
///
/// The pages namespace carries no bound. That matches the deployed
/// configuration and is treated as deliberate, but it is a growth risk
/// under high navigation churn.
pub fn platform_namespaces() -> Vec<NamespaceSpec> {
    vec![
        NamespaceSpec::new("font-stylesheets", ExpirationPolicy::unbounded()),
        NamespaceSpec::new("webfonts", ExpirationPolicy::new(Some(30), Some(Duration::days(365)))),
        NamespaceSpec::new("images", ExpirationPolicy::new(Some(60), Some(Duration::days(30)))),
        NamespaceSpec::new("api-cache", ExpirationPolicy::new(Some(100), Some(Duration::hours(1)))),
        NamespaceSpec::new("avatar-models", ExpirationPolicy::new(Some(10), Some(Duration::days(90)))),
        NamespaceSpec::new("avatar-presets", ExpirationPolicy::new(Some(5), Some(Duration::days(1)))),
        NamespaceSpec::new("pages", ExpirationPolicy::unbounded()),
        NamespaceSpec::new("precache", ExpirationPolicy::unbounded()),
    ]
}
