//! Host-based routing table.
//!
//! Decides, from the request URL alone, which strategy serves a request.
//! Rules are checked in order; the first matching host pattern wins.

use url::Url;

use pwa_relay_core::{AppConfig, Strategy};

/// A host and all of its subdomains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPattern(String);

impl HostPattern {
    pub fn new(pattern: &str) -> Self {
        Self(pattern.trim().trim_start_matches('.').to_ascii_lowercase())
    }

    /// `firebasedatabase.app` matches `firebasedatabase.app` and
    /// `gochat-default-rtdb.asia-southeast1.firebasedatabase.app`, but not
    /// `notfirebasedatabase.app`.
    pub fn matches(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        host == self.0
            || host
                .strip_suffix(self.0.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Ordered host rules plus a fallback strategy.
#[derive(Debug, Clone)]
pub struct RouteTable {
    rules: Vec<(HostPattern, Strategy)>,
    default: Strategy,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new(Strategy::StaleWhileRevalidate)
    }
}

impl RouteTable {
    pub fn new(default: Strategy) -> Self {
        Self { rules: Vec::new(), default }
    }

    /// Append a rule. Earlier rules take precedence.
    pub fn with_rule(mut self, host: &str, strategy: Strategy) -> Self {
        self.rules.push((HostPattern::new(host), strategy));
        self
    }

    /// Add every host of the bypass set as a network-only rule.
    pub fn with_bypass<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for host in hosts {
            self = self.with_rule(host.as_ref(), Strategy::NetworkOnly);
        }
        self
    }

    /// Explicit `routes` first, then `bypass_hosts`, then the default strategy.
    pub fn from_config(config: &AppConfig) -> Self {
        let mut table = Self::new(config.default_strategy);
        for rule in &config.routes {
            table = table.with_rule(&rule.host, rule.strategy);
        }
        table.with_bypass(&config.bypass_hosts)
    }

    /// Strategy for a request URL. URLs without a host are never cached.
    pub fn decide(&self, url: &Url) -> Strategy {
        let Some(host) = url.host_str() else {
            return Strategy::NetworkOnly;
        };

        self.rules
            .iter()
            .find(|(pattern, _)| pattern.matches(host))
            .map(|(_, strategy)| *strategy)
            .unwrap_or(self.default)
    }
}
