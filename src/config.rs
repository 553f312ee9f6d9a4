use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::models::Protocol;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_http_server")]
    pub http_server: String,
    #[serde(default)]
    pub api_url: String,
    /// Seconds slept between the end of one cycle and the start of the next.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    /// Transport timeout applied to every probe, in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,
    #[serde(default = "default_threshold")]
    pub error_transition_threshold: u32,
    /// Comma-separated endpoint ids already announced as OFFLINE.
    #[serde(default)]
    pub known_error_endpoints: String,
    #[serde(default)]
    pub report_blocks: bool,
    #[serde(default)]
    pub dns_seeders: Vec<DnsSeederGroup>,
    #[serde(default)]
    pub websites: Vec<WebsiteGroup>,
    #[serde(default)]
    pub node: Option<NodeConfig>,
    #[serde(default)]
    pub slack: Option<SlackConfig>,
}

fn default_http_server() -> String { "0.0.0.0:8080".into() }
fn default_check_interval() -> u64 { 60 }
fn default_probe_timeout() -> u64 { 30 }
fn default_threshold() -> u32 { 3 }

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DnsSeederGroup {
    pub name: String,
    pub hosts: String,
}

impl DnsSeederGroup {
    pub fn host_list(&self) -> Vec<String> {
        split_list(&self.hosts)
    }
}

/// Marker for the bare host of a website group.
pub const APEX: &str = "@";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WebsiteGroup {
    pub host: String,
    #[serde(default)]
    pub subdomains: String,
    /// Fully qualified host -> protocols that must not be probed for it.
    #[serde(default)]
    pub protocol_exclusions: HashMap<String, Vec<Protocol>>,
    /// Subdomain (or `@`) -> substring the body has to contain.
    #[serde(default)]
    pub content_match: HashMap<String, String>,
}

impl WebsiteGroup {
    /// Expands the group into `(subdomain key, fqdn)` pairs. An empty
    /// subdomain list means only the apex host.
    pub fn targets(&self) -> Vec<(String, String)> {
        let subs = split_list(&self.subdomains);
        if subs.is_empty() {
            return vec![(APEX.to_string(), self.host.clone())];
        }
        subs.into_iter()
            .map(|sub| {
                let fqdn = if sub == APEX { self.host.clone() } else { format!("{}.{}", sub, self.host) };
                (sub, fqdn)
            })
            .collect()
    }

    pub fn is_excluded(&self, fqdn: &str, protocol: Protocol) -> bool {
        self.protocol_exclusions
            .get(fqdn)
            .is_some_and(|protocols| protocols.contains(&protocol))
    }

    /// Expected body substring for a subdomain; empty when unset.
    pub fn expected_content(&self, subdomain: &str) -> &str {
        self.content_match.get(subdomain).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NodeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_node_host")]
    pub host: String,
    #[serde(default = "default_node_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

fn default_true() -> bool { true }
fn default_node_host() -> String { "127.0.0.1".into() }
fn default_node_port() -> u16 { 9332 }

impl NodeConfig {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SlackConfig {
    pub token: String,
    pub channel: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Seconds an outbound websocket write may stall before it is abandoned.
    #[serde(default = "default_send_timeout")]
    pub send_timeout: u64,
}

fn default_api_base() -> String { "https://slack.com/api".into() }
fn default_send_timeout() -> u64 { 10 }

impl MonitorConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.error_transition_threshold == 0 {
            return Err(ConfigError::Invalid("error_transition_threshold must be at least 1".into()));
        }
        if self.check_interval == 0 {
            return Err(ConfigError::Invalid("check_interval must be at least 1 second".into()));
        }
        if self.probe_timeout == 0 {
            return Err(ConfigError::Invalid("probe_timeout must be at least 1 second".into()));
        }
        if let Some(group) = self.dns_seeders.iter().find(|g| g.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("dns seeder group with hosts '{}' has no name", group.hosts)));
        }
        if self.websites.iter().any(|w| w.host.trim().is_empty()) {
            return Err(ConfigError::Invalid("website group with empty host".into()));
        }
        if let Some(slack) = &self.slack {
            if slack.token.is_empty() || slack.channel.is_empty() {
                return Err(ConfigError::Invalid("slack token and channel are required".into()));
            }
            if slack.send_timeout == 0 {
                return Err(ConfigError::Invalid("slack send_timeout must be at least 1 second".into()));
            }
        }
        Ok(())
    }

    pub fn known_errors(&self) -> Vec<String> {
        split_list(&self.known_error_endpoints)
    }

    pub fn set_known_errors(&mut self, endpoints: &[String]) {
        self.known_error_endpoints = endpoints.join(",");
    }

    /// Host advertised by `!api`: `api_url` when set, otherwise the listen host.
    pub fn api_host(&self) -> String {
        if !self.api_url.is_empty() {
            return self.api_url.clone();
        }
        self.http_server.rsplit_once(':').map(|(h, _)| h.to_string()).unwrap_or_default()
    }

    pub fn api_port(&self) -> String {
        self.http_server.rsplit_once(':').map(|(_, p)| p.to_string()).unwrap_or_default()
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> MonitorConfig {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn defaults_apply_to_minimal_config() {
        let cfg = parse("{}");
        assert_eq!(cfg.http_server, "0.0.0.0:8080");
        assert_eq!(cfg.check_interval, 60);
        assert_eq!(cfg.error_transition_threshold, 3);
        assert!(cfg.slack.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let cfg = parse(r#"{"error_transition_threshold": 0}"#);
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn slack_send_timeout_defaults_and_rejects_zero() {
        let cfg = parse(r#"{"slack": {"token": "t", "channel": "alerts"}}"#);
        assert_eq!(cfg.slack.as_ref().unwrap().send_timeout, 10);

        let cfg = parse(r#"{"slack": {"token": "t", "channel": "alerts", "send_timeout": 0}}"#);
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unnamed_seeder_group_is_rejected() {
        let cfg = parse(r#"{"dns_seeders": [{"name": " ", "hosts": "a.example"}]}"#);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn website_targets_expand_subdomains_and_apex() {
        let group = WebsiteGroup {
            host: "example.org".into(),
            subdomains: "www, @,blog".into(),
            protocol_exclusions: HashMap::new(),
            content_match: HashMap::new(),
        };
        let fqdns: Vec<String> = group.targets().into_iter().map(|(_, f)| f).collect();
        assert_eq!(fqdns, vec!["www.example.org", "example.org", "blog.example.org"]);
    }

    #[test]
    fn empty_subdomains_mean_apex_only() {
        let group = parse(r#"{"websites": [{"host": "example.org"}]}"#).websites.remove(0);
        assert_eq!(group.targets(), vec![("@".to_string(), "example.org".to_string())]);
    }

    #[test]
    fn exclusion_only_hits_named_protocol() {
        let cfg = parse(
            r#"{"websites": [{"host": "example.org", "subdomains": "download",
                "protocol_exclusions": {"download.example.org": ["https://"]}}]}"#,
        );
        let group = &cfg.websites[0];
        assert!(group.is_excluded("download.example.org", Protocol::Https));
        assert!(!group.is_excluded("download.example.org", Protocol::Http));
        assert!(!group.is_excluded("example.org", Protocol::Https));
    }

    #[test]
    fn known_errors_round_trip_through_string() {
        let mut cfg = parse(r#"{"known_error_endpoints": "dns://a, https://b.org,"}"#);
        assert_eq!(cfg.known_errors(), vec!["dns://a", "https://b.org"]);
        cfg.set_known_errors(&["http://c.org".to_string()]);
        assert_eq!(cfg.known_error_endpoints, "http://c.org");
    }

    #[test]
    fn api_host_falls_back_to_listen_address() {
        let mut cfg = parse(r#"{"http_server": "10.0.0.5:9000"}"#);
        assert_eq!(cfg.api_host(), "10.0.0.5");
        assert_eq!(cfg.api_port(), "9000");
        cfg.api_url = "status.example.org".into();
        assert_eq!(cfg.api_host(), "status.example.org");
    }
}
