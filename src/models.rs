use serde::{Deserialize, Serialize};
use std::fmt;

pub const ONLINE: &str = "ONLINE";
pub const OFFLINE: &str = "OFFLINE";
pub const HEALTH_OK: &str = "OK";
pub const HEALTH_ATTENTION: &str = "Needs attention.";

/// Tracker id of the node tip-height check.
pub const TIP_HEIGHT_ENDPOINT: &str = "rpc://tip-height";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "http://", alias = "HTTP")]
    Http,
    #[serde(rename = "https://", alias = "HTTPS")]
    Https,
}

impl Protocol {
    pub const ALL: [Protocol; 2] = [Protocol::Http, Protocol::Https];

    pub fn scheme(self) -> &'static str {
        match self {
            Protocol::Http => "http://",
            Protocol::Https => "https://",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn online_offline(online: bool) -> &'static str {
    if online { ONLINE } else { OFFLINE }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsSeederStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub node_count: usize,
    pub status: String,
    pub error: String,
}

impl DnsSeederStatus {
    pub fn endpoint_id(&self) -> String {
        format!("dns://{}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteStatus {
    pub name: String,
    #[serde(serialize_with = "serialize_label")]
    pub protocol: Protocol,
    pub status: String,
    pub http_code: u16,
    pub content_size: usize,
    pub response_time: String,
    pub error: String,
}

fn serialize_label<S: serde::Serializer>(p: &Protocol, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(p.label())
}

impl SiteStatus {
    pub fn endpoint_id(&self) -> String {
        format!("{}{}", self.protocol.scheme(), self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub block_height: u64,
    pub block_hash: String,
    pub block_time: i64,
    pub time_elapsed: i64,
    pub status: String,
}

impl BlockInfo {
    /// Recomputes the age fields against `now` (Unix seconds).
    pub fn refresh(&mut self, now: i64) {
        if self.block_time == 0 {
            return;
        }
        self.time_elapsed = (now - self.block_time).max(0);
        self.status = block_age_status(self.time_elapsed).to_string();
    }
}

pub fn block_age_status(seconds: i64) -> &'static str {
    match seconds {
        s if s < 150 => "OK",
        s if s < 600 => "Block not found within 2.5 minutes.",
        s if s < 1800 => "Block not found within 10 minutes.",
        _ => "POTENTIAL ISSUE: Block not found within 30 minutes.",
    }
}

/// Most recent results of one poll cycle.
///
/// An empty `status` means no cycle has completed yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub dns_seeders: Vec<DnsSeederStatus>,
    pub websites: Vec<SiteStatus>,
    #[serde(rename = "network")]
    pub block: BlockInfo,
    pub status: String,
    pub last_updated: i64,
    /// Error of the last tip-height query; tracked but not part of the API.
    #[serde(skip)]
    pub tip_error: Option<String>,
}

impl StatusSnapshot {
    pub fn is_populated(&self) -> bool {
        !self.status.is_empty()
    }

    /// `(endpoint id, error text)` for every tracked endpoint, in poll order.
    /// The error text is empty for healthy endpoints.
    pub fn endpoints(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .dns_seeders
            .iter()
            .map(|s| (s.endpoint_id(), s.error.clone()))
            .chain(self.websites.iter().map(|s| (s.endpoint_id(), s.error.clone())))
            .collect();
        if let Some(err) = &self.tip_error {
            out.push((TIP_HEIGHT_ENDPOINT.to_string(), err.clone()));
        } else if self.block.block_height > 0 {
            out.push((TIP_HEIGHT_ENDPOINT.to_string(), String::new()));
        }
        out
    }
}

pub fn overall_status(seeders: &[DnsSeederStatus], sites: &[SiteStatus]) -> &'static str {
    let failing = seeders.iter().any(|s| !s.error.is_empty()) || sites.iter().any(|s| !s.error.is_empty());
    if failing { HEALTH_ATTENTION } else { HEALTH_OK }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(name: &str, protocol: Protocol, error: &str) -> SiteStatus {
        SiteStatus {
            name: name.into(),
            protocol,
            status: online_offline(error.is_empty()).into(),
            http_code: 200,
            content_size: 10,
            response_time: "1ms".into(),
            error: error.into(),
        }
    }

    #[test]
    fn overall_status_flags_any_error() {
        let ok = vec![site("a.org", Protocol::Http, "")];
        assert_eq!(overall_status(&[], &ok), HEALTH_OK);

        let seeders = vec![DnsSeederStatus { name: "seed".into(), error: "nxdomain".into(), ..Default::default() }];
        assert_eq!(overall_status(&seeders, &ok), HEALTH_ATTENTION);
    }

    #[test]
    fn block_age_thresholds() {
        assert_eq!(block_age_status(0), "OK");
        assert_eq!(block_age_status(149), "OK");
        assert_eq!(block_age_status(150), "Block not found within 2.5 minutes.");
        assert_eq!(block_age_status(600), "Block not found within 10 minutes.");
        assert_eq!(block_age_status(1800), "POTENTIAL ISSUE: Block not found within 30 minutes.");
    }

    #[test]
    fn endpoint_ids_are_protocol_qualified() {
        let snap = StatusSnapshot {
            dns_seeders: vec![DnsSeederStatus { name: "seed.example".into(), ..Default::default() }],
            websites: vec![site("www.example.org", Protocol::Https, "boom")],
            tip_error: Some("rpc down".into()),
            ..Default::default()
        };
        let ids = snap.endpoints();
        assert_eq!(ids[0], ("dns://seed.example".to_string(), String::new()));
        assert_eq!(ids[1], ("https://www.example.org".to_string(), "boom".to_string()));
        assert_eq!(ids[2], (TIP_HEIGHT_ENDPOINT.to_string(), "rpc down".to_string()));
    }

    #[test]
    fn snapshot_json_uses_api_field_names() {
        let snap = StatusSnapshot {
            websites: vec![site("example.org", Protocol::Https, "")],
            status: HEALTH_OK.into(),
            last_updated: 42,
            ..Default::default()
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["websites"][0]["protocol"], "HTTPS");
        assert_eq!(json["status"], "OK");
        assert!(json.get("network").is_some());
        assert!(json.get("tip_error").is_none());
    }

    #[test]
    fn refresh_ignores_unset_block() {
        let mut block = BlockInfo::default();
        block.refresh(1_000);
        assert_eq!(block.time_elapsed, 0);
        assert!(block.status.is_empty());
    }
}
