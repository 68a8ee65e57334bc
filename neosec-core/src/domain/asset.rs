//! Normalized asset model
//!
//! Every adapter, whatever tool it wraps, reduces its raw output to these
//! types. Ports live exclusively inside their [`Host`]; callers that need
//! host context for a port carry it explicitly.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Transport protocol of a scanned port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "tcp"),
            Protocol::Udp => write!(f, "udp"),
        }
    }
}

/// The state of a scanned port, following nmap conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
    Filtered,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortState::Open => write!(f, "open"),
            PortState::Closed => write!(f, "closed"),
            PortState::Filtered => write!(f, "filtered"),
        }
    }
}

/// A single port observation on a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub number: u16,
    pub protocol: Protocol,
    pub state: PortState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Combined product/version banner when the tool reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<String>,
}

impl Port {
    pub fn new(number: u16, protocol: Protocol, state: PortState) -> Self {
        Self {
            number,
            protocol,
            state,
            service: None,
            product: None,
            version: None,
            banner: None,
        }
    }

    /// Key used for uniqueness within a host.
    pub fn key(&self) -> (u16, Protocol) {
        (self.number, self.protocol)
    }
}

/// A host discovered during a scan, owning its port table.
///
/// Ports are keyed by (number, protocol); inserting a port that is already
/// present replaces the previous observation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    /// OS-match confidence (0-100) as reported by the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_accuracy: Option<u8>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    ports: BTreeMap<(u16, Protocol), Port>,
}

impl Host {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Insert or replace a port observation.
    pub fn upsert_port(&mut self, port: Port) {
        self.ports.insert(port.key(), port);
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    pub fn port(&self, number: u16, protocol: Protocol) -> Option<&Port> {
        self.ports.get(&(number, protocol))
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }
}

/// A web application discovered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebApp {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub technologies: Vec<String>,
}

/// A subdomain discovered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subdomain {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cname: Option<String>,
    /// Which tool discovered this subdomain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Everything a single task discovered, bundled for aggregation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Tool that produced this asset bundle.
    pub source_tool: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<Host>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub web_apps: Vec<WebApp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subdomains: Vec<Subdomain>,
    pub discovered_at: DateTime<Utc>,
}

impl Asset {
    pub fn new(source_tool: impl Into<String>) -> Self {
        Self {
            source_tool: source_tool.into(),
            hosts: Vec::new(),
            web_apps: Vec::new(),
            subdomains: Vec::new(),
            discovered_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty() && self.web_apps.is_empty() && self.subdomains.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_uniqueness_by_number_and_protocol() {
        let mut host = Host::new("192.0.2.10");
        host.upsert_port(Port::new(80, Protocol::Tcp, PortState::Open));
        host.upsert_port(Port::new(80, Protocol::Udp, PortState::Filtered));

        let mut replacement = Port::new(80, Protocol::Tcp, PortState::Open);
        replacement.service = Some("http".into());
        host.upsert_port(replacement);

        assert_eq!(host.port_count(), 2);
        assert_eq!(
            host.port(80, Protocol::Tcp).and_then(|p| p.service.as_deref()),
            Some("http")
        );
    }

    #[test]
    fn ports_iterate_in_stable_order() {
        let mut host = Host::new("192.0.2.10");
        host.upsert_port(Port::new(443, Protocol::Tcp, PortState::Open));
        host.upsert_port(Port::new(22, Protocol::Tcp, PortState::Open));
        host.upsert_port(Port::new(80, Protocol::Tcp, PortState::Open));

        let numbers: Vec<u16> = host.ports().map(|p| p.number).collect();
        assert_eq!(numbers, vec![22, 80, 443]);
    }

    #[test]
    fn host_serde_skips_empty_ports() {
        let host = Host::new("192.0.2.1");
        let json = serde_json::to_string(&host).unwrap();
        assert!(!json.contains("ports"));

        let parsed: Host = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.port_count(), 0);
    }

    #[test]
    fn protocol_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Protocol::Tcp).unwrap(), "\"tcp\"");
        assert_eq!(Protocol::Udp.to_string(), "udp");
    }

    #[test]
    fn asset_bundle_round_trips() {
        let mut asset = Asset::new("httpx");
        asset.web_apps.push(WebApp {
            url: "https://192.0.2.1".into(),
            title: Some("Login".into()),
            status_code: Some(200),
            server: Some("nginx".into()),
            technologies: vec!["php".into()],
        });
        asset.subdomains.push(Subdomain {
            name: "api.example.com".into(),
            addresses: vec!["192.0.2.2".into()],
            cname: None,
            source: Some("subfinder".into()),
        });

        assert!(!asset.is_empty());
        let json = serde_json::to_string(&asset).unwrap();
        let back: Asset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, asset);
        assert_eq!(back.web_apps[0].status_code, Some(200));
        assert_eq!(back.subdomains[0].source.as_deref(), Some("subfinder"));
    }
}
