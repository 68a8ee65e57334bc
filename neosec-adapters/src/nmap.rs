//! Nmap adapter
//!
//! Builds `nmap` invocations from an allowlisted option schema and parses
//! `-oX -` XML output into [`Host`] assets. Only open ports are kept, which
//! matches what downstream tasks care about.
//!
//! Accepted options:
//!
//! | key                 | type   | default | argv effect            |
//! |---------------------|--------|---------|------------------------|
//! | `scan_type`         | string | `syn`   | `-sS` / `-sT` / `-sU`  |
//! | `ports`             | string | all     | `-p <spec>`            |
//! | `service_detection` | bool   | true    | `-sV`                  |
//! | `os_detection`      | bool   | false   | `-O`                   |
//! | `timing`            | int    | 4       | `-T<n>`                |
//! | `min_rate`          | int    | 1000    | `--min-rate <n>`       |
//! | `no_dns`            | bool   | true    | `-n`                   |
//!
//! Anything else is rejected before a command is built.

use once_cell::sync::Lazy;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::debug;

use neosec_core::domain::adapter::{
    AdapterError, CommandRequest, ParsedOutput, RawOutput, ToolAdapter, ToolCategory,
    ToolDescriptor,
};
use neosec_core::domain::asset::{Asset, Host, Port, PortState, Protocol};

/// Port specs like `80`, `1-1024`, `22,80,8000-8100`.
static PORT_SPEC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,5}(-\d{1,5})?(,\d{1,5}(-\d{1,5})?)*$").expect("static pattern"));

const ALLOWED_KEYS: &[&str] = &[
    "scan_type",
    "ports",
    "service_detection",
    "os_detection",
    "timing",
    "min_rate",
    "no_dns",
];

/// Adapter for the Network Mapper port scanner.
#[derive(Debug, Default)]
pub struct NmapAdapter;

impl NmapAdapter {
    pub fn new() -> Self {
        Self
    }

    fn invalid(key: &str, reason: impl Into<String>) -> AdapterError {
        AdapterError::InvalidOption {
            tool: "nmap".to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

impl ToolAdapter for NmapAdapter {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: "nmap".to_string(),
            category: ToolCategory::Recon,
            description: "Network Mapper port and service scanner".to_string(),
            required_binaries: vec!["nmap".to_string()],
        }
    }

    fn name(&self) -> &str {
        "nmap"
    }

    fn build_command(&self, request: &CommandRequest<'_>) -> Result<Vec<String>, AdapterError> {
        let options = request.options;
        for key in options.keys() {
            if !ALLOWED_KEYS.contains(&key.as_str()) {
                return Err(AdapterError::UnsupportedOption {
                    tool: "nmap".to_string(),
                    key: key.clone(),
                });
            }
        }

        let mut cmd = vec![request.binary.to_string_lossy().into_owned()];

        match options.get("scan_type") {
            None => cmd.push("-sS".to_string()),
            Some(value) => match value.as_str() {
                Some("syn") => cmd.push("-sS".to_string()),
                Some("tcp") => cmd.push("-sT".to_string()),
                Some("udp") => cmd.push("-sU".to_string()),
                Some(other) => {
                    return Err(Self::invalid(
                        "scan_type",
                        format!("expected syn, tcp, or udp, got {other:?}"),
                    ));
                }
                None => return Err(Self::invalid("scan_type", "expected a string")),
            },
        }

        if let Some(value) = options.get("ports") {
            let spec = value
                .as_str()
                .ok_or_else(|| Self::invalid("ports", "expected a string"))?;
            if !PORT_SPEC.is_match(spec) {
                return Err(Self::invalid("ports", format!("not a port spec: {spec:?}")));
            }
            for number in spec.split(['-', ',']) {
                if number.parse::<u32>().map_or(true, |n| n == 0 || n > 65535) {
                    return Err(Self::invalid("ports", format!("port out of range: {number}")));
                }
            }
            cmd.push("-p".to_string());
            cmd.push(spec.to_string());
        }

        let service_detection = match options.get("service_detection") {
            None => true,
            Some(value) => value
                .as_bool()
                .ok_or_else(|| Self::invalid("service_detection", "expected a bool"))?,
        };
        if service_detection {
            cmd.push("-sV".to_string());
        }

        if let Some(value) = options.get("os_detection") {
            if value
                .as_bool()
                .ok_or_else(|| Self::invalid("os_detection", "expected a bool"))?
            {
                cmd.push("-O".to_string());
            }
        }

        let timing = match options.get("timing") {
            None => 4,
            Some(value) => {
                let t = value
                    .as_int()
                    .ok_or_else(|| Self::invalid("timing", "expected an integer"))?;
                if !(0..=5).contains(&t) {
                    return Err(Self::invalid("timing", format!("expected 0-5, got {t}")));
                }
                t
            }
        };
        cmd.push(format!("-T{timing}"));

        let min_rate = match options.get("min_rate") {
            None => 1000,
            Some(value) => {
                let rate = value
                    .as_int()
                    .ok_or_else(|| Self::invalid("min_rate", "expected an integer"))?;
                if rate < 1 {
                    return Err(Self::invalid("min_rate", format!("expected >= 1, got {rate}")));
                }
                rate
            }
        };
        cmd.push("--min-rate".to_string());
        cmd.push(min_rate.to_string());

        let no_dns = match options.get("no_dns") {
            None => true,
            Some(value) => value
                .as_bool()
                .ok_or_else(|| Self::invalid("no_dns", "expected a bool"))?,
        };
        if no_dns {
            cmd.push("-n".to_string());
        }

        // XML on stdout; the executor captures it.
        cmd.push("-oX".to_string());
        cmd.push("-".to_string());
        cmd.push(request.target.as_str().to_string());

        Ok(cmd)
    }

    fn parse_output(&self, output: &RawOutput<'_>) -> Result<ParsedOutput, AdapterError> {
        let xml = output.stdout_str();
        let hosts = parse_nmap_xml(&xml, output.truncated)?;
        debug!(host_count = hosts.len(), "nmap output parsed");

        let mut parsed = ParsedOutput::default();
        if !hosts.is_empty() {
            let mut asset = Asset::new("nmap");
            asset.hosts = hosts;
            parsed.assets.push(asset);
        }
        Ok(parsed)
    }
}

fn attr(element: &BytesStart<'_>, name: &str) -> Option<String> {
    element
        .try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| String::from_utf8(a.value.into_owned()).ok())
}

/// Walk the nmap XML event stream, collecting hosts that are up.
///
/// On a truncated capture the stream may end mid-document; whatever was
/// fully parsed up to the cut is returned instead of failing the task.
fn parse_nmap_xml(xml: &str, truncated: bool) -> Result<Vec<Host>, AdapterError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut hosts = Vec::new();
    let mut current_host: Option<Host> = None;
    let mut host_is_up = false;
    let mut current_port: Option<Port> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"host" => {
                    current_host = Some(Host::new(String::new()));
                    host_is_up = false;
                }
                b"status" => {
                    if current_host.is_some() {
                        host_is_up = attr(&e, "state").as_deref() == Some("up");
                    }
                }
                b"address" => {
                    if let Some(host) = current_host.as_mut() {
                        match attr(&e, "addrtype").as_deref() {
                            Some("ipv4") | Some("ipv6") => {
                                if let Some(addr) = attr(&e, "addr") {
                                    host.address = addr;
                                }
                            }
                            Some("mac") => host.mac_address = attr(&e, "addr"),
                            _ => {}
                        }
                    }
                }
                b"hostname" => {
                    if let Some(host) = current_host.as_mut() {
                        if host.hostname.is_none() {
                            host.hostname = attr(&e, "name");
                        }
                    }
                }
                b"port" => {
                    if current_host.is_some() {
                        let protocol = match attr(&e, "protocol").as_deref() {
                            Some("tcp") => Some(Protocol::Tcp),
                            Some("udp") => Some(Protocol::Udp),
                            _ => None,
                        };
                        let number = attr(&e, "portid").and_then(|p| p.parse::<u16>().ok());
                        current_port = match (number, protocol) {
                            (Some(number), Some(protocol)) => {
                                Some(Port::new(number, protocol, PortState::Filtered))
                            }
                            _ => None,
                        };
                    }
                }
                b"state" => {
                    if let Some(port) = current_port.as_mut() {
                        port.state = match attr(&e, "state").as_deref() {
                            Some("open") => PortState::Open,
                            Some("closed") => PortState::Closed,
                            _ => PortState::Filtered,
                        };
                    }
                }
                b"service" => {
                    if let Some(port) = current_port.as_mut() {
                        port.service = attr(&e, "name");
                        port.product = attr(&e, "product");
                        port.version = attr(&e, "version");
                        port.banner = match (&port.product, &port.version) {
                            (Some(product), Some(version)) => {
                                Some(format!("{product} {version}"))
                            }
                            (Some(product), None) => Some(product.clone()),
                            _ => None,
                        };
                    }
                }
                b"osmatch" => {
                    if let Some(host) = current_host.as_mut() {
                        if host.os_name.is_none() {
                            host.os_name = attr(&e, "name");
                            host.os_accuracy =
                                attr(&e, "accuracy").and_then(|a| a.parse::<u8>().ok());
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"port" => {
                    if let (Some(host), Some(port)) = (current_host.as_mut(), current_port.take())
                    {
                        if port.state == PortState::Open {
                            host.upsert_port(port);
                        }
                    }
                }
                b"host" => {
                    if let Some(host) = current_host.take() {
                        if host_is_up && !host.address.is_empty() {
                            hosts.push(host);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => {
                if truncated {
                    // The capture was cut mid-document; keep what parsed.
                    debug!(error = %err, "stopping at parse error in truncated capture");
                    break;
                }
                return Err(AdapterError::Parse {
                    tool: "nmap".to_string(),
                    format: "xml".to_string(),
                    reason: err.to_string(),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use neosec_core::domain::adapter::{OptionMap, OptionValue};
    use neosec_core::domain::target::Target;
    use std::path::Path;

    const SAMPLE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<nmaprun scanner="nmap" args="nmap -sV -oX - 192.0.2.10" version="7.94">
<host starttime="1" endtime="2"><status state="up" reason="syn-ack"/>
<address addr="192.0.2.10" addrtype="ipv4"/>
<address addr="AA:BB:CC:DD:EE:FF" addrtype="mac"/>
<hostnames><hostname name="web.example.internal" type="PTR"/></hostnames>
<ports>
<port protocol="tcp" portid="22"><state state="open" reason="syn-ack"/><service name="ssh" product="OpenSSH" version="9.6"/></port>
<port protocol="tcp" portid="80"><state state="open" reason="syn-ack"/><service name="http" product="nginx"/></port>
<port protocol="tcp" portid="443"><state state="filtered" reason="no-response"/></port>
</ports>
<os><osmatch name="Linux 5.x" accuracy="96"/></os>
</host>
<host><status state="down" reason="no-response"/>
<address addr="192.0.2.11" addrtype="ipv4"/>
</host>
</nmaprun>
"#;

    fn build(options: OptionMap) -> Result<Vec<String>, AdapterError> {
        let target = Target::parse("192.0.2.10").unwrap();
        let request = CommandRequest {
            target: &target,
            options: &options,
            binary: Path::new("/usr/bin/nmap"),
        };
        NmapAdapter::new().build_command(&request)
    }

    #[test]
    fn default_command_shape() {
        let cmd = build(OptionMap::new()).unwrap();
        assert_eq!(cmd[0], "/usr/bin/nmap");
        assert!(cmd.contains(&"-sS".to_string()));
        assert!(cmd.contains(&"-sV".to_string()));
        assert!(cmd.contains(&"-T4".to_string()));
        assert!(cmd.contains(&"-n".to_string()));
        assert_eq!(cmd[cmd.len() - 3..], ["-oX", "-", "192.0.2.10"]);
    }

    #[test]
    fn options_map_to_flags() {
        let mut options = OptionMap::new();
        options.insert("scan_type".into(), OptionValue::Str("udp".into()));
        options.insert("ports".into(), OptionValue::Str("22,80,8000-8100".into()));
        options.insert("service_detection".into(), OptionValue::Bool(false));
        options.insert("os_detection".into(), OptionValue::Bool(true));
        options.insert("timing".into(), OptionValue::Int(2));
        options.insert("min_rate".into(), OptionValue::Int(500));
        options.insert("no_dns".into(), OptionValue::Bool(false));

        let cmd = build(options).unwrap();
        assert!(cmd.contains(&"-sU".to_string()));
        assert!(cmd.contains(&"-p".to_string()));
        assert!(cmd.contains(&"22,80,8000-8100".to_string()));
        assert!(!cmd.contains(&"-sV".to_string()));
        assert!(cmd.contains(&"-O".to_string()));
        assert!(cmd.contains(&"-T2".to_string()));
        assert!(cmd.contains(&"500".to_string()));
        assert!(!cmd.contains(&"-n".to_string()));
    }

    #[test]
    fn unknown_option_key_is_rejected() {
        let mut options = OptionMap::new();
        options.insert("script".into(), OptionValue::Str("vuln".into()));
        assert!(matches!(
            build(options),
            Err(AdapterError::UnsupportedOption { key, .. }) if key == "script"
        ));
    }

    #[test]
    fn hostile_port_spec_is_rejected() {
        for hostile in ["80; rm -rf /", "80 --script=evil", "1-1024,$(id)", "99999"] {
            let mut options = OptionMap::new();
            options.insert("ports".into(), OptionValue::Str(hostile.into()));
            assert!(
                matches!(build(options), Err(AdapterError::InvalidOption { .. })),
                "should reject {hostile:?}"
            );
        }
    }

    #[test]
    fn out_of_range_timing_is_rejected() {
        let mut options = OptionMap::new();
        options.insert("timing".into(), OptionValue::Int(9));
        assert!(matches!(
            build(options),
            Err(AdapterError::InvalidOption { key, .. }) if key == "timing"
        ));
    }

    #[test]
    fn parses_hosts_ports_and_os() {
        let raw = RawOutput {
            stdout: SAMPLE_XML.as_bytes(),
            stderr: b"",
            truncated: false,
        };
        let parsed = NmapAdapter::new().parse_output(&raw).unwrap();

        assert_eq!(parsed.assets.len(), 1);
        let asset = &parsed.assets[0];
        assert_eq!(asset.source_tool, "nmap");
        // The down host is dropped.
        assert_eq!(asset.hosts.len(), 1);

        let host = &asset.hosts[0];
        assert_eq!(host.address, "192.0.2.10");
        assert_eq!(host.hostname.as_deref(), Some("web.example.internal"));
        assert_eq!(host.mac_address.as_deref(), Some("AA:BB:CC:DD:EE:FF"));
        assert_eq!(host.os_name.as_deref(), Some("Linux 5.x"));
        assert_eq!(host.os_accuracy, Some(96));

        // Only open ports are kept.
        assert_eq!(host.port_count(), 2);
        let ssh = host.port(22, Protocol::Tcp).unwrap();
        assert_eq!(ssh.service.as_deref(), Some("ssh"));
        assert_eq!(ssh.banner.as_deref(), Some("OpenSSH 9.6"));
        let http = host.port(80, Protocol::Tcp).unwrap();
        assert_eq!(http.banner.as_deref(), Some("nginx"));
        assert!(host.port(443, Protocol::Tcp).is_none());
    }

    #[test]
    fn parse_is_deterministic() {
        let raw = RawOutput {
            stdout: SAMPLE_XML.as_bytes(),
            stderr: b"",
            truncated: false,
        };
        let adapter = NmapAdapter::new();
        let first = adapter.parse_output(&raw).unwrap();
        let second = adapter.parse_output(&raw).unwrap();
        // Discovery timestamps differ between calls; the parsed content
        // itself must be identical.
        assert_eq!(first.assets[0].hosts, second.assets[0].hosts);
        assert_eq!(first.assets[0].source_tool, second.assets[0].source_tool);
    }

    #[test]
    fn empty_scan_yields_no_assets() {
        let raw = RawOutput {
            stdout: b"<?xml version=\"1.0\"?><nmaprun></nmaprun>",
            stderr: b"",
            truncated: false,
        };
        let parsed = NmapAdapter::new().parse_output(&raw).unwrap();
        assert!(parsed.assets.is_empty());
    }

    #[test]
    fn malformed_xml_is_a_parse_error() {
        let raw = RawOutput {
            stdout: b"<nmaprun><host><status",
            stderr: b"",
            truncated: false,
        };
        assert!(matches!(
            NmapAdapter::new().parse_output(&raw),
            Err(AdapterError::Parse { .. })
        ));
    }

    #[test]
    fn truncated_capture_keeps_complete_hosts() {
        // Cut the sample mid-way through the second host element.
        let cut = SAMPLE_XML.find("<host><status state=\"down\"").unwrap() + 10;
        let raw = RawOutput {
            stdout: SAMPLE_XML[..cut].as_bytes(),
            stderr: b"",
            truncated: true,
        };
        let parsed = NmapAdapter::new().parse_output(&raw).unwrap();
        assert_eq!(parsed.assets.len(), 1);
        assert_eq!(parsed.assets[0].hosts[0].address, "192.0.2.10");
    }
}
