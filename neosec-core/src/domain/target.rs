//! Scan target validation
//!
//! Targets come straight from the CLI or workflow file and end up as argv
//! tokens of external tools, so validation here is the first line of defense
//! against command injection. A [`Target`] can only be constructed through
//! [`Target::parse`], which rejects shell metacharacters outright and then
//! classifies the value.

use std::fmt;
use std::net::IpAddr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Characters that must never reach an argv token built from user input.
static SHELL_METACHARACTERS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[;&|$`\\'"<>\n\r]"#).expect("static pattern"));

static HOSTNAME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)*[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$",
    )
    .expect("static pattern")
});

/// What kind of address a target turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Ip,
    Cidr,
    Hostname,
    Url,
}

/// A validated scan target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Target {
    value: String,
    kind: TargetKind,
}

impl Target {
    /// Validate and classify a raw target string.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(TargetError::Empty);
        }
        if SHELL_METACHARACTERS.is_match(value) {
            return Err(TargetError::ForbiddenCharacters(value.to_string()));
        }

        let kind = classify(value).ok_or_else(|| TargetError::Unrecognized(value.to_string()))?;
        Ok(Self {
            value: value.to_string(),
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }
}

fn classify(value: &str) -> Option<TargetKind> {
    if value.parse::<IpAddr>().is_ok() {
        return Some(TargetKind::Ip);
    }
    if let Some((addr, prefix)) = value.split_once('/') {
        let max = match addr.parse::<IpAddr>() {
            Ok(IpAddr::V4(_)) => 32u8,
            Ok(IpAddr::V6(_)) => 128u8,
            Err(_) => return None,
        };
        return match prefix.parse::<u8>() {
            Ok(p) if p <= max => Some(TargetKind::Cidr),
            _ => None,
        };
    }
    if value.starts_with("http://") || value.starts_with("https://") {
        let rest = value.splitn(2, "://").nth(1)?;
        let host = rest.split(['/', ':', '?']).next()?;
        if !host.is_empty() && (host.parse::<IpAddr>().is_ok() || HOSTNAME_PATTERN.is_match(host)) {
            return Some(TargetKind::Url);
        }
        return None;
    }
    if value.len() <= 253 && HOSTNAME_PATTERN.is_match(value) {
        return Some(TargetKind::Hostname);
    }
    None
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl TryFrom<String> for Target {
    type Error = TargetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Target::parse(&value)
    }
}

impl From<Target> for String {
    fn from(target: Target) -> String {
        target.value
    }
}

/// Target validation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("target is empty")]
    Empty,
    #[error("target contains shell metacharacters: {0:?}")]
    ForbiddenCharacters(String),
    #[error("target is not an IP, CIDR, hostname, or URL: {0:?}")]
    Unrecognized(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_target_shapes() {
        assert_eq!(Target::parse("192.0.2.1").unwrap().kind(), TargetKind::Ip);
        assert_eq!(Target::parse("2001:db8::1").unwrap().kind(), TargetKind::Ip);
        assert_eq!(
            Target::parse("192.0.2.0/24").unwrap().kind(),
            TargetKind::Cidr
        );
        assert_eq!(
            Target::parse("scanme.example.com").unwrap().kind(),
            TargetKind::Hostname
        );
        assert_eq!(
            Target::parse("https://example.com/login").unwrap().kind(),
            TargetKind::Url
        );
    }

    #[test]
    fn rejects_shell_metacharacters() {
        for hostile in [
            "192.0.2.1; rm -rf /",
            "example.com && id",
            "example.com|nc",
            "$(whoami).example.com",
            "`id`.example.com",
            "host\nsecond",
            "a<b.example.com",
            "quote'.example.com",
        ] {
            assert!(
                matches!(
                    Target::parse(hostile),
                    Err(TargetError::ForbiddenCharacters(_))
                ),
                "should reject {:?}",
                hostile
            );
        }
    }

    #[test]
    fn rejects_malformed_cidr_and_garbage() {
        assert!(Target::parse("192.0.2.0/33").is_err());
        assert!(Target::parse("not valid!").is_err());
        assert!(Target::parse("").is_err());
        assert!(Target::parse("http://").is_err());
    }

    #[test]
    fn serde_round_trip_revalidates() {
        let target = Target::parse("10.0.0.0/8").unwrap();
        let json = serde_json::to_string(&target).unwrap();
        assert_eq!(json, "\"10.0.0.0/8\"");
        let back: Target = serde_json::from_str(&json).unwrap();
        assert_eq!(back, target);

        let hostile: Result<Target, _> = serde_json::from_str("\"a;b\"");
        assert!(hostile.is_err());
    }
}
