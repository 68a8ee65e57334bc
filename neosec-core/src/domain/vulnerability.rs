//! Normalized vulnerability model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a finding, ordered from least to most severe.
///
/// The derived `Ord` gives `Info < Low < Medium < High < Critical`, which is
/// what threshold comparisons rely on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Rough classification of what a finding is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VulnerabilityCategory {
    Network,
    Web,
    Configuration,
    Credential,
    Other,
}

/// CVSS scoring data attached to a vulnerability when the tool reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cvss {
    /// Full vector string, e.g. `CVSS:3.1/AV:N/AC:L/...`.
    pub vector: String,
    /// Base score in [0.0, 10.0].
    pub base_score: f64,
    pub version: String,
}

impl Cvss {
    /// Build a CVSS record, clamping the score into the valid range.
    pub fn new(vector: impl Into<String>, base_score: f64, version: impl Into<String>) -> Self {
        Self {
            vector: vector.into(),
            base_score: base_score.clamp(0.0, 10.0),
            version: version.into(),
        }
    }
}

/// A normalized vulnerability finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    /// Stable identifier, unique per (tool, finding) pair.
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cvss: Option<Cvss>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cve_ids: Vec<String>,
    pub category: VulnerabilityCategory,
    /// Host address or URL the finding applies to.
    pub affected: String,
    /// Raw evidence excerpt preserved for forensics.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub evidence: String,
    pub detected_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_total_order() {
        assert!(Severity::Info < Severity::Low);
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
        assert_eq!(
            [Severity::High, Severity::Info, Severity::Critical]
                .iter()
                .max(),
            Some(&Severity::Critical)
        );
    }

    #[test]
    fn cvss_score_is_clamped() {
        assert_eq!(Cvss::new("CVSS:3.1/AV:N", 11.2, "3.1").base_score, 10.0);
        assert_eq!(Cvss::new("CVSS:3.1/AV:N", -0.5, "3.1").base_score, 0.0);
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
        let back: Severity = serde_json::from_str("\"medium\"").unwrap();
        assert_eq!(back, Severity::Medium);
    }
}
