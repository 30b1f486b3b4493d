//! Recommendation Types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

/// Rule identities. The variant order here is the documented evaluation
/// order; tests pin it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    FuelLeakPattern,
    AnomalyCluster,
    EfficiencyDecline,
    ErraticConsumption,
    FleetAnomalyRate,
    SparseHistory,
}

/// What a recommendation is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Vehicle(String),
    Fleet,
}

/// One advisory. Generated fresh per evaluation; no stored identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub rule: RecommendationType,
    pub severity: Severity,
    pub subject: Subject,
    pub message: String,
    pub suggested_action: String,
    /// Numbers backing the message, for dashboards and logs
    pub details: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
    }

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::Critical.to_string(), "CRITICAL");
        assert_eq!(Severity::Low.to_string(), "LOW");
    }
}
