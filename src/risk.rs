use std::fmt;

use serde::Serialize;

pub const MEDIUM_RISK_FROM: f64 = 10.0;
pub const HIGH_RISK_FROM: f64 = 30.0;

/// Leptospirosis transmission risk tier. Malaria indices have no tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLevel {
    #[serde(rename = "Low Risk")]
    Low,
    #[serde(rename = "Medium Risk")]
    Medium,
    #[serde(rename = "High Risk")]
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low Risk",
            RiskLevel::Medium => "Medium Risk",
            RiskLevel::High => "High Risk",
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Minimal intervention needed",
            RiskLevel::Medium => "Enhanced monitoring recommended",
            RiskLevel::High => "Immediate control measures required",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn classify_rodent_index(rodent_index: f64) -> RiskLevel {
    if rodent_index < MEDIUM_RISK_FROM {
        RiskLevel::Low
    } else if rodent_index < HIGH_RISK_FROM {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}
