//! Validation alerts produced for a turn result.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Alert severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Weight used when ranking candidate results (high=3, medium=2, low=1).
    pub const fn weight(self) -> u32 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Alert category identifiers emitted by the built-in checks. Categories are
/// opaque strings so rule sets may introduce their own.
pub mod category {
    pub const MISSING_FIELD: &str = "MISSING_FIELD";
    pub const EMPTY_RESPONSE: &str = "EMPTY_RESPONSE";
    pub const HARD_FATIGUE: &str = "HARD_FATIGUE";
    pub const SOFT_FATIGUE: &str = "SOFT_FATIGUE";
    pub const LOW_NOVELTY: &str = "LOW_NOVELTY";
    pub const CONTEXT_PRESSURE: &str = "CONTEXT_PRESSURE";
    pub const TOKEN_PRESSURE: &str = "TOKEN_PRESSURE";
}

/// One diagnostic about a turn result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationAlert {
    pub category: String,
    pub severity: Severity,
    pub detail: String,
    pub suggested_fix: String,
}

impl ValidationAlert {
    /// Build an alert.
    pub fn new(
        category: impl Into<String>,
        severity: Severity,
        detail: impl Into<String>,
        suggested_fix: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            severity,
            detail: detail.into(),
            suggested_fix: suggested_fix.into(),
        }
    }
}

impl fmt::Display for ValidationAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ({}) {}. Fix: {}",
            self.category, self.severity, self.detail, self.suggested_fix
        )
    }
}

/// Severity-weighted sum, used to pick the best of several imperfect results.
pub fn alert_weight(alerts: &[ValidationAlert]) -> u32 {
    alerts.iter().map(|a| a.severity.weight()).sum()
}
