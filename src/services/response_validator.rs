//! Rule-driven validation of turn results.
//!
//! The validator is a pure function of a [`TurnResult`] and an optional
//! [`FatigueSample`]. Which checks run, and their thresholds, come from
//! [`ValidationConfig`].

use crate::domain::models::{
    category, FatigueSample, Severity, TurnResult, ValidationAlert, ValidationConfig,
};
use crate::services::fatigue_detector::component;

/// Applies the configured rule set to a turn result.
#[derive(Debug, Clone, Default)]
pub struct ResponseValidator {
    rules: ValidationConfig,
}

impl ResponseValidator {
    /// Create a validator for a rule set.
    pub fn new(rules: ValidationConfig) -> Self {
        Self { rules }
    }

    /// Active rule set.
    pub fn rules(&self) -> &ValidationConfig {
        &self.rules
    }

    /// Produce every alert that applies. An empty vector means the turn is
    /// clean.
    pub fn validate(&self, turn: &TurnResult, sample: Option<&FatigueSample>) -> Vec<ValidationAlert> {
        let mut alerts = Vec::new();
        self.check_structure(turn, &mut alerts);
        if let Some(sample) = sample {
            self.check_fatigue(sample, &mut alerts);
        }
        self.check_pressure(turn, &mut alerts);
        alerts
    }

    fn check_structure(&self, turn: &TurnResult, alerts: &mut Vec<ValidationAlert>) {
        if self.rules.require_visible_text && turn.visible_text.trim().is_empty() {
            alerts.push(ValidationAlert::new(
                category::EMPTY_RESPONSE,
                Severity::High,
                "Visible text is empty",
                "Provide a non-empty visibleText",
            ));
        }
        for field in &self.rules.required_fields {
            if turn.metadata.lookup(field).is_none() {
                alerts.push(ValidationAlert::new(
                    category::MISSING_FIELD,
                    Severity::High,
                    format!("Required metadata field '{field}' is missing"),
                    format!("Include processMetadata.{field} in the response"),
                ));
            }
        }
    }

    fn check_fatigue(&self, sample: &FatigueSample, alerts: &mut Vec<ValidationAlert>) {
        if self.rules.fatigue_alerts {
            if sample.hard_flag {
                alerts.push(ValidationAlert::new(
                    category::HARD_FATIGUE,
                    Severity::Medium,
                    format!("Fatigue score {:.3} is above the hard threshold", sample.score),
                    "Change direction: introduce a new angle instead of restating earlier turns",
                ));
            } else if sample.soft_flag {
                alerts.push(ValidationAlert::new(
                    category::SOFT_FATIGUE,
                    Severity::Low,
                    format!("Fatigue score {:.3} is above the soft threshold", sample.score),
                    "Vary phrasing and disclose that the conversation is converging",
                ));
            }
        }
        if let (Some(threshold), Some(novelty)) = (
            self.rules.low_novelty_threshold,
            sample.component(component::NOVELTY),
        ) {
            if novelty < threshold {
                alerts.push(ValidationAlert::new(
                    category::LOW_NOVELTY,
                    Severity::Low,
                    format!("Novelty {novelty:.3} is below {threshold:.3}"),
                    "Bring in material not covered by recent turns",
                ));
            }
        }
    }

    fn check_pressure(&self, turn: &TurnResult, alerts: &mut Vec<ValidationAlert>) {
        if let Some(usage) = turn.metadata.context_usage() {
            if usage > self.rules.context_usage_warning {
                alerts.push(ValidationAlert::new(
                    category::CONTEXT_PRESSURE,
                    Severity::Medium,
                    format!(
                        "Context usage {usage:.2} exceeds {:.2}",
                        self.rules.context_usage_warning
                    ),
                    "Summarise earlier context and keep the reply short",
                ));
            }
        }
        if let (Some(threshold), Some(pressure)) =
            (self.rules.token_pressure_warning, turn.metadata.token_pressure())
        {
            if pressure > threshold {
                alerts.push(ValidationAlert::new(
                    category::TOKEN_PRESSURE,
                    Severity::Low,
                    format!("Token pressure {pressure:.2} exceeds {threshold:.2}"),
                    "Reduce response length",
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::json;

    use super::*;
    use crate::domain::models::FatigueModel;

    fn complete_turn(context_usage: f64) -> TurnResult {
        serde_json::from_value(json!({
            "visibleText": "hi there",
            "processMetadata": {
                "internalSignals": {"contextUsage": context_usage, "tokenPressure": 0.5},
                "processDisclosures": [],
                "complianceBlock": {"ok": true}
            }
        }))
        .unwrap()
    }

    fn sample(score: f64) -> FatigueSample {
        FatigueSample {
            turn_index: 3,
            score,
            model_used: FatigueModel::A,
            components: BTreeMap::from([(component::NOVELTY.to_string(), 1.0 - score)]),
            soft_flag: score > 0.68,
            hard_flag: score > 0.84,
        }
    }

    fn categories(alerts: &[ValidationAlert]) -> Vec<&str> {
        alerts.iter().map(|a| a.category.as_str()).collect()
    }

    #[test]
    fn test_clean_turn_has_no_alerts() {
        let validator = ResponseValidator::default();
        assert!(validator.validate(&complete_turn(0.2), Some(&sample(0.1))).is_empty());
    }

    #[test]
    fn test_degraded_turn_misses_required_fields() {
        let validator = ResponseValidator::default();
        let alerts = validator.validate(&TurnResult::degraded("raw"), None);
        assert_eq!(categories(&alerts), vec![category::MISSING_FIELD, category::MISSING_FIELD]);
        assert!(alerts.iter().all(|a| a.severity == Severity::High));
    }

    #[test]
    fn test_hard_fatigue_is_medium_with_score() {
        let validator = ResponseValidator::default();
        let alerts = validator.validate(&complete_turn(0.2), Some(&sample(0.91)));
        assert_eq!(categories(&alerts), vec![category::HARD_FATIGUE]);
        assert_eq!(alerts[0].severity, Severity::Medium);
        assert!(alerts[0].detail.contains("0.910"));
    }

    #[test]
    fn test_soft_fatigue_is_low() {
        let validator = ResponseValidator::default();
        let alerts = validator.validate(&complete_turn(0.2), Some(&sample(0.7)));
        assert_eq!(categories(&alerts), vec![category::SOFT_FATIGUE]);
        assert_eq!(alerts[0].severity, Severity::Low);
        assert!(alerts[0].detail.contains("0.700"));
    }

    #[test]
    fn test_context_pressure_threshold() {
        let validator = ResponseValidator::default();
        assert!(validator.validate(&complete_turn(0.8), None).is_empty());
        let alerts = validator.validate(&complete_turn(0.81), None);
        assert_eq!(categories(&alerts), vec![category::CONTEXT_PRESSURE]);
    }

    #[test]
    fn test_optional_rules() {
        let validator = ResponseValidator::new(ValidationConfig {
            token_pressure_warning: Some(0.4),
            low_novelty_threshold: Some(0.5),
            fatigue_alerts: false,
            ..ValidationConfig::default()
        });
        let alerts = validator.validate(&complete_turn(0.2), Some(&sample(0.7)));
        assert_eq!(
            categories(&alerts),
            vec![category::LOW_NOVELTY, category::TOKEN_PRESSURE]
        );
    }

    #[test]
    fn test_empty_visible_text() {
        let validator = ResponseValidator::default();
        let mut turn = complete_turn(0.1);
        turn.visible_text = "   ".to_string();
        assert_eq!(
            categories(&validator.validate(&turn, None)),
            vec![category::EMPTY_RESPONSE]
        );
    }
}
