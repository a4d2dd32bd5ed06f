//! Kind-specific fix validation.
//!
//! Riskier kinds need more confidence before they run unattended.

use std::collections::HashMap;

use shared_types::{FixKind, GeneratedFix};

use super::value_objects::{ValidationRule, Verdict};

#[derive(Debug, Clone)]
pub struct ValidationTable {
    rules: HashMap<FixKind, ValidationRule>,
}

impl Default for ValidationTable {
    fn default() -> Self {
        let rules = HashMap::from([
            (FixKind::ConfigChange, ValidationRule::StructuredPayload),
            (FixKind::MethodFallback, ValidationRule::Always),
            (FixKind::CommandExecution, ValidationRule::MinConfidence(80)),
            (FixKind::DriverUpdate, ValidationRule::AdvisoryOnly),
            (FixKind::FeatureDisable, ValidationRule::MinConfidence(70)),
            (FixKind::CodePatch, ValidationRule::MinConfidence(90)),
            (FixKind::Manual, ValidationRule::OperatorOnly),
        ]);
        Self { rules }
    }
}

impl ValidationTable {
    pub fn set_rule(&mut self, kind: FixKind, rule: ValidationRule) {
        self.rules.insert(kind, rule);
    }

    pub fn rule(&self, kind: FixKind) -> Option<ValidationRule> {
        self.rules.get(&kind).copied()
    }

    pub fn validate(&self, fix: &GeneratedFix) -> Verdict {
        let Some(rule) = self.rule(fix.kind) else {
            return Verdict::Rejected(format!("no validation rule for {}", fix.kind));
        };
        match rule {
            ValidationRule::StructuredPayload => {
                match serde_json::from_str::<serde_json::Value>(&fix.payload) {
                    Ok(_) => Verdict::AutoApply,
                    Err(e) => Verdict::Rejected(format!("payload is not structured data: {}", e)),
                }
            }
            ValidationRule::Always => Verdict::AutoApply,
            ValidationRule::MinConfidence(min) if fix.confidence_score >= min => Verdict::AutoApply,
            ValidationRule::MinConfidence(min) => Verdict::Rejected(format!(
                "confidence {} below {} required for {}",
                fix.confidence_score, min, fix.kind
            )),
            ValidationRule::AdvisoryOnly => Verdict::Advisory,
            ValidationRule::OperatorOnly => Verdict::OperatorRequired,
        }
    }
}
