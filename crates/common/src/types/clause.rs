use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::RiskLevel;
use crate::error::SchemaValidationError;
use crate::validation::RecordReader;

/// One reviewed clause of the contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClauseAnalysis {
    pub clause_title: String,
    /// Free-text category (e.g. "Liability", "Termination").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Verbatim excerpt from the contract.
    pub original_text: String,
    pub risk_level: RiskLevel,
    /// Why this clause is flagged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redline_suggestion: Option<String>,
    /// Whether the clause aligns with the playbook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook_match: Option<bool>,
    #[serde(default)]
    pub requires_user_input: bool,
    /// How much the user should pay attention to this clause, in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_attention_score: Option<f64>,
    /// The analysing role's confidence, in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_confidence_score: Option<f64>,
}

impl ClauseAnalysis {
    pub const RECORD: &'static str = "ClauseAnalysis";

    /// Validate raw role output into a clause analysis.
    ///
    /// `clause_title`, `original_text` and `risk_level` are required.
    /// Unknown fields are ignored.
    pub fn from_value(raw: &Value) -> Result<Self, SchemaValidationError> {
        let mut r = RecordReader::new(Self::RECORD, raw);

        let clause_title = r.required_title("clause_title");
        let category = r.optional_text("category");
        let original_text = r.required_text("original_text");
        let risk_level = r.required_risk_level("risk_level");
        let rationale = r.optional_text("rationale");
        let redline_suggestion = r.optional_text("redline_suggestion");
        let playbook_match = r.optional_bool("playbook_match");
        let requires_user_input = r.optional_bool("requires_user_input").unwrap_or(false);
        let user_attention_score = r.optional_score("user_attention_score");
        let agent_confidence_score = r.optional_score("agent_confidence_score");

        r.finish()?;

        Ok(Self {
            clause_title: clause_title.unwrap_or_default(),
            category,
            original_text: original_text.unwrap_or_default(),
            risk_level: risk_level.unwrap_or_default(),
            rationale,
            redline_suggestion,
            playbook_match,
            requires_user_input,
            user_attention_score,
            agent_confidence_score,
        })
    }
}

/// A risk-focused view of a clause, produced by the risk scoring role.
///
/// Independent of [`ClauseAnalysis`]; the two may disagree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RiskItem {
    pub clause_title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_attention_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_confidence_score: Option<f64>,
}

impl RiskItem {
    pub const RECORD: &'static str = "RiskItem";

    pub fn from_value(raw: &Value) -> Result<Self, SchemaValidationError> {
        let mut r = RecordReader::new(Self::RECORD, raw);

        let clause_title = r.required_title("clause_title");
        let category = r.optional_text("category");
        let risk_level = r.required_risk_level("risk_level");
        let reason = r.optional_text("reason");
        let rationale = r.optional_text("rationale");
        let user_attention_score = r.optional_score("user_attention_score");
        let agent_confidence_score = r.optional_score("agent_confidence_score");

        r.finish()?;

        Ok(Self {
            clause_title: clause_title.unwrap_or_default(),
            category,
            risk_level: risk_level.unwrap_or_default(),
            reason: reason.or(rationale),
            user_attention_score,
            agent_confidence_score,
        })
    }
}

/// A partial clause finding from any single analysis role.
///
/// Only `clause_title` is required; the aggregator fills the rest from
/// whichever roles reported the same clause.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ClauseFinding {
    pub clause_title: String,
    pub category: Option<String>,
    pub original_text: Option<String>,
    pub risk_level: Option<RiskLevel>,
    /// `rationale`, or the risk role's `reason` when no rationale is given.
    pub rationale: Option<String>,
    pub redline_suggestion: Option<String>,
    pub playbook_match: Option<bool>,
    pub requires_user_input: Option<bool>,
    pub user_attention_score: Option<f64>,
    pub agent_confidence_score: Option<f64>,
}

impl ClauseFinding {
    pub const RECORD: &'static str = "ClauseFinding";

    pub fn from_value(raw: &Value) -> Result<Self, SchemaValidationError> {
        let mut r = RecordReader::new(Self::RECORD, raw);

        let clause_title = r.required_title("clause_title");
        let category = r.optional_text("category");
        let original_text = r.optional_text("original_text");
        let risk_level = r.optional_risk_level("risk_level");
        let rationale = r.optional_text("rationale");
        let reason = r.optional_text("reason");
        let redline_suggestion = r.optional_text("redline_suggestion");
        let playbook_match = r.optional_bool("playbook_match");
        let requires_user_input = r.optional_bool("requires_user_input");
        let user_attention_score = r.optional_score("user_attention_score");
        let agent_confidence_score = r.optional_score("agent_confidence_score");

        r.finish()?;

        Ok(Self {
            clause_title: clause_title.unwrap_or_default(),
            category,
            original_text,
            risk_level,
            rationale: rationale.or(reason),
            redline_suggestion,
            playbook_match,
            requires_user_input,
            user_attention_score,
            agent_confidence_score,
        })
    }

    /// Case-insensitive correlation key.
    pub fn correlation_key(&self) -> String {
        self.clause_title.trim().to_lowercase()
    }
}

impl From<RiskItem> for ClauseFinding {
    fn from(item: RiskItem) -> Self {
        Self {
            clause_title: item.clause_title,
            category: item.category,
            risk_level: Some(item.risk_level),
            rationale: item.reason,
            user_attention_score: item.user_attention_score,
            agent_confidence_score: item.agent_confidence_score,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_clause() -> Value {
        json!({
            "clause_title": "Indemnification",
            "category": "Liability",
            "original_text": "Customer shall indemnify Provider against all claims.",
            "risk_level": "high",
            "rationale": "One-sided indemnity",
            "user_attention_score": 0.9,
            "agent_confidence_score": 0.75
        })
    }

    #[test]
    fn test_valid_clause_parses() {
        let clause = ClauseAnalysis::from_value(&valid_clause()).unwrap();
        assert_eq!(clause.clause_title, "Indemnification");
        assert_eq!(clause.category.as_deref(), Some("Liability"));
        assert_eq!(clause.risk_level, RiskLevel::High);
        assert_eq!(clause.user_attention_score, Some(0.9));
        assert!(!clause.requires_user_input);
        assert_eq!(clause.playbook_match, None);
    }

    #[test]
    fn test_score_bounds_are_inclusive() {
        for score in [0.0, 0.5, 1.0] {
            let mut raw = valid_clause();
            raw["user_attention_score"] = json!(score);
            raw["agent_confidence_score"] = json!(score);
            let clause = ClauseAnalysis::from_value(&raw).unwrap();
            assert_eq!(clause.user_attention_score, Some(score));
        }
    }

    #[test]
    fn test_out_of_range_scores_are_rejected_not_clamped() {
        let mut raw = valid_clause();
        raw["user_attention_score"] = json!(1.5);
        raw["agent_confidence_score"] = json!(-0.1);

        let err = ClauseAnalysis::from_value(&raw).unwrap_err();
        assert_eq!(err.violations.len(), 2);
        assert!(err.has_field("user_attention_score"));
        assert!(err.has_field("agent_confidence_score"));
    }

    #[test]
    fn test_missing_required_fields_collected_together() {
        let raw = json!({ "category": "Payment", "user_attention_score": 3 });

        let err = ClauseAnalysis::from_value(&raw).unwrap_err();
        assert!(err.has_field("clause_title"));
        assert!(err.has_field("original_text"));
        assert!(err.has_field("risk_level"));
        assert!(err.has_field("user_attention_score"));
        assert_eq!(err.violations.len(), 4);
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let mut raw = valid_clause();
        raw["page_number"] = json!(4);
        raw["negotiation_history"] = json!(["v1", "v2"]);
        assert!(ClauseAnalysis::from_value(&raw).is_ok());
    }

    #[test]
    fn test_wrong_types_reported() {
        let mut raw = valid_clause();
        raw["requires_user_input"] = json!("yes");
        raw["playbook_match"] = json!(1);
        raw["risk_level"] = json!("severe");

        let err = ClauseAnalysis::from_value(&raw).unwrap_err();
        assert!(err.has_field("requires_user_input"));
        assert!(err.has_field("playbook_match"));
        assert!(err.has_field("risk_level"));
    }

    #[test]
    fn test_empty_title_rejected() {
        let mut raw = valid_clause();
        raw["clause_title"] = json!("   ");
        let err = ClauseAnalysis::from_value(&raw).unwrap_err();
        assert!(err.has_field("clause_title"));
    }

    #[test]
    fn test_risk_item_requires_level() {
        let err = RiskItem::from_value(&json!({"clause_title": "Termination"})).unwrap_err();
        assert!(err.has_field("risk_level"));

        let item = RiskItem::from_value(&json!({
            "clause_title": "Termination",
            "risk_level": "MEDIUM",
            "reason": "Limited termination rights"
        }))
        .unwrap();
        assert_eq!(item.risk_level, RiskLevel::Medium);
        assert_eq!(item.reason.as_deref(), Some("Limited termination rights"));
    }

    #[test]
    fn test_finding_takes_reason_as_rationale() {
        let finding = ClauseFinding::from_value(&json!({
            "clause_title": " Governing Law ",
            "reason": "Out-of-state venue"
        }))
        .unwrap();
        assert_eq!(finding.rationale.as_deref(), Some("Out-of-state venue"));
        assert_eq!(finding.risk_level, None);
        assert_eq!(finding.correlation_key(), "governing law");
    }

    #[test]
    fn test_null_optional_fields_are_unset() {
        let finding = ClauseFinding::from_value(&json!({
            "clause_title": "Insurance",
            "category": null,
            "user_attention_score": null
        }))
        .unwrap();
        assert_eq!(finding.category, None);
        assert_eq!(finding.user_attention_score, None);
    }
}
