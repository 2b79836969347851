use serde::{Deserialize, Serialize};

use super::{ClauseAnalysis, RiskLevel};

/// Conventional compliance verdicts. Role output is not restricted to these.
pub const COMPLIANCE_VOCABULARY: [&str; 3] = ["Compliant", "Partial", "Risky"];

/// Whether a compliance verdict uses the conventional vocabulary.
pub fn is_conventional_status(status: &str) -> bool {
    COMPLIANCE_VOCABULARY
        .iter()
        .any(|s| s.eq_ignore_ascii_case(status.trim()))
}

/// Aggregate summary of a review.
///
/// `high_risk_count + medium_risk_count + low_risk_count <= total_clauses_reviewed`;
/// clauses at [`RiskLevel::Unknown`] count only towards the total.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    /// Free text, conventionally one of [`COMPLIANCE_VOCABULARY`].
    pub overall_compliance_status: String,
    pub executive_summary: String,
    pub total_clauses_reviewed: u32,
    pub high_risk_count: u32,
    pub medium_risk_count: u32,
    pub low_risk_count: u32,
}

impl ReviewSummary {
    /// Build a summary whose counts are derived from the clauses themselves.
    pub fn tally(
        overall_compliance_status: String,
        executive_summary: String,
        clauses: &[ClauseAnalysis],
    ) -> Self {
        let count = |level: RiskLevel| {
            saturating_u32(clauses.iter().filter(|c| c.risk_level == level).count())
        };

        Self {
            overall_compliance_status,
            executive_summary,
            total_clauses_reviewed: saturating_u32(clauses.len()),
            high_risk_count: count(RiskLevel::High),
            medium_risk_count: count(RiskLevel::Medium),
            low_risk_count: count(RiskLevel::Low),
        }
    }

    pub fn unknown_risk_count(&self) -> u32 {
        self.total_clauses_reviewed.saturating_sub(
            self.high_risk_count + self.medium_risk_count + self.low_risk_count,
        )
    }
}

fn saturating_u32(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// The structured result of reviewing one contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContractReview {
    /// e.g. "NDA", "SaaS", "Services Agreement".
    pub contract_type: String,
    /// Governing law or location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jurisdiction: Option<String>,
    /// In document order.
    pub clause_analyses: Vec<ClauseAnalysis>,
    pub summary: ReviewSummary,
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions_for_user: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(title: &str, level: RiskLevel) -> ClauseAnalysis {
        ClauseAnalysis {
            clause_title: title.into(),
            category: None,
            original_text: String::new(),
            risk_level: level,
            rationale: None,
            redline_suggestion: None,
            playbook_match: None,
            requires_user_input: false,
            user_attention_score: None,
            agent_confidence_score: None,
        }
    }

    #[test]
    fn test_tally_excludes_unknown_from_buckets() {
        let clauses = vec![
            clause("A", RiskLevel::High),
            clause("B", RiskLevel::Unknown),
            clause("C", RiskLevel::Low),
            clause("D", RiskLevel::High),
        ];
        let summary = ReviewSummary::tally("Risky".into(), "s".into(), &clauses);
        assert_eq!(summary.total_clauses_reviewed, 4);
        assert_eq!(summary.high_risk_count, 2);
        assert_eq!(summary.medium_risk_count, 0);
        assert_eq!(summary.low_risk_count, 1);
        assert_eq!(summary.unknown_risk_count(), 1);
    }

    #[test]
    fn test_tally_of_nothing_is_all_zero() {
        let summary = ReviewSummary::tally("Compliant".into(), String::new(), &[]);
        assert_eq!(summary.total_clauses_reviewed, 0);
        assert_eq!(summary.high_risk_count, 0);
        assert_eq!(summary.medium_risk_count, 0);
        assert_eq!(summary.low_risk_count, 0);
    }

    #[test]
    fn test_saturating_count() {
        assert_eq!(saturating_u32(7), 7);
        assert_eq!(saturating_u32(usize::MAX), u32::MAX);
    }

    #[test]
    fn test_conventional_vocabulary() {
        assert!(is_conventional_status("Risky"));
        assert!(is_conventional_status(" partial "));
        assert!(!is_conventional_status("Needs counsel"));
    }
}
