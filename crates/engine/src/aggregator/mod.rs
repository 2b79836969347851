//! Merge the three role reports into one [`ContractReview`].
//!
//! Pure and deterministic: the same contributions always produce the same
//! review. Findings are correlated by case-insensitive clause title, and the
//! summary counts are recomputed from the merged clauses rather than taken
//! from any role.

use std::collections::HashMap;

use contract_review_common::types::{
    is_conventional_status, ClauseAnalysis, ClauseFinding, ContractReview, ReviewSummary,
    RiskItem, RiskLevel,
};
use contract_review_common::SchemaValidationError;
use serde::Serialize;
use serde_json::Value;

use crate::roles::{ReviewRole, RoleReport};

/// Verdict used when the checklist role gave none.
pub const UNDETERMINED_STATUS: &str = "Undetermined";

/// Contract type used when no role named one.
pub const UNKNOWN_CONTRACT_TYPE: &str = "Unknown";

/// What one role contributed to a review.
#[derive(Clone, Debug)]
pub enum RoleContribution {
    Completed(RoleReport),
    /// The role produced nothing; `reason` is kept for the report log.
    Failed { reason: String },
}

impl RoleContribution {
    fn report(&self) -> Option<&RoleReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Failed { .. } => None,
        }
    }
}

/// Contributions of all three roles to one review.
#[derive(Clone, Debug)]
pub struct RoleOutputs {
    pub clause_extraction: RoleContribution,
    pub risk_scoring: RoleContribution,
    pub checklist_compliance: RoleContribution,
}

impl RoleOutputs {
    pub fn get(&self, role: ReviewRole) -> &RoleContribution {
        match role {
            ReviewRole::ClauseExtraction => &self.clause_extraction,
            ReviewRole::RiskScoring => &self.risk_scoring,
            ReviewRole::ChecklistCompliance => &self.checklist_compliance,
        }
    }

    fn report(&self, role: ReviewRole) -> Option<&RoleReport> {
        self.get(role).report()
    }
}

/// A finding that failed validation and was left out of the review.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RejectedRecord {
    pub role: ReviewRole,
    /// Position of the finding in the role's list.
    pub index: usize,
    pub error: SchemaValidationError,
}

/// Result of aggregation.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregation {
    pub review: ContractReview,
    pub rejected_records: Vec<RejectedRecord>,
    /// Roles that contributed nothing, in role order.
    pub missing_roles: Vec<ReviewRole>,
}

// Field precedence between roles when more than one reported a clause.
const TEXT_PRECEDENCE: [ReviewRole; 3] = [
    ReviewRole::ClauseExtraction,
    ReviewRole::RiskScoring,
    ReviewRole::ChecklistCompliance,
];
const ASSESSMENT_PRECEDENCE: [ReviewRole; 3] = [
    ReviewRole::RiskScoring,
    ReviewRole::ClauseExtraction,
    ReviewRole::ChecklistCompliance,
];
const PLAYBOOK_PRECEDENCE: [ReviewRole; 3] = [
    ReviewRole::ChecklistCompliance,
    ReviewRole::ClauseExtraction,
    ReviewRole::RiskScoring,
];
const HEADER_PRECEDENCE: [ReviewRole; 3] = [
    ReviewRole::ClauseExtraction,
    ReviewRole::ChecklistCompliance,
    ReviewRole::RiskScoring,
];

/// Merges role outputs into a review.
pub struct ReportAggregator;

impl ReportAggregator {
    pub fn aggregate(outputs: &RoleOutputs) -> Aggregation {
        let missing_roles: Vec<ReviewRole> = ReviewRole::ALL
            .into_iter()
            .filter(|role| outputs.report(*role).is_none())
            .collect();

        let mut rejected_records = Vec::new();
        let mut clauses = ClauseTable::default();

        for role in ReviewRole::ALL {
            let Some(report) = outputs.report(role) else {
                continue;
            };
            for (index, raw) in report.findings.iter().enumerate() {
                match validate_finding(role, raw) {
                    Ok(finding) => clauses.insert(role, finding),
                    Err(error) => rejected_records.push(RejectedRecord { role, index, error }),
                }
            }
        }

        let clause_analyses = clauses.merge();

        let contract_type = first_header(outputs, |r| r.contract_type.clone())
            .unwrap_or_else(|| UNKNOWN_CONTRACT_TYPE.to_string());
        let jurisdiction = first_header(outputs, |r| r.jurisdiction.clone());

        let checklist = outputs.report(ReviewRole::ChecklistCompliance);
        let status = checklist
            .and_then(|r| r.overall_compliance_status.clone())
            .unwrap_or_else(|| UNDETERMINED_STATUS.to_string());
        if checklist.is_some() && !is_conventional_status(&status) {
            tracing::warn!(status = %status, "Unconventional compliance verdict");
        }

        // Counts first, so a generated narrative can quote them.
        let mut summary = ReviewSummary::tally(status, String::new(), &clause_analyses);
        let mut executive_summary = checklist
            .and_then(|r| r.executive_summary.clone())
            .unwrap_or_else(|| generated_summary(&summary));
        if !missing_roles.is_empty() {
            executive_summary.push_str("\n\n");
            executive_summary.push_str(&incomplete_note(&missing_roles));
        }
        summary.executive_summary = executive_summary;

        let recommendations = dedup_texts(
            ReviewRole::ALL
                .into_iter()
                .filter_map(|role| outputs.report(role))
                .flat_map(|r| r.recommendations.iter().cloned()),
        );

        let questions = dedup_texts(
            ReviewRole::ALL
                .into_iter()
                .filter_map(|role| outputs.report(role))
                .flat_map(|r| r.questions_for_user.iter().cloned())
                .chain(missing_roles.iter().map(|role| missing_role_question(*role))),
        );

        Aggregation {
            review: ContractReview {
                contract_type,
                jurisdiction,
                clause_analyses,
                summary,
                recommendations,
                questions_for_user: (!questions.is_empty()).then_some(questions),
            },
            rejected_records,
            missing_roles,
        }
    }
}

fn first_header(
    outputs: &RoleOutputs,
    field: impl Fn(&RoleReport) -> Option<String>,
) -> Option<String> {
    HEADER_PRECEDENCE
        .into_iter()
        .filter_map(|role| outputs.report(role))
        .find_map(field)
}

/// The risk role must give a level for every clause it reports; the other
/// roles may report partial findings.
fn validate_finding(role: ReviewRole, raw: &Value) -> Result<ClauseFinding, SchemaValidationError> {
    match role {
        ReviewRole::RiskScoring => RiskItem::from_value(raw).map(ClauseFinding::from),
        ReviewRole::ClauseExtraction | ReviewRole::ChecklistCompliance => {
            ClauseFinding::from_value(raw)
        }
    }
}

/// Findings grouped by correlation key, in first-seen order.
#[derive(Default)]
struct ClauseTable {
    order: Vec<String>,
    entries: HashMap<String, Vec<(ReviewRole, ClauseFinding)>>,
}

impl ClauseTable {
    fn insert(&mut self, role: ReviewRole, finding: ClauseFinding) {
        let key = finding.correlation_key();
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.entry(key).or_default().push((role, finding));
    }

    fn merge(self) -> Vec<ClauseAnalysis> {
        let Self { order, mut entries } = self;
        order
            .into_iter()
            .filter_map(|key| entries.remove(&key))
            .map(|findings| merge_findings(&findings))
            .collect()
    }
}

/// First value of `field` over the findings, taking roles in `precedence`
/// order and findings of one role in the order they were reported.
fn pick<T>(
    findings: &[(ReviewRole, ClauseFinding)],
    precedence: [ReviewRole; 3],
    field: impl Fn(&ClauseFinding) -> Option<T>,
) -> Option<T> {
    precedence.into_iter().find_map(|role| {
        findings
            .iter()
            .filter(|(r, _)| *r == role)
            .find_map(|(_, f)| field(f))
    })
}

fn merge_findings(findings: &[(ReviewRole, ClauseFinding)]) -> ClauseAnalysis {
    let clause_title = findings
        .first()
        .map(|(_, f)| f.clause_title.clone())
        .unwrap_or_default();

    // Over-flagging is preferred to under-flagging.
    let risk_level = findings
        .iter()
        .filter_map(|(_, f)| f.risk_level)
        .fold(RiskLevel::Unknown, RiskLevel::most_severe);

    ClauseAnalysis {
        clause_title,
        category: pick(findings, TEXT_PRECEDENCE, |f| f.category.clone()),
        original_text: pick(findings, TEXT_PRECEDENCE, |f| f.original_text.clone())
            .unwrap_or_default(),
        risk_level,
        rationale: pick(findings, ASSESSMENT_PRECEDENCE, |f| f.rationale.clone()),
        redline_suggestion: pick(findings, PLAYBOOK_PRECEDENCE, |f| {
            f.redline_suggestion.clone()
        }),
        playbook_match: pick(findings, PLAYBOOK_PRECEDENCE, |f| f.playbook_match),
        requires_user_input: findings
            .iter()
            .any(|(_, f)| f.requires_user_input == Some(true)),
        user_attention_score: pick(findings, ASSESSMENT_PRECEDENCE, |f| f.user_attention_score),
        agent_confidence_score: pick(findings, ASSESSMENT_PRECEDENCE, |f| {
            f.agent_confidence_score
        }),
    }
}

/// Keep the first occurrence of each text, dropping blanks.
fn dedup_texts(texts: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for text in texts {
        if !text.trim().is_empty() && !out.contains(&text) {
            out.push(text);
        }
    }
    out
}

fn generated_summary(summary: &ReviewSummary) -> String {
    format!(
        "Reviewed {} clause{}: {} high risk, {} medium risk, {} low risk, {} unrated.",
        summary.total_clauses_reviewed,
        if summary.total_clauses_reviewed == 1 { "" } else { "s" },
        summary.high_risk_count,
        summary.medium_risk_count,
        summary.low_risk_count,
        summary.unknown_risk_count()
    )
}

fn incomplete_note(missing: &[ReviewRole]) -> String {
    let labels: Vec<&str> = missing.iter().map(|r| r.label()).collect();
    format!(
        "Incomplete review: missing analysis dimensions: {}.",
        labels.join(", ")
    )
}

fn missing_role_question(role: ReviewRole) -> String {
    format!(
        "Role {} did not complete; manual review recommended for this area.",
        role.label()
    )
}
