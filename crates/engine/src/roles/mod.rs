//! The three analysis roles and the interface used to invoke them.

pub mod output;
pub mod session;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use contract_review_common::config::{LlmConfig, LlmRoleConfig};
use contract_review_common::types::UserContext;
use contract_review_common::ReviewError;
use serde::{Deserialize, Serialize};

use crate::document::Document;

pub use output::RoleReport;
pub use session::LlmRoleInvoker;

/// An independent analysis dimension of a review.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewRole {
    ClauseExtraction,
    RiskScoring,
    ChecklistCompliance,
}

impl ReviewRole {
    /// All roles in aggregation order.
    pub const ALL: [ReviewRole; 3] = [
        ReviewRole::ClauseExtraction,
        ReviewRole::RiskScoring,
        ReviewRole::ChecklistCompliance,
    ];

    /// Stable identifier, used for config sections, prompts and tool directories.
    pub fn id(self) -> &'static str {
        match self {
            Self::ClauseExtraction => "clause_extraction",
            Self::RiskScoring => "risk_scoring",
            Self::ChecklistCompliance => "checklist_compliance",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::ClauseExtraction => "Clause Extraction",
            Self::RiskScoring => "Risk Scoring",
            Self::ChecklistCompliance => "Checklist Compliance",
        }
    }

    pub fn llm_config(self, llm: &LlmConfig) -> &LlmRoleConfig {
        match self {
            Self::ClauseExtraction => &llm.clause_extraction,
            Self::RiskScoring => &llm.risk_scoring,
            Self::ChecklistCompliance => &llm.checklist_compliance,
        }
    }
}

impl fmt::Display for ReviewRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Input shared by every role in one review.
#[derive(Clone, Debug)]
pub struct RoleRequest {
    pub document: Arc<Document>,
    pub user_context: UserContext,
}

/// Why a role produced no report.
#[derive(Debug, thiserror::Error)]
pub enum RoleError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("model timed out: {0}")]
    ModelTimeout(String),

    #[error("malformed role output: {0}")]
    MalformedOutput(String),
}

impl RoleError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelUnavailable(_) => "unavailable",
            Self::ModelTimeout(_) => "timeout",
            Self::MalformedOutput(_) => "malformed",
        }
    }
}

impl From<RoleError> for ReviewError {
    fn from(e: RoleError) -> Self {
        match e {
            RoleError::ModelTimeout(msg) => ReviewError::ModelTimeout(msg),
            // A role whose answer cannot be read contributes nothing, same as an outage.
            other => ReviewError::ModelUnavailable(other.to_string()),
        }
    }
}

pub type RoleFuture<'a> = Pin<Box<dyn Future<Output = Result<RoleReport, RoleError>> + Send + 'a>>;

/// Runs one analysis role over a document.
pub trait RoleInvoker: Send + Sync {
    fn invoke_role<'a>(&'a self, role: ReviewRole, request: &'a RoleRequest) -> RoleFuture<'a>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ids_match_config_sections() {
        let ids: Vec<_> = ReviewRole::ALL.iter().map(|r| r.id()).collect();
        assert_eq!(ids, ["clause_extraction", "risk_scoring", "checklist_compliance"]);
        assert_eq!(
            serde_json::to_string(&ReviewRole::RiskScoring).unwrap(),
            "\"risk_scoring\""
        );
    }

    #[test]
    fn test_role_errors_degrade() {
        let timeout: ReviewError = RoleError::ModelTimeout("300s".into()).into();
        assert!(matches!(timeout, ReviewError::ModelTimeout(_)));

        let malformed: ReviewError = RoleError::MalformedOutput("no JSON".into()).into();
        assert!(malformed.is_role_degradation());
    }
}
