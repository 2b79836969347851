//! One review run: load the contract, run the roles concurrently, merge.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use contract_review_common::types::{ContractReview, UserContext};
use contract_review_common::{ReviewError, ReviewId};
use serde::Serialize;

use crate::aggregator::{RejectedRecord, ReportAggregator, RoleContribution, RoleOutputs};
use crate::document::DocumentCache;
use crate::roles::{ReviewRole, RoleInvoker, RoleRequest};

/// What to review and for whom.
#[derive(Clone, Debug, Default)]
pub struct ReviewRequest {
    pub path: PathBuf,
    pub user_context: UserContext,
    /// Passed through to the report; no history is stored.
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

/// The review plus the facts needed to judge how complete it is.
#[derive(Clone, Debug, Serialize)]
pub struct ReviewReport {
    pub review_id: ReviewId,
    pub filename: String,
    pub generated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// False when any role contributed nothing.
    pub complete: bool,
    pub missing_roles: Vec<ReviewRole>,
    pub rejected_records: Vec<RejectedRecord>,
    pub review: ContractReview,
}

/// Runs reviews over one document cache.
///
/// Each pipeline owns its cache, so concurrent reviews of different
/// documents need separate pipelines.
pub struct ReviewPipeline {
    cache: DocumentCache,
    invoker: Arc<dyn RoleInvoker>,
}

impl ReviewPipeline {
    pub fn new(cache: DocumentCache, invoker: Arc<dyn RoleInvoker>) -> Self {
        Self { cache, invoker }
    }

    /// Review one contract.
    ///
    /// Only document errors abort the run. A role that fails is left out
    /// and the report is marked incomplete.
    pub async fn review(&mut self, request: &ReviewRequest) -> Result<ReviewReport, ReviewError> {
        let start = Instant::now();
        let document = self.cache.get_document(&request.path)?;

        tracing::info!(filename = %document.filename, "Review started");

        let role_request = RoleRequest {
            document: Arc::clone(&document),
            user_context: request.user_context.clone(),
        };
        let invoker = self.invoker.as_ref();

        let (clause_extraction, risk_scoring, checklist_compliance) = tokio::join!(
            contribute(invoker, ReviewRole::ClauseExtraction, &role_request),
            contribute(invoker, ReviewRole::RiskScoring, &role_request),
            contribute(invoker, ReviewRole::ChecklistCompliance, &role_request),
        );

        let aggregation = ReportAggregator::aggregate(&RoleOutputs {
            clause_extraction,
            risk_scoring,
            checklist_compliance,
        });

        for rejected in &aggregation.rejected_records {
            tracing::warn!(
                role = rejected.role.id(),
                index = rejected.index,
                error = %rejected.error,
                "Finding rejected"
            );
            metrics::counter!("review.records.rejected", "role" => rejected.role.id())
                .increment(1);
        }

        let complete = aggregation.missing_roles.is_empty();
        let duration = start.elapsed().as_secs_f64();
        let summary = &aggregation.review.summary;

        metrics::histogram!("review.duration").record(duration);
        metrics::counter!("review.completed", "complete" => complete.to_string()).increment(1);

        tracing::info!(
            filename = %document.filename,
            duration_s = duration,
            complete,
            clauses = summary.total_clauses_reviewed,
            high_risk = summary.high_risk_count,
            rejected = aggregation.rejected_records.len(),
            status = %summary.overall_compliance_status,
            "Review finished"
        );

        Ok(ReviewReport {
            review_id: ReviewId::new(),
            filename: document.filename.clone(),
            generated_at: Utc::now(),
            user_id: request.user_id.clone(),
            session_id: request.session_id.clone(),
            complete,
            missing_roles: aggregation.missing_roles,
            rejected_records: aggregation.rejected_records,
            review: aggregation.review,
        })
    }

    /// Forget the cached document so a different one can be reviewed.
    pub fn reset_document(&mut self) {
        self.cache.reset();
    }
}

async fn contribute(
    invoker: &dyn RoleInvoker,
    role: ReviewRole,
    request: &RoleRequest,
) -> RoleContribution {
    match invoker.invoke_role(role, request).await {
        Ok(report) => RoleContribution::Completed(report),
        Err(e) => {
            let error = ReviewError::from(e);
            if error.is_role_degradation() {
                tracing::warn!(role = role.id(), error = %error, "Role contributed nothing, review continues");
            } else {
                tracing::error!(role = role.id(), error = %error, "Role failed unexpectedly, review continues");
            }
            RoleContribution::Failed {
                reason: error.to_string(),
            }
        }
    }
}
