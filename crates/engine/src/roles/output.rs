use contract_review_common::validation::RecordReader;
use contract_review_common::SchemaValidationError;
use serde::Serialize;
use serde_json::Value;

use super::RoleError;

/// What one role reported, before its findings are validated.
///
/// Findings stay raw here; each is validated on its own during aggregation
/// so one bad record does not discard the rest.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RoleReport {
    pub contract_type: Option<String>,
    pub jurisdiction: Option<String>,
    pub findings: Vec<Value>,
    pub recommendations: Vec<String>,
    pub questions_for_user: Vec<String>,
    pub overall_compliance_status: Option<String>,
    pub executive_summary: Option<String>,
}

impl RoleReport {
    pub const RECORD: &'static str = "RoleReport";

    /// Parse a role's final answer. The answer must contain one JSON object,
    /// optionally wrapped in a code fence or surrounded by prose.
    pub fn parse(text: &str) -> Result<Self, RoleError> {
        let json = extract_json_object(text)
            .ok_or_else(|| RoleError::MalformedOutput("no JSON object in role answer".into()))?;

        let raw: Value = serde_json::from_str(json)
            .map_err(|e| RoleError::MalformedOutput(format!("invalid JSON: {}", e)))?;

        Self::from_value(&raw).map_err(|e| RoleError::MalformedOutput(e.to_string()))
    }

    pub fn from_value(raw: &Value) -> Result<Self, SchemaValidationError> {
        let mut r = RecordReader::new(Self::RECORD, raw);

        let contract_type = r.optional_text("contract_type");
        let jurisdiction = r.optional_text("jurisdiction");
        let findings = r.list("findings");
        let recommendations = r.text_list("recommendations");
        let questions_for_user = r.text_list("questions_for_user");
        let overall_compliance_status = r.optional_text("overall_compliance_status");
        let executive_summary = r.optional_text("executive_summary");

        r.finish()?;

        Ok(Self {
            contract_type: non_blank(contract_type),
            jurisdiction: non_blank(jurisdiction),
            findings,
            recommendations,
            questions_for_user,
            overall_compliance_status: non_blank(overall_compliance_status),
            executive_summary: non_blank(executive_summary),
        })
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// The outermost `{ ... }` span of the text.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
