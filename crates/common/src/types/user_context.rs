use serde::{Deserialize, Serialize};

/// Caller profile used to adjust the tone and emphasis of recommendations.
///
/// Every field is optional; the review runs the same without it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_experience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specific_concerns: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl UserContext {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_context_serializes_to_empty_object() {
        let ctx = UserContext::default();
        assert!(ctx.is_empty());
        assert_eq!(serde_json::to_string(&ctx).unwrap(), "{}");
    }

    #[test]
    fn test_partial_context_roundtrip() {
        let ctx: UserContext = serde_json::from_str(
            r#"{"job_title": "Software Engineering", "company_size": "startup", "unknown": 1}"#,
        )
        .unwrap();
        assert!(!ctx.is_empty());
        assert_eq!(ctx.company_size.as_deref(), Some("startup"));
        assert_eq!(ctx.full_name, None);
    }
}
