use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for contract review operations.
#[derive(Debug, Error)]
pub enum ReviewError {
    // --- Document access errors (fatal, abort the run) ---
    #[error("Contract file not found or unreadable: {}", path.display())]
    DocumentNotFound { path: PathBuf },

    #[error("No extractable text in {filename} (scanned or image-only document?)")]
    EmptyDocument { filename: String },

    #[error("Failed to extract text: {0}")]
    Extraction(String),

    // --- Record errors (fatal for the offending record only) ---
    #[error(transparent)]
    SchemaValidation(#[from] SchemaValidationError),

    // --- Model errors (the role contributes nothing, review continues) ---
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model timed out: {0}")]
    ModelTimeout(String),

    // --- Operational errors ---
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Internal(String),
}

impl ReviewError {
    /// Whether this error aborts the whole review run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DocumentNotFound { .. } | Self::EmptyDocument { .. } | Self::Extraction(_)
        )
    }

    /// Whether this error only removes one role's contribution from the report.
    pub fn is_role_degradation(&self) -> bool {
        matches!(self, Self::ModelUnavailable(_) | Self::ModelTimeout(_))
    }
}

/// One field that failed type or range validation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Every violation found while validating one raw record.
///
/// Validation collects all problems before failing so a role's output can be
/// corrected in a single pass.
#[derive(Clone, Debug, PartialEq, Error, Serialize, Deserialize)]
pub struct SchemaValidationError {
    /// Name of the record type being validated (e.g. "ClauseAnalysis").
    pub record: String,
    pub violations: Vec<FieldViolation>,
}

impl SchemaValidationError {
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|v| v.field.as_str())
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields().any(|f| f == field)
    }
}

impl fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed validation ({} violation{}): ",
            self.record,
            self.violations.len(),
            if self.violations.len() == 1 { "" } else { "s" }
        )?;
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}
