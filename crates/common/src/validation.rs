//! Collect-all validation of untyped role output.
//!
//! Each accessor records a [`FieldViolation`] instead of returning early, so
//! [`RecordReader::finish`] reports every problem in the record at once.

use serde_json::{Map, Value};

use crate::error::{FieldViolation, SchemaValidationError};
use crate::types::RiskLevel;

/// Reads typed fields out of one raw record, accumulating violations.
pub struct RecordReader<'a> {
    record: &'static str,
    fields: Option<&'a Map<String, Value>>,
    violations: Vec<FieldViolation>,
}

impl<'a> RecordReader<'a> {
    pub fn new(record: &'static str, raw: &'a Value) -> Self {
        let mut reader = Self {
            record,
            fields: raw.as_object(),
            violations: Vec::new(),
        };
        if reader.fields.is_none() {
            reader.violate("$", format!("expected an object, got {}", type_name(raw)));
        }
        reader
    }

    fn violate(&mut self, field: &str, message: impl Into<String>) {
        self.violations.push(FieldViolation {
            field: field.to_string(),
            message: message.into(),
        });
    }

    /// The field's value, treating JSON null as absent.
    fn get(&self, field: &str) -> Option<&'a Value> {
        self.fields?.get(field).filter(|v| !v.is_null())
    }

    fn require(&mut self, field: &str) -> Option<&'a Value> {
        let value = self.get(field);
        if value.is_none() && self.fields.is_some() {
            self.violate(field, "is required");
        }
        value
    }

    fn as_text(&mut self, field: &str, value: &Value) -> Option<String> {
        match value.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                self.violate(field, format!("expected a string, got {}", type_name(value)));
                None
            }
        }
    }

    pub fn required_text(&mut self, field: &str) -> Option<String> {
        let value = self.require(field)?;
        self.as_text(field, value)
    }

    /// A required string that must contain non-whitespace text.
    pub fn required_title(&mut self, field: &str) -> Option<String> {
        let text = self.required_text(field)?;
        if text.trim().is_empty() {
            self.violate(field, "must not be empty");
            return None;
        }
        Some(text.trim().to_string())
    }

    pub fn optional_text(&mut self, field: &str) -> Option<String> {
        let value = self.get(field)?;
        self.as_text(field, value)
    }

    pub fn optional_bool(&mut self, field: &str) -> Option<bool> {
        let value = self.get(field)?;
        match value.as_bool() {
            Some(b) => Some(b),
            None => {
                self.violate(field, format!("expected a boolean, got {}", type_name(value)));
                None
            }
        }
    }

    /// An optional score that must lie in the closed interval [0.0, 1.0].
    pub fn optional_score(&mut self, field: &str) -> Option<f64> {
        let value = self.get(field)?;
        let Some(score) = value.as_f64() else {
            self.violate(field, format!("expected a number, got {}", type_name(value)));
            return None;
        };
        if !(0.0..=1.0).contains(&score) {
            self.violate(
                field,
                format!("must be between 0.0 and 1.0, got {}", score),
            );
            return None;
        }
        Some(score)
    }

    fn risk_level(&mut self, field: &str, value: &Value) -> Option<RiskLevel> {
        let text = self.as_text(field, value)?;
        match RiskLevel::parse(&text) {
            Some(level) => Some(level),
            None => {
                self.violate(
                    field,
                    format!(
                        "'{}' is not one of high, medium, low, unknown",
                        text
                    ),
                );
                None
            }
        }
    }

    pub fn required_risk_level(&mut self, field: &str) -> Option<RiskLevel> {
        let value = self.require(field)?;
        self.risk_level(field, value)
    }

    pub fn optional_risk_level(&mut self, field: &str) -> Option<RiskLevel> {
        let value = self.get(field)?;
        self.risk_level(field, value)
    }

    /// A list of strings; non-string entries are violations.
    pub fn text_list(&mut self, field: &str) -> Vec<String> {
        let Some(value) = self.get(field) else {
            return Vec::new();
        };
        let Some(items) = value.as_array() else {
            self.violate(field, format!("expected an array, got {}", type_name(value)));
            return Vec::new();
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(s) => out.push(s.to_string()),
                None => self.violate(
                    &format!("{}[{}]", field, i),
                    format!("expected a string, got {}", type_name(item)),
                ),
            }
        }
        out
    }

    /// A list of raw entries, each validated later as its own record.
    pub fn list(&mut self, field: &str) -> Vec<Value> {
        let Some(value) = self.get(field) else {
            return Vec::new();
        };
        match value.as_array() {
            Some(items) => items.clone(),
            None => {
                self.violate(field, format!("expected an array, got {}", type_name(value)));
                Vec::new()
            }
        }
    }

    /// Fail with every violation seen so far, if any.
    pub fn finish(self) -> Result<(), SchemaValidationError> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError {
                record: self.record.to_string(),
                violations: self.violations,
            })
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
