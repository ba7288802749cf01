//! Structural validation of the model's analysis object.
//!
//! Only shape is checked: required keys present, `teamMembers.roles` a list of
//! role objects with responsibilities, `pricing` an object. Values are never
//! judged.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::analysis::error::AnalysisError;

pub const REQUIRED_FIELDS: [&str; 7] = [
    "summary",
    "requirements",
    "feasibility",
    "techStack",
    "timeline",
    "teamMembers",
    "pricing",
];

/// A validated project assessment, kept as the JSON object the model produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StructuredAnalysis(Map<String, Value>);

impl StructuredAnalysis {
    /// Validates `value` and wraps it on success.
    pub fn from_value(value: Value) -> Result<Self, AnalysisError> {
        validate(&value).into_result()?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            _ => Err(AnalysisError::SchemaValidation(
                "analysis must be a JSON object".to_string(),
            )),
        }
    }

    pub fn summary(&self) -> Option<&str> {
        self.0.get("summary").and_then(Value::as_str)
    }

    pub fn roles(&self) -> &[Value] {
        self.0
            .get("teamMembers")
            .and_then(|t| t.get("roles"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    pub valid: bool,
    pub missing_fields: BTreeSet<String>,
    pub structural_error: Option<String>,
}

impl ValidationResult {
    /// Collapses the result into a single error listing every defect found.
    pub fn into_result(self) -> Result<(), AnalysisError> {
        if self.valid {
            return Ok(());
        }

        let mut problems = Vec::new();
        if !self.missing_fields.is_empty() {
            let fields: Vec<&str> = self.missing_fields.iter().map(String::as_str).collect();
            problems.push(format!("missing required fields: {}", fields.join(", ")));
        }
        if let Some(structural) = self.structural_error {
            problems.push(structural);
        }
        Err(AnalysisError::SchemaValidation(problems.join("; ")))
    }
}

pub fn validate(value: &Value) -> ValidationResult {
    let Some(object) = value.as_object() else {
        return ValidationResult {
            valid: false,
            missing_fields: BTreeSet::new(),
            structural_error: Some("analysis must be a JSON object".to_string()),
        };
    };

    let missing_fields: BTreeSet<String> = REQUIRED_FIELDS
        .iter()
        .filter(|field| is_missing(object.get(**field)))
        .map(|field| field.to_string())
        .collect();

    let structural_error = object
        .get("teamMembers")
        .filter(|v| !is_missing(Some(*v)))
        .and_then(validate_team_members)
        .or_else(|| {
            object
                .get("pricing")
                .filter(|v| !is_missing(Some(*v)))
                .and_then(validate_pricing)
        });

    ValidationResult {
        valid: missing_fields.is_empty() && structural_error.is_none(),
        missing_fields,
        structural_error,
    }
}

/// Absent, `null` and empty strings all count as missing.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn validate_team_members(team: &Value) -> Option<String> {
    let Some(roles) = team.get("roles").and_then(Value::as_array) else {
        return Some("teamMembers.roles must be a sequence".to_string());
    };
    roles
        .iter()
        .position(|role| !validate_role(role))
        .map(|i| format!("role {i} missing responsibilities sequence"))
}

/// A role needs a non-empty `responsibilities` list.
fn validate_role(role: &Value) -> bool {
    role.get("responsibilities")
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty())
}

fn validate_pricing(pricing: &Value) -> Option<String> {
    if pricing.is_object() {
        None
    } else {
        Some("pricing must be an object".to_string())
    }
}
