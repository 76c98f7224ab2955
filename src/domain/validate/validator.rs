use crate::domain::config::{FieldRules, FieldValidation};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;

/// One rejected field. A list of these, never an `Err`, signals bad input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ValidationError {
    pub field: String,
    pub tag: String,
    #[schema(value_type = Object)]
    pub value: JsonValue,
    pub message: String,
}

impl ValidationError {
    pub fn new(
        field: impl Into<String>,
        tag: impl Into<String>,
        value: JsonValue,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            tag: tag.into(),
            value,
            message: message.into(),
        }
    }
}

/// Missing, `null`, or the empty string.
pub fn is_blank(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.is_empty(),
        _ => false,
    }
}

/// Applies `rules` to `data`, collecting every violation.
///
/// A blank required field yields a single `required` error and its other
/// rules are skipped; blank optional fields are not checked at all.
pub fn validate<R: FieldRules>(data: &Map<String, JsonValue>, rules: &[R]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for rule in rules {
        let field = rule.field();
        let value = data.get(field);
        if is_blank(value) {
            if rule.required() {
                errors.push(ValidationError::new(
                    field,
                    "required",
                    value.cloned().unwrap_or(JsonValue::Null),
                    format!("Field '{}' is required", field),
                ));
            }
            continue;
        }
        if let (Some(value), Some(v)) = (value, rule.validation()) {
            check_field(field, value, v, &mut errors);
        }
    }
    errors
}

fn check_field(field: &str, value: &JsonValue, v: &FieldValidation, out: &mut Vec<ValidationError>) {
    let mut push = |tag: &str, message: String| {
        let message = v
            .error_message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or(message);
        out.push(ValidationError::new(field, tag, value.clone(), message));
    };

    let text = textual(value);

    if let Some(text) = text.as_deref() {
        let len = text.chars().count();
        if let Some(min) = v.min_length {
            if len < min {
                push(
                    "min_length",
                    format!("Field '{}' must be at least {} characters long", field, min),
                );
            }
        }
        if let Some(max) = v.max_length {
            if len > max {
                push(
                    "max_length",
                    format!("Field '{}' must be at most {} characters long", field, max),
                );
            }
        }
    }

    if v.min.is_some() || v.max.is_some() {
        match numeric(value) {
            Some(n) => {
                if let Some(min) = v.min {
                    if n < min {
                        push("min", format!("Field '{}' must be at least {}", field, min));
                    }
                }
                if let Some(max) = v.max {
                    if n > max {
                        push("max", format!("Field '{}' must be at most {}", field, max));
                    }
                }
            }
            None => push("numeric", format!("Field '{}' must be a number", field)),
        }
    }

    if let Some(pattern) = v.pattern.as_deref().filter(|p| !p.is_empty()) {
        match Regex::new(pattern) {
            Ok(re) => {
                if !text.as_deref().map(|t| re.is_match(t)).unwrap_or(false) {
                    push("pattern", format!("Field '{}' format is invalid", field));
                }
            }
            Err(_) => push(
                "pattern",
                format!("Field '{}' has an invalid validation pattern", field),
            ),
        }
    }
}

/// Text form of scalar values; objects and arrays have none.
fn textual(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn numeric(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
