//! Boundary validation for request bodies and query strings.
//!
//! Rules are declared as `{field, rule, message}` tables per request type and
//! checked before the note service is called. Shape errors (missing required
//! fields, wrong JSON types) are already rejected by deserialization.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::{
    CreateNoteRequest, CreateTagRequest, CreateTodoRequest, PaginationQuery, UpdateNoteRequest,
};
use crate::service::slugify;

/// A single failed rule, reported back to the client.
#[derive(Debug, Clone, Serialize)]
pub struct FieldViolation {
    pub field: String,
    pub rule: &'static str,
    pub message: String,
}

/// Checks a field value can be held to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    NotEmpty,
    HasWordCharacter,
    IsoDate,
    NonNegative,
    Positive,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::NotEmpty => "not_empty",
            Rule::HasWordCharacter => "has_word_character",
            Rule::IsoDate => "iso_date",
            Rule::NonNegative => "non_negative",
            Rule::Positive => "positive",
        }
    }

    fn holds(&self, value: &Value<'_>) -> bool {
        match (self, value) {
            (_, Value::Absent) => true,
            (Rule::NotEmpty, Value::Text(s)) => !s.trim().is_empty(),
            (Rule::HasWordCharacter, Value::Text(s)) => !slugify(s).is_empty(),
            (Rule::IsoDate, Value::Text(s)) => is_iso_date(s),
            (Rule::NonNegative, Value::Integer(n)) => *n >= 0,
            (Rule::Positive, Value::Integer(n)) => *n > 0,
            _ => false,
        }
    }
}

/// One row of a rule table.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub field: &'static str,
    pub rule: Rule,
    pub message: &'static str,
}

/// Field value as seen by the rules. Optional fields that were left out are `Absent`.
#[derive(Debug, Clone, Copy)]
pub enum Value<'a> {
    Absent,
    Text(&'a str),
    Integer(i64),
}

impl<'a> From<Option<&'a str>> for Value<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(Value::Absent, Value::Text)
    }
}

impl From<Option<i64>> for Value<'_> {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Value::Absent, Value::Integer)
    }
}

/// A request type with a rule table.
pub trait Validate {
    const RULES: &'static [FieldRule];

    fn value(&self, field: &str) -> Value<'_>;
}

impl Validate for CreateNoteRequest {
    const RULES: &'static [FieldRule] = &[FieldRule {
        field: "title",
        rule: Rule::NotEmpty,
        message: "title must be a non-empty string",
    }];

    fn value(&self, field: &str) -> Value<'_> {
        match field {
            "title" => Value::Text(&self.title),
            _ => Value::Absent,
        }
    }
}

impl Validate for UpdateNoteRequest {
    const RULES: &'static [FieldRule] = &[FieldRule {
        field: "title",
        rule: Rule::NotEmpty,
        message: "title must be a non-empty string when provided",
    }];

    fn value(&self, field: &str) -> Value<'_> {
        match field {
            "title" => self.title.as_deref().into(),
            _ => Value::Absent,
        }
    }
}

impl Validate for CreateTagRequest {
    const RULES: &'static [FieldRule] = &[
        FieldRule {
            field: "tagName",
            rule: Rule::NotEmpty,
            message: "tagName must be a non-empty string",
        },
        FieldRule {
            field: "tagName",
            rule: Rule::HasWordCharacter,
            message: "tagName must contain at least one letter or digit",
        },
    ];

    fn value(&self, field: &str) -> Value<'_> {
        match field {
            "tagName" => Value::Text(&self.tag_name),
            _ => Value::Absent,
        }
    }
}

impl Validate for CreateTodoRequest {
    const RULES: &'static [FieldRule] = &[FieldRule {
        field: "dueDate",
        rule: Rule::IsoDate,
        message: "dueDate must be an ISO 8601 date string",
    }];

    fn value(&self, field: &str) -> Value<'_> {
        match field {
            "dueDate" => self.due_date.as_deref().into(),
            _ => Value::Absent,
        }
    }
}

impl Validate for PaginationQuery {
    const RULES: &'static [FieldRule] = &[
        FieldRule {
            field: "skip",
            rule: Rule::NonNegative,
            message: "skip must be a non-negative integer",
        },
        FieldRule {
            field: "take",
            rule: Rule::Positive,
            message: "take must be a positive integer",
        },
    ];

    fn value(&self, field: &str) -> Value<'_> {
        match field {
            "skip" => self.skip.into(),
            "take" => self.take.into(),
            _ => Value::Absent,
        }
    }
}

/// Run a rule table against one item, prefixing reported field names with `path`.
fn check<T: Validate>(item: &T, path: &str, violations: &mut Vec<FieldViolation>) {
    for rule in T::RULES {
        if !rule.rule.holds(&item.value(rule.field)) {
            violations.push(FieldViolation {
                field: format!("{}{}", path, rule.field),
                rule: rule.rule.name(),
                message: rule.message.to_string(),
            });
        }
    }
}

fn check_each<T: Validate>(items: Option<&[T]>, name: &str, violations: &mut Vec<FieldViolation>) {
    for (i, item) in items.unwrap_or_default().iter().enumerate() {
        check(item, &format!("{}[{}].", name, i), violations);
    }
}

fn finish(violations: Vec<FieldViolation>) -> Result<(), AppError> {
    if violations.is_empty() {
        return Ok(());
    }
    let message = violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    Err(AppError::Validation {
        message,
        violations,
    })
}

pub fn validate_create_note(request: &CreateNoteRequest) -> Result<(), AppError> {
    let mut violations = Vec::new();
    check(request, "", &mut violations);
    check_each(request.tags.as_deref(), "tags", &mut violations);
    check_each(request.todos.as_deref(), "todos", &mut violations);
    finish(violations)
}

pub fn validate_update_note(request: &UpdateNoteRequest) -> Result<(), AppError> {
    let mut violations = Vec::new();
    check(request, "", &mut violations);
    check_each(request.tags.as_deref(), "tags", &mut violations);
    check_each(request.todos.as_deref(), "todos", &mut violations);
    finish(violations)
}

pub fn validate_pagination(query: &PaginationQuery) -> Result<(), AppError> {
    let mut violations = Vec::new();
    check(query, "", &mut violations);
    finish(violations)
}

fn is_iso_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}
