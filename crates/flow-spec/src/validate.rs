use regex::Regex;
use serde_json::{Map, Value};

use crate::answers::{ValidationError, ValidationResult};
use crate::graph::QuestionGraph;
use crate::navigator::{is_blank, live_path};
use crate::spec::{Constraint, QuestionKind, QuestionSpec};
use crate::store::FieldStore;

/// Validates a full answer object against the questions on its live path.
pub fn validate(graph: &QuestionGraph, answers: &Value) -> ValidationResult {
    let answers_map = answers.as_object().cloned().unwrap_or_default();
    let store = FieldStore::from_answers(answers_map.clone());

    let mut errors = Vec::new();
    let mut missing_required = Vec::new();

    for key in live_path(graph, &store) {
        let Some(question) = graph.node_for(&key) else {
            continue;
        };
        match answers_map.get(&key) {
            Some(value) if !is_blank(value) => {
                if let Some(error) = validate_answer(question, value) {
                    errors.push(error);
                }
            }
            _ => {
                if question.required {
                    missing_required.push(key);
                }
            }
        }
    }

    let unknown_fields: Vec<String> = answers_map
        .keys()
        .filter(|key| !graph.contains(key))
        .cloned()
        .collect();

    ValidationResult {
        valid: errors.is_empty() && missing_required.is_empty() && unknown_fields.is_empty(),
        errors,
        missing_required,
        unknown_fields,
    }
}

/// Checks one present answer against its question's kind and constraints.
pub fn validate_answer(question: &QuestionSpec, value: &Value) -> Option<ValidationError> {
    if !matches_kind(question.kind, value) {
        return Some(base_error(question, "type mismatch", "type_mismatch"));
    }

    match question.kind {
        QuestionKind::SingleChoice => {
            if let Some(choices) = &question.choices
                && let Some(text) = value.as_str()
                && !choices.iter().any(|choice| choice == text)
            {
                return Some(base_error(question, "invalid choice", "choice_mismatch"));
            }
        }
        QuestionKind::MultiChoice => {
            if let Some(choices) = &question.choices
                && let Some(items) = value.as_array()
                && items
                    .iter()
                    .any(|item| {
                        !item
                            .as_str()
                            .is_some_and(|text| choices.iter().any(|c| c == text))
                    })
            {
                return Some(base_error(question, "invalid choice", "choice_mismatch"));
            }
        }
        QuestionKind::Group => {
            if let Some(error) = validate_group(question, value) {
                return Some(error);
            }
        }
        QuestionKind::FreeText | QuestionKind::File => {}
    }

    if let Some(constraint) = &question.constraint {
        return enforce_constraint(question, value, constraint);
    }

    None
}

fn validate_group(question: &QuestionSpec, value: &Value) -> Option<ValidationError> {
    let fields = value.as_object().cloned().unwrap_or_else(Map::new);
    for field in &question.fields {
        let path = format!("/{}/{}", question.id, field.id);
        match fields.get(&field.id) {
            Some(inner) if !is_blank(inner) => {
                if let Some(mut error) = validate_answer(field, inner) {
                    error.question_id = Some(question.id.clone());
                    error.path = Some(path);
                    return Some(error);
                }
            }
            _ if field.required => {
                return Some(ValidationError {
                    question_id: Some(question.id.clone()),
                    path: Some(path),
                    message: format!("{} is required", field.title),
                    code: Some("required".into()),
                });
            }
            _ => {}
        }
    }
    None
}

fn matches_kind(kind: QuestionKind, value: &Value) -> bool {
    match kind {
        QuestionKind::SingleChoice | QuestionKind::FreeText => value.is_string(),
        QuestionKind::MultiChoice => value
            .as_array()
            .is_some_and(|items| items.iter().all(Value::is_string)),
        QuestionKind::File => {
            value.is_string()
                || value
                    .as_object()
                    .is_some_and(|file| file.get("name").is_some_and(Value::is_string))
        }
        QuestionKind::Group => value.is_object(),
    }
}

fn enforce_constraint(
    question: &QuestionSpec,
    value: &Value,
    constraint: &Constraint,
) -> Option<ValidationError> {
    let fail = |message: &str, code: &str| {
        let message = constraint.message.as_deref().unwrap_or(message);
        Some(base_error(question, message, code))
    };

    if let Some(pattern) = &constraint.pattern
        && let Some(text) = value.as_str()
        && let Ok(regex) = Regex::new(pattern)
        && !regex.is_match(text)
    {
        return fail("value does not match pattern", "pattern_mismatch");
    }

    if let Some(min_len) = constraint.min_len
        && let Some(text) = value.as_str()
        && text.chars().count() < min_len
    {
        return fail("string shorter than min length", "min_length");
    }

    if let Some(max_len) = constraint.max_len
        && let Some(text) = value.as_str()
        && text.chars().count() > max_len
    {
        return fail("string longer than max length", "max_length");
    }

    if let Some(min_items) = constraint.min_items
        && let Some(items) = value.as_array()
        && items.len() < min_items
    {
        return fail("too few selections", "min_items");
    }

    if let Some(max_items) = constraint.max_items
        && let Some(items) = value.as_array()
        && items.len() > max_items
    {
        return fail("too many selections", "max_items");
    }

    None
}

fn base_error(question: &QuestionSpec, message: &str, code: &str) -> ValidationError {
    ValidationError::for_question(&question.id, message, code)
}
