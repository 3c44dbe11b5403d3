mod common;

use flow_spec::{Constraint, QuestionKind, QuestionSpec, validate, validate_answer};
use serde_json::json;

use common::graph;

fn holders_group() -> QuestionSpec {
    QuestionSpec::new("co_holder", QuestionKind::Group, "Co-holder").with_fields(vec![
        QuestionSpec::new("name", QuestionKind::FreeText, "Full name"),
        QuestionSpec::new("phone", QuestionKind::FreeText, "Phone")
            .optional()
            .with_constraint(Constraint {
                pattern: Some(r"^\+?[0-9 ()-]{7,20}$".into()),
                ..Default::default()
            }),
    ])
}

#[test]
fn validation_reports_missing_on_live_path_only() {
    let graph = graph("financing");
    let result = validate(&graph, &json!({ "asking_price": "300000", "has_mortgage": "no" }));
    assert!(!result.valid);
    assert_eq!(result.missing_required, vec!["closing_date"]);
    assert!(result.errors.is_empty());
}

#[test]
fn validation_flags_unknown_fields_and_type_mismatch() {
    let graph = graph("branching");
    let result = validate(&graph, &json!({ "a": true, "c": "Headline", "zz": 1 }));
    assert!(!result.valid);
    assert_eq!(result.unknown_fields, vec!["zz"]);
    assert_eq!(result.errors[0].code.as_deref(), Some("type_mismatch"));
}

#[test]
fn complete_answers_are_valid() {
    let graph = graph("branching");
    let result = validate(&graph, &json!({ "a": "yes", "b": "Tenant", "c": "Headline" }));
    assert!(result.valid, "{result:?}");
}

#[test]
fn single_choice_rejects_unknown_option() {
    let question = QuestionSpec::new("hoa", QuestionKind::SingleChoice, "HOA?")
        .with_choices(["yes", "no"]);
    let error = validate_answer(&question, &json!("maybe")).expect("error");
    assert_eq!(error.code.as_deref(), Some("choice_mismatch"));
    assert!(validate_answer(&question, &json!("yes")).is_none());
}

#[test]
fn multi_choice_enforces_selection_limits() {
    let question = QuestionSpec::new("features", QuestionKind::MultiChoice, "Features")
        .with_choices(["pool", "garage", "solar"])
        .with_constraint(Constraint {
            max_items: Some(2),
            ..Default::default()
        });
    let error = validate_answer(&question, &json!(["pool", "garage", "solar"])).expect("error");
    assert_eq!(error.code.as_deref(), Some("max_items"));
    let error = validate_answer(&question, &json!(["pool", "sauna"])).expect("error");
    assert_eq!(error.code.as_deref(), Some("choice_mismatch"));
}

#[test]
fn file_answers_accept_names_or_descriptors() {
    let question = QuestionSpec::new("deed", QuestionKind::File, "Deed");
    assert!(validate_answer(&question, &json!("deed.pdf")).is_none());
    assert!(validate_answer(&question, &json!({ "name": "deed.pdf", "size": 1024 })).is_none());
    assert!(validate_answer(&question, &json!({ "size": 1024 })).is_some());
}

#[test]
fn group_checks_required_and_formatted_fields() {
    let group = holders_group();
    let missing = validate_answer(&group, &json!({ "phone": "555 123 4567" })).expect("error");
    assert_eq!(missing.code.as_deref(), Some("required"));
    assert_eq!(missing.path.as_deref(), Some("/co_holder/name"));

    let malformed =
        validate_answer(&group, &json!({ "name": "Jo Doe", "phone": "call me" })).expect("error");
    assert_eq!(malformed.code.as_deref(), Some("pattern_mismatch"));
    assert_eq!(malformed.path.as_deref(), Some("/co_holder/phone"));

    assert!(validate_answer(&group, &json!({ "name": "Jo Doe" })).is_none());
}
