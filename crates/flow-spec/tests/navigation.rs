mod common;

use flow_spec::{
    Expr, FieldStore, FlowError, FlowSpec, Navigator, Position, QuestionGraph, QuestionKind,
    QuestionSpec, live_path, submission,
};
use serde_json::json;
use std::sync::Arc;

use common::graph;

fn at(key: &str) -> Position {
    Position::Question(key.into())
}

#[test]
fn negative_answer_skips_dependent_question_and_back_returns() {
    let graph = graph("branching");
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph, &store);
    assert_eq!(navigator.current(), &at("a"));

    navigator.record(&mut store, "a", json!("no"));
    assert_eq!(navigator.advance(&mut store).expect("advance"), &at("c"));
    assert_eq!(navigator.history(), ["a".to_string()]);

    assert_eq!(navigator.retreat().expect("retreat"), &at("a"));
    assert!(navigator.history().is_empty());
}

#[test]
fn positive_answer_visits_dependent_question() {
    let graph = graph("branching");
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph, &store);

    navigator.record(&mut store, "a", json!("yes"));
    navigator.advance(&mut store).expect("advance");
    assert_eq!(navigator.current(), &at("b"));
    navigator.record(&mut store, "b", json!("Tenant"));
    navigator.advance(&mut store).expect("advance");
    navigator.record(&mut store, "c", json!("Sunny bungalow"));
    assert!(navigator.advance(&mut store).expect("advance").is_done());
    assert!(navigator.is_terminal());
    assert_eq!(navigator.history(), ["a", "b", "c"]);
}

#[test]
fn advance_then_retreat_is_an_exact_inverse() {
    let graph = graph("financing");
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph, &store);
    let answers = [
        ("asking_price", json!("450000")),
        ("has_mortgage", json!("yes")),
        ("lender", json!("First Bank")),
        ("balance", json!("120000")),
    ];

    for (key, value) in answers {
        navigator.record(&mut store, key, value);
        let before = navigator.state().clone();
        navigator.advance(&mut store).expect("advance");
        navigator.retreat().expect("retreat");
        assert_eq!(navigator.state(), &before);
        navigator.advance(&mut store).expect("advance again");
    }
    assert_eq!(navigator.current(), &at("rate_type"));
}

#[test]
fn unanswered_required_question_blocks_advance() {
    let graph = graph("branching");
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph, &store);

    let err = navigator.advance(&mut store).unwrap_err();
    match err {
        FlowError::Validation(error) => {
            assert_eq!(error.code.as_deref(), Some("required"));
            assert_eq!(error.question_id.as_deref(), Some("a"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(navigator.current(), &at("a"));
    assert!(navigator.history().is_empty());
}

#[test]
fn invalid_answer_blocks_advance_with_constraint_message() {
    let graph = graph("financing");
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph, &store);

    navigator.record(&mut store, "asking_price", json!("about 400k"));
    let err = navigator.advance(&mut store).unwrap_err();
    assert_eq!(err.to_string(), "digits only");
    assert_eq!(navigator.current(), &at("asking_price"));
}

#[test]
fn optional_question_passed_blank_is_recorded_as_null() {
    let graph = graph("documents");
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph.clone(), &store);

    navigator.record(&mut store, "mode", json!("questions"));
    navigator.advance(&mut store).expect("mode");
    navigator.record(&mut store, "hoa", json!("no"));
    assert_eq!(navigator.advance(&mut store).expect("hoa"), &at("features"));
    assert!(navigator.advance(&mut store).expect("features").is_done());
    assert_eq!(store.get("features"), Some(&json!(null)));
    assert!(!submission(&graph, &store).contains_key("features"));
}

#[test]
fn retreat_without_history_fails() {
    let graph = graph("branching");
    let store = FieldStore::new();
    let mut navigator = Navigator::start(graph, &store);
    assert_eq!(navigator.retreat().unwrap_err(), FlowError::NoHistory);
}

#[test]
fn advancing_past_the_end_is_rejected() {
    let graph = graph("branching");
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph, &store);
    navigator.record(&mut store, "a", json!("no"));
    navigator.advance(&mut store).expect("a");
    navigator.record(&mut store, "c", json!("Headline"));
    navigator.advance(&mut store).expect("c");
    assert_eq!(
        navigator.advance(&mut store).unwrap_err(),
        FlowError::AlreadyComplete
    );
}

#[test]
fn switching_branch_clears_sibling_answers() {
    let graph = graph("documents");
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph.clone(), &store);

    navigator.record(&mut store, "mode", json!("questions"));
    navigator.advance(&mut store).expect("mode");
    navigator.record(&mut store, "hoa", json!("yes"));
    navigator.advance(&mut store).expect("hoa");
    navigator.record(&mut store, "hoa_fee", json!("250"));
    navigator.retreat().expect("back to hoa");
    navigator.retreat().expect("back to mode");

    let recorded = navigator.record(&mut store, "mode", json!("upload"));
    assert!(recorded.changed);
    assert_eq!(recorded.cleared, vec!["hoa".to_string(), "hoa_fee".to_string()]);
    assert!(store.get("hoa").is_none());
    assert!(store.get("hoa_fee").is_none());
    assert_eq!(live_path(&graph, &store), vec!["mode", "document"]);
}

#[test]
fn recording_the_same_value_twice_clears_nothing_more() {
    let graph = graph("documents");
    let mut store = FieldStore::new();
    let navigator = Navigator::start(graph, &store);

    navigator.record(&mut store, "mode", json!("questions"));
    store.set("hoa", json!("yes"));
    let first = navigator.record(&mut store, "mode", json!("upload"));
    assert_eq!(first.cleared, vec!["hoa".to_string()]);
    let revision = store.revision();

    let second = navigator.record(&mut store, "mode", json!("upload"));
    assert!(!second.changed);
    assert!(second.cleared.is_empty());
    assert_eq!(store.revision(), revision);
}

#[test]
fn dependent_answer_is_cleared_when_its_parent_flips() {
    let graph = graph("branching");
    let mut store = FieldStore::new();
    let navigator = Navigator::start(graph.clone(), &store);

    navigator.record(&mut store, "a", json!("yes"));
    navigator.record(&mut store, "b", json!("Owner"));
    let recorded = navigator.record(&mut store, "a", json!("no"));
    assert_eq!(recorded.cleared, vec!["b".to_string()]);
    assert_eq!(
        submission(&graph, &store).keys().collect::<Vec<_>>(),
        vec!["a"]
    );
}

#[test]
fn earliest_declared_route_wins_when_several_match() {
    let yes = |key: &str| Expr::Eq {
        key: key.into(),
        value: json!("yes"),
    };
    let spec = FlowSpec::new(
        "ties",
        vec![
            QuestionSpec::new("gate", QuestionKind::SingleChoice, "Gate")
                .with_choices(["yes", "no"])
                .route(Some(yes("gate")), "first")
                .route(Some(yes("gate")), "second"),
            QuestionSpec::new("first", QuestionKind::FreeText, "First")
                .route(None, "$done"),
            QuestionSpec::new("second", QuestionKind::FreeText, "Second"),
        ],
    );
    let graph = Arc::new(QuestionGraph::new(spec).expect("graph"));
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph, &store);
    navigator.record(&mut store, "gate", json!("yes"));
    assert_eq!(navigator.advance(&mut store).expect("advance"), &at("first"));
}

#[test]
fn parent_skip_wins_over_dependent_condition() {
    let spec = FlowSpec::new(
        "skips",
        vec![
            QuestionSpec::new("owner", QuestionKind::SingleChoice, "Owner occupied?")
                .with_choices(["yes", "no"]),
            QuestionSpec::new("move_out", QuestionKind::FreeText, "Move-out date").visible_if(
                Expr::Eq {
                    key: "owner".into(),
                    value: json!("yes"),
                },
            ),
            QuestionSpec::new("storage", QuestionKind::FreeText, "Storage needed until")
                .visible_if(Expr::IsSet {
                    key: "move_out".into(),
                }),
            QuestionSpec::new("notes", QuestionKind::FreeText, "Notes"),
        ],
    );
    let graph = Arc::new(QuestionGraph::new(spec).expect("graph"));
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph, &store);
    navigator.record(&mut store, "owner", json!("no"));
    assert_eq!(navigator.advance(&mut store).expect("advance"), &at("notes"));
}

#[test]
fn start_skips_an_unreachable_first_question() {
    let spec = FlowSpec::new(
        "late-start",
        vec![
            QuestionSpec::new("never", QuestionKind::FreeText, "Never")
                .visible_if(Expr::LiteralBool { value: false }),
            QuestionSpec::new("first", QuestionKind::FreeText, "First"),
        ],
    );
    let graph = Arc::new(QuestionGraph::new(spec).expect("graph"));
    let navigator = Navigator::start(graph, &FieldStore::new());
    assert_eq!(navigator.current(), &at("first"));
}
