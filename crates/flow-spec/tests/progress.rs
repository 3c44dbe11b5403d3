mod common;

use flow_spec::{
    Expr, FieldStore, FlowSpec, Navigator, Position, QuestionGraph, QuestionKind, QuestionSpec,
    progress, step_number, total_steps,
};
use serde_json::json;

use common::graph;

#[test]
fn undecided_branch_reports_worst_case_total() {
    let graph = graph("financing");
    let store = FieldStore::new();
    assert_eq!(total_steps(&graph, &store), 3 + 6);
}

#[test]
fn total_recomputes_once_branching_answer_is_known() {
    let graph = graph("financing");
    let mut store = FieldStore::new();
    store.set("asking_price", json!("450000"));
    assert_eq!(total_steps(&graph, &store), 9);

    store.set("has_mortgage", json!("no"));
    assert_eq!(total_steps(&graph, &store), 3);

    store.set("has_mortgage", json!("yes"));
    assert_eq!(total_steps(&graph, &store), 9);
}

#[test]
fn total_never_grows_while_moving_forward() {
    let graph = graph("documents");
    let mut store = FieldStore::new();
    let mut navigator = Navigator::start(graph.clone(), &store);
    let answers = [json!("questions"), json!("no"), json!(["pool"])];

    let mut last_total = total_steps(&graph, &store);
    let mut last_step = 0;
    for value in answers {
        let key = navigator.current().key().expect("question").to_string();
        navigator.record(&mut store, &key, value);
        let total = total_steps(&graph, &store);
        let step = step_number(&graph, &store, navigator.current());
        assert!(total <= last_total, "total grew from {last_total} to {total}");
        assert!(step > last_step, "step regressed at {key}");
        assert!(step <= total);
        last_total = total;
        last_step = step;
        navigator.advance(&mut store).expect("advance");
    }
    assert!(navigator.is_terminal());
    assert_eq!(last_total, 3);
}

#[test]
fn routed_branches_take_the_longest_candidate() {
    let graph = graph("documents");
    let mut store = FieldStore::new();
    // mode, hoa, hoa_fee, features on the longer branch.
    assert_eq!(total_steps(&graph, &store), 4);

    store.set("mode", json!("upload"));
    assert_eq!(total_steps(&graph, &store), 2);
}

#[test]
fn step_number_follows_the_live_path() {
    let graph = graph("financing");
    let mut store = FieldStore::new();
    store.set("asking_price", json!("1"));
    store.set("has_mortgage", json!("no"));

    let closing = Position::Question("closing_date".into());
    assert_eq!(step_number(&graph, &store, &closing), 3);
    assert_eq!(step_number(&graph, &store, &Position::Done), 3);

    let summary = progress(&graph, &store, &closing);
    assert_eq!(summary.step, 3);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.answered, 2);
}

/// Yes/no chain where answering `yes` jumps over the next question.
fn skip_chain(length: usize) -> QuestionGraph {
    let questions = (0..length)
        .map(|i| {
            let question = QuestionSpec::new(format!("q{i}"), QuestionKind::SingleChoice, "Skip?")
                .with_choices(["yes", "no"]);
            if i + 2 < length {
                question.route(
                    Some(Expr::Eq {
                        key: format!("q{i}"),
                        value: json!("yes"),
                    }),
                    format!("q{}", i + 2),
                )
            } else {
                question
            }
        })
        .collect();
    QuestionGraph::new(FlowSpec::new("chain", questions)).expect("graph")
}

#[test]
fn long_skip_chain_totals_without_blowing_up() {
    let graph = skip_chain(60);
    let mut store = FieldStore::new();
    assert_eq!(total_steps(&graph, &store), 60);

    store.set("q0", json!("yes"));
    assert_eq!(total_steps(&graph, &store), 59);
}
