use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::expr::{AnswerLookup, Lookup};
use crate::graph::{Edge, QuestionGraph};
use crate::navigator::{Position, is_blank, live_path};
use crate::store::FieldStore;

/// "Question X of Y" counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepProgress {
    pub step: usize,
    pub total: usize,
    pub answered: usize,
}

/// Number of questions the flow will ask, assuming the longest branch
/// wherever the answers needed to decide are not known yet.
///
/// Filling in answers only ever settles branches, so the total never grows
/// while the user moves forward.
pub fn total_steps(graph: &QuestionGraph, store: &FieldStore) -> usize {
    let mut memo = Memo::new();
    longest(
        graph,
        store,
        Edge::Node(graph.start_index()),
        &BTreeSet::new(),
        &mut memo,
    )
}

/// 1-based position of `position` on the live path; `Done` reports the total.
pub fn step_number(graph: &QuestionGraph, store: &FieldStore, position: &Position) -> usize {
    let key = match position {
        Position::Done => return total_steps(graph, store),
        Position::Question(key) => key,
    };
    let path = live_path(graph, store);
    match path.iter().position(|entry| entry == key) {
        Some(offset) => offset + 1,
        None => {
            let declared = graph.index_of(key);
            path.iter()
                .filter(|entry| graph.index_of(entry) < declared)
                .count()
                + 1
        }
    }
}

pub fn progress(graph: &QuestionGraph, store: &FieldStore, position: &Position) -> StepProgress {
    let answered = live_path(graph, store)
        .iter()
        .filter(|key| store.get(key).is_some_and(|value| !is_blank(value)))
        .count();
    StepProgress {
        step: step_number(graph, store, position),
        total: total_steps(graph, store),
        answered,
    }
}

/// Answer lookup for one hypothetical walk. Unanswered questions counted
/// earlier on the walk are still pending; other unanswered questions that
/// cannot be visited from `at` are settled as absent.
struct WalkKnowledge<'a> {
    graph: &'a QuestionGraph,
    store: &'a FieldStore,
    pending: &'a BTreeSet<usize>,
    at: usize,
}

impl AnswerLookup for WalkKnowledge<'_> {
    fn lookup(&self, key: &str) -> Lookup<'_> {
        if let Some(value) = self.store.get(key) {
            return Lookup::Present(value);
        }
        match self.graph.index_of(key) {
            Some(owner)
                if owner != self.at
                    && !self.pending.contains(&owner)
                    && !self.graph.is_descendant(self.at, owner) =>
            {
                Lookup::Absent
            }
            _ => Lookup::Unknown,
        }
    }
}

type Memo = HashMap<(usize, BTreeSet<usize>), usize>;

fn longest(
    graph: &QuestionGraph,
    store: &FieldStore,
    edge: Edge,
    pending: &BTreeSet<usize>,
    memo: &mut Memo,
) -> usize {
    let node = match edge {
        Edge::Done => return 0,
        Edge::Node(node) => node,
    };
    // Only pending questions read by a condition from here on affect the count.
    let pending: BTreeSet<usize> = pending
        .intersection(graph.condition_owners(node))
        .copied()
        .collect();
    let memo_key = (node, pending.clone());
    if let Some(count) = memo.get(&memo_key) {
        return *count;
    }

    let knowledge = WalkKnowledge {
        graph,
        store,
        pending: &pending,
        at: node,
    };
    let counted = graph.reachability_in(node, &knowledge) != Some(false);
    let candidates = graph.route_candidates(node, &knowledge);

    let mut next_pending = pending;
    if counted && !store.contains(graph.key(node)) {
        next_pending.insert(node);
    }
    let rest = candidates
        .into_iter()
        .map(|next| longest(graph, store, next, &next_pending, memo))
        .max()
        .unwrap_or(0);

    let count = usize::from(counted) + rest;
    memo.insert(memo_key, count);
    count
}
