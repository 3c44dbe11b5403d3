use std::collections::{BTreeSet, HashMap};

use regex::Regex;

use crate::error::ConfigurationError;
use crate::expr::{AnswerLookup, Expr, Lookup};
use crate::spec::{DONE_TARGET, FlowSpec, QuestionKind, QuestionSpec, Target};
use crate::store::FieldStore;

/// Static successor of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Edge {
    Node(usize),
    Done,
}

/// Immutable question graph built once per flow.
///
/// Construction rejects every malformed definition up front; afterwards only
/// the field store changes which nodes are reachable, never the shape.
#[derive(Debug, Clone)]
pub struct QuestionGraph {
    spec: FlowSpec,
    index: HashMap<String, usize>,
    start: usize,
    successors: Vec<Vec<Edge>>,
    descendants: Vec<BTreeSet<usize>>,
    condition_owners: Vec<BTreeSet<usize>>,
}

impl QuestionGraph {
    pub fn new(spec: FlowSpec) -> Result<Self, ConfigurationError> {
        if spec.questions.is_empty() {
            return Err(ConfigurationError::EmptyFlow(spec.id));
        }

        let mut index = HashMap::new();
        for (position, question) in spec.questions.iter().enumerate() {
            check_question(question)?;
            if index.insert(question.id.clone(), position).is_some() {
                return Err(ConfigurationError::DuplicateKey(question.id.clone()));
            }
        }

        let start = match &spec.start {
            Some(start) => *index
                .get(start)
                .ok_or_else(|| ConfigurationError::UnknownStart(start.clone()))?,
            None => 0,
        };

        for question in &spec.questions {
            for expr in conditions(question) {
                if let Some(key) = expr
                    .referenced_keys()
                    .into_iter()
                    .find(|key| !index.contains_key(*key))
                {
                    return Err(ConfigurationError::UnknownReference {
                        question: question.id.clone(),
                        key: key.to_string(),
                    });
                }
            }
        }

        let successors = spec
            .questions
            .iter()
            .enumerate()
            .map(|(position, question)| static_successors(&spec, &index, position, question))
            .collect::<Result<Vec<_>, _>>()?;

        let order = topological_order(&spec, &successors)?;
        let mut descendants = vec![BTreeSet::new(); spec.questions.len()];
        let mut condition_owners = vec![BTreeSet::new(); spec.questions.len()];
        for &node in order.iter().rev() {
            let mut reached = BTreeSet::new();
            let mut owners: BTreeSet<usize> = conditions(&spec.questions[node])
                .flat_map(Expr::referenced_keys)
                .filter_map(|key| index.get(key).copied())
                .collect();
            for edge in &successors[node] {
                if let Edge::Node(next) = edge {
                    reached.insert(*next);
                    reached.extend(descendants[*next].iter().copied());
                    owners.extend(condition_owners[*next].iter().copied());
                }
            }
            descendants[node] = reached;
            condition_owners[node] = owners;
        }

        for (node, question) in spec.questions.iter().enumerate() {
            if let Some(key) = forward_reference(question, node, &index, &descendants[node]) {
                return Err(ConfigurationError::ForwardReference {
                    question: question.id.clone(),
                    key: key.to_string(),
                });
            }
        }

        let mut reachable = descendants[start].clone();
        reachable.insert(start);
        if let Some(orphan) = (0..spec.questions.len()).find(|node| !reachable.contains(node)) {
            return Err(ConfigurationError::Orphan(spec.questions[orphan].id.clone()));
        }
        let terminal_reachable = reachable
            .iter()
            .any(|node| successors[*node].contains(&Edge::Done));
        if !terminal_reachable {
            return Err(ConfigurationError::TerminalUnreachable(spec.id));
        }

        tracing::debug!(
            flow = %spec.id,
            questions = spec.questions.len(),
            "question graph built"
        );

        Ok(Self {
            spec,
            index,
            start,
            successors,
            descendants,
            condition_owners,
        })
    }

    pub fn id(&self) -> &str {
        &self.spec.id
    }

    pub fn title(&self) -> &str {
        &self.spec.title
    }

    pub fn version(&self) -> &str {
        &self.spec.version
    }

    pub fn spec(&self) -> &FlowSpec {
        &self.spec
    }

    pub fn questions(&self) -> &[QuestionSpec] {
        &self.spec.questions
    }

    pub fn len(&self) -> usize {
        self.spec.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spec.questions.is_empty()
    }

    pub fn start_key(&self) -> &str {
        &self.spec.questions[self.start].id
    }

    pub fn node_for(&self, key: &str) -> Option<&QuestionSpec> {
        self.index_of(key).map(|position| &self.spec.questions[position])
    }

    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Every key a node can hand over to, with `$done` for the end of the flow.
    pub fn successor_keys(&self, key: &str) -> Vec<&str> {
        self.index_of(key)
            .map(|node| {
                self.successors[node]
                    .iter()
                    .map(|edge| match edge {
                        Edge::Node(next) => self.key(*next),
                        Edge::Done => DONE_TARGET,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Keys reachable from `key` under some assignment of answers.
    pub fn descendants(&self, key: &str) -> Vec<&str> {
        self.index_of(key)
            .map(|node| {
                self.descendants[node]
                    .iter()
                    .map(|next| self.key(*next))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Evaluates the node's `visible_if` against the store; `None` when the
    /// answers it depends on are still ahead.
    pub fn is_reachable(&self, key: &str, store: &FieldStore) -> Option<bool> {
        self.index_of(key)
            .and_then(|node| self.reachability(node, store))
    }

    pub(crate) fn key(&self, node: usize) -> &str {
        &self.spec.questions[node].id
    }

    pub(crate) fn question(&self, node: usize) -> &QuestionSpec {
        &self.spec.questions[node]
    }

    pub(crate) fn start_index(&self) -> usize {
        self.start
    }

    pub(crate) fn knowledge<'a>(&'a self, store: &'a FieldStore, node: usize) -> Knowledge<'a> {
        Knowledge {
            graph: self,
            store,
            at: node,
        }
    }

    pub(crate) fn reachability(&self, node: usize, store: &FieldStore) -> Option<bool> {
        self.reachability_in(node, &self.knowledge(store, node))
    }

    pub(crate) fn reachability_in(&self, node: usize, answers: &dyn AnswerLookup) -> Option<bool> {
        match &self.spec.questions[node].visible_if {
            Some(expr) => expr.evaluate(answers),
            None => Some(true),
        }
    }

    pub(crate) fn is_descendant(&self, of: usize, node: usize) -> bool {
        self.descendants[of].contains(&node)
    }

    /// Questions whose answers are read by a condition at `node` or any of
    /// its descendants.
    pub(crate) fn condition_owners(&self, node: usize) -> &BTreeSet<usize> {
        &self.condition_owners[node]
    }

    /// Route taken from `node` when undecided conditions count as false.
    pub(crate) fn route(&self, node: usize, store: &FieldStore) -> Edge {
        let knowledge = self.knowledge(store, node);
        for route in &self.spec.questions[node].next {
            let taken = match &route.when {
                Some(expr) => expr.evaluate(&knowledge) == Some(true),
                None => true,
            };
            if taken {
                return self.edge_for(route.target());
            }
        }
        self.fallback(node)
    }

    /// Every route that may still be taken from `node` given what is known.
    pub(crate) fn route_candidates(&self, node: usize, answers: &dyn AnswerLookup) -> Vec<Edge> {
        let mut candidates = Vec::new();
        for route in &self.spec.questions[node].next {
            match route.when.as_ref().map(|expr| expr.evaluate(answers)) {
                None | Some(Some(true)) => {
                    candidates.push(self.edge_for(route.target()));
                    return candidates;
                }
                Some(None) => candidates.push(self.edge_for(route.target())),
                Some(Some(false)) => {}
            }
        }
        candidates.push(self.fallback(node));
        candidates
    }

    /// Follows `edge` until a node that is reachable under the store, skipping
    /// through each unreachable node's own route.
    pub(crate) fn resolve(&self, mut edge: Edge, store: &FieldStore) -> Option<usize> {
        loop {
            match edge {
                Edge::Done => return None,
                Edge::Node(node) => {
                    if self.reachability(node, store) == Some(true) {
                        return Some(node);
                    }
                    tracing::trace!(
                        flow = %self.spec.id,
                        skipped = %self.key(node),
                        "skipping unreachable question"
                    );
                    edge = self.route(node, store);
                }
            }
        }
    }

    fn fallback(&self, node: usize) -> Edge {
        if node + 1 < self.spec.questions.len() {
            Edge::Node(node + 1)
        } else {
            Edge::Done
        }
    }

    fn edge_for(&self, target: Target<'_>) -> Edge {
        match target {
            Target::Done => Edge::Done,
            // Targets were checked at construction.
            Target::Question(key) => self
                .index
                .get(key)
                .map_or(Edge::Done, |node| Edge::Node(*node)),
        }
    }
}

/// Answer lookup as seen from one node: unanswered keys whose question can no
/// longer be visited from here are settled as absent.
pub(crate) struct Knowledge<'a> {
    graph: &'a QuestionGraph,
    store: &'a FieldStore,
    at: usize,
}

impl AnswerLookup for Knowledge<'_> {
    fn lookup(&self, key: &str) -> Lookup<'_> {
        if let Some(value) = self.store.get(key) {
            return Lookup::Present(value);
        }
        match self.graph.index.get(key) {
            Some(&owner) if owner != self.at && !self.graph.is_descendant(self.at, owner) => {
                Lookup::Absent
            }
            _ => Lookup::Unknown,
        }
    }
}

fn conditions(question: &QuestionSpec) -> impl Iterator<Item = &Expr> {
    question
        .visible_if
        .iter()
        .chain(question.next.iter().filter_map(|route| route.when.as_ref()))
}

/// First key a condition on `question` reads before it can have been asked.
///
/// `visible_if` may only look behind the node. A route may also read the
/// node's own answer, which is recorded before routing.
fn forward_reference<'a>(
    question: &'a QuestionSpec,
    node: usize,
    index: &HashMap<String, usize>,
    descendants: &BTreeSet<usize>,
) -> Option<&'a str> {
    let ahead = |key: &str, own_allowed: bool| {
        index
            .get(key)
            .is_some_and(|&owner| (owner == node && !own_allowed) || descendants.contains(&owner))
    };
    let visibility = question
        .visible_if
        .iter()
        .flat_map(Expr::referenced_keys)
        .find(|key| ahead(*key, false));
    visibility.or_else(|| {
        question
            .next
            .iter()
            .filter_map(|route| route.when.as_ref())
            .flat_map(Expr::referenced_keys)
            .find(|key| ahead(*key, true))
    })
}

fn check_question(question: &QuestionSpec) -> Result<(), ConfigurationError> {
    if question.id == DONE_TARGET {
        return Err(ConfigurationError::ReservedKey(question.id.clone()));
    }
    check_field(question)?;
    if question.kind == QuestionKind::Group {
        if question.fields.is_empty() {
            return Err(ConfigurationError::EmptyGroup(question.id.clone()));
        }
        let mut seen = BTreeSet::new();
        for field in &question.fields {
            if field.kind == QuestionKind::Group {
                return Err(ConfigurationError::NestedGroup {
                    group: question.id.clone(),
                    field: field.id.clone(),
                });
            }
            if !seen.insert(field.id.as_str()) {
                return Err(ConfigurationError::DuplicateKey(format!(
                    "{}.{}",
                    question.id, field.id
                )));
            }
            check_field(field)?;
        }
    }
    Ok(())
}

fn check_field(question: &QuestionSpec) -> Result<(), ConfigurationError> {
    if question.kind.has_choices()
        && question
            .choices
            .as_ref()
            .is_none_or(|choices| choices.is_empty())
    {
        return Err(ConfigurationError::MissingChoices(question.id.clone()));
    }
    if let Some(pattern) = question
        .constraint
        .as_ref()
        .and_then(|constraint| constraint.pattern.as_ref())
        && let Err(err) = Regex::new(pattern)
    {
        return Err(ConfigurationError::InvalidPattern {
            question: question.id.clone(),
            reason: err.to_string(),
        });
    }
    Ok(())
}

fn static_successors(
    spec: &FlowSpec,
    index: &HashMap<String, usize>,
    position: usize,
    question: &QuestionSpec,
) -> Result<Vec<Edge>, ConfigurationError> {
    let mut edges = BTreeSet::new();
    let mut unconditional = false;
    for route in &question.next {
        let edge = match route.target() {
            Target::Done => Edge::Done,
            Target::Question(key) => {
                Edge::Node(*index.get(key).ok_or_else(|| ConfigurationError::UnknownTarget {
                    from: question.id.clone(),
                    to: key.to_string(),
                })?)
            }
        };
        edges.insert(edge);
        if route.when.is_none() {
            unconditional = true;
            break;
        }
    }
    if !unconditional {
        edges.insert(if position + 1 < spec.questions.len() {
            Edge::Node(position + 1)
        } else {
            Edge::Done
        });
    }
    Ok(edges.into_iter().collect())
}

/// Depth-first topological sort; any back edge is a routing cycle.
fn topological_order(
    spec: &FlowSpec,
    successors: &[Vec<Edge>],
) -> Result<Vec<usize>, ConfigurationError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        New,
        Active,
        Finished,
    }

    fn visit(
        node: usize,
        successors: &[Vec<Edge>],
        marks: &mut [Mark],
        stack: &mut Vec<usize>,
        order: &mut Vec<usize>,
    ) -> Result<(), Vec<usize>> {
        marks[node] = Mark::Active;
        stack.push(node);
        for edge in &successors[node] {
            if let Edge::Node(next) = *edge {
                match marks[next] {
                    Mark::Active => {
                        let from = stack.iter().position(|entry| *entry == next).unwrap_or(0);
                        let mut cycle = stack[from..].to_vec();
                        cycle.push(next);
                        return Err(cycle);
                    }
                    Mark::New => visit(next, successors, marks, stack, order)?,
                    Mark::Finished => {}
                }
            }
        }
        stack.pop();
        marks[node] = Mark::Finished;
        order.push(node);
        Ok(())
    }

    let mut marks = vec![Mark::New; successors.len()];
    let mut order = Vec::with_capacity(successors.len());
    for node in 0..successors.len() {
        if marks[node] == Mark::New {
            let mut stack = Vec::new();
            visit(node, successors, &mut marks, &mut stack, &mut order).map_err(|cycle| {
                ConfigurationError::Cycle(
                    cycle
                        .into_iter()
                        .map(|node| spec.questions[node].id.clone())
                        .collect(),
                )
            })?;
        }
    }
    // Post-order lists successors first; reverse for parents-before-children.
    order.reverse();
    Ok(order)
}
