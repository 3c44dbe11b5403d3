use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static NULL: Value = Value::Null;

/// What an expression sees when it looks up an answer key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lookup<'a> {
    /// The key holds a value (possibly `null` for a passed optional question).
    Present(&'a Value),
    /// The key is unanswered and its question can no longer be visited.
    Absent,
    /// The key is unanswered and its question may still be asked.
    Unknown,
}

/// Source of answers for expression evaluation.
pub trait AnswerLookup {
    fn lookup(&self, key: &str) -> Lookup<'_>;
}

/// Lightweight expression AST used for `visible_if` and route conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    LiteralBool { value: bool },
    Eq { key: String, value: Value },
    Ne { key: String, value: Value },
    In { key: String, values: Vec<Value> },
    Contains { key: String, value: Value },
    IsSet { key: String },
    And { expressions: Vec<Expr> },
    Or { expressions: Vec<Expr> },
    Not { expression: Box<Expr> },
}

impl Expr {
    /// Evaluates the expression with three-valued logic; `None` means the
    /// answers needed to decide are not known yet.
    pub fn evaluate(&self, answers: &dyn AnswerLookup) -> Option<bool> {
        match self {
            Expr::LiteralBool { value } => Some(*value),
            Expr::Eq { key, value } => Self::resolve(answers, key).map(|found| found == value),
            Expr::Ne { key, value } => Self::resolve(answers, key).map(|found| found != value),
            Expr::In { key, values } => {
                Self::resolve(answers, key).map(|found| values.contains(found))
            }
            Expr::Contains { key, value } => {
                Self::resolve(answers, key).map(|found| match found {
                    Value::Array(items) => items.contains(value),
                    Value::Null => false,
                    other => other == value,
                })
            }
            Expr::IsSet { key } => match answers.lookup(key) {
                Lookup::Present(found) => Some(!found.is_null()),
                Lookup::Absent => Some(false),
                Lookup::Unknown => None,
            },
            Expr::And { expressions } => {
                let mut unknown = false;
                for expr in expressions {
                    match expr.evaluate(answers) {
                        Some(true) => continue,
                        Some(false) => return Some(false),
                        None => unknown = true,
                    }
                }
                if unknown { None } else { Some(true) }
            }
            Expr::Or { expressions } => {
                let mut unknown = false;
                for expr in expressions {
                    match expr.evaluate(answers) {
                        Some(true) => return Some(true),
                        Some(false) => continue,
                        None => unknown = true,
                    }
                }
                if unknown { None } else { Some(false) }
            }
            Expr::Not { expression } => expression.evaluate(answers).map(|value| !value),
        }
    }

    /// Answer keys the expression depends on, in declaration order.
    pub fn referenced_keys(&self) -> Vec<&str> {
        let mut keys = Vec::new();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys<'a>(&'a self, keys: &mut Vec<&'a str>) {
        match self {
            Expr::LiteralBool { .. } => {}
            Expr::Eq { key, .. }
            | Expr::Ne { key, .. }
            | Expr::In { key, .. }
            | Expr::Contains { key, .. }
            | Expr::IsSet { key } => keys.push(key),
            Expr::And { expressions } | Expr::Or { expressions } => {
                for expr in expressions {
                    expr.collect_keys(keys);
                }
            }
            Expr::Not { expression } => expression.collect_keys(keys),
        }
    }

    fn resolve<'a>(answers: &'a dyn AnswerLookup, key: &str) -> Option<&'a Value> {
        match answers.lookup(key) {
            Lookup::Present(value) => Some(value),
            Lookup::Absent => Some(&NULL),
            Lookup::Unknown => None,
        }
    }
}
