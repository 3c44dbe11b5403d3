use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::expr::{AnswerLookup, Lookup};

/// Answer values keyed by question id.
///
/// Only changing writes bump the revision and mark the store dirty, so
/// repeating an identical `set` never triggers another snapshot write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldStore {
    values: BTreeMap<String, Value>,
    revision: u64,
    dirty: bool,
}

impl FieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a clean store from a snapshot's answer map.
    pub fn from_answers(answers: Map<String, Value>) -> Self {
        Self {
            values: answers.into_iter().collect(),
            revision: 0,
            dirty: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Stores `value` under `key`; returns whether the stored value changed.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        if self.values.get(&key) == Some(&value) {
            return false;
        }
        self.values.insert(key, value);
        self.touch();
        true
    }

    /// Removes the given keys and returns the ones that actually held a value.
    pub fn clear_many<I, K>(&mut self, keys: I) -> Vec<String>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let cleared: Vec<String> = keys
            .into_iter()
            .filter_map(|key| self.values.remove_entry(key.as_ref()).map(|(key, _)| key))
            .collect();
        if !cleared.is_empty() {
            self.touch();
        }
        cleared
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Copies every stored answer into a JSON object.
    pub fn answers(&self) -> Map<String, Value> {
        self.values
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.answers())
    }

    fn touch(&mut self) {
        self.revision += 1;
        self.dirty = true;
    }
}

impl AnswerLookup for FieldStore {
    fn lookup(&self, key: &str) -> Lookup<'_> {
        match self.values.get(key) {
            Some(value) => Lookup::Present(value),
            None => Lookup::Unknown,
        }
    }
}
