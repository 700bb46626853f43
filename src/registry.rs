use std::slice;

use crate::Rule;

/// Ordered, append-only store of declared rules.
///
/// Order is kept for deterministic iteration only; it never affects a
/// decision.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    rules: Vec<Rule>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn all(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> slice::Iter<'_, Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Drops every rule.
    pub fn clear(&mut self) {
        self.rules.clear();
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a Rule;
    type IntoIter = slice::Iter<'a, Rule>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
