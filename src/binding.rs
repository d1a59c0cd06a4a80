use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::error::{LeapjoinError, Result};
use crate::term::{Term, TermId, TermTable, VarHasher, Variable};

// ------------- Binding -------------
/// One row of variable to term-id assignments, keys unique.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Binding {
    slots: HashMap<Variable, TermId, VarHasher>,
}

impl Binding {
    pub fn new() -> Self {
        Self::default()
    }
    /// Builds a binding from a scan row, pairing the i:th id with the i:th attribute.
    pub fn from_row(attributes: &[Variable], ids: &[TermId]) -> Self {
        let mut binding = Self::default();
        binding.slots.reserve(attributes.len());
        for (var, id) in attributes.iter().zip(ids) {
            binding.slots.insert(var.clone(), *id);
        }
        binding
    }
    pub fn get(&self, var: &Variable) -> Option<TermId> {
        self.slots.get(var).copied()
    }
    pub fn contains(&self, var: &Variable) -> bool {
        self.slots.contains_key(var)
    }
    pub fn insert(&mut self, var: Variable, id: TermId) -> Option<TermId> {
        self.slots.insert(var, id)
    }
    /// Adds the assignments of `other` whose variables are not bound here yet.
    /// Existing assignments always win.
    pub fn extend_absent(&mut self, other: &Binding) {
        for (var, id) in other.slots.iter() {
            if !self.slots.contains_key(var) {
                self.slots.insert(var.clone(), *id);
            }
        }
    }
    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, TermId)> {
        self.slots.iter().map(|(var, id)| (var, *id))
    }
    pub fn vars(&self) -> impl Iterator<Item = &Variable> {
        self.slots.keys()
    }
    pub fn sorted(&self) -> Vec<(&Variable, TermId)> {
        let mut pairs: Vec<_> = self.iter().collect();
        pairs.sort_unstable_by(|a, b| a.0.cmp(b.0));
        pairs
    }
}
impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pairs: Vec<String> = self
            .sorted()
            .into_iter()
            .map(|(var, id)| format!("{}={}", var, id))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

// ------------- Solution -------------
/// A binding with every term id replaced by the term it stands for.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Solution {
    values: BTreeMap<Variable, Term>,
}

impl Solution {
    pub fn materialize(binding: &Binding, terms: &TermTable) -> Result<Self> {
        let mut values = BTreeMap::new();
        for (var, id) in binding.iter() {
            let term = terms
                .term(id)
                .ok_or_else(|| LeapjoinError::UnknownTerm(id.to_string()))?;
            values.insert(var.clone(), term.clone());
        }
        Ok(Self { values })
    }
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.values.get(&Variable::new(name))
    }
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(&Variable::new(name))
    }
    pub fn len(&self) -> usize {
        self.values.len()
    }
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Term)> {
        self.values.iter()
    }
}
impl fmt::Display for Solution {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pairs: Vec<String> = self
            .values
            .iter()
            .map(|(var, term)| format!("{}={}", var, term))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}
