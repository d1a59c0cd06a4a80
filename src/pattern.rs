//! Patterns and the ordered scans that evaluate them.
//!
//! A join node only ever talks to its scan through [`PatternScan`]. The
//! scan and its ancestors agree on a shared [`AttributeOrder`]: the variables
//! already bound upstream come first, so a parent can tell a child exactly
//! which prefix of that order changed between two of its rows.

use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::binding::Binding;
use crate::error::{LeapjoinError, Result};
use crate::interface::CancelToken;
use crate::store::{Dataset, QuadIndex};
use crate::term::{DEFAULT_GRAPH, Term, TermId, Variable};

// ------------- Slot -------------
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slot {
    Term(Term),
    Var(Variable),
}
impl Slot {
    pub fn var(name: &str) -> Self {
        Slot::Var(Variable::new(name))
    }
    pub fn is_var(&self) -> bool {
        matches!(self, Slot::Var(_))
    }
}
impl From<Term> for Slot {
    fn from(term: Term) -> Self {
        Slot::Term(term)
    }
}
impl From<Variable> for Slot {
    fn from(var: Variable) -> Self {
        Slot::Var(var)
    }
}
impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Slot::Term(t) => write!(f, "{}", t),
            Slot::Var(v) => write!(f, "{}", v),
        }
    }
}

// ------------- QuadPattern -------------
/// Subject, predicate, object and graph slots.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QuadPattern {
    slots: [Slot; 4],
}
impl QuadPattern {
    pub fn triple(s: impl Into<Slot>, p: impl Into<Slot>, o: impl Into<Slot>) -> Self {
        Self {
            slots: [s.into(), p.into(), o.into(), Slot::Term(DEFAULT_GRAPH.clone())],
        }
    }
    pub fn quad(g: impl Into<Slot>, s: impl Into<Slot>, p: impl Into<Slot>, o: impl Into<Slot>) -> Self {
        Self {
            slots: [s.into(), p.into(), o.into(), g.into()],
        }
    }
    pub fn slots(&self) -> &[Slot; 4] {
        &self.slots
    }
    pub fn in_graph(&self, graph: &Slot) -> Self {
        let mut slots = self.slots.clone();
        slots[3] = graph.clone();
        Self { slots }
    }
    pub fn variable_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_var()).count()
    }
}
impl fmt::Display for QuadPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let [s, p, o, g] = &self.slots;
        if *g == Slot::Term(DEFAULT_GRAPH.clone()) {
            write!(f, "({} {} {})", s, p, o)
        } else {
            write!(f, "({} {} {} {})", g, s, p, o)
        }
    }
}

// ------------- BasicPattern -------------
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BasicPattern {
    patterns: Vec<QuadPattern>,
}
impl BasicPattern {
    pub fn new(patterns: Vec<QuadPattern>) -> Self {
        Self { patterns }
    }
    pub fn push(&mut self, pattern: QuadPattern) {
        self.patterns.push(pattern);
    }
    pub fn patterns(&self) -> &[QuadPattern] {
        &self.patterns
    }
    pub fn len(&self) -> usize {
        self.patterns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
    /// Variables in order of first appearance.
    pub fn vars(&self) -> Vec<Variable> {
        let mut vars = Vec::new();
        for pattern in self.patterns.iter() {
            for slot in pattern.slots.iter() {
                if let Slot::Var(v) = slot {
                    if !vars.contains(v) {
                        vars.push(v.clone());
                    }
                }
            }
        }
        vars
    }
    pub fn mentions(&self, var: &Variable) -> bool {
        self.patterns
            .iter()
            .any(|p| p.slots.iter().any(|s| matches!(s, Slot::Var(v) if v == var)))
    }
    pub fn in_graph(&self, graph: &Slot) -> Self {
        Self {
            patterns: self.patterns.iter().map(|p| p.in_graph(graph)).collect(),
        }
    }
}
impl fmt::Display for BasicPattern {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let patterns: Vec<String> = self.patterns.iter().map(|p| p.to_string()).collect();
        write!(f, "{}", patterns.join(" "))
    }
}

// ------------- AttributeOrder -------------
/// The variable order shared by a node and its ancestors. Immutable: a scan
/// that discovers new variables hands back a longer copy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeOrder(Arc<[Variable]>);

impl AttributeOrder {
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }
    pub fn vars(&self) -> &[Variable] {
        &self.0
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn position(&self, var: &Variable) -> Option<usize> {
        self.0.iter().position(|v| v == var)
    }
    pub fn extend(&self, vars: &[Variable]) -> Self {
        let mut extended = self.0.to_vec();
        for var in vars {
            if !extended.contains(var) {
                extended.push(var.clone());
            }
        }
        Self(Arc::from(extended))
    }
}
impl Default for AttributeOrder {
    fn default() -> Self {
        Self::empty()
    }
}

// ------------- PatternScan -------------
/// The narrow contract between a join node and the ordered index.
pub trait PatternScan: Send {
    /// Negotiates the shared order; called exactly once, before anything else.
    fn init(&mut self, incoming: &AttributeOrder) -> AttributeOrder;
    /// Whether the pattern can ever match.
    fn open_terms(&self) -> bool;
    /// Starts scanning without any upstream context (root only).
    fn open(&mut self) -> Result<()>;
    fn has_next(&self) -> bool;
    /// The ids of the next row, one per local attribute.
    fn next(&mut self) -> Option<&[TermId]>;
    /// Repositions the scan for a new upstream context, given that only
    /// attributes at or after `first_changed` in the shared order changed.
    fn seek(&mut self, context: &Binding, first_changed: usize) -> Result<bool>;
    /// Rewinds to the start of the current context.
    fn reset(&mut self) -> bool;
    fn local_attributes(&self) -> &[Variable];
    fn local_attribute(&self, i: usize) -> &Variable {
        &self.local_attributes()[i]
    }
    fn has_variable(&self, var: &Variable) -> bool;
    /// First position in the shared order where the two bindings disagree.
    fn first_changed(&self, old: Option<&Binding>, new: &Binding) -> usize;
}

// ------------- IndexScan -------------
#[derive(Clone, Copy, Debug)]
enum Resolved {
    Const(TermId),
    Var(usize),
}

/// Evaluates a basic pattern against the dataset index, one upstream
/// context at a time, yielding rows sorted by local attribute order.
pub struct IndexScan {
    dataset: Arc<Dataset>,
    pattern: BasicPattern,
    cancel: CancelToken,
    initialized: bool,
    possible: bool,
    compiled: Vec<[Resolved; 4]>,
    attributes: Vec<Variable>,
    order: AttributeOrder,
    // (local attribute, position in the shared order) for upstream-bound attributes
    upstream: Vec<(usize, usize)>,
    context: Option<Vec<Option<TermId>>>,
    rows: Vec<TermId>,
    count: usize,
    cursor: usize,
}

impl IndexScan {
    pub fn new(dataset: Arc<Dataset>, pattern: BasicPattern, cancel: CancelToken) -> Self {
        Self {
            dataset,
            pattern,
            cancel,
            initialized: false,
            possible: true,
            compiled: Vec::new(),
            attributes: Vec::new(),
            order: AttributeOrder::empty(),
            upstream: Vec::new(),
            context: None,
            rows: Vec::new(),
            count: 0,
            cursor: 0,
        }
    }
    pub fn pattern(&self) -> &BasicPattern {
        &self.pattern
    }
    fn width(&self) -> usize {
        self.attributes.len()
    }
    fn derive(&mut self, key: Vec<Option<TermId>>) {
        self.rows.clear();
        self.count = 0;
        if self.possible {
            let mut env: Vec<Option<TermId>> = vec![None; self.width()];
            for ((local, _), value) in self.upstream.iter().zip(key.iter()) {
                env[*local] = *value;
            }
            let mut found = Vec::new();
            solve(self.dataset.index(), &self.compiled, &mut env, &mut found);
            found.sort_unstable();
            found.dedup();
            self.count = found.len();
            self.rows = found.into_iter().flatten().collect();
        }
        trace!(pattern = %self.pattern, rows = self.count, "context derived");
        self.context = Some(key);
        self.cursor = 0;
    }
}

// Index nested loop over the patterns, binding attributes as it goes.
fn solve(
    index: &QuadIndex,
    patterns: &[[Resolved; 4]],
    env: &mut [Option<TermId>],
    found: &mut Vec<Vec<TermId>>,
) {
    let Some((pattern, rest)) = patterns.split_first() else {
        if let Some(row) = env.iter().copied().collect::<Option<Vec<TermId>>>() {
            found.push(row);
        }
        return;
    };
    let mut bound = [None; 4];
    for (slot, resolved) in pattern.iter().enumerate() {
        bound[slot] = match resolved {
            Resolved::Const(id) => Some(*id),
            Resolved::Var(local) => env[*local],
        };
    }
    for quad in index.find(bound) {
        let mut newly = Vec::new();
        let mut consistent = true;
        for (slot, resolved) in pattern.iter().enumerate() {
            if let Resolved::Var(local) = resolved {
                match env[*local] {
                    Some(id) if id != quad[slot] => {
                        consistent = false;
                        break;
                    }
                    Some(_) => (),
                    None => {
                        env[*local] = Some(quad[slot]);
                        newly.push(*local);
                    }
                }
            }
        }
        if consistent {
            solve(index, rest, env, found);
        }
        for local in newly {
            env[local] = None;
        }
    }
}

impl PatternScan for IndexScan {
    fn init(&mut self, incoming: &AttributeOrder) -> AttributeOrder {
        let vars = self.pattern.vars();
        let mut upstream: Vec<(Variable, usize)> = vars
            .iter()
            .filter_map(|v| incoming.position(v).map(|p| (v.clone(), p)))
            .collect();
        upstream.sort_by_key(|(_, p)| *p);
        let fresh: Vec<Variable> = vars
            .into_iter()
            .filter(|v| incoming.position(v).is_none())
            .collect();
        self.upstream = upstream.iter().enumerate().map(|(local, (_, p))| (local, *p)).collect();
        self.attributes = upstream.into_iter().map(|(v, _)| v).chain(fresh.iter().cloned()).collect();
        self.order = incoming.extend(&fresh);

        let terms = self.dataset.terms();
        let index = self.dataset.index();
        let mut possible = true;
        let mut compiled = Vec::with_capacity(self.pattern.len());
        for pattern in self.pattern.patterns() {
            let mut resolved = [Resolved::Var(0); 4];
            for (slot, s) in pattern.slots().iter().enumerate() {
                resolved[slot] = match s {
                    Slot::Var(v) => match self.attributes.iter().position(|a| a == v) {
                        Some(local) => Resolved::Var(local),
                        None => {
                            possible = false;
                            Resolved::Const(TermId::MAX)
                        }
                    },
                    Slot::Term(t) => match terms.id(t) {
                        Some(id) if index.occurs(slot, id) => Resolved::Const(id),
                        _ => {
                            possible = false;
                            Resolved::Const(TermId::MAX)
                        }
                    },
                };
            }
            compiled.push(resolved);
        }
        self.compiled = compiled;
        self.possible = possible;
        self.initialized = true;
        trace!(pattern = %self.pattern, attributes = ?self.attributes, possible, "scan initialized");
        self.order.clone()
    }

    fn open_terms(&self) -> bool {
        self.possible
    }

    fn open(&mut self) -> Result<()> {
        if !self.initialized {
            return Err(LeapjoinError::Scan(format!("scan over {} opened before init", self.pattern)));
        }
        self.derive(vec![None; self.upstream.len()]);
        Ok(())
    }

    fn has_next(&self) -> bool {
        !self.cancel.is_cancelled() && self.cursor < self.count
    }

    fn next(&mut self) -> Option<&[TermId]> {
        if !self.has_next() {
            return None;
        }
        let width = self.width();
        let start = self.cursor * width;
        self.cursor += 1;
        Some(&self.rows[start..start + width])
    }

    fn seek(&mut self, context: &Binding, first_changed: usize) -> Result<bool> {
        if !self.initialized {
            return Err(LeapjoinError::Scan(format!("scan over {} sought before init", self.pattern)));
        }
        if !self.possible {
            return Ok(false);
        }
        let untouched = self.context.is_some()
            && self.upstream.iter().all(|(_, position)| *position < first_changed);
        if untouched {
            self.cursor = 0;
        } else {
            let key: Vec<Option<TermId>> = self
                .upstream
                .iter()
                .map(|(local, _)| context.get(&self.attributes[*local]))
                .collect();
            if self.context.as_ref() == Some(&key) {
                self.cursor = 0;
            } else {
                self.derive(key);
            }
        }
        Ok(self.count > 0)
    }

    fn reset(&mut self) -> bool {
        self.cursor = 0;
        self.count > 0
    }

    fn local_attributes(&self) -> &[Variable] {
        &self.attributes
    }

    fn has_variable(&self, var: &Variable) -> bool {
        self.pattern.mentions(var)
    }

    fn first_changed(&self, old: Option<&Binding>, new: &Binding) -> usize {
        let Some(old) = old else {
            return 0;
        };
        self.order
            .vars()
            .iter()
            .position(|v| old.get(v) != new.get(v))
            .unwrap_or(self.order.len())
    }
}

// ------------- Reorder -------------
/// Strategy for ordering the patterns of a basic pattern before it is scanned.
pub trait Reorder: Send + Sync {
    fn reorder(&self, pattern: &BasicPattern) -> BasicPattern;
}

/// Leaves patterns as written.
pub struct Identity;
impl Reorder for Identity {
    fn reorder(&self, pattern: &BasicPattern) -> BasicPattern {
        pattern.clone()
    }
}

/// Moves patterns with fewer variable slots to the front, keeping ties in
/// their written order.
pub struct BoundFirst;
impl Reorder for BoundFirst {
    fn reorder(&self, pattern: &BasicPattern) -> BasicPattern {
        let mut patterns = pattern.patterns().to_vec();
        patterns.sort_by_key(|p| p.variable_count());
        BasicPattern::new(patterns)
    }
}
