//! The join tree.
//!
//! Every [`JoinNode`] owns one pattern scan (its required pattern) and an
//! ordered list of optional children. For each row of its own scan a node
//! seeks every child to the new context, caches up to `capacity` rows per
//! child and then walks the cross product of those caches like a mixed-radix
//! counter, child 0 varying fastest. A child with no rows simply contributes
//! nothing to the combination, so the own row is still produced.
//!
//! ```text
//!   (?s <p> ?o)                  own scan, pre/post filters
//!     ├── (?o <q> ?x)            child 0, cache [x1 x2 ..]
//!     └── (?s <r> ?y)            child 1, cache [y1 ..]
//! ```

use std::mem;
use std::sync::Arc;

use tracing::trace;

use crate::binding::Binding;
use crate::error::{LeapjoinError, Result};
use crate::expr::{Expr, Resolve};
use crate::pattern::{AttributeOrder, PatternScan};
use crate::store::Dataset;
use crate::term::{Term, TermTable, Variable};

/// Where a node resumes when asked for its next row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Pull the next row from the own scan.
    Find,
    /// Step to the next combination of cached child rows.
    Extend,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Active(Phase),
    /// A row is pending; the phase is where to resume once it is taken.
    Ready(Phase),
    Exhausted,
}

/// Counters kept per node, mostly of interest when tracing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeStats {
    pub own_rows: usize,
    pub pre_filter_evaluations: usize,
    pub post_filter_evaluations: usize,
    pub combinations: usize,
    pub refills: usize,
}

// Resolves term ids through the term table, consulting the fallback
// (ancestor context) for variables the row lacks.
struct RowView<'a> {
    row: &'a Binding,
    fallback: Option<&'a Binding>,
    terms: &'a TermTable,
}
impl Resolve for RowView<'_> {
    fn resolve(&self, var: &Variable) -> Option<&Term> {
        self.row
            .get(var)
            .or_else(|| self.fallback.and_then(|f| f.get(var)))
            .and_then(|id| self.terms.term(id))
    }
}

// ------------- ChildCache -------------
/// A bounded window over the rows an optional child produces for the current
/// parent row.
pub struct ChildCache {
    node: JoinNode,
    entries: Vec<Binding>,
    cursor: usize,
    // the child had further rows when the window filled up
    more: bool,
    // how many windows have been drained since the child was positioned
    chunk: usize,
}

impl ChildCache {
    fn new(node: JoinNode) -> Self {
        Self {
            node,
            entries: Vec::new(),
            cursor: 0,
            more: false,
            chunk: 0,
        }
    }
    pub fn node(&self) -> &JoinNode {
        &self.node
    }
    pub fn entries(&self) -> &[Binding] {
        &self.entries
    }
    pub fn cursor(&self) -> usize {
        self.cursor
    }
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
    fn current(&self) -> Option<&Binding> {
        self.entries.get(self.cursor)
    }
    fn fill(&mut self, capacity: usize) -> Result<()> {
        self.entries.clear();
        self.cursor = 0;
        while self.entries.len() < capacity && self.node.advance()? {
            self.entries.push(self.node.take()?);
        }
        self.more = self.entries.len() == capacity && self.node.advance()?;
        Ok(())
    }
    // positions the child for a new parent row and fills the first window
    fn load(&mut self, context: &Binding, first_changed: usize, capacity: usize) -> Result<()> {
        self.chunk = 0;
        if self.node.seek(context, first_changed)? {
            self.fill(capacity)
        } else {
            self.entries.clear();
            self.cursor = 0;
            self.more = false;
            Ok(())
        }
    }
    fn step(&mut self) -> bool {
        if self.cursor + 1 < self.entries.len() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }
    fn refill(&mut self, capacity: usize) -> Result<bool> {
        if !self.more {
            return Ok(false);
        }
        self.fill(capacity)?;
        self.chunk += 1;
        Ok(!self.entries.is_empty())
    }
    // back to the first row for the current parent row
    fn rewind(&mut self, capacity: usize) -> Result<()> {
        if self.chunk == 0 {
            self.cursor = 0;
            return Ok(());
        }
        self.node.reset();
        self.chunk = 0;
        self.fill(capacity)
    }
}

// ------------- JoinNode -------------
pub struct JoinNode {
    scan: Box<dyn PatternScan>,
    dataset: Arc<Dataset>,
    capacity: usize,
    attributes: Vec<Variable>,
    children: Vec<ChildCache>,
    pre_filters: Vec<Expr>,
    post_filters: Vec<Expr>,
    state: State,
    // the pattern can never match
    never_matches: bool,
    // ancestor values this node was last positioned with
    context: Binding,
    own: Binding,
    extended: Binding,
    // the context last handed to the children
    child_context: Option<Binding>,
    stats: NodeStats,
}

impl JoinNode {
    pub fn new(scan: Box<dyn PatternScan>, dataset: Arc<Dataset>, capacity: usize) -> Self {
        Self {
            scan,
            dataset,
            capacity: capacity.max(1),
            attributes: Vec::new(),
            children: Vec::new(),
            pre_filters: Vec::new(),
            post_filters: Vec::new(),
            state: State::Active(Phase::Find),
            never_matches: false,
            context: Binding::new(),
            own: Binding::new(),
            extended: Binding::new(),
            child_context: None,
            stats: NodeStats::default(),
        }
    }

    pub fn add_child(&mut self, child: JoinNode) {
        self.children.push(ChildCache::new(child));
    }

    /// Files the expression as a pre-filter when the own scan binds every
    /// variable it mentions, otherwise as a post-filter. Returns true for a
    /// pre-filter.
    pub fn add_filter(&mut self, expr: Expr) -> bool {
        let pre = expr.vars().iter().all(|v| self.scan.has_variable(v));
        if pre {
            self.pre_filters.push(expr);
        } else {
            self.post_filters.push(expr);
        }
        pre
    }

    pub fn children(&self) -> impl Iterator<Item = &ChildCache> {
        self.children.iter()
    }
    pub fn pre_filters(&self) -> &[Expr] {
        &self.pre_filters
    }
    pub fn post_filters(&self) -> &[Expr] {
        &self.post_filters
    }
    pub fn state(&self) -> State {
        self.state
    }
    pub fn stats(&self) -> &NodeStats {
        &self.stats
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    pub fn attributes(&self) -> &[Variable] {
        &self.attributes
    }

    /// Negotiates the shared attribute order with the own scan and then with
    /// every child in turn, returning the order extended by the whole subtree.
    pub fn init(&mut self, incoming: &AttributeOrder) -> AttributeOrder {
        let mut order = self.scan.init(incoming);
        self.attributes = self.scan.local_attributes().to_vec();
        self.never_matches = !self.scan.open_terms();
        if self.never_matches {
            self.state = State::Exhausted;
        }
        for child in self.children.iter_mut() {
            order = child.node.init(&order);
        }
        order
    }

    /// Opens the own scan without any context. Only the root is opened this
    /// way; children are positioned through [`JoinNode::seek`].
    pub fn open(&mut self) -> Result<()> {
        self.context = Binding::new();
        self.child_context = None;
        if self.never_matches {
            trace!("node can never match");
            self.state = State::Exhausted;
            return Ok(());
        }
        self.scan.open()?;
        self.state = State::Active(Phase::Find);
        Ok(())
    }

    /// Repositions the node for a new ancestor context where only attributes
    /// at or after `first_changed` in the shared order differ from the last one.
    pub fn seek(&mut self, context: &Binding, first_changed: usize) -> Result<bool> {
        if self.never_matches {
            self.state = State::Exhausted;
            return Ok(false);
        }
        self.context = context.clone();
        let found = self.scan.seek(context, first_changed)?;
        self.state = if found {
            State::Active(Phase::Find)
        } else {
            State::Exhausted
        };
        Ok(found)
    }

    /// Rewinds to the first row of the current context.
    pub fn reset(&mut self) -> bool {
        if self.never_matches {
            self.state = State::Exhausted;
            return false;
        }
        let found = self.scan.reset();
        self.state = if found {
            State::Active(Phase::Find)
        } else {
            State::Exhausted
        };
        found
    }

    /// Computes the next row unless one is already pending. Calling it
    /// repeatedly without [`JoinNode::take`] has no further effect.
    pub fn advance(&mut self) -> Result<bool> {
        loop {
            match self.state {
                State::Exhausted => return Ok(false),
                State::Ready(_) => return Ok(true),
                State::Active(Phase::Find) => self.find()?,
                State::Active(Phase::Extend) => self.extend()?,
            }
        }
    }

    /// Hands out the pending row.
    pub fn take(&mut self) -> Result<Binding> {
        match self.state {
            State::Ready(phase) => {
                self.state = State::Active(phase);
                Ok(mem::take(&mut self.extended))
            }
            state => Err(LeapjoinError::Invariant(format!(
                "row taken from a node without a pending row ({:?})",
                state
            ))),
        }
    }

    fn find(&mut self) -> Result<()> {
        let own = match self.scan.next() {
            Some(ids) => Binding::from_row(&self.attributes, ids),
            None => {
                trace!(own_rows = self.stats.own_rows, "own scan exhausted");
                self.state = State::Exhausted;
                return Ok(());
            }
        };
        self.stats.own_rows += 1;
        if !self.pre_filters_hold(&own) {
            return Ok(());
        }

        let mut child_context = own.clone();
        child_context.extend_absent(&self.context);
        let first_changed = self
            .scan
            .first_changed(self.child_context.as_ref(), &child_context);
        for child in self.children.iter_mut() {
            child.load(&child_context, first_changed, self.capacity)?;
        }
        self.child_context = Some(child_context);
        self.own = own;
        self.rebuild_extended();

        let phase = if self.children.iter().any(|c| !c.is_empty()) {
            Phase::Extend
        } else {
            Phase::Find
        };
        trace!(own = %self.own, first_changed, ?phase, "own row");
        self.state = if self.post_filters_hold() {
            State::Ready(phase)
        } else {
            State::Active(phase)
        };
        Ok(())
    }

    fn extend(&mut self) -> Result<()> {
        if !self.next_combination()? {
            trace!(own = %self.own, "combinations exhausted");
            self.state = State::Active(Phase::Find);
            return Ok(());
        }
        self.rebuild_extended();
        if self.post_filters_hold() {
            self.state = State::Ready(Phase::Extend);
        }
        Ok(())
    }

    // Mixed-radix step over the child caches. Whenever child i moves on,
    // every non-empty child below it starts over from its first row.
    fn next_combination(&mut self) -> Result<bool> {
        for i in 0..self.children.len() {
            if self.children[i].is_empty() {
                continue;
            }
            let mut moved = self.children[i].step();
            if !moved {
                moved = self.children[i].refill(self.capacity)?;
                if moved {
                    self.stats.refills += 1;
                    trace!(child = i, rows = self.children[i].entries.len(), "child cache refilled");
                }
            }
            if moved {
                for lower in self.children[..i].iter_mut() {
                    if !lower.is_empty() {
                        lower.rewind(self.capacity)?;
                    }
                }
                return Ok(true);
            }
        }
        Ok(false)
    }

    // own row first, then the current row of each child in order; a variable
    // keeps the first value it was given
    fn rebuild_extended(&mut self) {
        let mut extended = self.own.clone();
        for child in self.children.iter() {
            if let Some(row) = child.current() {
                extended.extend_absent(row);
            }
        }
        self.extended = extended;
        self.stats.combinations += 1;
    }

    fn pre_filters_hold(&mut self, own: &Binding) -> bool {
        if self.pre_filters.is_empty() {
            return true;
        }
        self.stats.pre_filter_evaluations += 1;
        let view = RowView {
            row: own,
            fallback: None,
            terms: self.dataset.terms(),
        };
        self.pre_filters.iter().all(|f| f.is_satisfied(&view))
    }

    fn post_filters_hold(&mut self) -> bool {
        if self.post_filters.is_empty() {
            return true;
        }
        self.stats.post_filter_evaluations += 1;
        let view = RowView {
            row: &self.extended,
            fallback: Some(&self.context),
            terms: self.dataset.terms(),
        };
        self.post_filters.iter().all(|f| f.is_satisfied(&view))
    }
}
