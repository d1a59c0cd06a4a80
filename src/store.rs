//! In-memory quad dataset.
//!
//! Terms are interned into a [`TermTable`] and every quad is kept in four
//! orderings so that any combination of bound slots can be answered with a
//! single range scan over the ordering whose leading slots are bound.

use std::collections::BTreeSet;
use std::ops::Bound::Included;

// used for per-slot term membership
use roaring::RoaringTreemap;
use tracing::debug;

use crate::error::Result;
use crate::sse;
use crate::term::{Term, TermId, TermTable};

pub const SUBJECT: usize = 0;
pub const PREDICATE: usize = 1;
pub const OBJECT: usize = 2;
pub const GRAPH: usize = 3;

pub type Quad = [TermId; 4];

// ------------- Ordering -------------
// An ordering is a permutation of quad slots; keys are stored permuted.
#[derive(Debug)]
struct Ordering {
    slots: [usize; 4],
    keys: BTreeSet<Quad>,
}
impl Ordering {
    fn new(slots: [usize; 4]) -> Self {
        Self {
            slots,
            keys: BTreeSet::new(),
        }
    }
    fn permute(&self, quad: &Quad) -> Quad {
        [
            quad[self.slots[0]],
            quad[self.slots[1]],
            quad[self.slots[2]],
            quad[self.slots[3]],
        ]
    }
    fn restore(&self, key: &Quad) -> Quad {
        let mut quad = [TermId::MIN; 4];
        for (position, slot) in self.slots.iter().enumerate() {
            quad[*slot] = key[position];
        }
        quad
    }
    // number of leading slots of this ordering that are bound
    fn prefix_len(&self, bound: &[Option<TermId>; 4]) -> usize {
        self.slots.iter().take_while(|slot| bound[**slot].is_some()).count()
    }
}

// ------------- QuadIndex -------------
#[derive(Debug)]
pub struct QuadIndex {
    orderings: Vec<Ordering>,
    // which term ids occur at all in each slot
    occurs: [RoaringTreemap; 4],
}
impl QuadIndex {
    pub fn new() -> Self {
        Self {
            orderings: vec![
                Ordering::new([SUBJECT, PREDICATE, OBJECT, GRAPH]),
                Ordering::new([PREDICATE, OBJECT, SUBJECT, GRAPH]),
                Ordering::new([OBJECT, SUBJECT, PREDICATE, GRAPH]),
                Ordering::new([GRAPH, SUBJECT, PREDICATE, OBJECT]),
            ],
            occurs: [
                RoaringTreemap::new(),
                RoaringTreemap::new(),
                RoaringTreemap::new(),
                RoaringTreemap::new(),
            ],
        }
    }
    pub fn insert(&mut self, quad: Quad) -> bool {
        let mut added = false;
        for ordering in self.orderings.iter_mut() {
            let key = ordering.permute(&quad);
            added |= ordering.keys.insert(key);
        }
        for (slot, id) in quad.iter().enumerate() {
            self.occurs[slot].insert(id.value());
        }
        added
    }
    pub fn occurs(&self, slot: usize, id: TermId) -> bool {
        self.occurs[slot].contains(id.value())
    }
    /// All quads agreeing with the bound slots.
    pub fn find(&self, bound: [Option<TermId>; 4]) -> impl Iterator<Item = Quad> + '_ {
        let mut ordering = &self.orderings[0];
        for candidate in self.orderings[1..].iter() {
            if candidate.prefix_len(&bound) > ordering.prefix_len(&bound) {
                ordering = candidate;
            }
        }
        let prefix = ordering.prefix_len(&bound);
        let mut low = [TermId::MIN; 4];
        let mut high = [TermId::MAX; 4];
        for position in 0..prefix {
            // bound by construction of the prefix
            if let Some(id) = bound[ordering.slots[position]] {
                low[position] = id;
                high[position] = id;
            }
        }
        ordering
            .keys
            .range((Included(low), Included(high)))
            .map(move |key| ordering.restore(key))
            .filter(move |quad| {
                bound
                    .iter()
                    .zip(quad.iter())
                    .all(|(b, id)| b.is_none_or(|b| b == *id))
            })
    }
    pub fn len(&self) -> usize {
        self.orderings[0].keys.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
impl Default for QuadIndex {
    fn default() -> Self {
        Self::new()
    }
}

// ------------- Dataset -------------
// Mutable while loading, shared read-only (behind an Arc) while querying.
#[derive(Debug, Default)]
pub struct Dataset {
    terms: TermTable,
    index: QuadIndex,
}
impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add(&mut self, s: Term, p: Term, o: Term, g: Term) -> bool {
        let quad = [
            self.terms.intern(s),
            self.terms.intern(p),
            self.terms.intern(o),
            self.terms.intern(g),
        ];
        self.index.insert(quad)
    }
    pub fn add_triple(&mut self, s: Term, p: Term, o: Term) -> bool {
        let quad = [
            self.terms.intern(s),
            self.terms.intern(p),
            self.terms.intern(o),
            self.terms.default_graph(),
        ];
        self.index.insert(quad)
    }
    /// Loads statements in the text syntax, returning how many were new.
    pub fn load_str(&mut self, text: &str) -> Result<usize> {
        let statements = sse::parse_statements(text)?;
        let total = statements.len();
        let mut added = 0;
        for (s, p, o, g) in statements {
            let new = match g {
                Some(g) => self.add(s, p, o, g),
                None => self.add_triple(s, p, o),
            };
            if new {
                added += 1;
            }
        }
        debug!(statements = total, added, quads = self.index.len(), "dataset loaded");
        Ok(added)
    }
    pub fn terms(&self) -> &TermTable {
        &self.terms
    }
    pub fn index(&self) -> &QuadIndex {
        &self.index
    }
    pub fn lookup(&self, term: &Term) -> Option<TermId> {
        self.terms.id(term)
    }
    pub fn term(&self, id: TermId) -> Option<&Term> {
        self.terms.term(id)
    }
    pub fn len(&self) -> usize {
        self.index.len()
    }
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
