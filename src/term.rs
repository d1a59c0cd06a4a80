// used to keep the one-to-one mapping between terms and their assigned identities
use bimap::BiMap;

use core::hash::BuildHasherDefault;
use seahash::SeaHasher;

// decimals of arbitrary size and plain dates as literal values
use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use serde::{Serialize, Serializer};
use std::fmt;
use std::ops;
use std::str::FromStr;
use std::sync::Arc;

lazy_static::lazy_static! {
    /// The graph that triples (as opposed to quads) live in.
    pub static ref DEFAULT_GRAPH: Term = Term::Iri(String::from("urn:x-arq:DefaultGraph"));
}

pub type VarHasher = BuildHasherDefault<SeaHasher>;

// ------------- TermId -------------
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct TermId(u64);

impl TermId {
    pub const MIN: TermId = TermId(u64::MIN);
    pub const MAX: TermId = TermId(u64::MAX);

    pub fn new(id: u64) -> Self {
        Self(id)
    }
    pub fn value(&self) -> u64 {
        self.0
    }
}
impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ------------- Variable -------------
// Variables are compared by name only, never by where they appear.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Variable(Arc<str>);

impl Variable {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name.trim_start_matches('?')))
    }
    pub fn name(&self) -> &str {
        &self.0
    }
}
impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}
impl From<&str> for Variable {
    fn from(name: &str) -> Self {
        Variable::new(name)
    }
}
impl Serialize for Variable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// ------------- Decimal -------------
#[derive(Eq, PartialEq, Hash, PartialOrd, Ord, Clone, Debug)]
pub struct Decimal(BigDecimal);

impl Decimal {
    pub fn from_str(s: &str) -> Option<Decimal> {
        BigDecimal::from_str(s).ok().map(Decimal)
    }
}
impl From<i64> for Decimal {
    fn from(i: i64) -> Self {
        Decimal(BigDecimal::from(i))
    }
}
impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl ops::Deref for Decimal {
    type Target = BigDecimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ------------- Term -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Term {
    Iri(String),
    Blank(String),
    Str(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
}

impl Term {
    pub fn iri(iri: &str) -> Self {
        Term::Iri(iri.to_string())
    }
    pub fn blank(label: &str) -> Self {
        Term::Blank(label.to_string())
    }
    pub fn string(s: &str) -> Self {
        Term::Str(s.to_string())
    }
    pub fn integer(i: i64) -> Self {
        Term::Integer(i)
    }
    pub fn decimal(s: &str) -> Option<Self> {
        Decimal::from_str(s).map(Term::Decimal)
    }
    pub fn date(s: &str) -> Option<Self> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(Term::Date)
    }
    pub fn is_literal(&self) -> bool {
        !matches!(self, Term::Iri(_) | Term::Blank(_))
    }
    pub fn is_numeric(&self) -> bool {
        matches!(self, Term::Integer(_) | Term::Decimal(_))
    }
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Term::Integer(i) => Some(Decimal::from(*i)),
            Term::Decimal(d) => Some(d.clone()),
            _ => None,
        }
    }
}
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Blank(label) => write!(f, "_:{}", label),
            Term::Str(s) => write!(f, "\"{}\"", s),
            Term::Integer(i) => write!(f, "{}", i),
            Term::Decimal(d) => write!(f, "{}", d),
            Term::Date(d) => write!(f, "'{}'", d),
        }
    }
}
impl Serialize for Term {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

// ------------- TermTable -------------
// Interns terms into dense ids. The default graph always gets the first id.
#[derive(Debug)]
pub struct TermTable {
    kept: BiMap<Term, TermId>,
}
impl TermTable {
    pub fn new() -> Self {
        let mut table = Self { kept: BiMap::new() };
        table.intern(DEFAULT_GRAPH.clone());
        table
    }
    pub fn intern(&mut self, term: Term) -> TermId {
        if let Some(id) = self.kept.get_by_left(&term) {
            return *id;
        }
        let id = TermId(self.kept.len() as u64);
        self.kept.insert(term, id);
        id
    }
    pub fn id(&self, term: &Term) -> Option<TermId> {
        self.kept.get_by_left(term).copied()
    }
    pub fn term(&self, id: TermId) -> Option<&Term> {
        self.kept.get_by_right(&id)
    }
    pub fn default_graph(&self) -> TermId {
        TermId(0)
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
}
impl Default for TermTable {
    fn default() -> Self {
        Self::new()
    }
}
