//! Leapjoin – a join-tree executor for optional graph patterns.
//!
//! A query is a tree of *required* patterns with *optional* branches hanging
//! off them, as produced by SPARQL `OPTIONAL`:
//! * A [`pattern::BasicPattern`] is a list of quad patterns whose slots are
//!   terms or variables.
//! * A [`join::JoinNode`] evaluates one basic pattern through a
//!   [`pattern::PatternScan`] and owns the nodes of its optional branches.
//! * For every row of its own pattern a node seeks each child to the new
//!   context, buffers a bounded window of the child's rows and enumerates the
//!   cross product of those windows, reusing them instead of re-deriving a
//!   child subtree for every combination.
//! * Filters are split into *pre*-filters, checked before any child is
//!   touched, and *post*-filters, checked once per combination.
//!
//! All nodes of a tree agree on one [`pattern::AttributeOrder`], so a parent
//! can tell a child how much of its context actually changed (a leapfrog seek)
//! and the child can skip re-deriving rows it already has.
//!
//! ## Modules
//! * [`term`] – Terms, their interned ids and variables.
//! * [`store`] – The in-memory quad [`store::Dataset`] with its ordered index.
//! * [`pattern`] – Patterns, the scan contract and the index-backed scan.
//! * [`join`] – The join node state machine and child result cache.
//! * [`algebra`], [`sse`] – The pattern-tree algebra and its text syntax.
//! * [`builder`] – Algebra to join tree, with filter placement.
//! * [`exec`] – Runs a tree and materializes rows; [`interface`] runs queries
//!   on worker threads with cancellation.
//! * [`config`] – [`config::Settings`] read from file and environment.
//!
//! ## Quick Start
//! ```
//! use std::sync::Arc;
//! use leapjoin::{config::Settings, exec::{ExecutionContext, OpExecutor}, sse, store::Dataset};
//!
//! let mut dataset = Dataset::new();
//! dataset.load_str("<a> <p> <b> .\n<c> <p> <d> .\n<b> <q> \"x\" .").unwrap();
//! let op = sse::parse_op("(leftjoin (bgp (?s <p> ?o)) (bgp (?o <q> ?x)))").unwrap();
//! let context = ExecutionContext::new(Arc::new(dataset), Settings::default());
//! let rows = OpExecutor::new(context)
//!     .execute(&op)
//!     .unwrap()
//!     .collect::<leapjoin::Result<Vec<_>>>()
//!     .unwrap();
//! assert_eq!(rows.len(), 2);
//! assert_eq!(rows.iter().filter(|row| row.contains("x")).count(), 1);
//! ```
//!
//! ## Status
//! Only basic patterns, quad patterns, left joins, conditionals and filters
//! can be executed. Other operators parse but are refused when the tree is
//! built.

pub mod algebra;
pub mod binding;
pub mod builder;
pub mod config;
pub mod error;
pub mod exec;
pub mod expr;
pub mod interface;
pub mod join;
pub mod pattern;
pub mod sse;
pub mod store;
pub mod term;

pub use error::{LeapjoinError, Result};
