//! Pattern-tree algebra.
//!
//! Only the first five operators can be turned into a join tree. The rest are
//! recognised so that a query using them fails with a clear error naming the
//! operator instead of a parse error.

use std::fmt;

use crate::expr::Expr;
use crate::pattern::{BasicPattern, Slot};
use crate::term::Variable;

#[derive(Clone, Debug)]
pub enum Op {
    Bgp(BasicPattern),
    QuadPattern {
        graph: Slot,
        pattern: BasicPattern,
    },
    LeftJoin {
        left: Box<Op>,
        right: Box<Op>,
        exprs: Vec<Expr>,
    },
    Conditional {
        left: Box<Op>,
        right: Box<Op>,
    },
    Filter {
        exprs: Vec<Expr>,
        sub: Box<Op>,
    },
    Join(Box<Op>, Box<Op>),
    Union(Box<Op>, Box<Op>),
    Sequence(Vec<Op>),
    Project {
        vars: Vec<Variable>,
        sub: Box<Op>,
    },
    Distinct(Box<Op>),
}

impl Op {
    pub fn bgp(pattern: BasicPattern) -> Self {
        Op::Bgp(pattern)
    }
    pub fn left_join(left: Op, right: Op, exprs: Vec<Expr>) -> Self {
        Op::LeftJoin {
            left: Box::new(left),
            right: Box::new(right),
            exprs,
        }
    }
    pub fn conditional(left: Op, right: Op) -> Self {
        Op::Conditional {
            left: Box::new(left),
            right: Box::new(right),
        }
    }
    pub fn filter(exprs: Vec<Expr>, sub: Op) -> Self {
        Op::Filter {
            exprs,
            sub: Box::new(sub),
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            Op::Bgp(_) => "bgp",
            Op::QuadPattern { .. } => "quadpattern",
            Op::LeftJoin { .. } => "leftjoin",
            Op::Conditional { .. } => "conditional",
            Op::Filter { .. } => "filter",
            Op::Join(..) => "join",
            Op::Union(..) => "union",
            Op::Sequence(_) => "sequence",
            Op::Project { .. } => "project",
            Op::Distinct(_) => "distinct",
        }
    }
}

fn exprs_to_string(exprs: &[Expr]) -> String {
    let exprs: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
    format!("(exprs {})", exprs.join(" "))
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Op::Bgp(pattern) => write!(f, "(bgp {})", pattern),
            Op::QuadPattern { graph, pattern } => write!(f, "(quadpattern {} {})", graph, pattern),
            Op::LeftJoin { left, right, exprs } if exprs.is_empty() => {
                write!(f, "(leftjoin {} {})", left, right)
            }
            Op::LeftJoin { left, right, exprs } => {
                write!(f, "(leftjoin {} {} {})", left, right, exprs_to_string(exprs))
            }
            Op::Conditional { left, right } => write!(f, "(conditional {} {})", left, right),
            Op::Filter { exprs, sub } => write!(f, "(filter {} {})", exprs_to_string(exprs), sub),
            Op::Join(left, right) => write!(f, "(join {} {})", left, right),
            Op::Union(left, right) => write!(f, "(union {} {})", left, right),
            Op::Sequence(ops) => {
                let ops: Vec<String> = ops.iter().map(|op| op.to_string()).collect();
                write!(f, "(sequence {})", ops.join(" "))
            }
            Op::Project { vars, sub } => {
                let vars: Vec<String> = vars.iter().map(|v| v.to_string()).collect();
                write!(f, "(project ({}) {})", vars.join(" "), sub)
            }
            Op::Distinct(sub) => write!(f, "(distinct {})", sub),
        }
    }
}
