//! Boolean filter expressions.
//!
//! Only as much of an expression language as the join tree needs: variables,
//! constants, `bound`, the logical connectives, comparisons and `regex`.
//! Evaluation follows SPARQL in that any error (an unbound variable, a type
//! mismatch) makes the filter unsatisfied rather than failing the query.

use std::cmp::Ordering;
use std::fmt;

use bigdecimal::Zero;
use regex::Regex;
use thiserror::Error;

use crate::term::{Term, Variable};

/// Anything that can hand out the term bound to a variable.
pub trait Resolve {
    fn resolve(&self, var: &Variable) -> Option<&Term>;
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}
impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
    fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
    fn is_ordering(&self) -> bool {
        !matches!(self, CmpOp::Eq | CmpOp::Ne)
    }
}

#[derive(Clone, Debug)]
pub enum Expr {
    Var(Variable),
    Const(Term),
    Bound(Variable),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    Regex(Box<Expr>, Regex),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EvalError {
    #[error("unbound variable {0}")]
    Unbound(Variable),
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}

#[derive(Clone, Debug, PartialEq)]
enum Value {
    Term(Term),
    Bool(bool),
}

impl Expr {
    pub fn var(name: &str) -> Self {
        Expr::Var(Variable::new(name))
    }
    pub fn constant(term: Term) -> Self {
        Expr::Const(term)
    }
    pub fn cmp(op: CmpOp, left: Expr, right: Expr) -> Self {
        Expr::Cmp(op, Box::new(left), Box::new(right))
    }
    pub fn and(left: Expr, right: Expr) -> Self {
        Expr::And(Box::new(left), Box::new(right))
    }
    pub fn or(left: Expr, right: Expr) -> Self {
        Expr::Or(Box::new(left), Box::new(right))
    }
    pub fn not(inner: Expr) -> Self {
        Expr::Not(Box::new(inner))
    }
    pub fn regex(arg: Expr, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Expr::Regex(Box::new(arg), Regex::new(pattern)?))
    }

    /// Every variable mentioned anywhere in the expression, without duplicates.
    pub fn vars(&self) -> Vec<Variable> {
        let mut vars = Vec::new();
        self.collect_vars(&mut vars);
        vars
    }
    fn collect_vars(&self, vars: &mut Vec<Variable>) {
        match self {
            Expr::Var(v) | Expr::Bound(v) => {
                if !vars.contains(v) {
                    vars.push(v.clone());
                }
            }
            Expr::Const(_) => (),
            Expr::Not(inner) | Expr::Regex(inner, _) => inner.collect_vars(vars),
            Expr::And(l, r) | Expr::Or(l, r) | Expr::Cmp(_, l, r) => {
                l.collect_vars(vars);
                r.collect_vars(vars);
            }
        }
    }

    pub fn is_satisfied(&self, row: &dyn Resolve) -> bool {
        matches!(self.truth(row), Ok(true))
    }

    fn truth(&self, row: &dyn Resolve) -> Result<bool, EvalError> {
        match self {
            Expr::And(l, r) => match (l.truth(row), r.truth(row)) {
                (Ok(false), _) | (_, Ok(false)) => Ok(false),
                (Ok(true), Ok(true)) => Ok(true),
                (Err(e), _) | (_, Err(e)) => Err(e),
            },
            Expr::Or(l, r) => match (l.truth(row), r.truth(row)) {
                (Ok(true), _) | (_, Ok(true)) => Ok(true),
                (Ok(false), Ok(false)) => Ok(false),
                (Err(e), _) | (_, Err(e)) => Err(e),
            },
            _ => effective_boolean(&self.eval(row)?),
        }
    }

    fn eval(&self, row: &dyn Resolve) -> Result<Value, EvalError> {
        match self {
            Expr::Var(v) => row
                .resolve(v)
                .map(|t| Value::Term(t.clone()))
                .ok_or_else(|| EvalError::Unbound(v.clone())),
            Expr::Const(t) => Ok(Value::Term(t.clone())),
            Expr::Bound(v) => Ok(Value::Bool(row.resolve(v).is_some())),
            Expr::Not(inner) => Ok(Value::Bool(!inner.truth(row)?)),
            Expr::And(..) | Expr::Or(..) => Ok(Value::Bool(self.truth(row)?)),
            Expr::Cmp(op, l, r) => compare(*op, &l.eval(row)?, &r.eval(row)?).map(Value::Bool),
            Expr::Regex(arg, re) => match arg.eval(row)? {
                Value::Term(Term::Str(s)) => Ok(Value::Bool(re.is_match(&s))),
                other => Err(EvalError::TypeMismatch(format!("regex over {:?}", other))),
            },
        }
    }
}

fn effective_boolean(value: &Value) -> Result<bool, EvalError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Term(Term::Str(s)) => Ok(!s.is_empty()),
        Value::Term(t) if t.is_numeric() => Ok(t.as_decimal().is_some_and(|d| !d.is_zero())),
        Value::Term(t) => Err(EvalError::TypeMismatch(format!("no boolean value for {}", t))),
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let ordering = match (left, right) {
        (Value::Bool(a), Value::Bool(b)) if !op.is_ordering() => a.cmp(b),
        (Value::Term(a), Value::Term(b)) if a.is_numeric() && b.is_numeric() => {
            a.as_decimal().cmp(&b.as_decimal())
        }
        (Value::Term(Term::Str(a)), Value::Term(Term::Str(b))) => a.cmp(b),
        (Value::Term(Term::Date(a)), Value::Term(Term::Date(b))) => a.cmp(b),
        (Value::Term(a), Value::Term(b)) if !op.is_ordering() => {
            if a == b { Ordering::Equal } else { Ordering::Less }
        }
        (a, b) => {
            return Err(EvalError::TypeMismatch(format!(
                "{:?} {} {:?}",
                a,
                op.symbol(),
                b
            )));
        }
    };
    Ok(op.holds(ordering))
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expr::Var(v) => write!(f, "{}", v),
            Expr::Const(t) => write!(f, "{}", t),
            Expr::Bound(v) => write!(f, "(bound {})", v),
            Expr::Not(inner) => write!(f, "(! {})", inner),
            Expr::And(l, r) => write!(f, "(&& {} {})", l, r),
            Expr::Or(l, r) => write!(f, "(|| {} {})", l, r),
            Expr::Cmp(op, l, r) => write!(f, "({} {} {})", op.symbol(), l, r),
            Expr::Regex(arg, re) => write!(f, "(regex {} \"{}\")", arg, re.as_str()),
        }
    }
}
