//! Parsing of the S-expression algebra syntax and of quad data.
//!
//! ```text
//! (filter (> ?x 50)
//!   (leftjoin
//!     (bgp (?s <p> ?o))
//!     (bgp (?o <q> ?x))))
//! ```
//!
//! Data is one statement per line: three or four terms and a full stop, the
//! optional fourth term naming the graph.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::algebra::Op;
use crate::error::{LeapjoinError, Result};
use crate::expr::{CmpOp, Expr};
use crate::pattern::{BasicPattern, QuadPattern, Slot};
use crate::term::{Term, Variable};

#[derive(Parser)]
#[grammar = "sse.pest"]
struct SseParser;

/// Subject, predicate, object and an optional graph.
pub type Statement = (Term, Term, Term, Option<Term>);

pub fn parse_op(text: &str) -> Result<Op> {
    let algebra = SseParser::parse(Rule::algebra, text)?
        .next()
        .ok_or_else(|| empty("algebra"))?;
    let op = algebra
        .into_inner()
        .next()
        .ok_or_else(|| empty("algebra"))?;
    build_op(op)
}

pub fn parse_statements(text: &str) -> Result<Vec<Statement>> {
    let statements = SseParser::parse(Rule::statements, text)?
        .next()
        .ok_or_else(|| empty("data"))?;
    let mut parsed = Vec::new();
    for statement in statements.into_inner() {
        if statement.as_rule() != Rule::statement {
            continue;
        }
        let span = statement.clone();
        let mut terms = statement
            .into_inner()
            .map(build_term)
            .collect::<Result<Vec<Term>>>()?
            .into_iter();
        match (terms.next(), terms.next(), terms.next()) {
            (Some(s), Some(p), Some(o)) => parsed.push((s, p, o, terms.next())),
            _ => return Err(malformed(&span, "a statement needs at least three terms")),
        }
    }
    Ok(parsed)
}

fn empty(what: &str) -> LeapjoinError {
    LeapjoinError::Parse {
        message: format!("no {} found", what),
        line: None,
        col: None,
    }
}

fn malformed(pair: &Pair<Rule>, message: impl Into<String>) -> LeapjoinError {
    let (line, col) = pair.as_span().start_pos().line_col();
    LeapjoinError::Parse {
        message: message.into(),
        line: Some(line),
        col: Some(col),
    }
}

// ------------- Operators -------------
fn build_op(pair: Pair<Rule>) -> Result<Op> {
    let outer = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed(&outer, "missing operator"))?;
    let rule = inner.as_rule();
    let mut parts = inner.clone().into_inner();
    let op = match rule {
        Rule::bgp => Op::Bgp(build_triples(parts)?),
        Rule::quadpattern => {
            let graph = build_slot(parts.next().ok_or_else(|| malformed(&inner, "missing graph"))?)?;
            Op::QuadPattern {
                graph,
                pattern: build_triples(parts)?,
            }
        }
        Rule::leftjoin => {
            let left = build_op(parts.next().ok_or_else(|| malformed(&inner, "missing left operand"))?)?;
            let right = build_op(parts.next().ok_or_else(|| malformed(&inner, "missing right operand"))?)?;
            let exprs = match parts.next() {
                Some(exprs) => build_exprs(exprs)?,
                None => Vec::new(),
            };
            Op::left_join(left, right, exprs)
        }
        Rule::conditional => {
            let left = build_op(parts.next().ok_or_else(|| malformed(&inner, "missing left operand"))?)?;
            let right = build_op(parts.next().ok_or_else(|| malformed(&inner, "missing right operand"))?)?;
            Op::conditional(left, right)
        }
        Rule::filter => {
            let condition = parts.next().ok_or_else(|| malformed(&inner, "missing condition"))?;
            let exprs = match condition.as_rule() {
                Rule::exprs => build_exprs(condition)?,
                _ => vec![build_expr(condition)?],
            };
            let sub = build_op(parts.next().ok_or_else(|| malformed(&inner, "missing operand"))?)?;
            Op::filter(exprs, sub)
        }
        Rule::join | Rule::union => {
            let left = build_op(parts.next().ok_or_else(|| malformed(&inner, "missing left operand"))?)?;
            let right = build_op(parts.next().ok_or_else(|| malformed(&inner, "missing right operand"))?)?;
            if rule == Rule::join {
                Op::Join(Box::new(left), Box::new(right))
            } else {
                Op::Union(Box::new(left), Box::new(right))
            }
        }
        Rule::sequence => Op::Sequence(parts.map(build_op).collect::<Result<Vec<Op>>>()?),
        Rule::project => {
            let mut vars = Vec::new();
            let mut sub = None;
            for part in parts {
                match part.as_rule() {
                    Rule::var => vars.push(Variable::new(part.as_str())),
                    _ => sub = Some(build_op(part)?),
                }
            }
            let sub = sub.ok_or_else(|| malformed(&inner, "missing operand"))?;
            Op::Project {
                vars,
                sub: Box::new(sub),
            }
        }
        Rule::distinct => {
            let sub = build_op(parts.next().ok_or_else(|| malformed(&inner, "missing operand"))?)?;
            Op::Distinct(Box::new(sub))
        }
        other => return Err(malformed(&inner, format!("unexpected {:?}", other))),
    };
    Ok(op)
}

fn build_triples(parts: pest::iterators::Pairs<Rule>) -> Result<BasicPattern> {
    let mut pattern = BasicPattern::default();
    for triple in parts {
        let span = triple.clone();
        let slots = triple.into_inner().map(build_slot).collect::<Result<Vec<Slot>>>()?;
        match <[Slot; 3]>::try_from(slots) {
            Ok([s, p, o]) => pattern.push(QuadPattern::triple(s, p, o)),
            Err(_) => return Err(malformed(&span, "a pattern needs exactly three slots")),
        }
    }
    Ok(pattern)
}

fn build_slot(pair: Pair<Rule>) -> Result<Slot> {
    let outer = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed(&outer, "empty slot"))?;
    match inner.as_rule() {
        Rule::var => Ok(Slot::Var(Variable::new(inner.as_str()))),
        _ => Ok(Slot::Term(build_term(inner)?)),
    }
}

// ------------- Terms -------------
fn build_term(pair: Pair<Rule>) -> Result<Term> {
    let pair = match pair.as_rule() {
        Rule::term => {
            let outer = pair.clone();
            pair.into_inner()
                .next()
                .ok_or_else(|| malformed(&outer, "empty term"))?
        }
        _ => pair,
    };
    let text = pair.as_str();
    match pair.as_rule() {
        Rule::iri => Ok(Term::iri(&text[1..text.len() - 1])),
        Rule::blank => Ok(Term::blank(&text[2..])),
        Rule::string => Ok(Term::string(&text[1..text.len() - 1])),
        Rule::date => Term::date(&text[1..text.len() - 1])
            .ok_or_else(|| malformed(&pair, format!("invalid date {}", text))),
        Rule::decimal => Term::decimal(text)
            .ok_or_else(|| malformed(&pair, format!("invalid decimal {}", text))),
        Rule::integer => text
            .parse::<i64>()
            .map(Term::integer)
            .map_err(|e| malformed(&pair, format!("invalid integer {}: {}", text, e))),
        other => Err(malformed(&pair, format!("expected a term, found {:?}", other))),
    }
}

// ------------- Expressions -------------
fn build_exprs(pair: Pair<Rule>) -> Result<Vec<Expr>> {
    pair.into_inner().map(build_expr).collect()
}

fn build_expr(pair: Pair<Rule>) -> Result<Expr> {
    let outer = pair.clone();
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(|| malformed(&outer, "empty expression"))?;
    match inner.as_rule() {
        Rule::call => build_call(inner),
        _ => match build_slot(inner)? {
            Slot::Var(v) => Ok(Expr::Var(v)),
            Slot::Term(t) => Ok(Expr::Const(t)),
        },
    }
}

fn build_call(pair: Pair<Rule>) -> Result<Expr> {
    let mut parts = pair.clone().into_inner();
    let function = parts
        .next()
        .ok_or_else(|| malformed(&pair, "missing function"))?
        .as_str();
    let mut args = parts.map(build_expr).collect::<Result<Vec<Expr>>>()?;
    let arity = |n: usize| -> Result<()> {
        if args.len() == n {
            Ok(())
        } else {
            Err(malformed(
                &pair,
                format!("{} takes {} argument(s), found {}", function, n, args.len()),
            ))
        }
    };
    let cmp = match function {
        "=" => Some(CmpOp::Eq),
        "!=" => Some(CmpOp::Ne),
        "<" => Some(CmpOp::Lt),
        "<=" => Some(CmpOp::Le),
        ">" => Some(CmpOp::Gt),
        ">=" => Some(CmpOp::Ge),
        _ => None,
    };
    if let Some(op) = cmp {
        arity(2)?;
        let right = args.pop();
        let left = args.pop();
        return match (left, right) {
            (Some(left), Some(right)) => Ok(Expr::cmp(op, left, right)),
            _ => Err(malformed(&pair, "comparison needs two operands")),
        };
    }
    match function {
        "bound" => {
            arity(1)?;
            match args.pop() {
                Some(Expr::Var(v)) => Ok(Expr::Bound(v)),
                _ => Err(malformed(&pair, "bound takes a variable")),
            }
        }
        "!" => {
            arity(1)?;
            args.pop()
                .map(Expr::not)
                .ok_or_else(|| malformed(&pair, "! takes one operand"))
        }
        "regex" => {
            arity(2)?;
            let pattern = args.pop();
            let arg = args.pop();
            match (arg, pattern) {
                (Some(arg), Some(Expr::Const(Term::Str(pattern)))) => Expr::regex(arg, &pattern)
                    .map_err(|e| malformed(&pair, format!("invalid regex: {}", e))),
                _ => Err(malformed(&pair, "regex takes an operand and a string pattern")),
            }
        }
        "&&" | "||" => {
            if args.len() < 2 {
                return Err(malformed(&pair, format!("{} takes at least two operands", function)));
            }
            let mut args = args.into_iter();
            let first = args
                .next()
                .ok_or_else(|| malformed(&pair, "missing operand"))?;
            Ok(args.fold(first, |acc, next| {
                if function == "&&" {
                    Expr::and(acc, next)
                } else {
                    Expr::or(acc, next)
                }
            }))
        }
        other => Err(malformed(&pair, format!("unknown function {}", other))),
    }
}
