mod common;

use std::sync::Arc;

use leapjoin::LeapjoinError;
use leapjoin::binding::Binding;
use leapjoin::interface::CancelToken;
use leapjoin::pattern::{AttributeOrder, BasicPattern, BoundFirst, IndexScan, PatternScan, QuadPattern, Reorder, Slot};
use leapjoin::store::{Dataset, OBJECT, PREDICATE, SUBJECT};
use leapjoin::term::{Term, TermId, Variable};

use common::dataset;

const DATA: &str = "
<b> <p> 2 .
<a> <p> 1 .
<a> <p> 3 .
<c> <q> <a> .
<c> <q> <c> .
";

fn pattern(patterns: Vec<QuadPattern>) -> BasicPattern {
    BasicPattern::new(patterns)
}

fn scan(dataset: &Arc<Dataset>, patterns: Vec<QuadPattern>) -> IndexScan {
    IndexScan::new(Arc::clone(dataset), pattern(patterns), CancelToken::new())
}

fn rows(scan: &mut IndexScan) -> Vec<Vec<TermId>> {
    let mut rows = Vec::new();
    while let Some(row) = scan.next() {
        rows.push(row.to_vec());
    }
    rows
}

fn id(dataset: &Dataset, term: Term) -> TermId {
    dataset.lookup(&term).expect("term is interned")
}

fn names(vars: &[Variable]) -> Vec<&str> {
    vars.iter().map(|v| v.name()).collect()
}

#[test]
fn dataset_keeps_each_quad_once() {
    let mut dataset = Dataset::new();
    assert_eq!(dataset.load_str(DATA).expect("data loads"), 5);
    assert_eq!(dataset.load_str("<a> <p> 1 .\n<a> <p> 4 .").expect("data loads"), 1);
    assert_eq!(dataset.len(), 6);
    let a = dataset.lookup(&Term::iri("a")).expect("interned");
    let p = dataset.lookup(&Term::iri("p")).expect("interned");
    assert_eq!(dataset.index().find([Some(a), Some(p), None, None]).count(), 3);
    assert!(dataset.index().occurs(SUBJECT, a));
    assert!(dataset.index().occurs(OBJECT, a));
    assert!(!dataset.index().occurs(PREDICATE, a));
    assert_eq!(dataset.term(a), Some(&Term::iri("a")));
}

#[test]
fn local_attributes_put_upstream_variables_first() {
    let dataset = dataset(DATA);
    let mut scan = scan(&dataset, vec![QuadPattern::triple(Slot::var("s"), Term::iri("p"), Slot::var("o"))]);
    let incoming = AttributeOrder::empty().extend(&[Variable::new("x"), Variable::new("o")]);
    let outgoing = scan.init(&incoming);
    assert_eq!(names(scan.local_attributes()), vec!["o", "s"]);
    assert_eq!(names(outgoing.vars()), vec!["x", "o", "s"]);
    assert_eq!(scan.local_attribute(1), &Variable::new("s"));
    assert!(scan.has_variable(&Variable::new("s")));
    assert!(!scan.has_variable(&Variable::new("x")));
}

#[test]
fn open_yields_rows_sorted_by_local_attributes() {
    let dataset = dataset(DATA);
    let mut scan = scan(&dataset, vec![QuadPattern::triple(Slot::var("s"), Term::iri("p"), Slot::var("o"))]);
    scan.init(&AttributeOrder::empty());
    scan.open().expect("scan opens");
    let rows = rows(&mut scan);
    let (a, b) = (id(&dataset, Term::iri("a")), id(&dataset, Term::iri("b")));
    let subjects: Vec<TermId> = rows.iter().map(|row| row[0]).collect();
    let mut expected = vec![a, a, b];
    expected.sort();
    assert_eq!(subjects, expected);
    assert!(rows.windows(2).all(|w| w[0] < w[1]), "strictly increasing rows");
    assert!(!scan.has_next());
    assert!(scan.reset(), "rows exist for the current context");
    assert_eq!(rows.len(), 3);
}

#[test]
fn seek_follows_the_context() {
    let dataset = dataset(DATA);
    let mut scan = scan(&dataset, vec![QuadPattern::triple(Slot::var("s"), Term::iri("p"), Slot::var("o"))]);
    scan.init(&AttributeOrder::empty().extend(&[Variable::new("s")]));

    let mut context = Binding::new();
    context.insert(Variable::new("s"), id(&dataset, Term::iri("a")));
    assert!(scan.seek(&context, 0).expect("seek"));
    assert_eq!(rows(&mut scan).len(), 2);

    // nothing before position 1 changed, so the scan only rewinds
    assert!(scan.seek(&context, 1).expect("seek"));
    assert_eq!(rows(&mut scan).len(), 2);

    context.insert(Variable::new("s"), id(&dataset, Term::iri("b")));
    assert!(scan.seek(&context, 0).expect("seek"));
    assert_eq!(rows(&mut scan), vec![vec![id(&dataset, Term::iri("b")), id(&dataset, Term::integer(2))]]);

    context.insert(Variable::new("s"), id(&dataset, Term::iri("c")));
    assert!(!scan.seek(&context, 0).expect("seek"), "<c> has no <p>");
    assert!(!scan.has_next());
    assert!(!scan.reset());
}

#[test]
fn first_changed_walks_the_outgoing_order() {
    let dataset = dataset(DATA);
    let mut scan = scan(&dataset, vec![QuadPattern::triple(Slot::var("s"), Term::iri("p"), Slot::var("o"))]);
    scan.init(&AttributeOrder::empty());
    let (s, o) = (Variable::new("s"), Variable::new("o"));
    let mut old = Binding::new();
    old.insert(s.clone(), TermId::new(1));
    old.insert(o.clone(), TermId::new(2));
    let mut new = old.clone();
    assert_eq!(scan.first_changed(None, &new), 0);
    assert_eq!(scan.first_changed(Some(&old), &new), 2);
    new.insert(o, TermId::new(3));
    assert_eq!(scan.first_changed(Some(&old), &new), 1);
    new.insert(s, TermId::new(3));
    assert_eq!(scan.first_changed(Some(&old), &new), 0);
}

#[test]
fn impossible_constants_are_detected_up_front() {
    let dataset = dataset(DATA);
    let mut unknown = scan(&dataset, vec![QuadPattern::triple(Slot::var("s"), Term::iri("nope"), Slot::var("o"))]);
    unknown.init(&AttributeOrder::empty());
    assert!(!unknown.open_terms());

    // <a> is a known term but never a predicate
    let mut misplaced = scan(&dataset, vec![QuadPattern::triple(Slot::var("s"), Term::iri("a"), Slot::var("o"))]);
    misplaced.init(&AttributeOrder::empty());
    assert!(!misplaced.open_terms());

    let mut fine = scan(&dataset, vec![QuadPattern::triple(Term::iri("a"), Term::iri("p"), Slot::var("o"))]);
    fine.init(&AttributeOrder::empty());
    assert!(fine.open_terms());
}

#[test]
fn repeated_variable_must_agree() {
    let dataset = dataset(DATA);
    let mut scan = scan(&dataset, vec![QuadPattern::triple(Slot::var("x"), Term::iri("q"), Slot::var("x"))]);
    scan.init(&AttributeOrder::empty());
    scan.open().expect("scan opens");
    assert_eq!(rows(&mut scan), vec![vec![id(&dataset, Term::iri("c"))]]);
}

#[test]
fn joins_patterns_within_a_basic_pattern() {
    let dataset = dataset(DATA);
    let mut scan = scan(
        &dataset,
        vec![
            QuadPattern::triple(Slot::var("c"), Term::iri("q"), Slot::var("s")),
            QuadPattern::triple(Slot::var("s"), Term::iri("p"), Slot::var("o")),
        ],
    );
    scan.init(&AttributeOrder::empty());
    scan.open().expect("scan opens");
    assert_eq!(names(scan.local_attributes()), vec!["c", "s", "o"]);
    assert_eq!(rows(&mut scan).len(), 2, "<c> <q> <a> with both values of <a> <p>");
}

#[test]
fn must_be_initialized_first() {
    let dataset = dataset(DATA);
    let mut scan = scan(&dataset, vec![QuadPattern::triple(Slot::var("s"), Term::iri("p"), Slot::var("o"))]);
    assert!(matches!(scan.open(), Err(LeapjoinError::Scan(_))));
    assert!(matches!(scan.seek(&Binding::new(), 0), Err(LeapjoinError::Scan(_))));
}

#[test]
fn cancelled_scan_stops() {
    let dataset = dataset(DATA);
    let cancel = CancelToken::new();
    let mut scan = IndexScan::new(
        Arc::clone(&dataset),
        pattern(vec![QuadPattern::triple(Slot::var("s"), Term::iri("p"), Slot::var("o"))]),
        cancel.clone(),
    );
    scan.init(&AttributeOrder::empty());
    scan.open().expect("scan opens");
    assert!(scan.next().is_some());
    cancel.cancel();
    assert!(!scan.has_next());
    assert!(scan.next().is_none());
}

#[test]
fn bound_first_moves_selective_patterns_forward() {
    let loose = QuadPattern::triple(Slot::var("s"), Slot::var("p"), Slot::var("o"));
    let tight = QuadPattern::triple(Slot::var("s"), Term::iri("p"), Term::integer(1));
    let middle = QuadPattern::triple(Slot::var("s"), Term::iri("p"), Slot::var("o"));
    let reordered = BoundFirst.reorder(&pattern(vec![loose.clone(), middle.clone(), tight.clone()]));
    assert_eq!(reordered.patterns(), &[tight, middle, loose]);
}
