mod common;

use std::sync::Arc;

use leapjoin::LeapjoinError;
use leapjoin::builder::JoinTreeBuilder;
use leapjoin::config::ReorderStrategy;
use leapjoin::interface::CancelToken;
use leapjoin::pattern::AttributeOrder;
use leapjoin::sse;
use leapjoin::term::Variable;

use common::dataset;

fn builder() -> JoinTreeBuilder {
    let dataset = dataset("<s> <p> 1 .\n<s> <q> 2 .\n<s> <r> 3 .");
    JoinTreeBuilder::new(
        Arc::clone(&dataset),
        ReorderStrategy::BoundFirst.transformation(),
        10,
        CancelToken::new(),
    )
}

#[test]
fn unsupported_operators_are_named() {
    let builder = builder();
    let cases = [
        ("(union (bgp (?s <p> ?o)) (bgp (?s <q> ?o)))", "union"),
        ("(join (bgp (?s <p> ?o)) (bgp (?s <q> ?x)))", "join"),
        ("(sequence (bgp (?s <p> ?o)) (bgp (?s <q> ?x)))", "sequence"),
        ("(project (?s) (bgp (?s <p> ?o)))", "project"),
        ("(distinct (bgp (?s <p> ?o)))", "distinct"),
        // also when buried inside a supported operator
        ("(leftjoin (bgp (?s <p> ?o)) (distinct (bgp (?s <q> ?x))))", "distinct"),
        ("(filter (bound ?o) (union (bgp (?s <p> ?o)) (bgp (?s <q> ?o))))", "union"),
    ];
    for (algebra, name) in cases {
        let op = sse::parse_op(algebra).expect("algebra parses");
        match builder.build(&op) {
            Err(LeapjoinError::Unsupported { operator }) => assert_eq!(operator, name, "{}", algebra),
            Err(e) => panic!("unexpected error for {}: {}", algebra, e),
            Ok(_) => panic!("{} should not build", algebra),
        }
    }
}

#[test]
fn optional_branches_accumulate_on_the_left_root() {
    let builder = builder();
    let op = sse::parse_op(
        "(leftjoin
           (leftjoin (bgp (?s <p> ?o)) (bgp (?s <q> ?x)))
           (conditional (bgp (?s <r> ?y)) (bgp (?y <p> ?z))))",
    )
    .expect("algebra parses");
    let mut root = builder.build(&op).expect("tree builds");
    let children: Vec<_> = root.children().collect();
    assert_eq!(children.len(), 2, "both optional branches hang off the root");
    assert_eq!(children[0].node().children().count(), 0);
    assert_eq!(children[1].node().children().count(), 1, "nested optional stays nested");

    let order = root.init(&AttributeOrder::empty());
    let names: Vec<&str> = order.vars().iter().map(|v| v.name()).collect();
    assert_eq!(names, vec!["s", "o", "x", "y", "z"], "order grows top-down, left to right");
}

#[test]
fn left_join_expressions_go_to_the_optional_node() {
    let builder = builder();
    let op = sse::parse_op(
        "(leftjoin (bgp (?s <p> ?o)) (bgp (?s <q> ?x)) (exprs (> ?x 1) (> ?x ?o)))",
    )
    .expect("algebra parses");
    let root = builder.build(&op).expect("tree builds");
    assert!(root.pre_filters().is_empty());
    assert!(root.post_filters().is_empty());
    let child = root.children().next().expect("one child");
    assert_eq!(child.node().pre_filters().len(), 1, "?x is bound by the optional pattern");
    assert_eq!(child.node().post_filters().len(), 1, "?o comes from the parent");
}

#[test]
fn filter_attaches_to_the_node_it_wraps() {
    let builder = builder();
    let op = sse::parse_op("(filter (exprs (= ?o 1) (bound ?x)) (leftjoin (bgp (?s <p> ?o)) (bgp (?s <q> ?x))))")
        .expect("algebra parses");
    let root = builder.build(&op).expect("tree builds");
    assert_eq!(root.pre_filters().len(), 1);
    assert_eq!(root.post_filters().len(), 1);
    assert!(root.post_filters()[0].vars().contains(&Variable::new("x")));
}

#[test]
fn quad_pattern_graph_is_applied_to_every_pattern() {
    let builder = builder();
    let op = sse::parse_op("(quadpattern ?g (?s <p> ?o) (?s <q> ?x))").expect("algebra parses");
    let mut root = builder.build(&op).expect("tree builds");
    root.init(&AttributeOrder::empty());
    assert!(root.attributes().contains(&Variable::new("g")));
}
