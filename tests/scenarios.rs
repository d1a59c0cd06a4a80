mod common;

use common::{dataset, rendered, run, run_with, settings, sorted};

const DATA: &str = "
<s1> <p> 10 .
<s2> <p> 20 .
20 <q> 99 .
";

#[test]
fn required_pattern_only() {
    let dataset = dataset(DATA);
    let rows = run(&dataset, "(bgp (?s <p> ?o))");
    assert_eq!(
        rendered(&rows),
        vec!["{?o=10, ?s=<s1>}", "{?o=20, ?s=<s2>}"],
        "both rows in scan order"
    );
}

#[test]
fn optional_child_with_and_without_match() {
    let dataset = dataset(DATA);
    let rows = run(&dataset, "(leftjoin (bgp (?s <p> ?o)) (bgp (?o <q> ?x)))");
    assert_eq!(
        rendered(&rows),
        vec!["{?o=10, ?s=<s1>}", "{?o=20, ?s=<s2>, ?x=99}"]
    );
    assert!(!rows[0].contains("x"), "unmatched optional leaves ?x unbound");
}

#[test]
fn post_filter_drops_rows_with_unbound_variable() {
    let dataset = dataset(DATA);
    let rows = run(
        &dataset,
        "(filter (> ?x 50) (leftjoin (bgp (?s <p> ?o)) (bgp (?o <q> ?x))))",
    );
    assert_eq!(rendered(&rows), vec!["{?o=20, ?s=<s2>, ?x=99}"]);
}

#[test]
fn two_optionals_give_full_cross_product() {
    let dataset = dataset(
        "
        <s1> <p> 10 .
        <s1> <a> 1 .
        <s1> <a> 2 .
        <s1> <b> 3 .
        <s1> <b> 4 .
        ",
    );
    let algebra = "(leftjoin (leftjoin (bgp (?s <p> ?o)) (bgp (?s <a> ?x))) (bgp (?s <b> ?y)))";
    let rows = run(&dataset, algebra);
    assert_eq!(rows.len(), 4, "2 x 2 combinations");
    assert_eq!(
        sorted(&rows),
        vec![
            "{?o=10, ?s=<s1>, ?x=1, ?y=3}",
            "{?o=10, ?s=<s1>, ?x=1, ?y=4}",
            "{?o=10, ?s=<s1>, ?x=2, ?y=3}",
            "{?o=10, ?s=<s1>, ?x=2, ?y=4}",
        ]
    );
}

#[test]
fn conditional_behaves_like_left_join() {
    let dataset = dataset(DATA);
    let left_join = run(&dataset, "(leftjoin (bgp (?s <p> ?o)) (bgp (?o <q> ?x)))");
    let conditional = run(&dataset, "(conditional (bgp (?s <p> ?o)) (bgp (?o <q> ?x)))");
    assert_eq!(rendered(&left_join), rendered(&conditional));
}

#[test]
fn left_join_expression_restricts_the_optional_side() {
    let dataset = dataset(
        "
        <s1> <p> 10 .
        <s2> <p> 20 .
        10 <q> 5 .
        20 <q> 99 .
        ",
    );
    let rows = run(
        &dataset,
        "(leftjoin (bgp (?s <p> ?o)) (bgp (?o <q> ?x)) (exprs (> ?x ?o)))",
    );
    assert_eq!(
        rendered(&rows),
        vec!["{?o=10, ?s=<s1>}", "{?o=20, ?s=<s2>, ?x=99}"],
        "a left row whose optional matches all fail the expression is kept alone"
    );
}

#[test]
fn nested_optional() {
    let dataset = dataset(
        "
        <alice> <knows> <bob> .
        <alice> <knows> <carol> .
        <bob> <name> \"Bob\" .
        <bob> <mbox> <mailto:bob> .
        <carol> <name> \"Carol\" .
        ",
    );
    let rows = run(
        &dataset,
        "(leftjoin
            (bgp (<alice> <knows> ?p))
            (leftjoin (bgp (?p <name> ?n)) (bgp (?p <mbox> ?m))))",
    );
    assert_eq!(
        sorted(&rows),
        vec![
            "{?m=<mailto:bob>, ?n=\"Bob\", ?p=<bob>}",
            "{?n=\"Carol\", ?p=<carol>}",
        ]
    );
}

// Subject s0 has a nested child with two outer rows, s1 lacks <c> and s2
// lacks <a>, so every small cache refills and rewinds a node with children.
const NESTED_DATA: &str = "
    <s0> <p> 1 .
    <s0> <p> 2 .
    <s0> <a> <x0a> .
    <s0> <a> <x0b> .
    <x0a> <b> 1 .
    <x0a> <b> 2 .
    <x0a> <b> 3 .
    <s0> <c> 1 .
    <s0> <c> 2 .
    <s1> <p> 1 .
    <s1> <a> <x1a> .
    <x1a> <b> 1 .
    <x1a> <b> 2 .
    <s2> <p> 1 .
    <s2> <p> 2 .
    <s2> <p> 3 .
    <s2> <c> 1 .
    <s2> <c> 2 .
    <s2> <c> 3 .
";

fn same_rows_at_every_capacity(algebra: &str) {
    let dataset = dataset(NESTED_DATA);
    let expected = sorted(&run_with(&dataset, algebra, settings(1000)));
    // s0: 2 * (3 + 1) * 2, s1: 1 * 2 * 1, s2: 3 * 1 * 3
    assert_eq!(expected.len(), 27);
    for capacity in 1..=3 {
        let rows = run_with(&dataset, algebra, settings(capacity));
        assert_eq!(sorted(&rows), expected, "capacity {}", capacity);
    }
}

#[test]
fn nested_child_rewinds_under_a_later_sibling() {
    same_rows_at_every_capacity(
        "(leftjoin
            (leftjoin (bgp (?s <p> ?o)) (leftjoin (bgp (?s <a> ?x)) (bgp (?x <b> ?y))))
            (bgp (?s <c> ?z)))",
    );
}

#[test]
fn nested_child_refills_under_an_earlier_sibling() {
    same_rows_at_every_capacity(
        "(leftjoin
            (leftjoin (bgp (?s <p> ?o)) (bgp (?s <c> ?z)))
            (leftjoin (bgp (?s <a> ?x)) (bgp (?x <b> ?y))))",
    );
}

#[test]
fn quad_pattern_reads_named_graph() {
    let dataset = dataset(
        "
        <s1> <p> 1 <g1> .
        <s1> <p> 2 <g2> .
        <s1> <p> 3 .
        ",
    );
    let in_g1 = run(&dataset, "(quadpattern <g1> (?s <p> ?o))");
    assert_eq!(rendered(&in_g1), vec!["{?o=1, ?s=<s1>}"]);
    let any_graph = run(&dataset, "(quadpattern ?g (?s <p> ?o))");
    assert_eq!(any_graph.len(), 3, "a graph variable ranges over every graph");
    let default_graph = run(&dataset, "(bgp (?s <p> ?o))");
    assert_eq!(rendered(&default_graph), vec!["{?o=3, ?s=<s1>}"]);
}

#[test]
fn required_pattern_without_matches_yields_nothing() {
    let dataset = dataset(DATA);
    assert!(run(&dataset, "(leftjoin (bgp (?s <nope> ?o)) (bgp (?o <q> ?x)))").is_empty());
    assert!(run(&dataset, "(bgp (?s <q> 10))").is_empty());
}

#[test]
fn optional_sharing_no_variables_pairs_with_every_row() {
    let dataset = dataset(
        "
        <s1> <p> 1 .
        <s2> <p> 2 .
        <c> <colour> \"red\" .
        <c> <colour> \"blue\" .
        ",
    );
    let rows = run(&dataset, "(leftjoin (bgp (?s <p> ?o)) (bgp (<c> <colour> ?c)))");
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|row| row.contains("c")));
}
