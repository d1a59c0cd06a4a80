mod common;

use leapjoin::LeapjoinError;
use leapjoin::config::{DEFAULT_CACHE_CAPACITY, ReorderStrategy, Settings};

use common::{dataset, run_with, sorted};

#[test]
fn defaults() {
    let settings = Settings::default();
    assert_eq!(settings.cache_capacity, DEFAULT_CACHE_CAPACITY);
    assert_eq!(settings.cache_capacity, 1000);
    assert_eq!(settings.reorder, ReorderStrategy::BoundFirst);
    assert_eq!(settings.log_filter, "info");
}

#[test]
fn reads_toml_with_defaults_for_missing_keys() {
    let settings = Settings::from_toml("cache_capacity = 16\nreorder = \"none\"").expect("settings load");
    assert_eq!(settings.cache_capacity, 16);
    assert_eq!(settings.reorder, ReorderStrategy::None);
    assert_eq!(settings.log_filter, "info");

    let settings = Settings::from_toml("log_filter = \"leapjoin=trace\"").expect("settings load");
    assert_eq!(settings.cache_capacity, DEFAULT_CACHE_CAPACITY);
    assert_eq!(settings.log_filter, "leapjoin=trace");
}

#[test]
fn rejects_zero_capacity() {
    assert!(matches!(
        Settings::from_toml("cache_capacity = 0"),
        Err(LeapjoinError::Config(_))
    ));
    assert!(matches!(
        Settings::default().with_cache_capacity(0),
        Err(LeapjoinError::Config(_))
    ));
}

#[test]
fn rejects_unknown_reorder_strategy() {
    assert!(matches!(
        Settings::from_toml("reorder = \"cheapest\""),
        Err(LeapjoinError::Config(_))
    ));
}

#[test]
fn reorder_strategy_does_not_change_results() {
    let dataset = dataset(
        "
        <a> <type> <T> .
        <b> <type> <T> .
        <a> <knows> <b> .
        <b> <knows> <a> .
        <a> <age> 30 .
        ",
    );
    let algebra = "(leftjoin (bgp (?s <knows> ?o) (?s <type> <T>)) (bgp (?o <age> ?age)))";
    let as_written = run_with(&dataset, algebra, Settings::default().with_reorder(ReorderStrategy::None));
    let bound_first = run_with(&dataset, algebra, Settings::default());
    assert_eq!(as_written.len(), 2);
    assert_eq!(sorted(&as_written), sorted(&bound_first));
}
