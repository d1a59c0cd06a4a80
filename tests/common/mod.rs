#![allow(dead_code)]

use std::sync::Arc;

use leapjoin::binding::Solution;
use leapjoin::config::Settings;
use leapjoin::exec::{ExecutionContext, OpExecutor};
use leapjoin::sse;
use leapjoin::store::Dataset;

pub fn dataset(data: &str) -> Arc<Dataset> {
    let mut dataset = Dataset::new();
    dataset.load_str(data).expect("data loads");
    Arc::new(dataset)
}

pub fn settings(capacity: usize) -> Settings {
    Settings::default()
        .with_cache_capacity(capacity)
        .expect("capacity is valid")
}

pub fn run_with(dataset: &Arc<Dataset>, algebra: &str, settings: Settings) -> Vec<Solution> {
    let op = sse::parse_op(algebra).expect("algebra parses");
    let context = ExecutionContext::new(Arc::clone(dataset), settings);
    OpExecutor::new(context)
        .execute(&op)
        .expect("query builds")
        .collect::<leapjoin::Result<Vec<_>>>()
        .expect("query runs")
}

pub fn run(dataset: &Arc<Dataset>, algebra: &str) -> Vec<Solution> {
    run_with(dataset, algebra, Settings::default())
}

/// Rows rendered as text, in the order produced.
pub fn rendered(rows: &[Solution]) -> Vec<String> {
    rows.iter().map(|row| row.to_string()).collect()
}

/// Rows rendered as text and sorted, for order-insensitive comparison.
pub fn sorted(rows: &[Solution]) -> Vec<String> {
    let mut rows = rendered(rows);
    rows.sort();
    rows
}
