use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use leapjoin::Result;
use leapjoin::config::Settings;
use leapjoin::exec::{ExecutionContext, OpExecutor};
use leapjoin::sse;
use leapjoin::store::Dataset;

const USAGE: &str = "usage: leapjoin <data-file> <algebra-file>";

fn run(data_path: &str, algebra_path: &str, settings: Settings) -> Result<usize> {
    let read = |path: &str| {
        fs::read_to_string(path)
            .map_err(|e| leapjoin::LeapjoinError::Execution(format!("cannot read {}: {}", path, e)))
    };
    let mut dataset = Dataset::new();
    dataset.load_str(&read(data_path)?)?;
    info!(quads = dataset.len(), terms = dataset.terms().len(), "dataset ready");

    let op = sse::parse_op(&read(algebra_path)?)?;
    let context = ExecutionContext::new(Arc::new(dataset), settings);
    let mut rows = 0;
    for solution in OpExecutor::new(context).execute(&op)? {
        let solution = solution?;
        let line = serde_json::to_string(&solution)
            .map_err(|e| leapjoin::LeapjoinError::Execution(e.to_string()))?;
        println!("{}", line);
        rows += 1;
    }
    Ok(rows)
}

fn main() -> ExitCode {
    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    let filter = EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [data_path, algebra_path] = args.as_slice() else {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    };
    match run(data_path, algebra_path, settings) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "query failed");
            ExitCode::FAILURE
        }
    }
}
