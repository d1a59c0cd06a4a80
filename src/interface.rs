//! Threaded interface for submitting and controlling queries.
//!
//! A minimal thread-per-query runner: each query is executed on a background
//! thread and its rows are optionally streamed back over a channel. Cancellation
//! is cooperative through a shared token that every pattern scan of the query
//! checks before handing out another row. A timeout is a deadline carried by
//! that same token, so a query that never produces a row still stops.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::algebra::Op;
use crate::binding::Solution;
use crate::config::Settings;
use crate::error::{LeapjoinError, Result};
use crate::exec::{ExecutionContext, OpExecutor};
use crate::store::Dataset;

#[derive(Debug, Default)]
struct Signal {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

/// Cancellation token shared between a query and whoever may abort it.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<Signal>);
impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    /// A token that cancels itself once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self(Arc::new(Signal {
            cancelled: AtomicBool::new(false),
            deadline: Some(deadline),
        }))
    }
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        if self.0.cancelled.load(Ordering::Relaxed) {
            return true;
        }
        match self.0.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.cancel();
                true
            }
            _ => false,
        }
    }
}

/// Opaque query identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(u64);
impl QueryId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// How a query ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOutcome {
    pub rows: usize,
    pub cancelled: bool,
}

/// Handle to a running or completed query.
pub struct QueryHandle {
    pub id: QueryId,
    cancel: CancelToken,
    started: Instant,
    join: Option<JoinHandle<Result<QueryOutcome>>>,
    pub results: Option<Receiver<Solution>>, // None when rows are only counted
}
impl QueryHandle {
    /// Request cancellation. The worker observes it before its next row.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
    /// Wait for the query to finish.
    pub fn join(mut self) -> Result<QueryOutcome> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| LeapjoinError::Execution(format!("query {} panicked", self.id.0)))?,
            None => Err(LeapjoinError::Execution(format!("query {} already joined", self.id.0))),
        }
    }
    /// Elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Query submission options.
pub struct QueryOptions {
    pub stream_results: bool,
    pub timeout: Option<Duration>,
}
impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stream_results: true,
            timeout: None,
        }
    }
}

/// Registry managing query lifecycles.
pub struct QueryInterface {
    dataset: Arc<Dataset>, // shared, read-only while queries run
    settings: Settings,
    next_id: AtomicU64,
    active: Arc<Mutex<HashMap<QueryId, CancelToken>>>, // for external cancellation
}

impl QueryInterface {
    pub fn new(dataset: Arc<Dataset>, settings: Settings) -> Self {
        Self {
            dataset,
            settings,
            next_id: AtomicU64::new(0),
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn allocate_id(&self) -> QueryId {
        QueryId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Submit a query for execution on a background thread.
    /// When `options.stream_results` is true, a channel is returned for rows.
    pub fn start_query(&self, op: Op, options: QueryOptions) -> Result<QueryHandle> {
        let id = self.allocate_id();
        let started = Instant::now();
        // a timeout too large to represent is no timeout
        let cancel = match options.timeout.and_then(|timeout| started.checked_add(timeout)) {
            Some(deadline) => CancelToken::with_deadline(deadline),
            None => CancelToken::new(),
        };
        self.active.lock()?.insert(id, cancel.clone());

        let (tx, rx) = if options.stream_results {
            let (tx, rx) = mpsc::channel();
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let context = ExecutionContext::new(Arc::clone(&self.dataset), self.settings.clone())
            .with_cancel(cancel.clone());
        let active = Arc::clone(&self.active);
        debug!(query = id.0, timeout = ?options.timeout, "query submitted");
        let join = std::thread::spawn(move || {
            let token = context.cancel_token().clone();
            let outcome = run(context, &op, |solution| match &tx {
                Some(tx) => tx.send(solution).is_ok(),
                None => true,
            });
            if let Ok(mut active) = active.lock() {
                active.remove(&id);
            }
            if token.is_cancelled() {
                warn!(query = id.0, "query aborted");
            }
            outcome
        });

        Ok(QueryHandle {
            id,
            cancel,
            started,
            join: Some(join),
            results: rx,
        })
    }

    /// Run a query to completion on the current thread.
    pub fn run_sync(&self, op: &Op) -> Result<Vec<Solution>> {
        let context = ExecutionContext::new(Arc::clone(&self.dataset), self.settings.clone());
        OpExecutor::new(context).execute(op)?.collect()
    }

    /// Cancel a query by id.
    pub fn cancel(&self, id: QueryId) -> Result<bool> {
        match self.active.lock()?.get(&id) {
            Some(token) => {
                token.cancel();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn active_queries(&self) -> Result<usize> {
        Ok(self.active.lock()?.len())
    }
}

// Pumps the query into `sink`, which returns false when nobody is listening
// any more. The deadline, if any, lives in the context's cancel token.
fn run(
    context: ExecutionContext,
    op: &Op,
    mut sink: impl FnMut(Solution) -> bool,
) -> Result<QueryOutcome> {
    let cancel = context.cancel_token().clone();
    let mut rows = 0;
    for solution in OpExecutor::new(context).execute(op)? {
        let solution = solution?;
        rows += 1;
        if !sink(solution) {
            cancel.cancel();
        }
    }
    Ok(QueryOutcome {
        rows,
        cancelled: cancel.is_cancelled(),
    })
}
