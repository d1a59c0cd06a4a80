//! Executes supported algebra as a join tree and hands back materialized rows.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use crate::algebra::Op;
use crate::binding::{Binding, Solution};
use crate::builder::JoinTreeBuilder;
use crate::config::Settings;
use crate::error::Result;
use crate::interface::CancelToken;
use crate::join::JoinNode;
use crate::pattern::AttributeOrder;
use crate::store::Dataset;

// ------------- ExecutionContext -------------
/// What a query runs against: the shared dataset, the settings and the token
/// that aborts it.
#[derive(Clone)]
pub struct ExecutionContext {
    dataset: Arc<Dataset>,
    settings: Settings,
    cancel: CancelToken,
}
impl ExecutionContext {
    pub fn new(dataset: Arc<Dataset>, settings: Settings) -> Self {
        Self {
            dataset,
            settings,
            cancel: CancelToken::new(),
        }
    }
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }
    pub fn dataset(&self) -> &Arc<Dataset> {
        &self.dataset
    }
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

// ------------- OpExecutor -------------
pub struct OpExecutor {
    context: ExecutionContext,
}
impl OpExecutor {
    pub fn new(context: ExecutionContext) -> Self {
        Self { context }
    }
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Builds the join tree for `op`, negotiates its attribute order and
    /// opens the root, leaving it ready to pump.
    pub fn prepare(&self, op: &Op) -> Result<JoinNode> {
        let builder = JoinTreeBuilder::new(
            Arc::clone(&self.context.dataset),
            self.context.settings.reorder.transformation(),
            self.context.settings.cache_capacity,
            self.context.cancel.clone(),
        );
        let mut root = builder.build(op)?;
        root.init(&AttributeOrder::empty());
        root.open()?;
        Ok(root)
    }

    pub fn execute(&self, op: &Op) -> Result<QueryIter> {
        let root = self.prepare(op)?;
        info!(%op, "query started");
        Ok(QueryIter {
            root,
            dataset: Arc::clone(&self.context.dataset),
            cancel: self.context.cancel.clone(),
            rows: 0,
            started: Instant::now(),
            finished: false,
        })
    }
}

// ------------- QueryIter -------------
/// Pulls rows out of the root node until it runs dry, fails or is cancelled.
pub struct QueryIter {
    root: JoinNode,
    dataset: Arc<Dataset>,
    cancel: CancelToken,
    rows: usize,
    started: Instant,
    finished: bool,
}

impl QueryIter {
    pub fn root(&self) -> &JoinNode {
        &self.root
    }
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// The next row with its term ids still unresolved.
    pub fn next_binding(&mut self) -> Result<Option<Binding>> {
        if self.finished {
            return Ok(None);
        }
        if !self.cancel.is_cancelled() && self.root.advance()? {
            self.rows += 1;
            return self.root.take().map(Some);
        }
        self.finish();
        Ok(None)
    }

    fn finish(&mut self) {
        self.finished = true;
        let elapsed = self.started.elapsed();
        if self.cancel.is_cancelled() {
            warn!(rows = self.rows, ?elapsed, "query cancelled");
        } else {
            info!(rows = self.rows, ?elapsed, "query finished");
        }
    }
}

impl Iterator for QueryIter {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self
            .next_binding()
            .and_then(|b| b.map(|b| Solution::materialize(&b, self.dataset.terms())).transpose());
        if next.is_err() {
            self.finished = true;
        }
        next.transpose()
    }
}
