//! Turns pattern-tree algebra into a join tree.
//!
//! Required patterns become nodes, the right-hand side of a left join or
//! conditional becomes an optional child of the left-hand root, and filter
//! expressions are attached to the node they wrap. Anything else is refused.

use std::sync::Arc;

use tracing::debug;

use crate::algebra::Op;
use crate::error::{LeapjoinError, Result};
use crate::expr::Expr;
use crate::interface::CancelToken;
use crate::join::JoinNode;
use crate::pattern::{BasicPattern, IndexScan, Reorder};
use crate::store::Dataset;

pub struct JoinTreeBuilder {
    dataset: Arc<Dataset>,
    reorder: Box<dyn Reorder>,
    capacity: usize,
    cancel: CancelToken,
}

impl JoinTreeBuilder {
    pub fn new(
        dataset: Arc<Dataset>,
        reorder: Box<dyn Reorder>,
        capacity: usize,
        cancel: CancelToken,
    ) -> Self {
        Self {
            dataset,
            reorder,
            capacity,
            cancel,
        }
    }

    pub fn build(&self, op: &Op) -> Result<JoinNode> {
        match op {
            Op::Bgp(pattern) => Ok(self.leaf(pattern)),
            Op::QuadPattern { graph, pattern } => Ok(self.leaf(&pattern.in_graph(graph))),
            Op::LeftJoin { left, right, exprs } => {
                let mut root = self.build(left)?;
                let mut optional = self.build(right)?;
                self.attach_filters(&mut optional, exprs);
                root.add_child(optional);
                Ok(root)
            }
            Op::Conditional { left, right } => {
                let mut root = self.build(left)?;
                root.add_child(self.build(right)?);
                Ok(root)
            }
            Op::Filter { exprs, sub } => {
                let mut node = self.build(sub)?;
                self.attach_filters(&mut node, exprs);
                Ok(node)
            }
            Op::Join(..) | Op::Union(..) | Op::Sequence(_) | Op::Project { .. } | Op::Distinct(_) => {
                Err(LeapjoinError::Unsupported {
                    operator: op.name().to_string(),
                })
            }
        }
    }

    fn leaf(&self, pattern: &BasicPattern) -> JoinNode {
        let pattern = self.reorder.reorder(pattern);
        debug!(%pattern, "join node");
        let scan = IndexScan::new(Arc::clone(&self.dataset), pattern, self.cancel.clone());
        JoinNode::new(Box::new(scan), Arc::clone(&self.dataset), self.capacity)
    }

    fn attach_filters(&self, node: &mut JoinNode, exprs: &[Expr]) {
        for expr in exprs {
            let placement = if node.add_filter(expr.clone()) { "pre" } else { "post" };
            debug!(%expr, placement, "filter attached");
        }
    }
}
