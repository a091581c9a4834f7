use crossbeam_queue::ArrayQueue;
use petgraph::prelude::NodeIndex;
use std::sync::Arc;

/// Thread-safe handle for requesting a node's evaluation from outside the
/// executor.
///
/// Requests are queued and applied at the start of the next transaction.
/// Several requests for the same node before that point collapse into one
/// evaluation. When the queue is full the request is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    queue: Arc<ArrayQueue<NodeIndex>>,
    node: NodeIndex,
}

impl Notifier {
    pub(crate) const fn new(queue: Arc<ArrayQueue<NodeIndex>>, node: NodeIndex) -> Self {
        Self { queue, node }
    }

    #[inline(always)]
    pub fn notify(&self) {
        if self.queue.push(self.node).is_err() {
            tracing::warn!(node = self.node.index(), "notification queue full, request dropped");
        }
    }

    pub const fn node(&self) -> NodeIndex {
        self.node
    }
}
