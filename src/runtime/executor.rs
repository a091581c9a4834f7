use crate::pin::OutputPin;
use crate::runtime::clock::{Clock, CycleTime};
use crate::runtime::context::RuntimeContext;
use crate::runtime::graph::{Graph, GraphError, Link, NodeMeta};
use crate::runtime::node::{Handle, Node, NodeCell, NodeHandle, Slot};
use crate::runtime::notifier::Notifier;
use crate::runtime::timeout::Timeout;
use crossbeam_queue::ArrayQueue;
use enum_as_inner::EnumAsInner;
use petgraph::graph::NodeIndex;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub(crate) const DEFAULT_NOTIFICATION_CAPACITY: usize = 64;

/// Internal inconsistencies detected while evaluating. None of these can be
/// produced through the public builder API; they guard the arena layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error("link from {producer:?} into {node:?} does not match the producer's type")]
    InconsistentLink { node: NodeIndex, producer: NodeIndex },

    #[error("{node:?} is not ordered after its producer {producer:?}")]
    OrderViolation { node: NodeIndex, producer: NodeIndex },
}

/// Whether a transaction is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumAsInner)]
pub enum TransactionState {
    #[default]
    Idle,
    Running,
}

/// Summary of one completed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReport {
    /// One-based transaction number.
    pub transaction: u64,
    pub time: CycleTime,
    /// External notifications applied at the start of the transaction.
    pub notified: usize,
    /// Timeouts that fired at the start of the transaction.
    pub timeouts_fired: usize,
    /// Nodes evaluated.
    pub evaluated: usize,
}

/// Owns the graph and runs transactions over it.
///
/// The executor is single-threaded: nodes are built, evaluated and inspected
/// through `&mut self`/`&self`. The only cross-thread entry point is the
/// [`Notifier`], which queues evaluation requests that the next transaction
/// picks up.
pub struct Executor {
    graph: Graph,
    notifications: Arc<ArrayQueue<NodeIndex>>,
    state: TransactionState,
    transactions: u64,
    last_time: Option<CycleTime>,
}

impl Executor {
    pub fn new() -> Self {
        Self::with_notification_capacity(DEFAULT_NOTIFICATION_CAPACITY)
    }

    pub fn with_notification_capacity(capacity: usize) -> Self {
        Self {
            graph: Graph::new(),
            notifications: Arc::new(ArrayQueue::new(capacity.max(1))),
            state: TransactionState::Idle,
            transactions: 0,
            last_time: None,
        }
    }

    /// Graph access for construction; refused once the graph is sealed.
    pub(crate) fn graph_mut(&mut self) -> Result<&mut Graph, GraphError> {
        if self.is_sealed() {
            return Err(GraphError::Sealed {
                transactions: self.transactions,
            });
        }
        Ok(&mut self.graph)
    }

    /// Runs one transaction.
    ///
    /// # Execution Flow
    ///
    /// ## 1. Time snapshot
    /// ```text
    /// time = clock.cycle_time()
    /// ```
    /// Taken once; every node in this transaction sees the same time.
    ///
    /// ## 2. External requests
    /// ```text
    /// while notifications.pop() → Some(node): mark_dirty(node)
    /// ```
    ///
    /// ## 3. Timeouts
    /// ```text
    /// for node: if Armed(at) and at <= now → Fired, mark_dirty(node)
    /// ```
    /// A fired timeout stays visible (`Context::is_timed_out`) for the node's
    /// evaluation in this transaction.
    ///
    /// ## 4. Evaluation
    /// ```text
    /// for node in creation order where node is dirty:
    ///     copy linked upstream outputs into inputs
    ///     node.evaluate(ctx)
    ///     for each dirty output: mark consumers dirty
    /// ```
    /// Creation order is topological, so every producer has settled before
    /// its consumers read it, and a consumer marked by a producer is reached
    /// later in the same pass.
    ///
    /// ## 5. Cleanup
    /// Clears every node and output dirty flag, and retires fired timeouts
    /// that were not re-armed.
    ///
    /// The first transaction is the setup transaction: every node is dirty
    /// when created, so all of them run, with `Context::is_setting_up` set.
    /// After it the graph is sealed.
    pub fn transaction<C: Clock>(
        &mut self,
        clock: &mut C,
    ) -> Result<TransactionReport, ExecutorError> {
        let time = clock.cycle_time();
        self.transactions += 1;
        self.last_time = Some(time);
        self.state = TransactionState::Running;

        let result = self.run_transaction(RuntimeContext::new(time, self.transactions));

        // also after an aborted pass
        self.graph.cleanup();
        self.state = TransactionState::Idle;

        match &result {
            Ok(report) => tracing::debug!(
                transaction = report.transaction,
                notified = report.notified,
                timeouts_fired = report.timeouts_fired,
                evaluated = report.evaluated,
                "transaction complete"
            ),
            Err(err) => tracing::error!(transaction = self.transactions, %err, "transaction aborted"),
        }
        result
    }

    fn run_transaction(&mut self, runtime: RuntimeContext) -> Result<TransactionReport, ExecutorError> {
        let notified = self.drain_notifications();
        let timeouts_fired = self.graph.poll_timeouts(runtime.now());
        let evaluated = self.graph.evaluate(&runtime)?;

        Ok(TransactionReport {
            transaction: runtime.transaction(),
            time: runtime.cycle_time(),
            notified,
            timeouts_fired,
            evaluated,
        })
    }

    fn drain_notifications(&mut self) -> usize {
        // at most one queue's worth per transaction
        let mut applied = 0;
        for _ in 0..self.notifications.capacity() {
            let Some(index) = self.notifications.pop() else {
                break;
            };
            if self.graph.mark_dirty(index) {
                applied += 1;
            }
        }
        applied
    }

    /// Requests evaluation of a node in the next transaction. Idempotent
    /// until that transaction runs.
    pub fn mark_dirty<H: NodeHandle>(&mut self, handle: &H) -> Result<(), GraphError> {
        let index = self.graph.resolve(handle)?;
        self.graph.mark_dirty(index);
        Ok(())
    }

    /// A thread-safe handle that marks `handle`'s node dirty from anywhere.
    pub fn notifier<H: NodeHandle>(&self, handle: &H) -> Result<Notifier, GraphError> {
        let index = self.graph.resolve(handle)?;
        Ok(Notifier::new(self.notifications.clone(), index))
    }

    /// The node's current state.
    pub fn node<N: Node>(&self, handle: &Handle<N>) -> Option<&N> {
        self.cell(handle).map(|cell| &cell.node)
    }

    /// The value last emitted on one of the node's outputs.
    pub fn output<N: Node, T>(
        &self,
        handle: &Handle<N>,
        pin: OutputPin<N::Outputs, T>,
    ) -> Option<&T> {
        self.cell(handle).map(|cell| pin.get(&cell.outputs))
    }

    fn cell<N: Node>(&self, handle: &Handle<N>) -> Option<&NodeCell<N>> {
        self.slot(handle)?.as_any().downcast_ref::<NodeCell<N>>()
    }

    fn slot<H: NodeHandle>(&self, handle: &H) -> Option<&dyn Slot> {
        self.graph
            .resolve(handle)
            .ok()
            .and_then(|index| self.graph.slot(index))
    }

    /// Whether the node is scheduled for the next transaction.
    pub fn is_node_dirty<H: NodeHandle>(&self, handle: &H) -> bool {
        self.slot(handle)
            .is_some_and(|slot| slot.header().flags.is_node_dirty())
    }

    /// Whether the node has an output marked dirty. Outside a transaction this
    /// is always `false`, since cleanup clears every flag.
    pub fn has_dirty_outputs<H: NodeHandle>(&self, handle: &H) -> bool {
        self.slot(handle)
            .is_some_and(|slot| slot.header().flags.outputs() != 0)
    }

    /// Whether the node ran in the most recent transaction.
    pub fn has_evaluated<H: NodeHandle>(&self, handle: &H) -> bool {
        self.transactions > 0
            && self.last_evaluated(handle) == Some(self.transactions)
    }

    /// Number of the transaction in which the node last ran.
    pub fn last_evaluated<H: NodeHandle>(&self, handle: &H) -> Option<u64> {
        self.slot(handle)?.header().evaluated_in
    }

    pub fn timeout<H: NodeHandle>(&self, handle: &H) -> Option<Timeout> {
        self.slot(handle).map(|slot| slot.header().timeout)
    }

    /// Earliest pending timeout across the graph.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.graph.next_deadline()
    }

    /// Whether the next transaction has work regardless of time: a dirty node
    /// or a queued notification.
    pub fn has_pending_work(&self) -> bool {
        !self.notifications.is_empty() || self.graph.has_dirty()
    }

    pub fn meta<H: NodeHandle>(&self, handle: &H) -> Option<&NodeMeta> {
        self.graph.meta(self.graph.resolve(handle).ok()?)
    }

    /// Consumers fed by the node, with the link carrying each.
    pub fn downstream<H: NodeHandle>(&self, handle: &H) -> Vec<(NodeIndex, Link)> {
        match self.graph.resolve(handle) {
            Ok(index) => self.graph.downstream(index).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Producers feeding the node, with the link carrying each.
    pub fn upstream<H: NodeHandle>(&self, handle: &H) -> Vec<(NodeIndex, Link)> {
        match self.graph.resolve(handle) {
            Ok(index) => self.graph.upstream(index).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Graphviz rendering of the topology.
    pub fn to_dot(&self) -> String {
        self.graph.to_dot()
    }

    pub fn node_count(&self) -> usize {
        self.graph.len()
    }

    /// Number of transactions run so far.
    pub const fn transactions(&self) -> u64 {
        self.transactions
    }

    /// Whether the setup transaction has run. A sealed graph accepts no new
    /// nodes.
    pub const fn is_sealed(&self) -> bool {
        self.transactions > 0
    }

    pub const fn state(&self) -> TransactionState {
        self.state
    }

    /// The time snapshot of the most recent transaction.
    pub const fn last_cycle_time(&self) -> Option<CycleTime> {
        self.last_time
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("nodes", &self.graph.len())
            .field("transactions", &self.transactions)
            .field("state", &self.state)
            .finish()
    }
}
