use crate::runtime::context::RuntimeContext;
use crate::runtime::executor::ExecutorError;
use crate::runtime::node::{Node, NodeHandle, RawHandle, Slot};
use petgraph::Direction;
use petgraph::dot::Dot;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("graph is sealed after {transactions} transaction(s); nodes can only be added before the first")]
    Sealed { transactions: u64 },

    #[error("node {0:?} does not belong to this graph")]
    UnknownNode(NodeIndex),

    #[error("handle to node {node:?} was issued by another executor")]
    ForeignHandle { node: NodeIndex },

    #[error("input pin {input} is linked more than once")]
    DuplicateLink { input: u8 },
}

/// Identity of one graph. Every handle carries the id of the graph that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

impl GraphId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Edge weight: which output of the producer feeds which input of the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub output: u8,
    pub input: u8,
}

impl Link {
    pub const fn new(output: u8, input: u8) -> Self {
        Self { output, input }
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.output, self.input)
    }
}

/// Node weight: descriptive data only, the node itself lives in the arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeMeta {
    pub name: Option<String>,
    pub type_name: &'static str,
}

impl NodeMeta {
    pub(crate) fn new<N: Node>(name: Option<String>) -> Self {
        Self {
            name,
            type_name: std::any::type_name::<N>(),
        }
    }

    /// The type name without its module path.
    pub fn short_type_name(&self) -> &'static str {
        let base = self.type_name.split('<').next().unwrap_or(self.type_name);
        match base.rfind("::") {
            Some(pos) => &self.type_name[pos + 2..],
            None => self.type_name,
        }
    }
}

impl fmt::Display for NodeMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} ({})", self.short_type_name()),
            None => f.write_str(self.short_type_name()),
        }
    }
}

/// Node arena plus topology.
///
/// Node indices are positions in `slots` and are handed out in creation
/// order. A node can only link to nodes that already exist, which makes the
/// creation order a topological order and lets evaluation split the arena
/// into "already evaluated" and "not yet evaluated" halves.
pub(crate) struct Graph {
    id: GraphId,
    topology: DiGraph<NodeMeta, Link>,
    slots: Vec<Box<dyn Slot>>,
}

impl Graph {
    pub(crate) fn new() -> Self {
        Self {
            id: GraphId::next(),
            topology: DiGraph::new(),
            slots: Vec::new(),
        }
    }

    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline(always)]
    pub(crate) const fn id(&self) -> GraphId {
        self.id
    }

    #[inline(always)]
    pub(crate) fn contains(&self, index: NodeIndex) -> bool {
        index.index() < self.slots.len()
    }

    /// The handle's index, if the handle was issued by this graph and names
    /// an existing node.
    pub(crate) fn resolve<H: NodeHandle>(&self, handle: &H) -> Result<NodeIndex, GraphError> {
        let index = handle.index();
        if handle.graph() != self.id {
            return Err(GraphError::ForeignHandle { node: index });
        }
        if !self.contains(index) {
            return Err(GraphError::UnknownNode(index));
        }
        Ok(index)
    }

    pub(crate) fn add_node(
        &mut self,
        slot: Box<dyn Slot>,
        meta: NodeMeta,
        parents: &[(RawHandle, Link)],
    ) -> Result<NodeIndex, GraphError> {
        for (parent, _) in parents {
            self.resolve(parent)?;
        }

        tracing::trace!(node = self.slots.len(), %meta, "adding node");

        let index = self.topology.add_node(meta);
        debug_assert_eq!(index.index(), self.slots.len());
        self.slots.push(slot);

        for (parent, link) in parents {
            self.topology.add_edge(parent.index(), index, *link);
        }
        Ok(index)
    }

    #[inline(always)]
    pub(crate) fn slot(&self, index: NodeIndex) -> Option<&dyn Slot> {
        self.slots.get(index.index()).map(|slot| slot.as_ref())
    }

    pub(crate) fn meta(&self, index: NodeIndex) -> Option<&NodeMeta> {
        self.topology.node_weight(index)
    }

    /// Marks a node for evaluation in the next pass. Returns `false` for an
    /// unknown index.
    pub(crate) fn mark_dirty(&mut self, index: NodeIndex) -> bool {
        match self.slots.get_mut(index.index()) {
            Some(slot) => {
                slot.header_mut().flags.mark_node();
                true
            }
            None => false,
        }
    }

    pub(crate) fn has_dirty(&self) -> bool {
        self.slots
            .iter()
            .any(|slot| slot.header().flags.is_node_dirty())
    }

    /// Fires every timeout due at `now` and marks its node dirty.
    pub(crate) fn poll_timeouts(&mut self, now: Instant) -> usize {
        let mut fired = 0;
        for (position, slot) in self.slots.iter_mut().enumerate() {
            let header = slot.header_mut();
            if header.timeout.poll(now) {
                tracing::trace!(node = position, "timeout fired");
                header.flags.mark_node();
                fired += 1;
            }
        }
        fired
    }

    /// Evaluates dirty nodes in index order, propagating dirtiness along
    /// every edge whose producer output was marked.
    pub(crate) fn evaluate(&mut self, runtime: &RuntimeContext) -> Result<usize, ExecutorError> {
        let mut evaluated = 0;

        for position in 0..self.slots.len() {
            let (upstream, rest) = self.slots.split_at_mut(position);
            let Some((slot, downstream)) = rest.split_first_mut() else {
                break;
            };

            if !slot.header().flags.is_node_dirty() {
                continue;
            }

            let index = NodeIndex::new(position);
            tracing::trace!(
                node = position,
                meta = %self.topology[index],
                "evaluating"
            );

            slot.evaluate(index, upstream, runtime)?;
            evaluated += 1;

            let dirty_outputs = slot.header().flags.outputs();
            if dirty_outputs == 0 {
                continue;
            }

            for edge in self.topology.edges_directed(index, Direction::Outgoing) {
                if dirty_outputs & (1 << edge.weight().output) == 0 {
                    continue;
                }

                let target = edge.target();
                let consumer = target
                    .index()
                    .checked_sub(position + 1)
                    .and_then(|offset| downstream.get_mut(offset))
                    .ok_or(ExecutorError::OrderViolation {
                        node: target,
                        producer: index,
                    })?;
                consumer.header_mut().flags.mark_node();
            }
        }

        Ok(evaluated)
    }

    /// End-of-transaction reset: clears every dirty flag and retires fired
    /// timeouts that were not re-armed.
    pub(crate) fn cleanup(&mut self) {
        for slot in self.slots.iter_mut() {
            let header = slot.header_mut();
            header.flags.clear();
            header.timeout.retire();
        }
    }

    /// Earliest armed timeout across all nodes.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.slots
            .iter()
            .filter_map(|slot| slot.header().timeout.deadline())
            .min()
    }

    pub(crate) fn downstream(&self, index: NodeIndex) -> impl Iterator<Item = (NodeIndex, Link)> + '_ {
        self.topology
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| (edge.target(), *edge.weight()))
    }

    pub(crate) fn upstream(&self, index: NodeIndex) -> impl Iterator<Item = (NodeIndex, Link)> + '_ {
        self.topology
            .edges_directed(index, Direction::Incoming)
            .map(|edge| (edge.source(), *edge.weight()))
    }

    pub(crate) fn to_dot(&self) -> String {
        format!("{}", Dot::new(&self.topology))
    }
}
