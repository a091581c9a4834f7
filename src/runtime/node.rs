use crate::Dirtiness;
use crate::pin::{InputPin, OutputPin};
use crate::runtime::context::{Context, RuntimeContext};
use crate::runtime::executor::{Executor, ExecutorError};
use crate::runtime::graph::{GraphError, GraphId, Link, NodeMeta};
use crate::runtime::timeout::Timeout;
use petgraph::prelude::NodeIndex;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

/// A node type: persistent state plus an evaluation function over typed pins.
///
/// The implementing value *is* the node's private state; it lives in the
/// executor's arena for the life of the graph and is handed back mutably on
/// every evaluation. Pins are declared as the fields of `Inputs` and
/// `Outputs` (usually generated with [`pins!`](crate::pins)).
///
/// # Example
/// ```rust, ignore
/// tickflow::pins! {
///     pub struct CounterOutputs as OutputPin {
///         COUNT = 0 => count: u32,
///     }
/// }
///
/// #[derive(Default)]
/// struct Counter;
///
/// impl Node for Counter {
///     type Inputs = PulseInput;
///     type Outputs = CounterOutputs;
///
///     fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
///         if ctx.is_input_dirty(PulseInput::INC) {
///             let next = ctx.output(CounterOutputs::COUNT) + 1;
///             ctx.emit(CounterOutputs::COUNT, next);
///         }
///     }
/// }
/// ```
pub trait Node: Sized + 'static {
    /// Values copied from upstream outputs (or bound constants) before each
    /// evaluation.
    type Inputs: Clone + Default + 'static;

    /// Values this node produces. They persist across transactions.
    type Outputs: Default + 'static;

    /// Whether writes are tracked per output or every run counts as a change
    /// on every output.
    const DIRTINESS: Dirtiness = Dirtiness::Tracked;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>);
}

/// Common interface for anything that identifies a node in an executor.
pub trait NodeHandle {
    fn index(&self) -> NodeIndex;

    /// The graph that issued the handle. An executor refuses handles from
    /// any other graph.
    fn graph(&self) -> GraphId;
}

/// Untyped node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RawHandle {
    graph: GraphId,
    index: NodeIndex,
}

impl RawHandle {
    pub(crate) const fn new(graph: GraphId, index: NodeIndex) -> Self {
        Self { graph, index }
    }

    pub const fn index(&self) -> NodeIndex {
        self.index
    }

    pub const fn graph(&self) -> GraphId {
        self.graph
    }
}

impl NodeHandle for RawHandle {
    fn index(&self) -> NodeIndex {
        self.index
    }

    fn graph(&self) -> GraphId {
        self.graph
    }
}

/// Typed node identifier returned by [`NodeBuilder::build`].
///
/// The type parameter is what lets builders check pin compatibility when
/// linking and lets hosts read a node's state and outputs back without
/// casting. Besides the index it records the issuing graph, so a handle
/// from one executor cannot address a node of another.
pub struct Handle<N> {
    graph: GraphId,
    index: NodeIndex,
    _node: PhantomData<fn() -> N>,
}

impl<N> Handle<N> {
    pub(crate) const fn new(graph: GraphId, index: NodeIndex) -> Self {
        Self {
            graph,
            index,
            _node: PhantomData,
        }
    }

    #[inline(always)]
    pub const fn index(&self) -> NodeIndex {
        self.index
    }

    #[inline(always)]
    pub const fn graph(&self) -> GraphId {
        self.graph
    }

    #[inline(always)]
    pub const fn raw_handle(&self) -> RawHandle {
        RawHandle::new(self.graph, self.index)
    }
}

impl<N> NodeHandle for Handle<N> {
    fn index(&self) -> NodeIndex {
        self.index
    }

    fn graph(&self) -> GraphId {
        self.graph
    }
}

impl<N> Clone for Handle<N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> Copy for Handle<N> {}

impl<N> PartialEq for Handle<N> {
    fn eq(&self, other: &Self) -> bool {
        self.graph == other.graph && self.index == other.index
    }
}

impl<N> Eq for Handle<N> {}

impl<N> fmt::Debug for Handle<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("graph", &self.graph)
            .field("index", &self.index.index())
            .field("node", &std::any::type_name::<N>())
            .finish()
    }
}

/// Node-dirty bit plus one dirty bit per output pin.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct DirtyFlags {
    node: bool,
    outputs: u32,
}

impl DirtyFlags {
    #[inline(always)]
    pub(crate) const fn is_node_dirty(&self) -> bool {
        self.node
    }

    #[inline(always)]
    pub(crate) const fn mark_node(&mut self) {
        self.node = true;
    }

    #[inline(always)]
    pub(crate) const fn outputs(&self) -> u32 {
        self.outputs
    }

    #[inline(always)]
    pub(crate) const fn is_output_dirty(&self, index: u8) -> bool {
        self.outputs & (1 << index) != 0
    }

    #[inline(always)]
    pub(crate) const fn mark_outputs(&mut self, mask: u32) {
        self.outputs |= mask;
    }

    #[inline(always)]
    pub(crate) const fn clear(&mut self) {
        self.node = false;
        self.outputs = 0;
    }
}

/// Engine-owned bookkeeping shared by every node cell.
#[derive(Debug, Default)]
pub(crate) struct Header {
    pub(crate) flags: DirtyFlags,
    pub(crate) timeout: Timeout,
    /// Transaction number of the most recent evaluation.
    pub(crate) evaluated_in: Option<u64>,
}

impl Header {
    /// Fresh nodes start dirty so the first transaction evaluates them.
    fn created() -> Self {
        let mut header = Self::default();
        header.flags.mark_node();
        header
    }
}

type CopyFn<I> = Box<dyn Fn(&dyn Any, &mut I) -> bool>;

/// One input wired to an upstream output.
pub(crate) struct InputLink<I> {
    source: NodeIndex,
    output: u8,
    input_mask: u32,
    copy: CopyFn<I>,
}

/// Type-erased view of a node cell, as stored in the arena.
pub(crate) trait Slot: Any {
    fn header(&self) -> &Header;

    fn header_mut(&mut self) -> &mut Header;

    fn as_any(&self) -> &dyn Any;

    /// Builds the node's context from `upstream` (every node with a lower
    /// index) and runs its evaluation.
    fn evaluate(
        &mut self,
        current: NodeIndex,
        upstream: &[Box<dyn Slot>],
        runtime: &RuntimeContext,
    ) -> Result<(), ExecutorError>;
}

/// Arena storage for one node of type `N`.
pub(crate) struct NodeCell<N: Node> {
    pub(crate) node: N,
    pub(crate) outputs: N::Outputs,
    header: Header,
    bound: N::Inputs,
    links: Vec<InputLink<N::Inputs>>,
}

impl<N: Node> Slot for NodeCell<N> {
    #[inline(always)]
    fn header(&self) -> &Header {
        &self.header
    }

    #[inline(always)]
    fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    #[inline(always)]
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn evaluate(
        &mut self,
        current: NodeIndex,
        upstream: &[Box<dyn Slot>],
        runtime: &RuntimeContext,
    ) -> Result<(), ExecutorError> {
        let mut inputs = self.bound.clone();
        let mut input_dirty = 0;

        for link in &self.links {
            let source = upstream
                .get(link.source.index())
                .ok_or(ExecutorError::OrderViolation {
                    node: current,
                    producer: link.source,
                })?;

            if !(link.copy)(source.as_any(), &mut inputs) {
                return Err(ExecutorError::InconsistentLink {
                    node: current,
                    producer: link.source,
                });
            }

            if source.header().flags.is_output_dirty(link.output) {
                input_dirty |= link.input_mask;
            }
        }

        let Self {
            node,
            outputs,
            header,
            ..
        } = self;

        let mut ctx = Context::new(
            runtime,
            current,
            inputs,
            input_dirty,
            outputs,
            &mut header.flags,
            &mut header.timeout,
        );
        node.evaluate(&mut ctx);

        if N::DIRTINESS.is_disabled() {
            header.flags.mark_outputs(u32::MAX);
        }
        header.evaluated_in = Some(runtime.transaction());
        Ok(())
    }
}

/// Builder for adding nodes to an [`Executor`].
///
/// 1. **Create**: `NodeBuilder::new(node)` with the node's initial state
/// 2. **Configure**: link inputs to upstream outputs, bind constants, name it
/// 3. **Build**: insert into the graph with [`build`](Self::build)
///
/// Upstream nodes must be built before the nodes that read them, so the
/// order in which nodes are built is always a valid evaluation order and a
/// cycle cannot be expressed.
///
/// # Example
/// ```rust, ignore
/// let diff = NodeBuilder::new(Subtract)
///     .named("light_diff")
///     .link(Operands::IN1, &left_sensor, AnalogReadOutputs::VAL)
///     .link(Operands::IN2, &right_sensor, AnalogReadOutputs::VAL)
///     .build(&mut executor)?;
///
/// let turn = NodeBuilder::new(Greater)
///     .link(Operands::IN1, &diff, NumberOutput::OUT)
///     .bind(Operands::IN2, 0.2)
///     .build(&mut executor)?;
/// ```
pub struct NodeBuilder<N: Node> {
    node: N,
    name: Option<String>,
    bound: N::Inputs,
    links: Vec<InputLink<N::Inputs>>,
    parents: Vec<(RawHandle, Link)>,
    linked_inputs: u32,
    duplicate: Option<u8>,
}

impl<N: Node> NodeBuilder<N> {
    pub fn new(node: N) -> Self {
        Self {
            node,
            name: None,
            bound: N::Inputs::default(),
            links: Vec::new(),
            parents: Vec::new(),
            linked_inputs: 0,
            duplicate: None,
        }
    }

    /// Sets a debug name, used in logs and graph dumps.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Binds a constant to an input. A linked input ignores its bound value.
    pub fn bind<T>(mut self, pin: InputPin<N::Inputs, T>, value: T) -> Self {
        *pin.get_mut(&mut self.bound) = value;
        self
    }

    /// Links `input` to `output` of an upstream node.
    ///
    /// Each input accepts a single link; linking the same input twice makes
    /// [`build`](Self::build) fail with [`GraphError::DuplicateLink`].
    pub fn link<M, T>(
        mut self,
        input: InputPin<N::Inputs, T>,
        source: &Handle<M>,
        output: OutputPin<M::Outputs, T>,
    ) -> Self
    where
        M: Node,
        T: Clone + 'static,
    {
        if self.linked_inputs & input.mask() != 0 {
            self.duplicate.get_or_insert(input.index());
        }
        self.linked_inputs |= input.mask();

        let copy: CopyFn<N::Inputs> = Box::new(move |source, inputs| {
            match source.downcast_ref::<NodeCell<M>>() {
                Some(cell) => {
                    *input.get_mut(inputs) = output.get(&cell.outputs).clone();
                    true
                }
                None => false,
            }
        });

        self.links.push(InputLink {
            source: source.index(),
            output: output.index(),
            input_mask: input.mask(),
            copy,
        });
        self.parents
            .push((source.raw_handle(), Link::new(output.index(), input.index())));
        self
    }

    /// Inserts the node into the executor's graph.
    ///
    /// Fails if the graph is already sealed (a transaction has run), if a
    /// linked upstream handle does not belong to this executor, or if an
    /// input was linked twice.
    pub fn build(self, executor: &mut Executor) -> Result<Handle<N>, GraphError> {
        if let Some(input) = self.duplicate {
            tracing::warn!(name = ?self.name, input, "input linked more than once");
            return Err(GraphError::DuplicateLink { input });
        }

        let meta = NodeMeta::new::<N>(self.name);
        let cell = NodeCell {
            node: self.node,
            outputs: N::Outputs::default(),
            header: Header::created(),
            bound: self.bound,
            links: self.links,
        };

        let graph = executor.graph_mut()?;
        let id = graph.id();
        graph
            .add_node(Box::new(cell), meta, &self.parents)
            .inspect_err(|err| tracing::warn!(%err, "link rejected"))
            .map(|index| Handle::new(id, index))
    }
}

impl<N: Node + Default> Default for NodeBuilder<N> {
    fn default() -> Self {
        Self::new(N::default())
    }
}
