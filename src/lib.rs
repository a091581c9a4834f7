//! # tickflow
//!
//! A deterministic, single-threaded execution engine for static dataflow
//! graphs. Nodes are created once, wired through typed pins, and then
//! evaluated in *transactions*: one complete pass over the graph per tick in
//! which only nodes whose inputs changed (or whose own timeout fired) run.
//!
//! The pieces, leaves first:
//!
//! - [`sequence`] - lazy single-pass views over plain buffers, terminated text
//!   and concatenations, plus the folds built on top of them.
//! - [`pin`] - typed input/output pin descriptors. A node can only touch the
//!   pins of its own `Inputs`/`Outputs` structs; anything else fails to compile.
//! - [`runtime`] - the node arena, per-evaluation [`Context`](runtime::Context),
//!   the timeout state machine and the transaction [`Executor`](runtime::Executor).
//! - [`nodes`] - a small standard library of node types (logic, math, timing,
//!   text, gpio) written against the public node contract.
//!
//! ```rust, ignore
//! use tickflow::prelude::*;
//! use tickflow::nodes::{core::Constant, logic::Greater, Operands};
//!
//! let mut executor = Executor::new();
//! let a = NodeBuilder::new(Constant::new(3.0f32)).build(&mut executor)?;
//! let b = NodeBuilder::new(Constant::new(5.0f32)).build(&mut executor)?;
//! let gt = NodeBuilder::new(Greater)
//!     .link(Operands::IN1, &a, Constant::<f32>::VAL)
//!     .link(Operands::IN2, &b, Constant::<f32>::VAL)
//!     .build(&mut executor)?;
//! ```

use enum_as_inner::EnumAsInner;
pub use petgraph::prelude::NodeIndex;

pub mod format;
pub mod nodes;
pub mod pin;
pub mod runtime;
pub mod sequence;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

/// How a node type reports which of its outputs changed.
///
/// Chosen per node type through [`Node::DIRTINESS`](runtime::Node::DIRTINESS)
/// and fixed when the graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumAsInner)]
pub enum Dirtiness {
    /// Only outputs written through `Context::emit` are dirty, and only
    /// consumers of those outputs are scheduled.
    Tracked,

    /// Every output counts as freshly produced whenever the node runs, and
    /// every downstream consumer is scheduled, even when the value is the
    /// same as in the previous transaction.
    ///
    /// Meant for pure combinational nodes (logic gates, comparisons,
    /// arithmetic) where a branch-free body matters more than the occasional
    /// redundant downstream evaluation.
    Disabled,
}

/// Value carried by pulse pins.
///
/// A pulse has no payload: emitting one only marks the output dirty, and a
/// consumer observes it through `Context::is_input_dirty`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Pulse;

pub mod prelude {
    pub use crate::pin::{InputPin, OutputPin};
    pub use crate::{Dirtiness, NodeIndex, Pulse};

    pub use crate::runtime::*;

    #[cfg(any(test, feature = "testing"))]
    pub use crate::testing::*;
}
