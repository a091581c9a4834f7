//! # Standard Nodes
//!
//! Node types written against the public [`Node`](crate::runtime::Node)
//! contract, grouped by concern:
//!
//! - [`core`]: constants, clock sources and memory
//! - [`logic`]: boolean gates and comparisons
//! - [`math`]: arithmetic and range mapping
//! - [`time`]: debouncing and delays built on node timeouts
//! - [`text`]: number formatting and text concatenation
//! - [`gpio`]: digital/analog pins behind a [`Hal`](gpio::Hal)
//!
//! The combinational nodes in `logic` and `math` run with
//! [`Dirtiness::Disabled`](crate::Dirtiness::Disabled). Everything else tracks
//! which outputs it actually emitted.
//!
//! Pin structs shared by several node types live here.

pub mod core;
pub mod gpio;
pub mod logic;
pub mod math;
pub mod text;
pub mod time;

use crate::pins;
use crate::runtime::{Executor, GraphError, Handle, NodeBuilder};
use std::time::Duration;

pins! {
    /// For nodes driven only by their own timeout or setup.
    pub struct NoInputs as InputPin {}
}

pins! {
    /// For sinks whose effect is outside the graph.
    pub struct NoOutputs as OutputPin {}
}

pins! {
    /// Two numeric operands.
    pub struct Operands as InputPin {
        IN1 = 0 => in1: f32,
        IN2 = 1 => in2: f32,
    }
}

pins! {
    /// Two boolean operands.
    pub struct LogicOperands as InputPin {
        IN1 = 0 => in1: bool,
        IN2 = 1 => in2: bool,
    }
}

pins! {
    pub struct NumberInput as InputPin {
        IN = 0 => value: f32,
    }
}

pins! {
    pub struct LogicInput as InputPin {
        IN = 0 => value: bool,
    }
}

pins! {
    pub struct NumberOutput as OutputPin {
        OUT = 0 => value: f32,
    }
}

pins! {
    pub struct LogicOutput as OutputPin {
        OUT = 0 => value: bool,
    }
}

pins! {
    pub struct PulseOutput as OutputPin {
        TICK = 0 => tick: crate::Pulse,
    }
}

/// Converts a pin value in seconds to a delay. Negative and NaN become zero,
/// values too large to represent saturate.
pub(crate) fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or(Duration::MAX)
}

/// Creates a node holding `value`, emitted on setup.
pub fn constant_node<T>(
    executor: &mut Executor,
    value: T,
) -> Result<Handle<core::Constant<T>>, GraphError>
where
    T: Clone + Default + 'static,
{
    NodeBuilder::new(core::Constant::new(value)).build(executor)
}

/// Creates a node that pulses on every transaction.
pub fn continuously_node(executor: &mut Executor) -> Result<Handle<core::Continuously>, GraphError> {
    NodeBuilder::new(core::Continuously).build(executor)
}

/// Creates a node that pulses every `interval` while enabled.
pub fn clock_node(
    executor: &mut Executor,
    interval: Duration,
) -> Result<Handle<core::Clock>, GraphError> {
    NodeBuilder::new(core::Clock::default())
        .bind(core::ClockInputs::EN, true)
        .bind(core::ClockInputs::IVAL, interval.as_secs_f32())
        .build(executor)
}
