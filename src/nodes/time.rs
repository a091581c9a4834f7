//! # Time-Based Nodes
//!
//! Nodes that wait. Neither blocks: waiting means arming the node's timeout
//! and returning, and the node runs again once the timeout fires.

use crate::Pulse;
use crate::nodes::seconds;
use crate::pins;
use crate::runtime::{Context, Node};

pins! {
    pub struct DebounceInputs as InputPin {
        /// The raw, bouncing state.
        ST = 0 => state: bool,
        /// Stability window in seconds.
        TS = 1 => window: f32,
    }
}

pins! {
    pub struct DebounceOutput as OutputPin {
        OUT = 0 => value: bool,
    }
}

/// Passes `ST` through once it has held the same value for `TS` seconds.
///
/// Every change of `ST` restarts the window, so a burst of flips produces a
/// single emission carrying the last value, one full window after the last
/// flip.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebounceBoolean {
    last: bool,
}

impl Node for DebounceBoolean {
    type Inputs = DebounceInputs;
    type Outputs = DebounceOutput;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        let state = *ctx.input(DebounceInputs::ST);
        if state != self.last {
            self.last = state;
            let window = seconds(*ctx.input(DebounceInputs::TS));
            ctx.set_timeout(window);
        }

        if ctx.is_timed_out() {
            ctx.emit(DebounceOutput::OUT, state);
        }
    }
}

pins! {
    pub struct DelayInputs as InputPin {
        /// Delay in seconds.
        T = 0 => delay: f32,
        /// Starts (or restarts) the delay.
        SET = 1 => set: Pulse,
        /// Cancels a running delay.
        RST = 2 => reset: Pulse,
    }
}

pins! {
    pub struct DelayOutputs as OutputPin {
        /// Fires once the delay elapses.
        DONE = 0 => done: Pulse,
        /// True while a delay is running.
        ACT = 1 => active: bool,
    }
}

/// Delays a pulse by `T` seconds. `RST` wins over `SET`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Delay;

impl Node for Delay {
    type Inputs = DelayInputs;
    type Outputs = DelayOutputs;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        if ctx.is_input_dirty(DelayInputs::RST) {
            ctx.clear_timeout();
            ctx.emit(DelayOutputs::ACT, false);
            return;
        }

        if ctx.is_input_dirty(DelayInputs::SET) {
            let delay = seconds(*ctx.input(DelayInputs::T));
            ctx.set_timeout(delay);
            ctx.emit(DelayOutputs::ACT, true);
            return;
        }

        if ctx.is_timed_out() {
            ctx.emit(DelayOutputs::DONE, Pulse);
            ctx.emit(DelayOutputs::ACT, false);
        }
    }
}
