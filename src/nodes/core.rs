//! # Core Nodes
//!
//! Value sources, clock sources and one bit of memory. The clock sources keep
//! themselves alive through their own timeouts: nothing outside the graph has
//! to mark them dirty.

use crate::Pulse;
use crate::nodes::{NoInputs, PulseOutput, seconds};
use crate::pin::{InputPin, OutputPin};
use crate::pins;
use crate::runtime::{Context, Node};
use std::time::{Duration, Instant};

/// Output of [`Constant`].
#[derive(Debug, Clone, Default)]
pub struct ValueOutput<T> {
    pub value: T,
}

impl<T> ValueOutput<T> {
    fn read(pins: &Self) -> &T {
        &pins.value
    }

    fn write(pins: &mut Self) -> &mut T {
        &mut pins.value
    }
}

/// Holds a value and emits it whenever evaluated: on setup, and on any
/// later transaction in which it was marked dirty.
#[derive(Debug, Clone, Default)]
pub struct Constant<T> {
    value: T,
}

impl<T> Constant<T> {
    pub const VAL: OutputPin<ValueOutput<T>, T> =
        OutputPin::new(0, ValueOutput::<T>::read, ValueOutput::<T>::write);

    pub const fn new(value: T) -> Self {
        Self { value }
    }

    pub const fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default + 'static> Node for Constant<T> {
    type Inputs = NoInputs;
    type Outputs = ValueOutput<T>;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        ctx.emit(Self::VAL, self.value.clone());
    }
}

/// Pulses on every transaction, forever.
///
/// Each evaluation fires `TICK` and re-arms a zero-delay timeout, which is
/// already due at the start of the next transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Continuously;

impl Node for Continuously {
    type Inputs = NoInputs;
    type Outputs = PulseOutput;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        ctx.emit(PulseOutput::TICK, Pulse);
        ctx.set_timeout(Duration::ZERO);
    }
}

pins! {
    pub struct BootOutput as OutputPin {
        BOOT = 0 => boot: Pulse,
    }
}

/// Pulses once, during the setup transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct Boot;

impl Node for Boot {
    type Inputs = NoInputs;
    type Outputs = BootOutput;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        if ctx.is_setting_up() {
            ctx.emit(BootOutput::BOOT, Pulse);
        }
    }
}

pins! {
    pub struct ClockInputs as InputPin {
        /// Runs while true. Bind `true` for a free-running clock.
        EN = 0 => enabled: bool,
        /// Period in seconds.
        IVAL = 1 => interval: f32,
        /// Restarts the period from now.
        RST = 2 => reset: Pulse,
    }
}

/// Pulses `TICK` every `IVAL` seconds while `EN` is true.
///
/// Disabling clears the pending tick. Enabling, or pulsing `RST`, starts a
/// fresh period unless one consistent with the current interval is already
/// running.
#[derive(Debug, Clone, Copy, Default)]
pub struct Clock {
    next_tick: Option<Instant>,
}

impl Clock {
    pub const EN: InputPin<ClockInputs, bool> = ClockInputs::EN;
    pub const IVAL: InputPin<ClockInputs, f32> = ClockInputs::IVAL;
    pub const RST: InputPin<ClockInputs, Pulse> = ClockInputs::RST;
    pub const TICK: OutputPin<PulseOutput, Pulse> = PulseOutput::TICK;

    pub const fn next_tick(&self) -> Option<Instant> {
        self.next_tick
    }
}

impl Node for Clock {
    type Inputs = ClockInputs;
    type Outputs = PulseOutput;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        let now = ctx.now();
        let interval = seconds(*ctx.input(ClockInputs::IVAL));
        let next = now.checked_add(interval);
        let enabled = *ctx.input(ClockInputs::EN);
        let reset = ctx.is_input_dirty(ClockInputs::RST);

        if ctx.is_timed_out() && enabled && !reset {
            ctx.emit(PulseOutput::TICK, Pulse);
            self.next_tick = next;
            ctx.set_timeout(interval);
        }

        if reset || ctx.is_input_dirty(ClockInputs::EN) || ctx.is_setting_up() {
            if !enabled {
                self.next_tick = None;
                ctx.clear_timeout();
            } else if reset || self.next_tick.is_none_or(|at| at < now || Some(at) > next) {
                self.next_tick = next;
                ctx.set_timeout(interval);
            }
        }
    }
}

pins! {
    pub struct FlipFlopInputs as InputPin {
        SET = 0 => set: Pulse,
        RST = 1 => reset: Pulse,
        TGL = 2 => toggle: Pulse,
    }
}

pins! {
    pub struct FlipFlopOutput as OutputPin {
        MEM = 0 => memory: bool,
    }
}

/// One bit of memory. `RST` wins over `SET`, which wins over `TGL`.
/// `MEM` is only emitted when the bit actually changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlipFlop;

impl Node for FlipFlop {
    type Inputs = FlipFlopInputs;
    type Outputs = FlipFlopOutput;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        let current = *ctx.output(FlipFlopOutput::MEM);
        let next = if ctx.is_input_dirty(FlipFlopInputs::RST) {
            false
        } else if ctx.is_input_dirty(FlipFlopInputs::SET) {
            true
        } else if ctx.is_input_dirty(FlipFlopInputs::TGL) {
            !current
        } else {
            current
        };

        if next != current {
            ctx.emit(FlipFlopOutput::MEM, next);
        }
    }
}
