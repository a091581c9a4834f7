//! # GPIO Nodes
//!
//! Digital and analog pins behind the [`Hal`] trait. Every node acts only
//! when its `UPD` input pulses, then reports the outcome:
//!
//! - `DONE` pulses after a successful read or write
//! - `ERR` goes true when the port does not support the operation, and back
//!   to false on the next success
//!
//! [`SimulatedBoard`] implements [`Hal`] in memory for tests and simulations.

use crate::Pulse;
use crate::pin::OutputPin;
use crate::pins;
use crate::runtime::{Context, Node};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;

/// Access to the pins of a board.
///
/// Port numbering is board specific: digital and PWM operations address
/// digital ports, analog reads address analog channels.
pub trait Hal: 'static {
    fn is_valid_digital_port(&self, port: u8) -> bool;

    fn is_valid_analog_port(&self, port: u8) -> bool;

    fn is_valid_pwm_port(&self, port: u8) -> bool;

    fn digital_read(&mut self, port: u8) -> bool;

    fn digital_write(&mut self, port: u8, level: bool);

    /// Reads an analog channel, scaled to `0.0..=1.0`.
    fn analog_read(&mut self, port: u8) -> f32;

    /// Sets the duty cycle of a PWM port, `0.0..=1.0`.
    fn pwm_write(&mut self, port: u8, duty: f32);
}

/// Emits `DONE`, and clears `ERR` if a previous attempt had set it.
fn succeed<N: Node>(
    ctx: &mut Context<'_, N>,
    done: OutputPin<N::Outputs, Pulse>,
    error: OutputPin<N::Outputs, bool>,
) {
    ctx.emit(done, Pulse);
    if *ctx.output(error) {
        ctx.emit(error, false);
    }
}

fn fail<N: Node>(ctx: &mut Context<'_, N>, error: OutputPin<N::Outputs, bool>, port: u8) {
    warn!(
        node = ctx.current().index(),
        port,
        kind = std::any::type_name::<N>(),
        "unsupported port"
    );
    ctx.emit(error, true);
}

pins! {
    pub struct ReadInputs as InputPin {
        PORT = 0 => port: u8,
        /// Triggers a read.
        UPD = 1 => update: Pulse,
    }
}

pins! {
    pub struct DigitalReadOutputs as OutputPin {
        SIG = 0 => signal: bool,
        DONE = 1 => done: Pulse,
        ERR = 2 => error: bool,
    }
}

/// Reads the level of a digital port.
#[derive(Debug, Clone, Default)]
pub struct DigitalRead<H> {
    hal: H,
}

impl<H: Hal> DigitalRead<H> {
    pub const fn new(hal: H) -> Self {
        Self { hal }
    }
}

impl<H: Hal> Node for DigitalRead<H> {
    type Inputs = ReadInputs;
    type Outputs = DigitalReadOutputs;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        if !ctx.is_input_dirty(ReadInputs::UPD) {
            return;
        }

        let port = *ctx.input(ReadInputs::PORT);
        if !self.hal.is_valid_digital_port(port) {
            fail(ctx, DigitalReadOutputs::ERR, port);
            return;
        }

        let level = self.hal.digital_read(port);
        ctx.emit(DigitalReadOutputs::SIG, level);
        succeed(ctx, DigitalReadOutputs::DONE, DigitalReadOutputs::ERR);
    }
}

pins! {
    pub struct AnalogReadOutputs as OutputPin {
        /// Reading scaled to `0.0..=1.0`.
        VAL = 0 => value: f32,
        DONE = 1 => done: Pulse,
        ERR = 2 => error: bool,
    }
}

/// Reads an analog channel.
#[derive(Debug, Clone, Default)]
pub struct AnalogRead<H> {
    hal: H,
}

impl<H: Hal> AnalogRead<H> {
    pub const fn new(hal: H) -> Self {
        Self { hal }
    }
}

impl<H: Hal> Node for AnalogRead<H> {
    type Inputs = ReadInputs;
    type Outputs = AnalogReadOutputs;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        if !ctx.is_input_dirty(ReadInputs::UPD) {
            return;
        }

        let port = *ctx.input(ReadInputs::PORT);
        if !self.hal.is_valid_analog_port(port) {
            fail(ctx, AnalogReadOutputs::ERR, port);
            return;
        }

        let value = self.hal.analog_read(port);
        ctx.emit(AnalogReadOutputs::VAL, value);
        succeed(ctx, AnalogReadOutputs::DONE, AnalogReadOutputs::ERR);
    }
}

pins! {
    pub struct DigitalWriteInputs as InputPin {
        PORT = 0 => port: u8,
        SIG = 1 => signal: bool,
        /// Triggers a write.
        UPD = 2 => update: Pulse,
    }
}

pins! {
    pub struct WriteOutputs as OutputPin {
        DONE = 0 => done: Pulse,
        ERR = 1 => error: bool,
    }
}

/// Drives a digital port to `SIG`.
#[derive(Debug, Clone, Default)]
pub struct DigitalWrite<H> {
    hal: H,
}

impl<H: Hal> DigitalWrite<H> {
    pub const fn new(hal: H) -> Self {
        Self { hal }
    }
}

impl<H: Hal> Node for DigitalWrite<H> {
    type Inputs = DigitalWriteInputs;
    type Outputs = WriteOutputs;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        if !ctx.is_input_dirty(DigitalWriteInputs::UPD) {
            return;
        }

        let port = *ctx.input(DigitalWriteInputs::PORT);
        if !self.hal.is_valid_digital_port(port) {
            fail(ctx, WriteOutputs::ERR, port);
            return;
        }

        self.hal.digital_write(port, *ctx.input(DigitalWriteInputs::SIG));
        succeed(ctx, WriteOutputs::DONE, WriteOutputs::ERR);
    }
}

pins! {
    pub struct PwmWriteInputs as InputPin {
        PORT = 0 => port: u8,
        /// Duty cycle, clamped to `0.0..=1.0`. NaN writes zero.
        DUTY = 1 => duty: f32,
        UPD = 2 => update: Pulse,
    }
}

/// Sets the duty cycle of a PWM-capable port.
#[derive(Debug, Clone, Default)]
pub struct PwmWrite<H> {
    hal: H,
}

impl<H: Hal> PwmWrite<H> {
    pub const fn new(hal: H) -> Self {
        Self { hal }
    }
}

impl<H: Hal> Node for PwmWrite<H> {
    type Inputs = PwmWriteInputs;
    type Outputs = WriteOutputs;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        if !ctx.is_input_dirty(PwmWriteInputs::UPD) {
            return;
        }

        let port = *ctx.input(PwmWriteInputs::PORT);
        if !self.hal.is_valid_pwm_port(port) {
            fail(ctx, WriteOutputs::ERR, port);
            return;
        }

        let duty = ctx.input(PwmWriteInputs::DUTY).clamp(0.0, 1.0);
        let duty = if duty.is_nan() { 0.0 } else { duty };
        self.hal.pwm_write(port, duty);
        succeed(ctx, WriteOutputs::DONE, WriteOutputs::ERR);
    }
}

#[derive(Debug)]
struct BoardState {
    digital: Vec<bool>,
    analog: Vec<f32>,
    pwm_ports: Vec<u8>,
    duty: Vec<f32>,
    writes: usize,
}

/// In-memory board. Clones share the same pins, so a test keeps one clone to
/// set inputs and inspect outputs while the nodes hold the others.
///
/// The default board is laid out like an Arduino Uno: 20 digital ports, 6
/// analog channels and PWM on ports 3, 5, 6, 9, 10 and 11.
#[derive(Debug, Clone)]
pub struct SimulatedBoard {
    state: Rc<RefCell<BoardState>>,
}

impl SimulatedBoard {
    pub fn new(digital_ports: u8, analog_ports: u8, pwm_ports: &[u8]) -> Self {
        let state = BoardState {
            digital: vec![false; usize::from(digital_ports)],
            analog: vec![0.0; usize::from(analog_ports)],
            pwm_ports: pwm_ports.iter().copied().filter(|p| *p < digital_ports).collect(),
            duty: vec![0.0; usize::from(digital_ports)],
            writes: 0,
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn uno() -> Self {
        Self::new(20, 6, &[3, 5, 6, 9, 10, 11])
    }

    /// Sets the level seen by reads of a digital port. Ignored for unknown
    /// ports.
    pub fn set_digital_input(&self, port: u8, level: bool) {
        if let Some(slot) = self.state.borrow_mut().digital.get_mut(usize::from(port)) {
            *slot = level;
        }
    }

    /// Sets an analog channel, clamped to `0.0..=1.0`.
    pub fn set_analog_input(&self, port: u8, value: f32) {
        if let Some(slot) = self.state.borrow_mut().analog.get_mut(usize::from(port)) {
            *slot = value.clamp(0.0, 1.0);
        }
    }

    pub fn digital_level(&self, port: u8) -> Option<bool> {
        self.state.borrow().digital.get(usize::from(port)).copied()
    }

    pub fn pwm_duty(&self, port: u8) -> Option<f32> {
        self.state.borrow().duty.get(usize::from(port)).copied()
    }

    /// Number of digital and PWM writes performed so far.
    pub fn write_count(&self) -> usize {
        self.state.borrow().writes
    }
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self::uno()
    }
}

impl Hal for SimulatedBoard {
    fn is_valid_digital_port(&self, port: u8) -> bool {
        usize::from(port) < self.state.borrow().digital.len()
    }

    fn is_valid_analog_port(&self, port: u8) -> bool {
        usize::from(port) < self.state.borrow().analog.len()
    }

    fn is_valid_pwm_port(&self, port: u8) -> bool {
        self.state.borrow().pwm_ports.contains(&port)
    }

    fn digital_read(&mut self, port: u8) -> bool {
        self.digital_level(port).unwrap_or_default()
    }

    fn digital_write(&mut self, port: u8, level: bool) {
        let mut state = self.state.borrow_mut();
        if let Some(slot) = state.digital.get_mut(usize::from(port)) {
            *slot = level;
            state.writes += 1;
        }
    }

    fn analog_read(&mut self, port: u8) -> f32 {
        self.state
            .borrow()
            .analog
            .get(usize::from(port))
            .copied()
            .unwrap_or_default()
    }

    fn pwm_write(&mut self, port: u8, duty: f32) {
        let mut state = self.state.borrow_mut();
        if let Some(slot) = state.duty.get_mut(usize::from(port)) {
            *slot = duty;
            state.writes += 1;
        }
    }
}
