//! Closed-loop solar tracker running against a simulated board.
//!
//! Two light sensors sit either side of the panel. Their calibrated
//! difference decides whether the panel turns east, west or holds. Two limit
//! switches stop it at the ends of its travel and light an indicator LED
//! each. The tracker alternates between adjusting and sleeping; while it
//! sleeps both motor relays stay off. The [`Sun`] node stands
//! in for the physical world: it sweeps the sun across the sky, moves the
//! panel while a motor relay is energized, and writes the resulting sensor
//! readings back onto the board.
//!
//! Run with `RUST_LOG=debug` to see each transaction.

use std::time::Duration;
use tickflow::nodes::core::{Clock, FlipFlop, FlipFlopInputs, FlipFlopOutput};
use tickflow::nodes::gpio::{
    AnalogRead, AnalogReadOutputs, DigitalRead, DigitalReadOutputs, DigitalWrite,
    DigitalWriteInputs, ReadInputs, SimulatedBoard,
};
use tickflow::nodes::logic::{And, Greater, Less, Not};
use tickflow::nodes::math::{Abs, Multiply, Subtract};
use tickflow::nodes::text::{FormatNumber, FormatNumberInputs, Text, TextOutput};
use tickflow::nodes::time::{DebounceBoolean, DebounceInputs, DebounceOutput};
use tickflow::nodes::{
    LogicInput, LogicOperands, LogicOutput, NumberInput, NumberOutput, Operands, PulseOutput,
    clock_node,
};
use tickflow::prelude::*;
use tickflow::runtime::clock::{DEVICE_TICK, OffsetDateTime, SteppedClock};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

const LEFT_LDR: u8 = 0;
const RIGHT_LDR: u8 = 1;
const EAST_LIMIT: u8 = 2;
const WEST_LIMIT: u8 = 3;
const EAST_RELAY: u8 = 7;
const WEST_RELAY: u8 = 8;
const EAST_LED: u8 = 11;
const WEST_LED: u8 = 12;
const STATUS_LED: u8 = 13;

const LEFT_CALIBRATION: f32 = 1.0;
const RIGHT_CALIBRATION: f32 = 0.97;
const THRESHOLD_TURN: f32 = 0.05;

const SAMPLE_PERIOD: Duration = Duration::from_millis(50);
const SIMULATED_DAY: Duration = Duration::from_secs(60);
/// The tracker adjusts for one period, then sleeps for the next.
const ADJUST_PERIOD: Duration = Duration::from_secs(10);

/// Degrees per second.
const SUN_SPEED: f32 = 2.0;
const PANEL_SPEED: f32 = 10.0;
const TRAVEL_LIMIT: f32 = 70.0;

tickflow::pins! {
    struct SunInputs as InputPin {
        UPD = 0 => update: Pulse,
    }
}

tickflow::pins! {
    struct SunOutputs as OutputPin {
        DONE = 0 => done: Pulse,
    }
}

/// The world outside the board.
struct Sun {
    board: SimulatedBoard,
    start: Option<OffsetDateTime>,
    last_update: Option<OffsetDateTime>,
    panel: f32,
    travel_limit: f32,
}

impl Sun {
    fn new(board: SimulatedBoard) -> Self {
        Self {
            board,
            start: None,
            last_update: None,
            panel: 0.0,
            travel_limit: TRAVEL_LIMIT,
        }
    }

    /// Moves the limit switches in to `degrees` either side of center.
    #[cfg(test)]
    fn with_travel_limit(mut self, degrees: f32) -> Self {
        self.travel_limit = degrees;
        self
    }

    fn sun_angle(&self, now: OffsetDateTime) -> f32 {
        let elapsed = self.start.map_or(0.0, |start| (now - start).as_seconds_f32());
        -60.0 + SUN_SPEED * elapsed
    }
}

impl Node for Sun {
    type Inputs = SunInputs;
    type Outputs = SunOutputs;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        if !ctx.is_input_dirty(SunInputs::UPD) {
            return;
        }

        let now = ctx.unix_time();
        let start = *self.start.get_or_insert(now);
        let step = self
            .last_update
            .replace(now)
            .map_or(0.0, |last| (now - last).as_seconds_f32());

        let east = self.board.digital_level(EAST_RELAY).unwrap_or_default();
        let west = self.board.digital_level(WEST_RELAY).unwrap_or_default();
        if east != west {
            let direction = if east { 1.0 } else { -1.0 };
            self.panel = (self.panel + direction * PANEL_SPEED * step)
                .clamp(-self.travel_limit, self.travel_limit);
        }

        let error = self.sun_angle(now) - self.panel;
        self.board
            .set_analog_input(LEFT_LDR, (0.5 + error / 120.0) / LEFT_CALIBRATION);
        self.board
            .set_analog_input(RIGHT_LDR, (0.5 - error / 120.0) / RIGHT_CALIBRATION);
        self.board
            .set_digital_input(EAST_LIMIT, self.panel >= self.travel_limit);
        self.board
            .set_digital_input(WEST_LIMIT, self.panel <= -self.travel_limit);

        debug!(
            elapsed = (now - start).as_seconds_f32(),
            sun = self.sun_angle(now),
            panel = self.panel,
            "world updated"
        );
        ctx.emit(SunOutputs::DONE, Pulse);
    }
}

tickflow::pins! {
    struct ReportInputs as InputPin {
        DIFF = 0 => difference: Text,
        TURN = 1 => turning: bool,
        SLEEP = 2 => sleeping: bool,
    }
}

tickflow::pins! {
    struct NoOutputs as OutputPin {}
}

/// Logs every change of the debounced turn decision or the sleep state.
#[derive(Default)]
struct Report;

impl Node for Report {
    type Inputs = ReportInputs;
    type Outputs = NoOutputs;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        if ctx.is_input_dirty(ReportInputs::TURN) || ctx.is_input_dirty(ReportInputs::SLEEP) {
            info!(
                turning = *ctx.input(ReportInputs::TURN),
                sleeping = *ctx.input(ReportInputs::SLEEP),
                difference = %ctx.input(ReportInputs::DIFF),
                "tracker state"
            );
        }
    }
}

fn scaled(
    executor: &mut Executor,
    reading: &Handle<AnalogRead<SimulatedBoard>>,
    calibration: f32,
) -> Result<Handle<Multiply>, GraphError> {
    NodeBuilder::new(Multiply)
        .link(Operands::IN1, reading, AnalogReadOutputs::VAL)
        .bind(Operands::IN2, calibration)
        .build(executor)
}

/// `drive AND NOT blocker`
fn blocked_by<N: Node>(
    executor: &mut Executor,
    drive: &Handle<And>,
    blocker: &Handle<N>,
    blocker_pin: OutputPin<N::Outputs, bool>,
) -> Result<Handle<And>, GraphError> {
    let free = NodeBuilder::new(Not)
        .link(LogicInput::IN, blocker, blocker_pin)
        .build(executor)?;
    NodeBuilder::new(And)
        .link(LogicOperands::IN1, drive, LogicOutput::OUT)
        .link(LogicOperands::IN2, &free, LogicOutput::OUT)
        .build(executor)
}

fn digital_out<N: Node>(
    executor: &mut Executor,
    board: &SimulatedBoard,
    port: u8,
    signal: &Handle<N>,
    signal_pin: OutputPin<N::Outputs, bool>,
    tick: &Handle<Clock>,
) -> Result<Handle<DigitalWrite<SimulatedBoard>>, GraphError> {
    NodeBuilder::new(DigitalWrite::new(board.clone()))
        .named(format!("out {port}"))
        .bind(DigitalWriteInputs::PORT, port)
        .link(DigitalWriteInputs::SIG, signal, signal_pin)
        .link(DigitalWriteInputs::UPD, tick, PulseOutput::TICK)
        .build(executor)
}

fn build_tracker(
    executor: &mut Executor,
    board: &SimulatedBoard,
    sun: Sun,
) -> Result<(), GraphError> {
    let tick = clock_node(executor, SAMPLE_PERIOD)?;
    let sun = NodeBuilder::new(sun)
        .named("sun")
        .link(SunInputs::UPD, &tick, PulseOutput::TICK)
        .build(executor)?;

    let ldr = |executor: &mut Executor, port: u8| {
        NodeBuilder::new(AnalogRead::new(board.clone()))
            .named(format!("ldr {port}"))
            .bind(ReadInputs::PORT, port)
            .link(ReadInputs::UPD, &sun, SunOutputs::DONE)
            .build(executor)
    };
    let left = ldr(executor, LEFT_LDR)?;
    let right = ldr(executor, RIGHT_LDR)?;
    let left = scaled(executor, &left, LEFT_CALIBRATION)?;
    let right = scaled(executor, &right, RIGHT_CALIBRATION)?;

    let difference = NodeBuilder::new(Subtract)
        .link(Operands::IN1, &left, NumberOutput::OUT)
        .link(Operands::IN2, &right, NumberOutput::OUT)
        .build(executor)?;
    let magnitude = NodeBuilder::new(Abs)
        .link(NumberInput::IN, &difference, NumberOutput::OUT)
        .build(executor)?;
    let turn = NodeBuilder::new(Greater)
        .named("turn")
        .link(Operands::IN1, &magnitude, NumberOutput::OUT)
        .bind(Operands::IN2, THRESHOLD_TURN)
        .build(executor)?;

    let east = NodeBuilder::new(Greater)
        .link(Operands::IN1, &difference, NumberOutput::OUT)
        .build(executor)?;
    let west = NodeBuilder::new(Less)
        .link(Operands::IN1, &difference, NumberOutput::OUT)
        .build(executor)?;
    let drive_east = NodeBuilder::new(And)
        .link(LogicOperands::IN1, &turn, LogicOutput::OUT)
        .link(LogicOperands::IN2, &east, LogicOutput::OUT)
        .build(executor)?;
    let drive_west = NodeBuilder::new(And)
        .link(LogicOperands::IN1, &turn, LogicOutput::OUT)
        .link(LogicOperands::IN2, &west, LogicOutput::OUT)
        .build(executor)?;

    let limit = |executor: &mut Executor, port: u8| {
        NodeBuilder::new(DigitalRead::new(board.clone()))
            .named(format!("limit {port}"))
            .bind(ReadInputs::PORT, port)
            .link(ReadInputs::UPD, &sun, SunOutputs::DONE)
            .build(executor)
    };
    let east_limit = limit(executor, EAST_LIMIT)?;
    let west_limit = limit(executor, WEST_LIMIT)?;
    let drive_east = blocked_by(executor, &drive_east, &east_limit, DigitalReadOutputs::SIG)?;
    let drive_west = blocked_by(executor, &drive_west, &west_limit, DigitalReadOutputs::SIG)?;
    digital_out(executor, board, EAST_LED, &east_limit, DigitalReadOutputs::SIG, &tick)?;
    digital_out(executor, board, WEST_LED, &west_limit, DigitalReadOutputs::SIG, &tick)?;

    let sleep_cycle = clock_node(executor, ADJUST_PERIOD)?;
    let sleeping = NodeBuilder::new(FlipFlop)
        .named("sleeping")
        .link(FlipFlopInputs::TGL, &sleep_cycle, PulseOutput::TICK)
        .build(executor)?;
    let drive_east = blocked_by(executor, &drive_east, &sleeping, FlipFlopOutput::MEM)?;
    let drive_west = blocked_by(executor, &drive_west, &sleeping, FlipFlopOutput::MEM)?;

    digital_out(executor, board, EAST_RELAY, &drive_east, LogicOutput::OUT, &tick)?;
    digital_out(executor, board, WEST_RELAY, &drive_west, LogicOutput::OUT, &tick)?;

    let settled = NodeBuilder::new(DebounceBoolean::default())
        .link(DebounceInputs::ST, &turn, LogicOutput::OUT)
        .bind(DebounceInputs::TS, 0.5)
        .build(executor)?;
    digital_out(executor, board, STATUS_LED, &settled, DebounceOutput::OUT, &tick)?;

    let formatted = NodeBuilder::new(FormatNumber)
        .link(FormatNumberInputs::NUM, &difference, NumberOutput::OUT)
        .bind(FormatNumberInputs::DIG, 3)
        .build(executor)?;
    NodeBuilder::new(Report)
        .link(ReportInputs::DIFF, &formatted, TextOutput::OUT)
        .link(ReportInputs::TURN, &settled, DebounceOutput::OUT)
        .link(ReportInputs::SLEEP, &sleeping, FlipFlopOutput::MEM)
        .build(executor)?;

    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let board = SimulatedBoard::uno();
    let dawn = OffsetDateTime::UNIX_EPOCH + Duration::from_secs(6 * 3600);
    let day = SteppedClock::spanning(SIMULATED_DAY, DEVICE_TICK).starting_at(dawn);
    let mut runtime = SimulationRuntime::new(day);
    build_tracker(runtime.executor(), &board, Sun::new(board.clone()))?;
    debug!(graph = %runtime.executor().to_dot(), "tracker graph");

    let transactions = runtime.run_until_completion()?;
    info!(
        transactions,
        nodes = runtime.executor().node_count(),
        writes = board.write_count(),
        "simulated day complete"
    );

    Ok(())
}
