//! Transaction engine for static dataflow graphs.
//!
//! # Architecture Overview
//!
//! ## Computation Model
//! - **Nodes**: values implementing [`Node`], holding their own state and
//!   reading/writing typed pins
//! - **Links**: an input pin wired to one upstream output pin
//! - **Transactions**: one pass over the graph per tick; only dirty nodes run
//! - **Dirtiness**: emitting an output marks it; marked outputs schedule their
//!   consumers later in the same pass
//! - **Timeouts**: a node may ask to be re-run once a delay has elapsed
//!
//! ## Core Components
//!
//! ### [`Executor`]
//! Owns the node arena and topology and runs [`transaction`](Executor::transaction)s.
//!
//! ### [`NodeBuilder<N>`] and [`Handle<N>`]
//! Build-time wiring. Nodes are created leaves first, so creation order is
//! a valid evaluation order and cycles cannot be expressed.
//!
//! ### [`Context<N>`]
//! What a node sees while it evaluates: input copies, its outputs, its
//! timeout and the transaction's time snapshot.
//!
//! ### [`Runtime<C>`]
//! Pairs an executor with a [`Clock`] and drives transactions:
//! - [`RealtimeRuntime`]: wall time, runs until shutdown
//! - [`SimulationRuntime`]: a fixed budget of device ticks, runs to completion
//! - `TestRuntime`: manually advanced time, one transaction at a time
//!
//! # Usage
//! ```rust, ignore
//! use tickflow::prelude::*;
//! use tickflow::nodes::core::Clock as Ticker;
//!
//! let mut runtime = RealtimeRuntime::new(ExecutionMode::Park);
//! let ticker = NodeBuilder::new(Ticker::default())
//!     .bind(Ticker::IVAL, 0.5)
//!     .build(runtime.executor())?;
//!
//! runtime.run_forever()?;
//! ```

pub mod clock;
mod context;
mod executor;
mod graph;
mod node;
mod notifier;
mod timeout;

use derive_builder::Builder;
use enum_as_inner::EnumAsInner;
use std::time::Duration;

#[cfg(feature = "signals")]
use std::sync::{Arc, atomic::AtomicBool};

pub use clock::*;
pub use context::*;
pub use executor::*;
pub use graph::{GraphError, GraphId, Link, NodeMeta};
pub use node::{Handle, Node, NodeBuilder, NodeHandle, RawHandle};
pub use notifier::*;
pub use timeout::*;

const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(10);

/// CPU/latency trade-off for [`Runtime::run_forever`].
///
/// - `Spin`: back-to-back transactions. Lowest latency, one core busy.
/// - `Park`: sleeps between transactions when nothing is pending, waking for
///   the next timeout or after `idle_sleep`, whichever is first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumAsInner)]
pub enum ExecutionMode {
    Spin,
    Park,
}

#[derive(Debug, Clone, Builder)]
pub struct RuntimeConfig {
    #[builder(default = "ExecutionMode::Park")]
    pub mode: ExecutionMode,

    /// Longest a parked runtime sleeps, which bounds how long an external
    /// [`Notifier`] request can wait.
    #[builder(default = "DEFAULT_IDLE_SLEEP")]
    pub idle_sleep: Duration,

    #[builder(default = "executor::DEFAULT_NOTIFICATION_CAPACITY")]
    pub notification_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Park,
            idle_sleep: DEFAULT_IDLE_SLEEP,
            notification_capacity: executor::DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

#[cfg(any(test, feature = "testing"))]
pub type TestRuntime = Runtime<TestClock>;
pub type RealtimeRuntime = Runtime<PrecisionClock>;
pub type SimulationRuntime = Runtime<SteppedClock>;

pub struct Runtime<C: Clock> {
    executor: Executor,

    clock: C,

    config: RuntimeConfig,

    #[cfg(feature = "signals")]
    shutdown: Arc<AtomicBool>,
}

impl<C: Clock> Runtime<C> {
    pub fn with_clock(clock: C, config: RuntimeConfig) -> Self {
        Self {
            executor: Executor::with_notification_capacity(config.notification_capacity),
            clock,
            config,
            #[cfg(feature = "signals")]
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub const fn executor(&mut self) -> &mut Executor {
        &mut self.executor
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Runs a single transaction at the clock's current time.
    pub fn run_one_cycle(&mut self) -> Result<TransactionReport, ExecutorError> {
        self.executor.transaction(&mut self.clock)
    }

    pub fn run_cycles(&mut self, cycles: usize) -> Result<(), ExecutorError> {
        for _ in 0..cycles {
            self.run_one_cycle()?;
        }
        Ok(())
    }

    /// Sleeps until the next timeout, capped by `idle_sleep`, unless work is
    /// already pending.
    fn park(&self) {
        if self.executor.has_pending_work() {
            return;
        }

        let idle_sleep = self.config.idle_sleep;
        let sleep = self
            .executor
            .next_deadline()
            .map_or(idle_sleep, |deadline| {
                deadline
                    .saturating_duration_since(std::time::Instant::now())
                    .min(idle_sleep)
            });

        if !sleep.is_zero() {
            std::thread::sleep(sleep);
        }
    }

    fn run_cycle_in_mode(&mut self) -> Result<(), ExecutorError> {
        self.run_one_cycle()?;
        if self.config.mode.is_park() {
            self.park();
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "testing"))]
impl Runtime<TestClock> {
    pub fn new() -> Self {
        Self::with_clock(
            TestClock::new(),
            RuntimeConfig {
                mode: ExecutionMode::Spin,
                ..RuntimeConfig::default()
            },
        )
    }

    pub fn advance_clock(&mut self, duration: Duration) {
        self.clock.advance(duration);
    }
}

#[cfg(any(test, feature = "testing"))]
impl Default for Runtime<TestClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime<SteppedClock> {
    pub fn new(clock: SteppedClock) -> Self {
        Self::with_clock(
            clock,
            RuntimeConfig {
                mode: ExecutionMode::Spin,
                ..RuntimeConfig::default()
            },
        )
    }

    /// Device ticks of [`DEVICE_TICK`] covering `span`.
    pub fn spanning(span: Duration) -> Self {
        Self::new(SteppedClock::spanning(span, DEVICE_TICK))
    }

    /// Runs one transaction per tick until the clock's budget is spent.
    /// Returns the number of transactions run.
    pub fn run_until_completion(&mut self) -> Result<u64, ExecutorError> {
        let mut transactions = 0;
        while !self.clock.is_exhausted() {
            self.run_one_cycle()?;
            transactions += 1;
        }
        tracing::debug!(transactions, elapsed = ?self.clock.elapsed(), "simulation ticks spent");
        Ok(transactions)
    }
}

impl Runtime<PrecisionClock> {
    pub fn new(mode: ExecutionMode) -> Self {
        Self::with_config(RuntimeConfig {
            mode,
            ..RuntimeConfig::default()
        })
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self::with_clock(PrecisionClock::new(), config)
    }

    #[cfg(feature = "signals")]
    pub fn enable_graceful_shutdown(&self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use signal_hook::consts::{SIGINT, SIGTERM};
            use signal_hook::flag;
            flag::register(SIGINT, self.shutdown.clone())?;
            flag::register(SIGTERM, self.shutdown.clone())?;
        }

        #[cfg(not(unix))]
        {
            return Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "signal handling is only supported on unix platforms",
            ));
        }

        Ok(())
    }

    /// Runs transactions until a shutdown signal arrives or a transaction
    /// fails.
    #[cfg(feature = "signals")]
    pub fn run_forever(&mut self) -> Result<(), ExecutorError> {
        use std::sync::atomic::Ordering;
        tracing::info!(mode = ?self.config.mode, nodes = self.executor.node_count(), "runtime started");
        while !self.shutdown.load(Ordering::Relaxed) {
            self.run_cycle_in_mode()?;
        }
        tracing::info!(transactions = self.executor.transactions(), "runtime shut down");
        Ok(())
    }

    /// Runs transactions until one fails.
    #[cfg(not(feature = "signals"))]
    pub fn run_forever(&mut self) -> Result<(), ExecutorError> {
        tracing::info!(mode = ?self.config.mode, nodes = self.executor.node_count(), "runtime started");
        loop {
            self.run_cycle_in_mode()?;
        }
    }
}
