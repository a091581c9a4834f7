use crate::pin::{InputPin, OutputPin};
use crate::runtime::clock::CycleTime;
use crate::runtime::node::{DirtyFlags, Node};
use crate::runtime::timeout::Timeout;
use petgraph::prelude::NodeIndex;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

/// Transaction-wide state shared by every evaluation in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeContext {
    time: CycleTime,
    transaction: u64,
}

impl RuntimeContext {
    pub(crate) const fn new(time: CycleTime, transaction: u64) -> Self {
        Self { time, transaction }
    }

    #[inline(always)]
    pub const fn cycle_time(&self) -> CycleTime {
        self.time
    }

    #[inline(always)]
    pub const fn now(&self) -> Instant {
        self.time.now()
    }

    /// One-based number of this transaction.
    #[inline(always)]
    pub const fn transaction(&self) -> u64 {
        self.transaction
    }

    /// True only during the first transaction of an executor.
    #[inline(always)]
    pub const fn is_setting_up(&self) -> bool {
        self.transaction == 1
    }
}

/// Everything a node may touch while it evaluates.
///
/// Input values are copies taken just before the evaluation, so upstream
/// state cannot change underneath a node. Pins are typed by the node's own
/// `Inputs` and `Outputs`, so reading an input or emitting an output the node
/// did not declare does not compile.
pub struct Context<'a, N: Node> {
    runtime: &'a RuntimeContext,
    current: NodeIndex,
    inputs: N::Inputs,
    input_dirty: u32,
    outputs: &'a mut N::Outputs,
    flags: &'a mut DirtyFlags,
    timeout: &'a mut Timeout,
}

impl<'a, N: Node> Context<'a, N> {
    pub(crate) fn new(
        runtime: &'a RuntimeContext,
        current: NodeIndex,
        inputs: N::Inputs,
        input_dirty: u32,
        outputs: &'a mut N::Outputs,
        flags: &'a mut DirtyFlags,
        timeout: &'a mut Timeout,
    ) -> Self {
        Self {
            runtime,
            current,
            inputs,
            input_dirty,
            outputs,
            flags,
            timeout,
        }
    }

    #[inline(always)]
    pub fn input<T>(&self, pin: InputPin<N::Inputs, T>) -> &T {
        pin.get(&self.inputs)
    }

    /// Whether the upstream output linked to `pin` changed in this
    /// transaction. Always `false` for a bound (unlinked) input.
    #[inline(always)]
    pub fn is_input_dirty<T>(&self, pin: InputPin<N::Inputs, T>) -> bool {
        self.input_dirty & pin.mask() != 0
    }

    /// Whether any linked input changed in this transaction.
    #[inline(always)]
    pub const fn any_input_dirty(&self) -> bool {
        self.input_dirty != 0
    }

    /// Writes an output and marks it dirty, scheduling its consumers.
    #[inline(always)]
    pub fn emit<T>(&mut self, pin: OutputPin<N::Outputs, T>, value: T) {
        *pin.get_mut(self.outputs) = value;
        self.flags.mark_outputs(pin.mask());
    }

    /// Marks an output dirty without changing its value. This is how pulse
    /// outputs fire.
    #[inline(always)]
    pub fn touch<T>(&mut self, pin: OutputPin<N::Outputs, T>) {
        self.flags.mark_outputs(pin.mask());
    }

    /// The value last emitted on `pin`, or its default if never emitted.
    #[inline(always)]
    pub fn output<T>(&self, pin: OutputPin<N::Outputs, T>) -> &T {
        pin.get(self.outputs)
    }

    /// Requests a re-evaluation once `delay` has elapsed, replacing any
    /// pending request. A zero delay fires on the next transaction; a delay
    /// too large to represent never fires.
    #[inline(always)]
    pub fn set_timeout(&mut self, delay: Duration) {
        match self.runtime.now().checked_add(delay) {
            Some(at) => self.timeout.arm(at),
            None => self.timeout.clear(),
        }
    }

    #[inline(always)]
    pub fn clear_timeout(&mut self) {
        self.timeout.clear();
    }

    /// Whether this evaluation was triggered by this node's own timeout.
    #[inline(always)]
    pub fn is_timed_out(&self) -> bool {
        self.timeout.is_fired()
    }

    /// Whether a timeout is armed and has not fired yet.
    #[inline(always)]
    pub fn is_timeout_pending(&self) -> bool {
        self.timeout.is_armed()
    }

    #[inline(always)]
    pub const fn now(&self) -> Instant {
        self.runtime.now()
    }

    #[inline(always)]
    pub const fn unix_time(&self) -> OffsetDateTime {
        self.runtime.cycle_time().unix_timestamp()
    }

    #[inline(always)]
    pub const fn cycle_time(&self) -> CycleTime {
        self.runtime.cycle_time()
    }

    #[inline(always)]
    pub const fn is_setting_up(&self) -> bool {
        self.runtime.is_setting_up()
    }

    #[inline(always)]
    pub const fn transaction(&self) -> u64 {
        self.runtime.transaction()
    }

    #[inline(always)]
    pub const fn current(&self) -> NodeIndex {
        self.current
    }
}
