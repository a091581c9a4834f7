//! Helpers for driving graphs from tests.
//!
//! - [`push_node`]: a source node whose value the test sets from outside,
//!   delivered through a [`Notifier`] like any external event
//! - [`Recorder`]: a sink node that records every value its input receives

use crate::nodes::{NoInputs, NoOutputs};
use crate::pin::{InputPin, OutputPin};
use crate::runtime::{
    Context, Executor, ExecutorError, GraphError, Handle, Node, NodeBuilder, Notifier,
    TestRuntime, TransactionReport,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Output of a [`PushNode`].
#[derive(Debug, Clone, Default)]
pub struct PushOutput<T> {
    pub value: T,
}

impl<T> PushOutput<T> {
    fn read(pins: &Self) -> &T {
        &pins.value
    }

    fn write(pins: &mut Self) -> &mut T {
        &mut pins.value
    }
}

/// Source node fed by a [`Push`] handle. Emits its value on setup and after
/// every push.
pub struct PushNode<T> {
    value: T,
    pending: Rc<RefCell<Option<T>>>,
}

impl<T> PushNode<T> {
    pub const OUT: OutputPin<PushOutput<T>, T> =
        OutputPin::new(0, PushOutput::<T>::read, PushOutput::<T>::write);

    pub const fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default + 'static> Node for PushNode<T> {
    type Inputs = NoInputs;
    type Outputs = PushOutput<T>;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        if let Some(value) = self.pending.borrow_mut().take() {
            self.value = value;
        }
        ctx.emit(Self::OUT, self.value.clone());
    }
}

/// Test-side handle of a [`PushNode`].
pub struct Push<T> {
    pending: Rc<RefCell<Option<T>>>,
    notifier: Notifier,
}

impl<T> Clone for Push<T> {
    fn clone(&self) -> Self {
        Self {
            pending: self.pending.clone(),
            notifier: self.notifier.clone(),
        }
    }
}

impl<T> Push<T> {
    /// Stores `value` and schedules the node for the next transaction. A
    /// second push before then replaces the first.
    pub fn push(&self, value: T) {
        *self.pending.borrow_mut() = Some(value);
        self.notifier.notify();
    }

    pub fn push_with_cycle(
        &self,
        runtime: &mut TestRuntime,
        value: T,
    ) -> Result<TransactionReport, ExecutorError> {
        self.push(value);
        runtime.run_one_cycle()
    }

    pub fn push_with_cycle_advance(
        &self,
        runtime: &mut TestRuntime,
        value: T,
        duration: Duration,
    ) -> Result<TransactionReport, ExecutorError> {
        self.push(value);
        runtime.advance_clock(duration);
        runtime.run_one_cycle()
    }
}

pub fn push_node<T: Clone + Default + 'static>(
    executor: &mut Executor,
    initial: T,
) -> Result<(Handle<PushNode<T>>, Push<T>), GraphError> {
    let pending = Rc::new(RefCell::new(None));
    let handle = NodeBuilder::new(PushNode {
        value: initial,
        pending: pending.clone(),
    })
    .build(executor)?;

    let notifier = executor.notifier(&handle)?;
    Ok((handle, Push { pending, notifier }))
}

/// Input of a [`Recorder`].
#[derive(Debug, Clone, Default)]
pub struct RecorderInput<T> {
    pub value: T,
}

impl<T> RecorderInput<T> {
    fn read(pins: &Self) -> &T {
        &pins.value
    }

    fn write(pins: &mut Self) -> &mut T {
        &mut pins.value
    }
}

/// Sink node recording each value its input delivers. A value is recorded
/// whenever the linked output was marked dirty, even if it did not change.
#[derive(Debug, Clone, Default)]
pub struct Recorder<T> {
    received: Vec<T>,
}

impl<T> Recorder<T> {
    pub const IN: InputPin<RecorderInput<T>, T> =
        InputPin::new(0, RecorderInput::<T>::read, RecorderInput::<T>::write);

    pub fn received(&self) -> &[T] {
        &self.received
    }
}

impl<T: Clone + Default + 'static> Recorder<T> {
    /// Builds a recorder linked to `output` of `source`.
    pub fn attach<M: Node>(
        executor: &mut Executor,
        source: &Handle<M>,
        output: OutputPin<M::Outputs, T>,
    ) -> Result<RecorderHandle<T>, GraphError> {
        NodeBuilder::new(Self {
            received: Vec::new(),
        })
        .link(Self::IN, source, output)
        .build(executor)
        .map(|handle| RecorderHandle { handle })
    }
}

impl<T: Clone + Default + 'static> Node for Recorder<T> {
    type Inputs = RecorderInput<T>;
    type Outputs = NoOutputs;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        if ctx.is_input_dirty(Self::IN) {
            self.received.push(ctx.input(Self::IN).clone());
        }
    }
}

/// Typed access to a built [`Recorder`].
pub struct RecorderHandle<T> {
    handle: Handle<Recorder<T>>,
}

impl<T> Clone for RecorderHandle<T> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle,
        }
    }
}

impl<T: Clone + Default + 'static> RecorderHandle<T> {
    pub fn handle(&self) -> Handle<Recorder<T>> {
        self.handle
    }

    /// Every value received so far, oldest first.
    pub fn values(&self, executor: &Executor) -> Vec<T> {
        executor
            .node(&self.handle)
            .map(|recorder| recorder.received.clone())
            .unwrap_or_default()
    }

    pub fn last(&self, executor: &Executor) -> Option<T> {
        executor
            .node(&self.handle)
            .and_then(|recorder| recorder.received.last().cloned())
    }

    pub fn count(&self, executor: &Executor) -> usize {
        executor
            .node(&self.handle)
            .map_or(0, |recorder| recorder.received.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_node() {
        let mut runtime = TestRuntime::new();
        let (source, push) = push_node(runtime.executor(), 0).unwrap();
        let recorder = Recorder::attach(runtime.executor(), &source, PushNode::<i32>::OUT).unwrap();

        runtime.run_one_cycle().unwrap();
        assert_eq!(recorder.values(runtime.executor()), vec![0]);

        push.push_with_cycle(&mut runtime, 3).unwrap();
        assert_eq!(recorder.last(runtime.executor()), Some(3));

        // last push before the transaction wins
        push.push(4);
        push.push(5);
        let report = runtime.run_one_cycle().unwrap();
        assert_eq!(report.evaluated, 2);
        assert_eq!(recorder.values(runtime.executor()), vec![0, 3, 5]);
        assert_eq!(runtime.executor().node(&source).unwrap().value(), &5);
    }

    #[test]
    fn test_push_with_advance() {
        let mut runtime = TestRuntime::new();
        let (source, push) = push_node(runtime.executor(), "idle").unwrap();
        runtime.run_one_cycle().unwrap();

        let report = push
            .push_with_cycle_advance(&mut runtime, "busy", Duration::from_secs(2))
            .unwrap();
        assert!(runtime.executor().has_evaluated(&source));
        assert_eq!(runtime.executor().output(&source, PushNode::<&str>::OUT), Some(&"busy"));
        assert_eq!(report.notified, 1);
    }

    #[test]
    fn test_recorder_ignores_clean_input() {
        let mut runtime = TestRuntime::new();
        let (source, _push) = push_node(runtime.executor(), 1u8).unwrap();
        let recorder = Recorder::attach(runtime.executor(), &source, PushNode::<u8>::OUT).unwrap();

        runtime.run_one_cycle().unwrap();
        runtime.executor().mark_dirty(&recorder.handle()).unwrap();
        runtime.run_one_cycle().unwrap();

        assert!(runtime.executor().has_evaluated(&recorder.handle()));
        assert_eq!(recorder.count(runtime.executor()), 1);
    }
}
