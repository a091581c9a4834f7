use std::time::Duration;
use tickflow::nodes::core::{Constant, Continuously};
use tickflow::nodes::logic::Greater;
use tickflow::nodes::math::Subtract;
use tickflow::nodes::{LogicOutput, NumberOutput, Operands, PulseOutput, clock_node};
use tickflow::prelude::*;
use tickflow::runtime::clock::{DEVICE_TICK, SteppedClock};
use time::OffsetDateTime;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Comparison {
    runtime: TestRuntime,
    a: Handle<Constant<f32>>,
    b: Handle<Constant<f32>>,
    greater: Handle<Greater>,
    difference: Handle<Subtract>,
}

impl Comparison {
    fn build() -> Self {
        let mut runtime = TestRuntime::new();
        let executor = runtime.executor();
        let a = NodeBuilder::new(Constant::new(3.0f32))
            .named("a")
            .build(executor)
            .unwrap();
        let b = NodeBuilder::new(Constant::new(5.0f32))
            .named("b")
            .build(executor)
            .unwrap();
        let greater = NodeBuilder::new(Greater)
            .link(Operands::IN1, &a, Constant::<f32>::VAL)
            .link(Operands::IN2, &b, Constant::<f32>::VAL)
            .build(executor)
            .unwrap();
        let difference = NodeBuilder::new(Subtract)
            .link(Operands::IN1, &a, Constant::<f32>::VAL)
            .link(Operands::IN2, &b, Constant::<f32>::VAL)
            .build(executor)
            .unwrap();

        Self {
            runtime,
            a,
            b,
            greater,
            difference,
        }
    }

    fn raw_handles(&self) -> [RawHandle; 4] {
        [
            self.a.raw_handle(),
            self.b.raw_handle(),
            self.greater.raw_handle(),
            self.difference.raw_handle(),
        ]
    }

    fn assert_all_clean(&mut self) {
        let handles = self.raw_handles();
        let executor = self.runtime.executor();
        for handle in handles {
            assert!(!executor.is_node_dirty(&handle), "{handle:?} still dirty");
            assert!(!executor.has_dirty_outputs(&handle), "{handle:?} outputs still dirty");
        }
    }
}

#[test]
fn test_setup_evaluates_whole_graph() {
    init_tracing();
    let mut graph = Comparison::build();

    let report = graph.runtime.run_one_cycle().unwrap();
    assert_eq!(report.transaction, 1);
    assert_eq!(report.evaluated, 4);

    let executor = graph.runtime.executor();
    assert_eq!(executor.output(&graph.greater, LogicOutput::OUT), Some(&false));
    assert_eq!(executor.output(&graph.difference, NumberOutput::OUT), Some(&-2.0));
    graph.assert_all_clean();
}

#[test]
fn test_marked_source_reevaluates_only_its_subgraph() {
    init_tracing();
    let mut graph = Comparison::build();
    graph.runtime.run_one_cycle().unwrap();

    let a = graph.a;
    graph.runtime.executor().mark_dirty(&a).unwrap();
    let report = graph.runtime.run_one_cycle().unwrap();
    assert_eq!(report.evaluated, 3);

    let executor = graph.runtime.executor();
    assert!(executor.has_evaluated(&graph.a));
    assert!(!executor.has_evaluated(&graph.b));
    assert!(executor.has_evaluated(&graph.greater));
    assert!(executor.has_evaluated(&graph.difference));
    graph.assert_all_clean();

    let b = graph.b;
    graph.runtime.executor().mark_dirty(&b).unwrap();
    let report = graph.runtime.run_one_cycle().unwrap();
    assert_eq!(report.evaluated, 3);
    assert!(!graph.runtime.executor().has_evaluated(&graph.a));
    graph.assert_all_clean();

    // nothing marked: nothing runs
    let report = graph.runtime.run_one_cycle().unwrap();
    assert_eq!(report.evaluated, 0);
}

#[test]
fn test_graph_sealed_after_first_transaction() {
    let mut graph = Comparison::build();
    graph.runtime.run_one_cycle().unwrap();

    let result = NodeBuilder::new(Constant::new(1.0f32)).build(graph.runtime.executor());
    assert_eq!(result.unwrap_err(), GraphError::Sealed { transactions: 1 });
}

#[test]
fn test_disabled_dirtiness_propagates_unchanged_values() {
    init_tracing();
    let mut runtime = TestRuntime::new();
    let (source, push) = push_node(runtime.executor(), 10.0f32).unwrap();
    let greater = NodeBuilder::new(Greater)
        .link(Operands::IN1, &source, PushNode::<f32>::OUT)
        .bind(Operands::IN2, 0.0)
        .build(runtime.executor())
        .unwrap();
    let recorder = Recorder::attach(runtime.executor(), &greater, LogicOutput::OUT).unwrap();

    runtime.run_one_cycle().unwrap();
    for value in [11.0, 12.0, 13.0] {
        push.push_with_cycle(&mut runtime, value).unwrap();
    }

    assert_eq!(recorder.values(runtime.executor()), vec![true; 4]);
}

#[test]
fn test_continuously_runs_every_transaction() {
    init_tracing();
    let mut runtime = TestRuntime::new();
    let source = NodeBuilder::new(Continuously)
        .build(runtime.executor())
        .unwrap();
    let recorder = Recorder::attach(runtime.executor(), &source, PulseOutput::TICK).unwrap();

    for step in 0..100u64 {
        runtime.advance_clock(Duration::from_millis(step % 7));
        let report = runtime.run_one_cycle().unwrap();
        assert_eq!(report.timeouts_fired, usize::from(step > 0));
    }
    assert_eq!(recorder.count(runtime.executor()), 100);
}

#[test]
fn test_simulated_clock_ticks() {
    init_tracing();
    let start = OffsetDateTime::UNIX_EPOCH + Duration::from_secs(3600);
    let ticks = SteppedClock::spanning(Duration::from_secs(1), DEVICE_TICK).starting_at(start);
    let mut runtime = SimulationRuntime::new(ticks);
    let clock = clock_node(runtime.executor(), Duration::from_millis(100)).unwrap();
    let recorder = Recorder::attach(runtime.executor(), &clock, PulseOutput::TICK).unwrap();

    let transactions = runtime.run_until_completion().unwrap();
    assert_eq!(transactions, 1000);

    // 100ms through 900ms; the last tick falls at 999ms
    assert_eq!(recorder.count(runtime.executor()), 9);
    let last = runtime.executor().last_cycle_time().unwrap();
    assert_eq!(last.unix_timestamp(), start + Duration::from_millis(999));
}

#[test]
fn test_dot_export_names_nodes() {
    let mut graph = Comparison::build();
    let dot = graph.runtime.executor().to_dot();
    assert!(dot.contains("a (Constant"));
    assert!(dot.contains("Greater"));
    assert!(dot.contains("0 -> 0"));
}
