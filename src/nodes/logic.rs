//! # Logic Nodes
//!
//! Gates and comparisons. All of them run with [`Dirtiness::Disabled`]: every
//! evaluation re-emits `OUT` and schedules every consumer, whether or not the
//! result changed.

use crate::Dirtiness;
use crate::nodes::{LogicInput, LogicOperands, LogicOutput, Operands};
use crate::runtime::{Context, Node};

macro_rules! binary_node {
    ($(#[$meta:meta])* $name:ident, $inputs:ty, |$a:ident, $b:ident| $body:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Node for $name {
            type Inputs = $inputs;
            type Outputs = LogicOutput;
            const DIRTINESS: Dirtiness = Dirtiness::Disabled;

            #[inline(always)]
            fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
                let $a = *ctx.input(<$inputs>::IN1);
                let $b = *ctx.input(<$inputs>::IN2);
                ctx.emit(LogicOutput::OUT, $body);
            }
        }
    };
}

/// `OUT = !IN`
#[derive(Debug, Clone, Copy, Default)]
pub struct Not;

impl Node for Not {
    type Inputs = LogicInput;
    type Outputs = LogicOutput;
    const DIRTINESS: Dirtiness = Dirtiness::Disabled;

    #[inline(always)]
    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        let value = !*ctx.input(LogicInput::IN);
        ctx.emit(LogicOutput::OUT, value);
    }
}

binary_node!(
    /// `OUT = IN1 && IN2`
    And, LogicOperands, |a, b| a && b
);

binary_node!(
    /// `OUT = IN1 || IN2`
    Or, LogicOperands, |a, b| a || b
);

binary_node!(
    /// `OUT = IN1 > IN2`
    Greater, Operands, |a, b| a > b
);

binary_node!(
    /// `OUT = IN1 < IN2`
    Less, Operands, |a, b| a < b
);

binary_node!(
    /// `OUT = IN1 == IN2`. NaN is never equal to anything.
    Equal, Operands, |a, b| a == b
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{NodeBuilder, TestRuntime};
    use crate::testing::{Recorder, PushNode, push_node};

    #[test]
    fn test_comparisons() {
        let mut runtime = TestRuntime::new();
        let (a, a_push) = push_node(runtime.executor(), 1.0f32).unwrap();
        let (b, _) = push_node(runtime.executor(), 2.0f32).unwrap();

        let gt = NodeBuilder::new(Greater)
            .link(Operands::IN1, &a, PushNode::<f32>::OUT)
            .link(Operands::IN2, &b, PushNode::<f32>::OUT)
            .build(runtime.executor())
            .unwrap();
        let lt = NodeBuilder::new(Less)
            .link(Operands::IN1, &a, PushNode::<f32>::OUT)
            .link(Operands::IN2, &b, PushNode::<f32>::OUT)
            .build(runtime.executor())
            .unwrap();
        let eq = NodeBuilder::new(Equal)
            .link(Operands::IN1, &a, PushNode::<f32>::OUT)
            .link(Operands::IN2, &b, PushNode::<f32>::OUT)
            .build(runtime.executor())
            .unwrap();

        runtime.run_one_cycle().unwrap();
        let out = |runtime: &mut TestRuntime| {
            let executor = runtime.executor();
            (
                *executor.output(&gt, LogicOutput::OUT).unwrap(),
                *executor.output(&lt, LogicOutput::OUT).unwrap(),
                *executor.output(&eq, LogicOutput::OUT).unwrap(),
            )
        };
        assert_eq!(out(&mut runtime), (false, true, false));

        a_push.push_with_cycle(&mut runtime, 2.0).unwrap();
        assert_eq!(out(&mut runtime), (false, false, true));

        a_push.push_with_cycle(&mut runtime, f32::NAN).unwrap();
        assert_eq!(out(&mut runtime), (false, false, false));
    }

    #[test]
    fn test_gates() {
        let mut runtime = TestRuntime::new();
        let (a, a_push) = push_node(runtime.executor(), false).unwrap();
        let (b, b_push) = push_node(runtime.executor(), false).unwrap();

        let and = NodeBuilder::new(And)
            .link(LogicOperands::IN1, &a, PushNode::<bool>::OUT)
            .link(LogicOperands::IN2, &b, PushNode::<bool>::OUT)
            .build(runtime.executor())
            .unwrap();
        let or = NodeBuilder::new(Or)
            .link(LogicOperands::IN1, &a, PushNode::<bool>::OUT)
            .link(LogicOperands::IN2, &b, PushNode::<bool>::OUT)
            .build(runtime.executor())
            .unwrap();
        let not = NodeBuilder::new(Not)
            .link(LogicInput::IN, &and, LogicOutput::OUT)
            .build(runtime.executor())
            .unwrap();

        let cases = [
            (false, false, false, false),
            (true, false, false, true),
            (true, true, true, true),
            (false, true, false, true),
        ];
        for (x, y, expect_and, expect_or) in cases {
            a_push.push(x);
            b_push.push(y);
            runtime.run_one_cycle().unwrap();

            let executor = runtime.executor();
            assert_eq!(executor.output(&and, LogicOutput::OUT), Some(&expect_and));
            assert_eq!(executor.output(&or, LogicOutput::OUT), Some(&expect_or));
            assert_eq!(executor.output(&not, LogicOutput::OUT), Some(&!expect_and));
        }
    }

    #[test]
    fn test_unchanged_result_still_propagates() {
        let mut runtime = TestRuntime::new();
        let (a, a_push) = push_node(runtime.executor(), 5.0f32).unwrap();
        let gt = NodeBuilder::new(Greater)
            .link(Operands::IN1, &a, PushNode::<f32>::OUT)
            .bind(Operands::IN2, 1.0)
            .build(runtime.executor())
            .unwrap();
        let recorder = Recorder::attach(runtime.executor(), &gt, LogicOutput::OUT).unwrap();

        runtime.run_one_cycle().unwrap();
        a_push.push_with_cycle(&mut runtime, 6.0).unwrap();
        a_push.push_with_cycle(&mut runtime, 7.0).unwrap();

        // `true` three times: the consumer ran every time
        assert_eq!(recorder.values(runtime.executor()), vec![true, true, true]);
    }
}
