//! # Math Nodes
//!
//! Arithmetic over `f32`. Like the logic nodes these run with
//! [`Dirtiness::Disabled`].

use crate::Dirtiness;
use crate::nodes::{NumberInput, NumberOutput, Operands};
use crate::pins;
use crate::runtime::{Context, Node};

macro_rules! arithmetic_node {
    ($(#[$meta:meta])* $name:ident, |$a:ident, $b:ident| $body:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default)]
        pub struct $name;

        impl Node for $name {
            type Inputs = Operands;
            type Outputs = NumberOutput;
            const DIRTINESS: Dirtiness = Dirtiness::Disabled;

            #[inline(always)]
            fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
                let $a = *ctx.input(Operands::IN1);
                let $b = *ctx.input(Operands::IN2);
                ctx.emit(NumberOutput::OUT, $body);
            }
        }
    };
}

arithmetic_node!(
    /// `OUT = IN1 + IN2`
    Add, |a, b| a + b
);

arithmetic_node!(
    /// `OUT = IN1 - IN2`
    Subtract, |a, b| a - b
);

arithmetic_node!(
    /// `OUT = IN1 * IN2`
    Multiply, |a, b| a * b
);

/// `OUT = |IN|`
#[derive(Debug, Clone, Copy, Default)]
pub struct Abs;

impl Node for Abs {
    type Inputs = NumberInput;
    type Outputs = NumberOutput;
    const DIRTINESS: Dirtiness = Dirtiness::Disabled;

    #[inline(always)]
    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        let value = ctx.input(NumberInput::IN).abs();
        ctx.emit(NumberOutput::OUT, value);
    }
}

pins! {
    pub struct MapRangeInputs as InputPin {
        X = 0 => x: f32,
        SMIN = 1 => source_min: f32,
        SMAX = 2 => source_max: f32,
        TMIN = 3 => target_min: f32,
        TMAX = 4 => target_max: f32,
    }
}

/// Linearly maps `X` from `[SMIN, SMAX]` onto `[TMIN, TMAX]`. Values outside
/// the source range extrapolate; an empty source range yields NaN or
/// infinity.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapRange;

impl MapRange {
    pub fn map(x: f32, source_min: f32, source_max: f32, target_min: f32, target_max: f32) -> f32 {
        (x - source_min) * (target_max - target_min) / (source_max - source_min) + target_min
    }
}

impl Node for MapRange {
    type Inputs = MapRangeInputs;
    type Outputs = NumberOutput;
    const DIRTINESS: Dirtiness = Dirtiness::Disabled;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        let value = Self::map(
            *ctx.input(MapRangeInputs::X),
            *ctx.input(MapRangeInputs::SMIN),
            *ctx.input(MapRangeInputs::SMAX),
            *ctx.input(MapRangeInputs::TMIN),
            *ctx.input(MapRangeInputs::TMAX),
        );
        ctx.emit(NumberOutput::OUT, value);
    }
}
