//! Typed pin descriptors.
//!
//! A node type declares its pins as two plain structs, `Inputs` and
//! `Outputs`, with one field per pin. A pin descriptor pairs a field with its
//! index, so the runtime can copy values along links and keep one dirty bit
//! per pin without knowing the concrete struct layout.
//!
//! Descriptors are parameterized by the struct they point into. A
//! [`Context`](crate::runtime::Context) for node `N` only accepts
//! `InputPin<N::Inputs, _>` and `OutputPin<N::Outputs, _>`, which turns
//! "read an undeclared input" or "write an undeclared output" into a type
//! error instead of a runtime fault.
//!
//! The [`pins!`](crate::pins) macro generates a pin struct together with its
//! descriptor constants:
//!
//! ```rust, ignore
//! tickflow::pins! {
//!     pub struct Operands as InputPin {
//!         IN1 = 0 => in1: f32,
//!         IN2 = 1 => in2: f32,
//!     }
//! }
//!
//! // Operands::IN1 : InputPin<Operands, f32>
//! ```

use std::fmt;

/// Maximum number of pins on either side of a node. Dirty bits for a node's
/// pins are packed into a single `u32`.
pub const MAX_PINS: u8 = 32;

/// Descriptor of an input pin with value type `T` living in the inputs
/// struct `I`.
pub struct InputPin<I, T> {
    index: u8,
    read: fn(&I) -> &T,
    write: fn(&mut I) -> &mut T,
}

impl<I, T> InputPin<I, T> {
    /// Creates a descriptor. Indices must be unique within one struct and
    /// below [`MAX_PINS`]; the bound is checked during constant evaluation.
    pub const fn new(index: u8, read: fn(&I) -> &T, write: fn(&mut I) -> &mut T) -> Self {
        assert!(index < MAX_PINS, "input pin index out of range");
        Self { index, read, write }
    }

    #[inline(always)]
    pub const fn index(&self) -> u8 {
        self.index
    }

    #[inline(always)]
    pub(crate) const fn mask(&self) -> u32 {
        1 << self.index
    }

    #[inline(always)]
    pub fn get<'a>(&self, inputs: &'a I) -> &'a T {
        (self.read)(inputs)
    }

    #[inline(always)]
    pub fn get_mut<'a>(&self, inputs: &'a mut I) -> &'a mut T {
        (self.write)(inputs)
    }
}

impl<I, T> Clone for InputPin<I, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I, T> Copy for InputPin<I, T> {}

impl<I, T> fmt::Debug for InputPin<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputPin")
            .field("index", &self.index)
            .finish()
    }
}

/// Descriptor of an output pin with value type `T` living in the outputs
/// struct `O`.
pub struct OutputPin<O, T> {
    index: u8,
    read: fn(&O) -> &T,
    write: fn(&mut O) -> &mut T,
}

impl<O, T> OutputPin<O, T> {
    /// Creates a descriptor. Indices must be unique within one struct and
    /// below [`MAX_PINS`]; the bound is checked during constant evaluation.
    pub const fn new(index: u8, read: fn(&O) -> &T, write: fn(&mut O) -> &mut T) -> Self {
        assert!(index < MAX_PINS, "output pin index out of range");
        Self { index, read, write }
    }

    #[inline(always)]
    pub const fn index(&self) -> u8 {
        self.index
    }

    #[inline(always)]
    pub(crate) const fn mask(&self) -> u32 {
        1 << self.index
    }

    #[inline(always)]
    pub fn get<'a>(&self, outputs: &'a O) -> &'a T {
        (self.read)(outputs)
    }

    #[inline(always)]
    pub fn get_mut<'a>(&self, outputs: &'a mut O) -> &'a mut T {
        (self.write)(outputs)
    }
}

impl<O, T> Clone for OutputPin<O, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<O, T> Copy for OutputPin<O, T> {}

impl<O, T> fmt::Debug for OutputPin<O, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputPin")
            .field("index", &self.index)
            .finish()
    }
}

/// Declares a pin struct and one descriptor constant per field.
///
/// `as InputPin` produces `InputPin<Struct, T>` constants, `as OutputPin`
/// produces `OutputPin<Struct, T>` constants. The struct derives `Debug`,
/// `Clone` and `Default`; a field's default is the value an unlinked,
/// unbound pin reads.
#[macro_export]
macro_rules! pins {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident as $kind:ident {
            $(
                $(#[$fmeta:meta])*
                $pin:ident = $idx:literal => $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default)]
        $vis struct $name {
            $(
                $(#[$fmeta])*
                pub $field: $ty,
            )*
        }

        impl $name {
            $(
                pub const $pin: $crate::pin::$kind<$name, $ty> = {
                    fn read(pins: &$name) -> &$ty {
                        &pins.$field
                    }
                    fn write(pins: &mut $name) -> &mut $ty {
                        &mut pins.$field
                    }
                    $crate::pin::$kind::new($idx, read, write)
                };
            )*
        }
    };
}

#[cfg(test)]
mod tests {
    crate::pins! {
        struct Sample as InputPin {
            A = 0 => a: u8,
            B = 5 => b: bool,
        }
    }

    #[test]
    fn test_generated_pins_access_fields() {
        let mut sample = Sample::default();
        *Sample::A.get_mut(&mut sample) = 7;
        *Sample::B.get_mut(&mut sample) = true;

        assert_eq!(sample.a, 7);
        assert!(sample.b);
        assert_eq!(*Sample::A.get(&sample), 7);
        assert_eq!(Sample::B.index(), 5);
        assert_eq!(Sample::B.mask(), 0b10_0000);
    }

    #[test]
    fn test_pins_are_copy() {
        let pin = Sample::A;
        let copy = pin;
        assert_eq!(pin.index(), copy.index());
    }
}
