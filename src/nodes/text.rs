//! # Text Nodes
//!
//! Text travels between nodes as [`Text`], a fixed-capacity inline string
//! that is cloned along every link without touching the heap. Concatenation
//! walks a borrowed [`View`] straight into the output buffer.

use crate::format::format_number;
use crate::pins;
use crate::runtime::{Context, Node};
use crate::sequence::{SequenceError, View};
use std::fmt;
use tracing::debug;

/// Bytes a [`Text`] can hold.
pub const TEXT_CAPACITY: usize = 64;

/// Inline text of at most [`TEXT_CAPACITY`] bytes.
#[derive(Clone, Copy)]
pub struct Text {
    buf: [u8; TEXT_CAPACITY],
    len: usize,
}

impl Text {
    /// Copies `text`, cutting it at the last character boundary that fits.
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(TEXT_CAPACITY);
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        let mut out = Self::default();
        out.buf[..end].copy_from_slice(&text.as_bytes()[..end]);
        out.len = end;
        out
    }

    /// Collects a byte sequence. Fails without truncating when the sequence
    /// does not fit.
    pub fn from_view(view: &View<'_, u8>) -> Result<Self, SequenceError> {
        let mut out = Self::default();
        out.len = view.copy_into(&mut out.buf)?;
        Ok(out)
    }

    /// Collects as much of a sequence as fits, cut back to a character
    /// boundary.
    pub fn from_view_truncated(view: &View<'_, u8>) -> Self {
        Self::collect(view).0
    }

    /// Single pass over `view`. The flag reports whether bytes were dropped.
    fn collect(view: &View<'_, u8>) -> (Self, bool) {
        let mut out = Self::default();
        let mut bytes = view.iter();
        for slot in out.buf.iter_mut() {
            let Some(byte) = bytes.next_value() else {
                return (out, false);
            };
            *slot = byte;
            out.len += 1;
        }

        if !bytes.is_valid() {
            return (out, false);
        }
        out.len = char_boundary(&out.buf, out.len);
        (out, true)
    }

    /// The text, or the longest valid UTF-8 prefix if a byte sequence was cut
    /// inside a character.
    pub fn as_str(&self) -> &str {
        let bytes = self.as_bytes();
        match std::str::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => std::str::from_utf8(&bytes[..err.valid_up_to()]).unwrap_or_default(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn view(&self) -> View<'_, u8> {
        View::Plain(self.as_bytes())
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Largest `end <= len` that does not split a multi-byte character at the
/// tail of `buf[..len]`.
fn char_boundary(buf: &[u8], len: usize) -> usize {
    match std::str::from_utf8(&buf[..len]) {
        Ok(_) => len,
        // only an incomplete trailing character is dropped
        Err(err) if err.error_len().is_none() => err.valid_up_to(),
        Err(_) => len,
    }
}

impl Default for Text {
    fn default() -> Self {
        Self {
            buf: [0; TEXT_CAPACITY],
            len: 0,
        }
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Text {}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Text").field(&self.as_str()).finish()
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pins! {
    pub struct FormatNumberInputs as InputPin {
        NUM = 0 => number: f32,
        /// Fraction digits, clamped to [`MAX_PRECISION`](crate::format::MAX_PRECISION).
        DIG = 1 => digits: u8,
    }
}

pins! {
    pub struct TextOutput as OutputPin {
        OUT = 0 => text: Text,
    }
}

/// Formats `NUM` with `DIG` fraction digits, see [`format_number`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatNumber;

impl Node for FormatNumber {
    type Inputs = FormatNumberInputs;
    type Outputs = TextOutput;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        let formatted = format_number(
            *ctx.input(FormatNumberInputs::NUM),
            *ctx.input(FormatNumberInputs::DIG),
        );
        ctx.emit(TextOutput::OUT, Text::new(formatted.as_str()));
    }
}

pins! {
    pub struct ConcatInputs as InputPin {
        IN1 = 0 => in1: Text,
        IN2 = 1 => in2: Text,
    }
}

/// `OUT = IN1 ++ IN2`. A result longer than [`TEXT_CAPACITY`] is cut.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatText;

impl Node for ConcatText {
    type Inputs = ConcatInputs;
    type Outputs = TextOutput;

    fn evaluate(&mut self, ctx: &mut Context<'_, Self>) {
        let left = ctx.input(ConcatInputs::IN1).view();
        let right = ctx.input(ConcatInputs::IN2).view();
        let joined = View::Concat(&left, &right);

        let (text, truncated) = Text::collect(&joined);
        if truncated {
            debug!(node = ctx.current().index(), len = text.len(), "truncated concatenated text");
        }
        ctx.emit(TextOutput::OUT, text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{NodeBuilder, TestRuntime};
    use crate::testing::{PushNode, push_node};

    #[test]
    fn test_text_truncates_on_char_boundary() {
        let long = "é".repeat(TEXT_CAPACITY);
        let text = Text::new(&long);
        assert_eq!(text.len(), TEXT_CAPACITY);
        assert_eq!(text.as_str().chars().count(), TEXT_CAPACITY / 2);

        assert_eq!(Text::new("abc").as_str(), "abc");
        assert!(Text::default().is_empty());
        assert_eq!(Text::from("abc"), Text::new("abc"));
    }

    #[test]
    fn test_text_from_view() {
        let left = View::Text(b"solar\0ignored".as_slice());
        let right = View::Plain(b" panel".as_slice());
        let joined = View::Concat(&left, &right);
        assert_eq!(Text::from_view(&joined).unwrap().as_str(), "solar panel");

        let big = [b'x'; TEXT_CAPACITY + 1];
        let view = View::Plain(big.as_slice());
        assert_eq!(
            Text::from_view(&view),
            Err(SequenceError::BufferTooSmall {
                required: TEXT_CAPACITY + 1,
                available: TEXT_CAPACITY,
            })
        );
        assert_eq!(Text::from_view_truncated(&view).len(), TEXT_CAPACITY);
    }

    #[test]
    fn test_format_number_node() {
        let mut runtime = TestRuntime::new();
        let (number, push) = push_node(runtime.executor(), 1.23456f32).unwrap();
        let format = NodeBuilder::new(FormatNumber)
            .link(FormatNumberInputs::NUM, &number, PushNode::<f32>::OUT)
            .bind(FormatNumberInputs::DIG, 2)
            .build(runtime.executor())
            .unwrap();

        runtime.run_one_cycle().unwrap();
        assert_eq!(
            runtime.executor().output(&format, TextOutput::OUT),
            Some(&Text::new("1.23"))
        );

        push.push_with_cycle(&mut runtime, f32::NAN).unwrap();
        assert_eq!(
            runtime.executor().output(&format, TextOutput::OUT),
            Some(&Text::new("NaN"))
        );
    }

    #[test]
    fn test_concat_node() {
        let mut runtime = TestRuntime::new();
        let (label, _) = push_node(runtime.executor(), Text::new("LDR: ")).unwrap();
        let (value, push) = push_node(runtime.executor(), Text::new("0.5")).unwrap();
        let concat = NodeBuilder::new(ConcatText)
            .link(ConcatInputs::IN1, &label, PushNode::<Text>::OUT)
            .link(ConcatInputs::IN2, &value, PushNode::<Text>::OUT)
            .build(runtime.executor())
            .unwrap();

        runtime.run_one_cycle().unwrap();
        assert_eq!(
            runtime.executor().output(&concat, TextOutput::OUT).map(Text::as_str),
            Some("LDR: 0.5")
        );

        let long = "9".repeat(TEXT_CAPACITY);
        push.push_with_cycle(&mut runtime, Text::new(&long)).unwrap();
        let out = runtime.executor().output(&concat, TextOutput::OUT).unwrap();
        assert_eq!(out.len(), TEXT_CAPACITY);
        assert!(out.as_str().starts_with("LDR: 999"));
    }

    #[test]
    fn test_concat_cut_keeps_whole_characters() {
        let mut runtime = TestRuntime::new();
        let (left, _) = push_node(runtime.executor(), Text::new("a")).unwrap();
        let (right, _) = push_node(runtime.executor(), Text::new(&"é".repeat(32))).unwrap();
        let concat = NodeBuilder::new(ConcatText)
            .link(ConcatInputs::IN1, &left, PushNode::<Text>::OUT)
            .link(ConcatInputs::IN2, &right, PushNode::<Text>::OUT)
            .build(runtime.executor())
            .unwrap();

        runtime.run_one_cycle().unwrap();
        let out = runtime.executor().output(&concat, TextOutput::OUT).unwrap();
        let expected = format!("a{}", "é".repeat(31));
        assert_eq!(out.len(), TEXT_CAPACITY - 1);
        assert!(std::str::from_utf8(out.as_bytes()).is_ok());
        assert_eq!(out.as_str(), expected);
        assert_eq!(*out, Text::new(&expected));
    }

    #[test]
    fn test_truncated_view_backs_off_to_char_boundary() {
        let wide = "€".repeat(22);
        let left = View::Plain(b"x".as_slice());
        let right = View::Plain(wide.as_bytes());
        let joined = View::Concat(&left, &right);

        // 1 + 21 * 3 = 64 fits exactly
        let exact = Text::from_view_truncated(&joined);
        assert_eq!(exact.len(), TEXT_CAPACITY);
        assert_eq!(exact.as_str().chars().count(), 22);

        let right = View::Plain(wide.as_bytes());
        let left = View::Plain(b"xy".as_slice());
        let joined = View::Concat(&left, &right);
        let cut = Text::from_view_truncated(&joined);
        assert_eq!(cut.len(), 2 + 20 * 3);
        assert_eq!(cut.as_bytes(), cut.as_str().as_bytes());
    }
}
