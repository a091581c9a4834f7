//! Number to text formatting without heap allocation.
//!
//! The result lives in a small inline buffer sized for the widest value the
//! formatter can produce (`-2147483647.` followed by [`MAX_PRECISION`]
//! fraction digits). Values the buffer cannot represent are reported as
//! overflow text instead of being truncated.

use crate::sequence::View;
use std::fmt::{self, Write};

/// Highest number of fraction digits honored; larger requests are clamped.
pub const MAX_PRECISION: u8 = 7;

const CAPACITY: usize = 24;
const OVERFLOW_LIMIT: f64 = i32::MAX as f64;

/// Text produced by [`format_number`], stored inline.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct FormattedNumber {
    buf: [u8; CAPACITY],
    len: usize,
}

impl FormattedNumber {
    const fn new() -> Self {
        Self {
            buf: [0; CAPACITY],
            len: 0,
        }
    }

    pub fn as_str(&self) -> &str {
        // only ASCII is ever written
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The text as a sequence view, for composing with other text.
    pub fn view(&self) -> View<'_, u8> {
        View::Plain(self.as_bytes())
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn replace(&mut self, text: &str) {
        self.len = 0;
        // every replacement literal fits the buffer
        let _ = self.write_str(text);
    }

    fn strip_negative_zero(&mut self) {
        let digits = &self.buf[1..self.len];
        if self.buf[0] == b'-' && digits.iter().all(|c| *c == b'0' || *c == b'.') {
            self.buf.copy_within(1..self.len, 0);
            self.len -= 1;
        }
    }
}

impl Write for FormattedNumber {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let end = self.len + bytes.len();
        if end > CAPACITY {
            return Err(fmt::Error);
        }
        self.buf[self.len..end].copy_from_slice(bytes);
        self.len = end;
        Ok(())
    }
}

impl fmt::Debug for FormattedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FormattedNumber").field(&self.as_str()).finish()
    }
}

impl fmt::Display for FormattedNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formats `value` with `precision` fraction digits.
///
/// Special values:
/// - NaN formats as `NaN`
/// - positive and negative infinity format as `Inf` and `-Inf`
/// - magnitudes above `2^31 - 1` format as `OVF` or `-OVF`
/// - a negative value that rounds to zero formats without the sign
pub fn format_number(value: f32, precision: u8) -> FormattedNumber {
    let mut out = FormattedNumber::new();
    let negative = value.is_sign_negative();

    if value.is_nan() {
        out.replace("NaN");
    } else if value.is_infinite() {
        out.replace(if negative { "-Inf" } else { "Inf" });
    } else if f64::from(value).abs() > OVERFLOW_LIMIT {
        out.replace(if negative { "-OVF" } else { "OVF" });
    } else {
        let precision = usize::from(precision.min(MAX_PRECISION));
        if write!(out, "{value:.precision$}").is_err() {
            out.replace(if negative { "-OVF" } else { "OVF" });
        } else if negative {
            out.strip_negative_zero();
        }
    }

    out
}
