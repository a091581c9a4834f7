//! Lazy, single-pass sequences over borrowed storage.
//!
//! A [`View`] describes *how* to walk some data without owning it: a plain
//! buffer, a terminated text buffer, or the concatenation of two other views.
//! Calling [`View::iter`] hands out an [`Iter`], a cursor that exclusively owns
//! its position. Cursors are move-only and walk forward once; once a cursor is
//! exhausted every further read yields `None`, and the only way to start over
//! is to ask the view for a fresh one.
//!
//! Concatenation neither copies nor allocates. A view is a tree whose leaves
//! are plain or text slices, and a cursor walks those leaves left to right,
//! holding only the current leaf and its position.
//!
//! ```rust, ignore
//! let hello = View::Text(b"hello\0junk");
//! let world = View::Plain(b", world");
//! let greeting = View::Concat(&hello, &world);
//!
//! let mut buf = [0u8; 16];
//! let len = greeting.copy_into(&mut buf)?;
//! assert_eq!(&buf[..len], b"hello, world");
//! ```

use std::fmt;

/// Errors produced by the derived sequence operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    #[error("buffer too small: sequence needs {required} elements, buffer holds {available}")]
    BufferTooSmall { required: usize, available: usize },
}

/// A borrowed, non-owning description of a sequence.
///
/// The caller guarantees the backing storage outlives the view; the borrow
/// checker enforces it.
pub enum View<'a, T> {
    /// Every element of the slice, in order.
    Plain(&'a [T]),

    /// Elements of the slice up to (not including) the first terminator,
    /// where the terminator is `T::default()` (`0` for bytes). A slice
    /// without a terminator ends at its last element.
    Text(&'a [T]),

    /// All of `left` followed by all of `right`.
    Concat(&'a View<'a, T>, &'a View<'a, T>),
}

impl<T> Clone for View<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for View<'_, T> {}

impl<T> fmt::Debug for View<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Plain(items) => write!(f, "Plain({} items)", items.len()),
            View::Text(items) => write!(f, "Text({} items max)", items.len()),
            View::Concat(left, right) => f.debug_tuple("Concat").field(left).field(right).finish(),
        }
    }
}

impl<'a, T> View<'a, T>
where
    T: Copy + Default + PartialEq,
{
    /// An empty sequence.
    pub fn empty() -> Self {
        View::Plain(&[])
    }

    /// Returns a fresh cursor positioned at the first element.
    pub fn iter(&self) -> Iter<'a, T> {
        let (items, terminated) = self.leaf(0).unwrap_or((&[], false));
        let mut iter = Iter {
            root: *self,
            leaf: 0,
            items,
            terminated,
            pos: 0,
        };
        iter.settle();
        iter
    }

    fn leaf_count(self) -> usize {
        match self {
            View::Plain(_) | View::Text(_) => 1,
            View::Concat(left, right) => left.leaf_count() + right.leaf_count(),
        }
    }

    /// The `n`th leaf slice from the left, and whether it is terminated.
    fn leaf(self, n: usize) -> Option<(&'a [T], bool)> {
        match self {
            View::Plain(items) => (n == 0).then_some((items, false)),
            View::Text(items) => (n == 0).then_some((items, true)),
            View::Concat(left, right) => {
                let on_left = left.leaf_count();
                if n < on_left {
                    left.leaf(n)
                } else {
                    right.leaf(n - on_left)
                }
            }
        }
    }

    /// Number of elements in the sequence.
    pub fn length(&self) -> usize {
        self.iter().fold(0, |len, _| len + 1)
    }

    /// Element-wise equality: both sequences have the same length and
    /// matching elements in order.
    pub fn equals(&self, other: &View<'_, T>) -> bool {
        let mut lhs = self.iter();
        let mut rhs = other.iter();
        loop {
            match (lhs.next_value(), rhs.next_value()) {
                (None, None) => return true,
                (Some(a), Some(b)) if a == b => continue,
                _ => return false,
            }
        }
    }

    /// Copies the sequence into the front of `buf` and returns how many
    /// elements were written.
    ///
    /// The buffer must already be large enough; nothing is written when it is
    /// not.
    pub fn copy_into(&self, buf: &mut [T]) -> Result<usize, SequenceError> {
        let required = self.length();
        if required > buf.len() {
            return Err(SequenceError::BufferTooSmall {
                required,
                available: buf.len(),
            });
        }

        Ok(self.iter().zip(buf.iter_mut()).fold(0, |written, (value, slot)| {
            *slot = value;
            written + 1
        }))
    }
}

/// Single-use cursor over a [`View`].
///
/// Not `Clone`: advancing a cursor consumes the positions behind it. Between
/// calls the cursor either points at an element or has no leaf left.
pub struct Iter<'a, T> {
    root: View<'a, T>,
    leaf: usize,
    items: &'a [T],
    terminated: bool,
    pos: usize,
}

impl<T> Iter<'_, T>
where
    T: Copy + Default + PartialEq,
{
    /// Whether the cursor currently points at an element.
    pub fn is_valid(&self) -> bool {
        self.value().is_some()
    }

    /// The element under the cursor, or `None` once exhausted.
    pub fn value(&self) -> Option<T> {
        let value = *self.items.get(self.pos)?;
        if self.terminated && value == T::default() {
            return None;
        }
        Some(value)
    }

    /// Moves to the next element. Advancing an exhausted cursor is a no-op.
    pub fn advance(&mut self) {
        if !self.is_valid() {
            return;
        }
        self.pos += 1;
        self.settle();
    }

    /// Skips finished leaves until the cursor points at an element or the
    /// view has no leaves left.
    fn settle(&mut self) {
        while !self.is_valid() {
            let Some((items, terminated)) = self.root.leaf(self.leaf + 1) else {
                return;
            };
            self.leaf += 1;
            self.items = items;
            self.terminated = terminated;
            self.pos = 0;
        }
    }

    /// Reads the element under the cursor and advances past it.
    pub fn next_value(&mut self) -> Option<T> {
        let value = self.value()?;
        self.advance();
        Some(value)
    }
}

impl<T> Iterator for Iter<'_, T>
where
    T: Copy + Default + PartialEq,
{
    type Item = T;

    #[inline]
    fn next(&mut self) -> Option<T> {
        self.next_value()
    }
}

impl<T> fmt::Debug for Iter<'_, T>
where
    T: Copy + Default + PartialEq,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Iter")
            .field("valid", &self.is_valid())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_text_stops_at_terminator() {
        let view = View::Text(b"abc\0def".as_slice());
        assert_eq!(view.length(), 3);
        assert_eq!(view.iter().collect::<Vec<_>>(), b"abc".to_vec());
    }

    #[test]
    fn test_text_without_terminator_ends_at_slice_end() {
        let view = View::Text(b"xyz".as_slice());
        assert_eq!(view.length(), 3);
    }

    #[test]
    fn test_cursor_contract() {
        let data = [1, 2];
        let view = View::Plain(&data[..]);
        let mut iter = view.iter();

        assert!(iter.is_valid());
        assert_eq!(iter.value(), Some(1));
        // reading does not move the cursor
        assert_eq!(iter.value(), Some(1));

        iter.advance();
        assert_eq!(iter.value(), Some(2));
        iter.advance();
        assert!(!iter.is_valid());
        assert_eq!(iter.value(), None);

        // stays exhausted
        iter.advance();
        assert_eq!(iter.next_value(), None);
    }

    #[test]
    fn test_concat_skips_empty_sides() {
        let empty = View::<u8>::empty();
        let text = View::Text(b"hi\0".as_slice());
        let left_empty = View::Concat(&empty, &text);
        let right_empty = View::Concat(&text, &empty);

        assert!(left_empty.equals(&text));
        assert!(right_empty.equals(&text));
        assert_eq!(View::Concat(&empty, &empty).length(), 0);
    }

    #[test]
    fn test_nested_concat() {
        let a = View::Plain(b"ab".as_slice());
        let b = View::Text(b"c\0".as_slice());
        let c = View::Plain(b"de".as_slice());
        let ab = View::Concat(&a, &b);
        let abc = View::Concat(&ab, &c);

        assert_eq!(abc.iter().collect::<Vec<_>>(), b"abcde".to_vec());
    }

    #[test]
    fn test_cursor_skips_empty_leaves_at_any_depth() {
        let empty = View::<u8>::empty();
        let cut = View::Text(b"\0hidden".as_slice());
        let x = View::Plain(b"x".as_slice());
        let y = View::Text(b"yz\0".as_slice());

        let inner = View::Concat(&empty, &cut);
        let left = View::Concat(&x, &inner);
        let right = View::Concat(&inner, &y);
        let all = View::Concat(&left, &right);

        let mut iter = all.iter();
        assert_eq!(iter.value(), Some(b'x'));
        iter.advance();
        // the empty leaves between are skipped on advance
        assert_eq!(iter.value(), Some(b'y'));
        assert_eq!(iter.by_ref().collect::<Vec<_>>(), b"yz".to_vec());
        assert!(!iter.is_valid());
        assert_eq!(all.length(), 3);

        assert!(!View::Concat(&inner, &inner).iter().is_valid());
    }

    #[test]
    fn test_equals_requires_same_length() {
        let short = View::Plain(b"ab".as_slice());
        let long = View::Plain(b"abc".as_slice());
        assert!(!short.equals(&long));
        assert!(!long.equals(&short));
        assert!(short.equals(&View::Text(b"ab\0c".as_slice())));
    }

    #[test]
    fn test_copy_into_rejects_short_buffer() {
        let view = View::Plain(b"abcd".as_slice());
        let mut buf = [0u8; 3];

        assert_eq!(
            view.copy_into(&mut buf),
            Err(SequenceError::BufferTooSmall {
                required: 4,
                available: 3
            })
        );
        assert_eq!(buf, [0, 0, 0]);

        let mut buf = [0u8; 6];
        assert_eq!(view.copy_into(&mut buf), Ok(4));
        assert_eq!(&buf[..4], b"abcd");
    }

    proptest! {
        #[test]
        fn prop_concat_length_is_sum(a in prop::collection::vec(any::<i32>(), 0..64),
                                     b in prop::collection::vec(any::<i32>(), 0..64)) {
            let left = View::Plain(a.as_slice());
            let right = View::Plain(b.as_slice());
            let joined = View::Concat(&left, &right);
            prop_assert_eq!(joined.length(), left.length() + right.length());
        }

        #[test]
        fn prop_concat_yields_left_then_right(a in prop::collection::vec(any::<u16>(), 0..32),
                                              b in prop::collection::vec(any::<u16>(), 0..32)) {
            let left = View::Plain(a.as_slice());
            let right = View::Plain(b.as_slice());
            let joined: Vec<u16> = View::Concat(&left, &right).iter().collect();
            let expected: Vec<u16> = a.iter().chain(b.iter()).copied().collect();
            prop_assert_eq!(joined, expected);
        }
    }
}
