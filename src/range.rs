use std::ops::Range;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A directed range of offsets in the linear model. This is an internal
/// replacement for `Range<usize>`, mainly because std's Range doesn't
/// implement Copy (urgh) and because selections need a direction: `from` is
/// the anchor and `to` is the focus, so `from > to` is a legal, *backwards*
/// range. All the arithmetic below works on the normalized `start()..end()`
/// form.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DocRange {
    pub from: usize,
    pub to: usize,
}

impl DocRange {
    #[inline]
    pub fn new(from: usize, to: usize) -> DocRange {
        DocRange { from, to }
    }

    /// A forwards range covering `len` items starting at `start`.
    #[inline]
    pub fn new_from_len(start: usize, len: usize) -> DocRange {
        DocRange { from: start, to: start + len }
    }

    /// Construct with explicit direction: the endpoints are given in document
    /// order, and `backwards` flips anchor and focus.
    pub fn new_directed(start: usize, end: usize, backwards: bool) -> DocRange {
        debug_assert!(start <= end);
        if backwards {
            DocRange { from: end, to: start }
        } else {
            DocRange { from: start, to: end }
        }
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.from.min(self.to)
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.from.max(self.to)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// Alias for [`is_empty`](DocRange::is_empty); selection code reads better
    /// with the editing term.
    pub fn is_collapsed(&self) -> bool {
        self.is_empty()
    }

    pub fn is_backwards(&self) -> bool {
        self.from > self.to
    }

    /// The same span, pointing the other way.
    pub fn flipped(&self) -> DocRange {
        DocRange { from: self.to, to: self.from }
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start() <= offset && offset < self.end()
    }

    pub fn contains_range(&self, other: &DocRange) -> bool {
        self.start() <= other.start() && other.end() <= self.end()
    }

    pub fn touches_range(&self, other: &DocRange) -> bool {
        self.start() < other.end() && other.start() < self.end()
    }
}

impl From<Range<usize>> for DocRange {
    fn from(range: Range<usize>) -> Self {
        DocRange { from: range.start, to: range.end }
    }
}

impl From<DocRange> for Range<usize> {
    fn from(range: DocRange) -> Self {
        range.start()..range.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction() {
        let fwd = DocRange::new(1, 4);
        let bwd = DocRange::new(4, 1);
        assert!(!fwd.is_backwards());
        assert!(bwd.is_backwards());
        assert_eq!(fwd.start(), bwd.start());
        assert_eq!(fwd.end(), bwd.end());
        assert_eq!(bwd.flipped(), fwd);
        assert_eq!(DocRange::new_directed(1, 4, true), bwd);
    }

    #[test]
    fn containment() {
        let r = DocRange::new(2, 6);
        assert!(r.contains_offset(2));
        assert!(!r.contains_offset(6));
        assert!(r.contains_range(&DocRange::new(3, 5)));
        assert!(!r.contains_range(&DocRange::new(3, 7)));
        assert!(r.touches_range(&DocRange::new(5, 9)));
        assert!(!r.touches_range(&DocRange::new(6, 9)));
    }
}
