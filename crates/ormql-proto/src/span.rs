//! Source location tracking for nodes handed over by the parser.

use serde::{Deserialize, Serialize};

/// A span representing a range in the source query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset.
    pub start: usize,
    /// End byte offset (exclusive).
    pub end: usize,
}

impl Span {
    /// Create a new span.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Create a span covering two spans.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Get the length of the span.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Check if the span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span {
            start: range.start,
            end: range.end,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let a = Span::new(5, 10);
        let b = Span::new(8, 15);
        assert_eq!(a.merge(b), Span::new(5, 15));
    }

    #[test]
    fn test_span_ordering_follows_source_position() {
        let mut spans = vec![Span::new(12, 13), Span::new(3, 4), Span::new(7, 9)];
        spans.sort();
        assert_eq!(spans[0], Span::new(3, 4));
        assert_eq!(spans[2], Span::new(12, 13));
        assert_eq!(Span::from(2..6).len(), 4);
    }

    #[test]
    fn test_inverted_span_has_zero_length() {
        assert_eq!(Span::new(9, 4).len(), 0);
    }
}
