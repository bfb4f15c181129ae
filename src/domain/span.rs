// ============================================================
// Layer 3 — Answer Spans
// ============================================================
// An answer lives in two coordinate spaces:
//
//   TextSpan  — half-open byte offsets into a context string
//   SpanLabel — inclusive token indices into the full encoded
//               <s> question </s></s> context </s> sequence
//
// SpanLabel::NoSpan replaces a magic out-of-range index: an item
// without a usable answer can never be confused with a real answer
// starting at token 0, and the reason is kept for metrics.

use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` byte range into a context string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end:   usize,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The text covered by this span, if it lies on character boundaries.
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end)
    }
}

/// Why an item has no token-level answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoSpanReason {
    /// No gold answer occurs in the context (or none was given).
    AnswerAbsent,
    /// The answer occurs but no occurrence could be aligned exactly.
    AlignmentFailed,
    /// The answer was aligned but fell outside the encoded window.
    Truncated,
}

/// Token-level training label for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanLabel {
    Span { start: usize, end: usize },
    NoSpan(NoSpanReason),
}

impl SpanLabel {
    pub fn span(start: usize, end: usize) -> Self {
        SpanLabel::Span { start, end }
    }

    pub fn positions(&self) -> Option<(usize, usize)> {
        match *self {
            SpanLabel::Span { start, end } => Some((start, end)),
            SpanLabel::NoSpan(_) => None,
        }
    }

    pub fn is_span(&self) -> bool {
        matches!(self, SpanLabel::Span { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_respects_char_boundaries() {
        let text = "café au lait";
        assert_eq!(TextSpan::new(0, 5).slice(text), Some("café"));
        // byte 4 is inside the two-byte 'é'
        assert_eq!(TextSpan::new(0, 4).slice(text), None);
    }

    #[test]
    fn test_no_span_has_no_positions() {
        assert_eq!(SpanLabel::span(0, 0).positions(), Some((0, 0)));
        assert_eq!(SpanLabel::NoSpan(NoSpanReason::Truncated).positions(), None);
        assert!(!SpanLabel::NoSpan(NoSpanReason::AnswerAbsent).is_span());
    }
}
