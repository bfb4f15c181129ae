// ============================================================
// Layer 4 — Alignment Corrector
// ============================================================
// Gold answers and contexts are normalised separately upstream, so
// an answer found by substring search can be off by one character
// at either edge (a stripped or added space, usually).
//
// Candidates tried, in order:
//   a) the span as given
//   b) start moved one character earlier
//   c) end moved one character later
//
// The first candidate whose text equals the answer exactly wins.
// No fuzzy matching beyond that.

use crate::domain::span::TextSpan;

/// Return a span of `context` whose text is exactly `answer`, searching
/// within one character of `approx`. None if no candidate matches.
pub fn correct_alignment(context: &str, answer: &str, approx: TextSpan) -> Option<TextSpan> {
    let candidates = [
        Some(approx),
        prev_boundary(context, approx.start).map(|start| TextSpan::new(start, approx.end)),
        next_boundary(context, approx.end).map(|end| TextSpan::new(approx.start, end)),
    ];

    let found = candidates
        .into_iter()
        .flatten()
        .find(|span| span.slice(context) == Some(answer));

    if found.is_none() {
        tracing::debug!(
            "Alignment failed: context[{}..{}]={:?} answer={:?}",
            approx.start,
            approx.end,
            approx.slice(context).unwrap_or(""),
            answer,
        );
    }
    found
}

/// Byte offset of the character just before `offset`.
fn prev_boundary(text: &str, offset: usize) -> Option<usize> {
    let c = text.get(..offset)?.chars().next_back()?;
    Some(offset - c.len_utf8())
}

/// Byte offset just past the character starting at `offset`.
fn next_boundary(text: &str, offset: usize) -> Option<usize> {
    let c = text.get(offset..)?.chars().next()?;
    Some(offset + c.len_utf8())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CTX: &str = "The capital is Paris, France.";

    #[test]
    fn test_exact_span_is_kept() {
        let span = correct_alignment(CTX, "Paris", TextSpan::new(15, 20));
        assert_eq!(span, Some(TextSpan::new(15, 20)));
    }

    #[test]
    fn test_start_shifted_earlier() {
        // answer carries a leading space the search did not include
        let span = correct_alignment(CTX, " Paris", TextSpan::new(15, 20));
        assert_eq!(span, Some(TextSpan::new(14, 20)));
        assert_eq!(span.unwrap().slice(CTX), Some(" Paris"));
    }

    #[test]
    fn test_end_extended_later() {
        let span = correct_alignment(CTX, "Paris,", TextSpan::new(15, 20));
        assert_eq!(span, Some(TextSpan::new(15, 21)));
    }

    #[test]
    fn test_more_than_one_char_drift_fails() {
        assert_eq!(correct_alignment(CTX, "Paris", TextSpan::new(13, 18)), None);
    }

    #[test]
    fn test_multibyte_neighbours() {
        let ctx  = "à Paris";
        // "à" is two bytes; moving the start back one character lands on 0
        let span = correct_alignment(ctx, "à Paris", TextSpan::new(2, 8));
        assert_eq!(span, Some(TextSpan::new(0, 8)));
    }

    #[test]
    fn test_out_of_range_span_fails_quietly() {
        assert_eq!(correct_alignment("abc", "abc", TextSpan::new(5, 9)), None);
    }

    #[test]
    fn test_every_one_char_drift_recovers() {
        let ctx    = "xx answer yy";
        let answer = "answer";
        let truth  = TextSpan::new(3, 9);
        for approx in [
            truth,
            TextSpan::new(truth.start + 1, truth.end),
            TextSpan::new(truth.start, truth.end - 1),
        ] {
            let span = correct_alignment(ctx, answer, approx).unwrap();
            assert_eq!(span.slice(ctx), Some(answer));
        }
    }
}
