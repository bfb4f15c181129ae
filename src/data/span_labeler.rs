// ============================================================
// Layer 4 — Span Labeler
// ============================================================
// Turns gold answer strings into token-level start/end labels for
// the full pair sequence:
//
//   <s> question </s></s> context </s> <pad>...
//                         ▲
//                         context_start
//
// Steps per item:
//   1. For every gold answer, search its occurrences in the context
//      and keep the first one the Alignment Corrector accepts.
//   2. Pick one of the kept spans with the injected RNG.
//   3. Map the first and last answer characters to tokens of the
//      stand-alone context encoding.
//   4. Shift those tokens into pair-sequence coordinates.
//
// Any failure yields SpanLabel::NoSpan with the reason; the rest of
// the batch is unaffected.

use rand::{seq::SliceRandom, Rng};

use crate::data::alignment::correct_alignment;
use crate::domain::span::{NoSpanReason, SpanLabel, TextSpan};
use crate::domain::traits::{ContextEncoding, PairEncoding};

/// Locate one gold answer in `context`.
///
/// Each answer contributes at most one span: its first verbatim
/// occurrence, or failing that the first occurrence of the trimmed answer
/// that aligns exactly. Among the contributing answers one is chosen uniformly.
pub fn find_answer_span<R: Rng + ?Sized>(
    context: &str,
    answers: &[String],
    rng:     &mut R,
) -> Result<TextSpan, NoSpanReason> {
    let mut aligned  = Vec::new();
    let mut occurred = false;

    for answer in answers {
        if answer.trim().is_empty() {
            continue;
        }

        // A verbatim occurrence is taken as is.
        if let Some(pos) = context.find(answer.as_str()) {
            occurred = true;
            aligned.push(TextSpan::new(pos, pos + answer.len()));
            continue;
        }

        // Otherwise search without surrounding whitespace and let the
        // corrector decide whether the annotated form fits.
        let needle = answer.trim();
        for (pos, _) in context.match_indices(needle) {
            occurred = true;
            let approx = TextSpan::new(pos, pos + needle.len());
            if let Some(span) = correct_alignment(context, answer, approx) {
                aligned.push(span);
                break;
            }
        }
    }

    match aligned.choose(rng) {
        Some(span) => Ok(*span),
        None if occurred => Err(NoSpanReason::AlignmentFailed),
        None => Err(NoSpanReason::AnswerAbsent),
    }
}

/// Compute the token-level label of row `row` of `pair`.
#[allow(clippy::too_many_arguments)]
pub fn label_item<R: Rng + ?Sized>(
    pair:         &PairEncoding,
    row:          usize,
    sep_token_id: u32,
    context:      &str,
    encoding:     &ContextEncoding,
    answers:      &[String],
    rng:          &mut R,
) -> SpanLabel {
    let span = match find_answer_span(context, answers, rng) {
        Ok(span) => span,
        Err(reason) => return SpanLabel::NoSpan(reason),
    };

    match token_span(pair, row, sep_token_id, context, encoding, span) {
        Some((start, end)) => SpanLabel::span(start, end),
        None => {
            tracing::debug!(
                "Answer at bytes {}..{} of item {} is outside the encoded window",
                span.start,
                span.end,
                row,
            );
            SpanLabel::NoSpan(NoSpanReason::Truncated)
        }
    }
}

/// Pair-sequence token indices of the first and last answer characters.
fn token_span(
    pair:         &PairEncoding,
    row:          usize,
    sep_token_id: u32,
    context:      &str,
    encoding:     &ContextEncoding,
    span:         TextSpan,
) -> Option<(usize, usize)> {
    let (first, last) = content_bounds(context, span)?;

    let start_local = encoding.char_to_token(first)?;
    let end_local   = encoding.char_to_token(last)?;

    let context_start = pair.context_start(row, sep_token_id)?;
    let start         = encoding.to_pair_index(start_local, context_start)?;
    let end           = encoding.to_pair_index(end_local, context_start)?;

    // The pair row may have been truncated harder than the stand-alone
    // context; the label must point at the same tokens in both.
    let ids = pair.input_ids.get(row)?;
    if end >= pair.real_len(row)
        || ids.get(start) != encoding.input_ids.get(start_local)
        || ids.get(end) != encoding.input_ids.get(end_local)
    {
        return None;
    }

    Some((start, end))
}

/// Byte offsets of the first and last non-whitespace characters of `span`.
fn content_bounds(context: &str, span: TextSpan) -> Option<(usize, usize)> {
    let text = span.slice(context)?;
    let mut chars = text
        .char_indices()
        .filter(|(_, c)| !c.is_whitespace())
        .map(|(offset, _)| span.start + offset);
    let first = chars.next()?;
    let last  = chars.next_back().unwrap_or(first);
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    use crate::domain::traits::QaTokenizer;
    use crate::infra::tokenizer_store::{HfQaTokenizer, TokenizerStore};

    const QUESTION: &str = "What is the capital?";
    const CONTEXT:  &str = "Paris is the capital of France.";

    fn answers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn tokenizer(max_len: usize) -> HfQaTokenizer {
        let corpus = [QUESTION, CONTEXT, "Lyon Marseille Nice"];
        let tok    = TokenizerStore::build_word_level(&corpus).unwrap();
        HfQaTokenizer::new(tok, max_len).unwrap()
    }

    fn label(tok: &HfQaTokenizer, context: &str, gold: &[&str]) -> SpanLabel {
        let pair = tok.encode_pairs(&[QUESTION], &[context]).unwrap();
        let enc  = tok.encode_context(context).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        label_item(&pair, 0, tok.sep_token_id(), context, &enc, &answers(gold), &mut rng)
    }

    #[test]
    fn test_find_first_answer() {
        let mut rng = StdRng::seed_from_u64(0);
        let span = find_answer_span(CONTEXT, &answers(&["capital"]), &mut rng).unwrap();
        assert_eq!(span.slice(CONTEXT), Some("capital"));
    }

    #[test]
    fn test_empty_answer_list_is_absent() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            find_answer_span(CONTEXT, &[], &mut rng),
            Err(NoSpanReason::AnswerAbsent)
        );
        assert_eq!(
            find_answer_span(CONTEXT, &answers(&["Berlin", "   "]), &mut rng),
            Err(NoSpanReason::AnswerAbsent)
        );
    }

    #[test]
    fn test_second_occurrence_when_first_does_not_align() {
        // "Paris " (trailing space) only occurs verbatim at the second "Paris"
        let ctx = "Paris, then Paris again";
        let mut rng = StdRng::seed_from_u64(0);
        let span = find_answer_span(ctx, &answers(&["Paris "]), &mut rng).unwrap();
        assert_eq!(span, TextSpan::new(12, 18));
        assert_eq!(span.slice(ctx), Some("Paris "));
    }

    #[test]
    fn test_verbatim_answer_keeps_surrounding_spaces() {
        let ctx = "city is Paris now";
        let mut rng = StdRng::seed_from_u64(0);

        let span = find_answer_span(ctx, &answers(&[" Paris "]), &mut rng).unwrap();
        assert_eq!(span, TextSpan::new(7, 14));

        let wide = "city is  Paris  now";
        let span = find_answer_span(wide, &answers(&["  Paris  "]), &mut rng).unwrap();
        assert_eq!(span.slice(wide), Some("  Paris  "));
    }

    #[test]
    fn test_unalignable_answer_reports_alignment_failure() {
        // occurs trimmed, but neither neighbour character is a space
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            find_answer_span("xParisx", &answers(&[" Paris "]), &mut rng),
            Err(NoSpanReason::AlignmentFailed)
        );
    }

    #[test]
    fn test_random_choice_is_seeded() {
        let ctx  = "alpha beta gamma delta";
        let gold = answers(&["alpha", "beta", "gamma", "delta"]);
        let pick = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            find_answer_span(ctx, &gold, &mut rng).unwrap()
        };
        assert_eq!(pick(11), pick(11));

        let seen: std::collections::HashSet<_> = (0..64).map(pick).collect();
        assert!(seen.len() > 1);
        for span in seen {
            assert!(gold.iter().any(|g| span.slice(ctx) == Some(g.as_str())));
        }
    }

    #[test]
    fn test_label_round_trips_through_decode() {
        let tok = tokenizer(64);
        for gold in ["Paris", "the capital", "France", "France."] {
            let SpanLabel::Span { start, end } = label(&tok, CONTEXT, &[gold]) else {
                panic!("no span for {gold}");
            };
            let pair = tok.encode_pairs(&[QUESTION], &[CONTEXT]).unwrap();
            let text = tok.decode(&pair.input_ids[0][start..=end]).unwrap();
            assert_eq!(text.split_whitespace().collect::<String>(),
                       gold.split_whitespace().collect::<String>());
        }
    }

    #[test]
    fn test_label_matches_two_separator_offset() {
        let tok  = tokenizer(64);
        let pair = tok.encode_pairs(&[QUESTION], &[CONTEXT]).unwrap();
        let sep  = pair.input_ids[0].iter().position(|&id| id == tok.sep_token_id()).unwrap();

        // "Paris" is the first context token (local index 1 after <s>)
        assert_eq!(label(&tok, CONTEXT, &["Paris"]), SpanLabel::span(1 + sep + 1, 1 + sep + 1));
    }

    #[test]
    fn test_missing_answer_is_never_token_zero() {
        let tok = tokenizer(64);
        assert_eq!(
            label(&tok, CONTEXT, &["Berlin"]),
            SpanLabel::NoSpan(NoSpanReason::AnswerAbsent)
        );
        assert_eq!(label(&tok, CONTEXT, &[]), SpanLabel::NoSpan(NoSpanReason::AnswerAbsent));
    }

    #[test]
    fn test_truncated_answer_gets_no_span() {
        // 12 tokens leave room for at most 5 of the 7 context tokens,
        // so "France" is cut from the pair while the context alone fits
        let tok = tokenizer(12);
        let ctx = "Paris is the capital of France.";
        assert_eq!(
            label(&tok, ctx, &["France"]),
            SpanLabel::NoSpan(NoSpanReason::Truncated)
        );
        // an answer inside the window still labels
        assert!(label(&tok, ctx, &["Paris"]).is_span());
    }
}
