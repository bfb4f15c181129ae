// ============================================================
// Layer 5 — Answer Decoder
// ============================================================
// Reads an answer out of start/end logits:
//
//   start = argmax(start_logits)
//   end   = argmax(end_logits)          (chosen independently)
//   text  = decode(ids[start..=end]).trim()
//   conf  = softmax(start_logits)[start] * softmax(end_logits)[end]
//
// The confidence is the probability of the (start, end) pair when
// start and end are treated as independent distributions.
//
// When end < start there is no span: the answer is empty and the
// confidence is 0.

use serde::{Deserialize, Serialize};

use crate::domain::traits::{QaModelOutput, QaTokenizer};
use crate::error::{DocQaError, Result};

/// One decoded answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedAnswer {
    pub text:       String,
    pub confidence: f32,
    /// Token indices of the chosen start and end.
    pub start:      usize,
    pub end:        usize,
}

/// Index of the largest value; the first one wins on ties.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((idx, v));
        }
    }
    best.map(|(idx, _)| idx)
}

/// Largest value of a logit row.
pub fn max_logit(values: &[f32]) -> Option<f32> {
    argmax(values).map(|idx| values[idx])
}

/// Numerically stable softmax.
pub fn softmax(values: &[f32]) -> Vec<f32> {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Decode the answer of one item.
pub fn decode_answer<T: QaTokenizer + ?Sized>(
    tokenizer:    &T,
    input_ids:    &[u32],
    start_logits: &[f32],
    end_logits:   &[f32],
) -> Result<DecodedAnswer> {
    let (start, end) = argmax(start_logits)
        .zip(argmax(end_logits))
        .ok_or_else(|| DocQaError::invalid_input("cannot decode an answer from empty logits"))?;

    if end < start {
        tracing::debug!("Predicted end {} precedes start {}; empty answer", end, start);
        return Ok(DecodedAnswer {
            text: String::new(),
            confidence: 0.0,
            start,
            end,
        });
    }

    let answer_ids = input_ids.get(start..=end).unwrap_or_default();
    let text       = tokenizer.decode(answer_ids)?.trim().to_string();
    let confidence = softmax(start_logits)[start] * softmax(end_logits)[end];

    tracing::debug!("Span [{},{}] conf={:.4} answer='{}'", start, end, confidence, text);

    Ok(DecodedAnswer {
        text,
        confidence,
        start,
        end,
    })
}

/// Decode every row of `output` against the matching row of `input_ids`.
pub fn decode_batch<T: QaTokenizer + ?Sized>(
    tokenizer: &T,
    input_ids: &[Vec<u32>],
    output:    &QaModelOutput,
) -> Result<Vec<DecodedAnswer>> {
    if input_ids.len() != output.len() {
        return Err(DocQaError::invalid_input(format!(
            "{} token rows for {} logit rows",
            input_ids.len(),
            output.len()
        )));
    }

    input_ids
        .iter()
        .zip(output.start_logits.iter().zip(&output.end_logits))
        .map(|(ids, (start, end))| decode_answer(tokenizer, ids, start, end))
        .collect()
}
