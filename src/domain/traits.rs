// ============================================================
// Layer 3 — Core Traits (Collaborator Seams)
// ============================================================
// The question-answering core never touches a concrete model or
// tokenizer. It talks to them through two traits:
//
//   QaTokenizer — text → token ids, offsets, and back to text
//   QaModel     — token ids → per-token start/end logits
//
// Implementations:
//   - HfQaTokenizer (infra::tokenizer_store) → HuggingFace tokenizers
//   - BurnQaModel   (ml::model)              → burn transformer encoder
//   - scripted fakes in the unit tests
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use crate::domain::span::SpanLabel;
use crate::error::Result;

// ─── Encodings ────────────────────────────────────────────────────────────────

/// A padded batch of (question, context) pair encodings.
/// Every row has the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairEncoding {
    pub input_ids:      Vec<Vec<u32>>,
    pub attention_mask: Vec<Vec<u32>>,
}

impl PairEncoding {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Index of the first token of the context segment in `row`.
    ///
    /// The context starts after the first run of separator tokens, so for
    /// `<s> q </s></s> c </s>` this is the first separator index + 2.
    /// Returns None when the row has no separator at all.
    pub fn context_start(&self, row: usize, sep_token_id: u32) -> Option<usize> {
        let ids     = self.input_ids.get(row)?;
        let sep_idx = ids.iter().position(|&id| id == sep_token_id)?;
        let run     = ids[sep_idx..].iter().take_while(|&&id| id == sep_token_id).count();
        Some(sep_idx + run)
    }

    /// Number of non-padding tokens in `row`.
    pub fn real_len(&self, row: usize) -> usize {
        self.attention_mask
            .get(row)
            .map(|mask| mask.iter().filter(|&&m| m != 0).count())
            .unwrap_or(0)
    }
}

/// Stand-alone encoding of one context string (special tokens included),
/// with the byte offsets each token covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextEncoding {
    pub input_ids: Vec<u32>,

    /// `(start, end)` byte offsets per token; special tokens cover nothing.
    pub offsets: Vec<(usize, usize)>,

    /// true for tokens added by the tokenizer (`<s>`, `</s>`, padding).
    pub special_tokens_mask: Vec<bool>,
}

impl ContextEncoding {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }

    /// Number of special tokens (e.g. `<s>`) before the first text token.
    pub fn leading_special_tokens(&self) -> usize {
        self.special_tokens_mask.iter().take_while(|&&special| special).count()
    }

    /// Map a context-local token index into a pair sequence whose context
    /// segment starts at `context_start`.
    pub fn to_pair_index(&self, local: usize, context_start: usize) -> Option<usize> {
        (local + context_start).checked_sub(self.leading_special_tokens())
    }

    /// Inverse of `to_pair_index`.
    pub fn from_pair_index(&self, pair_index: usize, context_start: usize) -> Option<usize> {
        (pair_index + self.leading_special_tokens()).checked_sub(context_start)
    }

    /// Token owning the byte at `offset`, or None when the byte is
    /// whitespace dropped by the pre-tokenizer or was truncated away.
    pub fn char_to_token(&self, offset: usize) -> Option<usize> {
        self.offsets
            .iter()
            .zip(&self.special_tokens_mask)
            .position(|(&(start, end), &special)| !special && start <= offset && offset < end)
    }
}

// ─── Model Output ─────────────────────────────────────────────────────────────

/// Start and end logits, one row per item and one column per token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QaModelOutput {
    pub start_logits: Vec<Vec<f32>>,
    pub end_logits:   Vec<Vec<f32>>,

    /// Mean span loss, present when labels were given and at least one
    /// item had a usable span.
    pub loss: Option<f32>,
}

impl QaModelOutput {
    pub fn len(&self) -> usize {
        self.start_logits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.start_logits.is_empty()
    }

    /// Copy out a single row as a one-item output.
    pub fn row(&self, idx: usize) -> Option<QaModelOutput> {
        Some(QaModelOutput {
            start_logits: vec![self.start_logits.get(idx)?.clone()],
            end_logits:   vec![self.end_logits.get(idx)?.clone()],
            loss:         None,
        })
    }
}

// ─── Traits ───────────────────────────────────────────────────────────────────

/// Tokenizer used by the question-answering core.
pub trait QaTokenizer {
    /// Batch-encode (question, context) pairs with padding and truncation.
    fn encode_pairs(&self, questions: &[&str], contexts: &[&str]) -> Result<PairEncoding>;

    /// Encode one context on its own, keeping token offsets.
    fn encode_context(&self, context: &str) -> Result<ContextEncoding>;

    /// Id of the separator token between question and context.
    fn sep_token_id(&self) -> u32;

    /// Turn token ids back into text, dropping special tokens.
    fn decode(&self, ids: &[u32]) -> Result<String>;
}

/// Extractive question-answering model.
pub trait QaModel {
    /// Run one forward pass. When `labels` is given the output carries a loss
    /// computed over the items whose label is a span.
    fn forward(
        &self,
        input_ids:      &[Vec<u32>],
        attention_mask: &[Vec<u32>],
        labels:         Option<&[SpanLabel]>,
    ) -> Result<QaModelOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_start_skips_separator_run() {
        let enc = PairEncoding {
            input_ids:      vec![vec![0, 7, 8, 2, 2, 9, 2, 1]],
            attention_mask: vec![vec![1, 1, 1, 1, 1, 1, 1, 0]],
        };
        assert_eq!(enc.context_start(0, 2), Some(5));
        assert_eq!(enc.real_len(0), 7);
        assert_eq!(enc.context_start(0, 42), None);
        assert_eq!(enc.context_start(3, 2), None);
    }

    #[test]
    fn test_char_to_token_skips_specials_and_gaps() {
        let enc = ContextEncoding {
            input_ids:           vec![0, 10, 11, 2],
            offsets:             vec![(0, 0), (0, 5), (6, 8), (0, 0)],
            special_tokens_mask: vec![true, false, false, true],
        };
        assert_eq!(enc.char_to_token(0), Some(1));
        assert_eq!(enc.char_to_token(4), Some(1));
        // the space between the two words belongs to no token
        assert_eq!(enc.char_to_token(5), None);
        assert_eq!(enc.char_to_token(7), Some(2));
        assert_eq!(enc.char_to_token(8), None);
    }

    #[test]
    fn test_pair_index_round_trip() {
        let enc = ContextEncoding {
            input_ids:           vec![0, 10, 11, 2],
            offsets:             vec![(0, 0), (0, 5), (6, 8), (0, 0)],
            special_tokens_mask: vec![true, false, false, true],
        };
        assert_eq!(enc.leading_special_tokens(), 1);
        // <s> q q </s></s> → context segment starts at 5
        assert_eq!(enc.to_pair_index(1, 5), Some(5));
        assert_eq!(enc.from_pair_index(6, 5), Some(2));
        // inside the question segment
        assert_eq!(enc.from_pair_index(2, 5), None);
    }

    #[test]
    fn test_output_row() {
        let out = QaModelOutput {
            start_logits: vec![vec![1.0], vec![2.0]],
            end_logits:   vec![vec![3.0], vec![4.0]],
            loss:         Some(0.5),
        };
        let row = out.row(1).unwrap();
        assert_eq!(row.start_logits, vec![vec![2.0]]);
        assert_eq!(row.loss, None);
        assert!(out.row(2).is_none());
    }
}
