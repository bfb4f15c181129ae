// ============================================================
// Layer 6 — Tokenizer Store and Adapter
// ============================================================
// TokenizerStore loads the HuggingFace `tokenizer.json` shipped
// next to the model weights, or builds a small word-level tokenizer
// in memory from a corpus (used by tests and demos).
//
// HfQaTokenizer adapts a `tokenizers::Tokenizer` to the QaTokenizer
// trait: batch-longest padding, longest-first truncation at the
// model's maximum sequence length, byte offsets per token.
//
// The word-level tokenizer uses the two-separator pair template:
//   single: <s> A </s>
//   pair:   <s> A </s></s> B </s>
//
// Reference: HuggingFace tokenizers documentation

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use tokenizers::{
    PaddingParams, PaddingStrategy, Tokenizer, TruncationParams, TruncationStrategy,
};

use crate::domain::traits::{ContextEncoding, PairEncoding, QaTokenizer};
use crate::error::DocQaError;

const SPECIAL_TOKENS: [&str; 4] = ["<s>", "<pad>", "</s>", "<unk>"];
const SEP_CANDIDATES: [&str; 2] = ["</s>", "[SEP]"];
const PAD_CANDIDATES: [&str; 2] = ["<pad>", "[PAD]"];

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load `tokenizer.json` from the store directory.
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.dir.join("tokenizer.json");
        tracing::info!("Loading tokenizer from '{}'", path.display());
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!("Cannot load tokenizer from '{}': {}", path.display(), e))
    }

    /// Build a word-level tokenizer whose vocabulary is every word and
    /// punctuation run found in `texts`, in first-seen order.
    pub fn build_word_level(texts: &[&str]) -> Result<Tokenizer> {
        let mut vocab: HashMap<String, u32> = SPECIAL_TOKENS
            .iter()
            .enumerate()
            .map(|(id, tok)| (tok.to_string(), id as u32))
            .collect();

        for text in texts {
            for word in pre_tokenize(text) {
                let next_id = vocab.len() as u32;
                vocab.entry(word.to_string()).or_insert(next_id);
            }
        }

        tracing::debug!("Word-level vocabulary has {} entries", vocab.len());

        let added_tokens: Vec<serde_json::Value> = SPECIAL_TOKENS
            .iter()
            .enumerate()
            .map(|(id, tok)| {
                serde_json::json!({
                    "id": id, "content": tok, "single_word": false, "lstrip": false,
                    "rstrip": false, "normalized": false, "special": true
                })
            })
            .collect();

        let tokenizer_json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": added_tokens,
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": {
                "type": "RobertaProcessing",
                "sep": ["</s>", 2],
                "cls": ["<s>", 0],
                "trim_offsets": false,
                "add_prefix_space": false
            },
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": vocab,
                "unk_token": "<unk>"
            }
        });

        Tokenizer::from_str(&serde_json::to_string(&tokenizer_json)?)
            .map_err(|e| anyhow::anyhow!("Cannot build word-level tokenizer: {e}"))
            .context("building tokenizer from corpus")
    }
}

/// Split like the `Whitespace` pre-tokenizer: runs of word characters,
/// or runs of anything that is neither a word character nor whitespace.
fn pre_tokenize(text: &str) -> Vec<&str> {
    #[derive(PartialEq, Clone, Copy)]
    enum Class {
        Word,
        Punct,
        Space,
    }
    let class = |c: char| {
        if c.is_alphanumeric() || c == '_' {
            Class::Word
        } else if c.is_whitespace() {
            Class::Space
        } else {
            Class::Punct
        }
    };

    let mut pieces = Vec::new();
    let mut start: Option<(usize, Class)> = None;

    for (offset, c) in text.char_indices() {
        let cls = class(c);
        match start {
            Some((_, current)) if current == cls => {}
            Some((begin, current)) => {
                if current != Class::Space {
                    pieces.push(&text[begin..offset]);
                }
                start = Some((offset, cls));
            }
            None => start = Some((offset, cls)),
        }
    }
    if let Some((begin, current)) = start {
        if current != Class::Space {
            pieces.push(&text[begin..]);
        }
    }
    pieces
}

// ─── HfQaTokenizer ────────────────────────────────────────────────────────────

/// QaTokenizer backed by a HuggingFace tokenizer.
pub struct HfQaTokenizer {
    tokenizer:    Tokenizer,
    sep_token_id: u32,
}

impl HfQaTokenizer {
    /// Configure padding and truncation on `tokenizer` for sequences of at
    /// most `max_length` tokens.
    pub fn new(mut tokenizer: Tokenizer, max_length: usize) -> Result<Self, DocQaError> {
        let sep_token_id = SEP_CANDIDATES
            .iter()
            .find_map(|tok| tokenizer.token_to_id(tok))
            .ok_or_else(|| DocQaError::config("tokenizer has no separator token"))?;

        let (pad_token, pad_id) = PAD_CANDIDATES
            .iter()
            .find_map(|tok| tokenizer.token_to_id(tok).map(|id| (tok.to_string(), id)))
            .unwrap_or_else(|| ("<pad>".to_string(), 0));

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            pad_id,
            pad_token,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                strategy: TruncationStrategy::LongestFirst,
                ..Default::default()
            }))
            .map_err(|e| DocQaError::tokenizer("configuring truncation", e))?;

        Ok(Self {
            tokenizer,
            sep_token_id,
        })
    }
}

impl QaTokenizer for HfQaTokenizer {
    fn encode_pairs(
        &self,
        questions: &[&str],
        contexts:  &[&str],
    ) -> crate::error::Result<PairEncoding> {
        if questions.len() != contexts.len() {
            return Err(DocQaError::invalid_input(format!(
                "{} questions for {} contexts",
                questions.len(),
                contexts.len()
            )));
        }

        let inputs: Vec<(&str, &str)> = questions
            .iter()
            .copied()
            .zip(contexts.iter().copied())
            .collect();
        let encodings = self
            .tokenizer
            .encode_batch(inputs, true)
            .map_err(|e| DocQaError::tokenizer("encoding question/context pairs", e))?;

        Ok(PairEncoding {
            input_ids:      encodings.iter().map(|e| e.get_ids().to_vec()).collect(),
            attention_mask: encodings.iter().map(|e| e.get_attention_mask().to_vec()).collect(),
        })
    }

    fn encode_context(&self, context: &str) -> crate::error::Result<ContextEncoding> {
        let encoding = self
            .tokenizer
            .encode(context, true)
            .map_err(|e| DocQaError::tokenizer("encoding context", e))?;

        Ok(ContextEncoding {
            input_ids:           encoding.get_ids().to_vec(),
            offsets:             encoding.get_offsets().to_vec(),
            special_tokens_mask: encoding
                .get_special_tokens_mask()
                .iter()
                .map(|&m| m != 0)
                .collect(),
        })
    }

    fn sep_token_id(&self) -> u32 {
        self.sep_token_id
    }

    fn decode(&self, ids: &[u32]) -> crate::error::Result<String> {
        self.tokenizer
            .decode(ids, true)
            .map_err(|e| DocQaError::tokenizer("decoding answer tokens", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qa_tokenizer(max_length: usize) -> HfQaTokenizer {
        let tok = TokenizerStore::build_word_level(&["Who wrote it?", "Ada wrote the notes."])
            .unwrap();
        HfQaTokenizer::new(tok, max_length).unwrap()
    }

    #[test]
    fn test_pre_tokenize_matches_whitespace_split() {
        assert_eq!(
            pre_tokenize("Hello, world!!  x_y 42"),
            vec!["Hello", ",", "world", "!!", "x_y", "42"]
        );
        assert!(pre_tokenize("   ").is_empty());
    }

    #[test]
    fn test_pair_template_has_double_separator() {
        let tok  = qa_tokenizer(64);
        let pair = tok.encode_pairs(&["Who wrote it?"], &["Ada wrote the notes."]).unwrap();
        let ids  = &pair.input_ids[0];
        let sep  = tok.sep_token_id();

        // <s> Who wrote it ? </s></s> Ada wrote the notes . </s>
        assert_eq!(ids.len(), 13);
        assert_eq!(ids[0], 0);
        assert_eq!((ids[5], ids[6]), (sep, sep));
        assert_eq!(pair.context_start(0, sep), Some(7));
        assert_eq!(*ids.last().unwrap(), sep);
    }

    #[test]
    fn test_batch_is_padded_to_longest() {
        let tok  = qa_tokenizer(64);
        let pair = tok
            .encode_pairs(&["Who wrote it?", "Who"], &["Ada wrote the notes.", "Ada"])
            .unwrap();
        assert_eq!(pair.input_ids[0].len(), pair.input_ids[1].len());
        assert_eq!(pair.real_len(1), 6);
        assert_eq!(pair.input_ids[1][6], 1); // <pad>
    }

    #[test]
    fn test_context_offsets_are_bytes() {
        let tok = qa_tokenizer(64);
        let enc = tok.encode_context("Ada wrote the notes.").unwrap();
        assert_eq!(enc.leading_special_tokens(), 1);
        assert_eq!(enc.char_to_token(0), Some(1));
        assert_eq!(enc.char_to_token(3), None);
        assert_eq!(enc.char_to_token(4), Some(2));
        assert_eq!(enc.char_to_token(19), Some(5));
    }

    #[test]
    fn test_decode_skips_specials() {
        let tok  = qa_tokenizer(64);
        let pair = tok.encode_pairs(&["Who"], &["Ada wrote"]).unwrap();
        assert_eq!(tok.decode(&pair.input_ids[0]).unwrap(), "Who Ada wrote");
    }

    #[test]
    fn test_mismatched_batch_is_rejected() {
        let tok = qa_tokenizer(64);
        assert!(matches!(
            tok.encode_pairs(&["a", "b"], &["c"]),
            Err(DocQaError::InvalidInput { .. })
        ));
    }
}
