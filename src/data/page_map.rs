// ============================================================
// Layer 4 — Page Correspondence Builder
// ============================================================
// In `concat` mode every page of a document is flattened into one
// context. To say which page a predicted answer came from, each
// context token is tagged with the page it belongs to.
//
//   page markers (per char):  a a a ∅ b b ∅ c c
//   boundaries (byte offset): 0, 4, 7
//   boundary tokens:          t0, t1, t2
//   token pages:              [t0, t1) → 0, [t1, t2) → 1, [t2, ..) → 2
//
// Tokens before the first resolved boundary have no page. The first
// boundary without a token (whitespace, or truncated away) freezes
// the map: the page before it runs to the end of the encoding.

use crate::domain::traits::ContextEncoding;

/// Page index per context token, anchored in the pair sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTokenMap {
    pages: Vec<Option<usize>>,

    /// Where the context segment starts in the pair sequence, plus the
    /// number of leading special tokens of the stand-alone encoding.
    anchor: Option<(usize, usize)>,
}

impl PageTokenMap {
    /// Build the map for one item.
    ///
    /// `page_markers` has one entry per character of `text`; None marks a
    /// boundary character. `context_start` is the index of the first context
    /// token in the (question, context) pair row.
    pub fn build(
        text:          &str,
        page_markers:  &[Option<usize>],
        encoding:      &ContextEncoding,
        context_start: Option<usize>,
    ) -> Self {
        let boundaries = page_boundaries(text, page_markers);
        let boundary_tokens: Vec<Option<usize>> = boundaries
            .iter()
            .map(|&offset| encoding.char_to_token(offset))
            .collect();

        let mut pages = vec![None; encoding.len()];

        for (page_idx, token) in boundary_tokens.iter().enumerate() {
            let Some(start) = *token else {
                tracing::debug!(
                    "Page boundary {} at byte {} has no token; page map frozen",
                    page_idx,
                    boundaries[page_idx],
                );
                break;
            };

            let end = boundary_tokens
                .get(page_idx + 1)
                .copied()
                .flatten()
                .unwrap_or(pages.len());

            if start < end {
                pages[start..end].fill(Some(page_idx));
            }
        }

        Self {
            pages,
            anchor: context_start.map(|start| (start, encoding.leading_special_tokens())),
        }
    }

    /// Page per context-local token.
    pub fn pages(&self) -> &[Option<usize>] {
        &self.pages
    }

    /// Page of the token at `pair_index` in the pair sequence. None for
    /// question tokens, unmapped tokens and indices past the map.
    pub fn page_at(&self, pair_index: usize) -> Option<usize> {
        let (context_start, lead) = self.anchor?;
        let local = (pair_index + lead).checked_sub(context_start)?;
        self.pages.get(local).copied().flatten()
    }
}

/// Byte offsets where a new page starts: 0, then one past every
/// boundary character.
pub fn page_boundaries(text: &str, page_markers: &[Option<usize>]) -> Vec<usize> {
    let mut boundaries = vec![0];
    boundaries.extend(
        text.char_indices()
            .zip(page_markers)
            .filter(|(_, marker)| marker.is_none())
            .map(|((offset, c), _)| offset + c.len_utf8()),
    );
    boundaries
}
