// ============================================================
// Layer 5 — Page Retrieval Strategies
// ============================================================
// Decides which page of a document holds the answer:
//
//   oracle — trust the gold page of each item
//   concat — pages were flattened into one context; trace the
//            predicted start token back to its page
//   logits — one forward pass per page; the page whose best
//            start/end logits are highest wins
//   none   — documents have no page concept
//
// `custom` is accepted by the parser because hierarchical models use
// it, but no strategy here implements it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::data::page_map::PageTokenMap;
use crate::domain::document::DocBatch;
use crate::domain::traits::QaModelOutput;
use crate::error::DocQaError;
use crate::ml::decoder::{argmax, max_logit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageRetrieval {
    Oracle,
    Concat,
    Logits,
    None,
    Custom,
}

impl PageRetrieval {
    /// Parse an optional configuration value; absent means `none`.
    pub fn from_config(value: Option<&str>) -> Result<Self, DocQaError> {
        value.map_or(Ok(PageRetrieval::None), |v| v.parse())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PageRetrieval::Oracle => "oracle",
            PageRetrieval::Concat => "concat",
            PageRetrieval::Logits => "logits",
            PageRetrieval::None => "none",
            PageRetrieval::Custom => "custom",
        }
    }
}

impl FromStr for PageRetrieval {
    type Err = DocQaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "oracle" => Ok(PageRetrieval::Oracle),
            "concat" => Ok(PageRetrieval::Concat),
            "logits" => Ok(PageRetrieval::Logits),
            "none" => Ok(PageRetrieval::None),
            "custom" => Ok(PageRetrieval::Custom),
            other => Err(DocQaError::config(format!(
                "unknown page_retrieval '{other}' (expected oracle, concat, logits or none)"
            ))),
        }
    }
}

impl fmt::Display for PageRetrieval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── oracle ───────────────────────────────────────────────────────────────────

pub fn oracle_pages(batch: &DocBatch) -> Vec<Option<usize>> {
    batch.items.iter().map(|item| item.answer_page).collect()
}

// ─── concat ───────────────────────────────────────────────────────────────────

/// Page of each item's predicted start token.
pub fn concat_pages(output: &QaModelOutput, page_maps: &[PageTokenMap]) -> Vec<Option<usize>> {
    output
        .start_logits
        .iter()
        .zip(page_maps)
        .map(|(logits, map)| argmax(logits).and_then(|start| map.page_at(start)))
        .collect()
}

// ─── logits ───────────────────────────────────────────────────────────────────

/// Confidence of a single-page output: mean of its best start and best
/// end logit.
pub fn page_score(output: &QaModelOutput) -> Option<f32> {
    let start = max_logit(output.start_logits.first()?)?;
    let end   = max_logit(output.end_logits.first()?)?;
    Some((start + end) / 2.0)
}

/// Running maximum over pages. Only a strictly higher score replaces the
/// current best, so ties keep the earliest page.
#[derive(Debug)]
pub struct BestPage<T> {
    best: Option<(usize, f32, T)>,
}

impl<T> Default for BestPage<T> {
    fn default() -> Self {
        Self { best: None }
    }
}

impl<T> BestPage<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&mut self, page: usize, score: f32, payload: T) {
        if score.is_nan() {
            return;
        }
        if self.best.as_ref().map_or(true, |(_, best, _)| score > *best) {
            self.best = Some((page, score, payload));
        }
    }

    pub fn page(&self) -> Option<usize> {
        self.best.as_ref().map(|(page, _, _)| *page)
    }

    pub fn into_inner(self) -> Option<(usize, T)> {
        self.best.map(|(page, _, payload)| (page, payload))
    }
}

/// Index of the first maximum of `scores`.
pub fn select_page(scores: &[f32]) -> Option<usize> {
    let mut best = BestPage::new();
    for (page, &score) in scores.iter().enumerate() {
        best.offer(page, score, ());
    }
    best.page()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::DocItem;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Oracle".parse::<PageRetrieval>().unwrap(), PageRetrieval::Oracle);
        assert_eq!("LOGITS".parse::<PageRetrieval>().unwrap(), PageRetrieval::Logits);
        assert_eq!(PageRetrieval::from_config(None).unwrap(), PageRetrieval::None);
        assert_eq!(
            PageRetrieval::from_config(Some(" concat ")).unwrap(),
            PageRetrieval::Concat
        );
    }

    #[test]
    fn test_unknown_mode_is_config_error() {
        assert!(matches!(
            "bm25".parse::<PageRetrieval>(),
            Err(DocQaError::Config { .. })
        ));
    }

    #[test]
    fn test_oracle_returns_gold_pages() {
        let batch = DocBatch::new(vec![
            DocItem::new("q", "a").with_answer_page(1),
            DocItem::new("q", "b"),
        ]);
        assert_eq!(oracle_pages(&batch), vec![Some(1), None]);
    }

    #[test]
    fn test_page_score_is_mean_of_maxima() {
        let out = QaModelOutput {
            start_logits: vec![vec![0.1, 0.8, 0.3]],
            end_logits:   vec![vec![0.4, 0.2, 0.0]],
            loss:         None,
        };
        assert!((page_score(&out).unwrap() - 0.6).abs() < 1e-6);
        assert_eq!(page_score(&QaModelOutput::default()), None);
    }

    #[test]
    fn test_select_first_maximum() {
        assert_eq!(select_page(&[0.3, 0.9]), Some(1));
        assert_eq!(select_page(&[0.5, 0.9, 0.9, 0.1]), Some(1));
        assert_eq!(select_page(&[2.0, 2.0]), Some(0));
        assert_eq!(select_page(&[-1e9, -5e8]), Some(1));
        assert_eq!(select_page(&[f32::NAN, 0.1]), Some(1));
        assert_eq!(select_page(&[]), None);
    }

    #[test]
    fn test_best_page_keeps_payload_of_winner() {
        let mut best = BestPage::new();
        best.offer(0, 0.3, "first");
        best.offer(1, 0.9, "second");
        best.offer(2, 0.9, "third");
        assert_eq!(best.into_inner(), Some((1, "second")));
    }
}
