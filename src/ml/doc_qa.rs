// ============================================================
// Layer 5 — Multi-Page Question Answering
// ============================================================
// DocQa wraps a tokenizer and a model and runs one forward pass
// over a batch of questions, each asked against a (possibly
// multi-page) document.
//
// oracle / concat / none:
//   encode (question, flattened context) pairs
//   → span labels (+ token→page maps for concat)
//   → one model call for the whole batch, labels attached
//   → decode answers, pick pages
//
// logits:
//   for every item, for every page: one model call on
//   (question, page); keep the page with the highest mean of
//   best start/end logits and decode its answer. No labels.
//
// Labels and page maps are rebuilt on every call; nothing is
// cached between calls except the injected RNG's state.

use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use crate::data::page_map::PageTokenMap;
use crate::data::span_labeler::label_item;
use crate::domain::document::DocBatch;
use crate::domain::span::SpanLabel;
use crate::domain::traits::{PairEncoding, QaModel, QaModelOutput, QaTokenizer};
use crate::error::{DocQaError, Result};
use crate::infra::config::DocQaConfig;
use crate::ml::decoder::{decode_answer, decode_batch, DecodedAnswer};
use crate::ml::retrieval::{concat_pages, oracle_pages, page_score, BestPage, PageRetrieval};

/// Raw model output(s) of one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutputs {
    /// One output row per item (oracle, concat, none).
    Batch(QaModelOutput),
    /// Output of the selected page per item (logits); None for items
    /// without pages.
    PerItem(Vec<Option<QaModelOutput>>),
}

impl ModelOutputs {
    /// Training loss, when the pass was labelled.
    pub fn loss(&self) -> Option<f32> {
        match self {
            ModelOutputs::Batch(output) => output.loss,
            ModelOutputs::PerItem(_) => None,
        }
    }
}

/// Everything one forward pass produces.
#[derive(Debug, Clone, PartialEq)]
pub struct DocQaOutput {
    pub outputs: ModelOutputs,

    /// Span labels fed to the model; None in `logits` mode.
    pub labels: Option<Vec<SpanLabel>>,

    /// Decoded answers, only when requested.
    pub answers: Option<Vec<String>>,

    /// Page per item; None in `none` mode.
    pub answer_pages: Option<Vec<Option<usize>>>,

    /// Answer confidence per item, only when answers were requested.
    pub confidences: Option<Vec<f32>>,
}

/// One item's prediction, flattened for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub question:    String,
    pub answer:      String,
    pub confidence:  f32,
    pub answer_page: Option<usize>,
}

pub struct DocQa<T, M> {
    tokenizer:      T,
    model:          M,
    page_retrieval: PageRetrieval,
    batch_size:     usize,
    rng:            StdRng,
}

impl<T: QaTokenizer, M: QaModel> DocQa<T, M> {
    /// Validate `config` and assemble the pipeline. Configuration problems
    /// surface here, before any batch is processed.
    pub fn new(config: &DocQaConfig, tokenizer: T, model: M) -> Result<Self> {
        let page_retrieval = config.validate()?;
        if page_retrieval == PageRetrieval::Custom {
            return Err(DocQaError::config(format!(
                "'custom' retrieval requires a hierarchical model, not {}",
                config.model_name
            )));
        }

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        tracing::info!(
            "DocQa ready: page_retrieval={} batch_size={}",
            page_retrieval,
            config.batch_size
        );

        Ok(Self {
            tokenizer,
            model,
            page_retrieval,
            batch_size: config.batch_size,
            rng,
        })
    }

    pub fn page_retrieval(&self) -> PageRetrieval {
        self.page_retrieval
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run one forward pass. Answers and confidences are only decoded when
    /// `return_answers` is set.
    pub fn forward(&mut self, batch: &DocBatch, return_answers: bool) -> Result<DocQaOutput> {
        match self.page_retrieval {
            PageRetrieval::Logits => self.forward_per_page(batch, return_answers),
            _ => self.forward_joint(batch, return_answers),
        }
    }

    /// Encode the batch and compute span labels, plus token→page maps in
    /// `concat` mode.
    pub fn label_batch(
        &mut self,
        batch: &DocBatch,
    ) -> Result<(PairEncoding, Vec<SpanLabel>, Vec<PageTokenMap>)> {
        let flats: Vec<_> = batch.items.iter().map(|item| item.flat_context()).collect();
        let questions: Vec<&str> = batch.items.iter().map(|item| item.question.as_str()).collect();
        let contexts: Vec<&str> = flats.iter().map(|flat| flat.text.as_str()).collect();

        let pair   = self.tokenizer.encode_pairs(&questions, &contexts)?;
        let sep_id = self.tokenizer.sep_token_id();

        let mut labels    = Vec::with_capacity(batch.len());
        let mut page_maps = Vec::new();

        for (row, (item, flat)) in batch.items.iter().zip(&flats).enumerate() {
            let encoding = self.tokenizer.encode_context(&flat.text)?;

            labels.push(label_item(
                &pair,
                row,
                sep_id,
                &flat.text,
                &encoding,
                &item.answers,
                &mut self.rng,
            ));

            if self.page_retrieval == PageRetrieval::Concat {
                page_maps.push(PageTokenMap::build(
                    &flat.text,
                    &flat.page_markers,
                    &encoding,
                    pair.context_start(row, sep_id),
                ));
            }
        }

        Ok((pair, labels, page_maps))
    }

    fn forward_joint(&mut self, batch: &DocBatch, return_answers: bool) -> Result<DocQaOutput> {
        if batch.is_empty() {
            return Ok(DocQaOutput {
                outputs:      ModelOutputs::Batch(QaModelOutput::default()),
                labels:       Some(Vec::new()),
                answers:      return_answers.then(Vec::new),
                answer_pages: (self.page_retrieval != PageRetrieval::None).then(Vec::new),
                confidences:  return_answers.then(Vec::new),
            });
        }

        let (pair, labels, page_maps) = self.label_batch(batch)?;
        let output = self.model.forward(&pair.input_ids, &pair.attention_mask, Some(&labels))?;
        if output.len() != batch.len() {
            return Err(DocQaError::model(
                "running the batch",
                format!("{} output rows for {} items", output.len(), batch.len()),
            ));
        }

        let decoded = if return_answers {
            Some(decode_batch(&self.tokenizer, &pair.input_ids, &output)?)
        } else {
            None
        };

        let answer_pages = match self.page_retrieval {
            PageRetrieval::Oracle => Some(oracle_pages(batch)),
            PageRetrieval::Concat => Some(concat_pages(&output, &page_maps)),
            _ => None,
        };

        let unlabelled = labels.iter().filter(|label| !label.is_span()).count();
        tracing::debug!(
            "Forward pass: {} items, {} without a usable span, loss={:?}",
            batch.len(),
            unlabelled,
            output.loss
        );

        let (answers, confidences) = split_decoded(decoded);
        Ok(DocQaOutput {
            outputs: ModelOutputs::Batch(output),
            labels: Some(labels),
            answers,
            answer_pages,
            confidences,
        })
    }

    fn forward_per_page(&mut self, batch: &DocBatch, return_answers: bool) -> Result<DocQaOutput> {
        let mut outputs = Vec::with_capacity(batch.len());
        let mut pages   = Vec::with_capacity(batch.len());
        let mut decoded = Vec::with_capacity(batch.len());

        for item in &batch.items {
            let page_texts = item.context.pages();
            if page_texts.is_empty() {
                outputs.push(None);
                pages.push(None);
                decoded.push(None);
                continue;
            }

            let questions = vec![item.question.as_str(); page_texts.len()];
            let encoding  = self.tokenizer.encode_pairs(&questions, &page_texts)?;

            let mut best = BestPage::new();
            for page_idx in 0..encoding.len() {
                let output = self.model.forward(
                    &encoding.input_ids[page_idx..=page_idx],
                    &encoding.attention_mask[page_idx..=page_idx],
                    None,
                )?;
                if let Some(score) = page_score(&output) {
                    tracing::debug!("Page {} score {:.4}", page_idx, score);
                    best.offer(page_idx, score, output);
                }
            }

            match best.into_inner() {
                Some((page_idx, output)) => {
                    let answer = if return_answers {
                        Some(decode_answer(
                            &self.tokenizer,
                            &encoding.input_ids[page_idx],
                            &output.start_logits[0],
                            &output.end_logits[0],
                        )?)
                    } else {
                        None
                    };
                    outputs.push(Some(output));
                    pages.push(Some(page_idx));
                    decoded.push(answer);
                }
                None => {
                    outputs.push(None);
                    pages.push(None);
                    decoded.push(None);
                }
            }
        }

        let decoded = return_answers.then(|| {
            decoded
                .into_iter()
                .map(|answer| answer.unwrap_or_else(empty_answer))
                .collect::<Vec<_>>()
        });
        let (answers, confidences) = split_decoded(decoded);

        Ok(DocQaOutput {
            outputs: ModelOutputs::PerItem(outputs),
            labels: None,
            answers,
            answer_pages: Some(pages),
            confidences,
        })
    }

    /// Answer every item, `batch_size` items per forward pass.
    pub fn predict(&mut self, batch: &DocBatch) -> Result<Vec<Prediction>> {
        let mut predictions = Vec::with_capacity(batch.len());

        for chunk in batch.items.chunks(self.batch_size.max(1)) {
            let sub_batch = DocBatch::new(chunk.to_vec());
            let output    = self.forward(&sub_batch, true)?;

            let answers     = output.answers.unwrap_or_default();
            let confidences = output.confidences.unwrap_or_default();
            let pages       = output
                .answer_pages
                .unwrap_or_else(|| vec![None; sub_batch.len()]);

            for (i, item) in sub_batch.items.iter().enumerate() {
                predictions.push(Prediction {
                    question:    item.question.clone(),
                    answer:      answers.get(i).cloned().unwrap_or_default(),
                    confidence:  confidences.get(i).copied().unwrap_or(0.0),
                    answer_page: pages.get(i).copied().flatten(),
                });
            }
        }

        Ok(predictions)
    }
}

fn empty_answer() -> DecodedAnswer {
    DecodedAnswer {
        text:       String::new(),
        confidence: 0.0,
        start:      0,
        end:        0,
    }
}

fn split_decoded(decoded: Option<Vec<DecodedAnswer>>) -> (Option<Vec<String>>, Option<Vec<f32>>) {
    match decoded {
        Some(answers) => {
            let confidences = answers.iter().map(|a| a.confidence).collect();
            let texts       = answers.into_iter().map(|a| a.text).collect();
            (Some(texts), Some(confidences))
        }
        None => (None, None),
    }
}
