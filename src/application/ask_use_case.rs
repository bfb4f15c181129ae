// ============================================================
// Layer 2 — Ask Use Case
// ============================================================
// Answers questions against multi-page documents:
//   1. Build the tokenizer and model from `model_weights`
//   2. Wrap them in DocQa with the configured page retrieval
//   3. Answer items `batch_size` at a time
//   4. Optionally write the predictions as JSON

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::domain::document::{DocBatch, DocItem};
use crate::infra::checkpoint::WeightsStore;
use crate::infra::config::DocQaConfig;
use crate::infra::tokenizer_store::{HfQaTokenizer, TokenizerStore};
use crate::ml::doc_qa::{DocQa, Prediction};
use crate::ml::model::BurnQaModel;

type InferBackend = burn::backend::Wgpu;

pub struct AskUseCase {
    qa: DocQa<HfQaTokenizer, BurnQaModel<InferBackend>>,
}

impl AskUseCase {
    pub fn new(config: &DocQaConfig) -> Result<Self> {
        let tokenizer = TokenizerStore::new(&config.model_weights).load()?;
        let tokenizer = HfQaTokenizer::new(tokenizer, config.max_sequence_length)?;

        let device = burn::backend::wgpu::WgpuDevice::default();
        let model  = WeightsStore::new(&config.model_weights).load_model::<InferBackend>(&device)?;

        let qa = DocQa::new(config, tokenizer, BurnQaModel::new(model, device))
            .context("Cannot set up question answering")?;
        Ok(Self { qa })
    }

    pub fn answer(&mut self, batch: &DocBatch) -> Result<Vec<Prediction>> {
        tracing::info!(
            "Answering {} question(s) with {} retrieval",
            batch.len(),
            self.qa.page_retrieval()
        );
        Ok(self.qa.predict(batch)?)
    }
}

/// Read a JSON array of items.
pub fn load_items(path: &Path) -> Result<DocBatch> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read items from '{}'", path.display()))?;
    let items: Vec<DocItem> = serde_json::from_str(&json)
        .with_context(|| format!("Malformed items file '{}'", path.display()))?;

    tracing::debug!("Loaded {} item(s) from '{}'", items.len(), path.display());
    Ok(DocBatch::new(items))
}

/// Write predictions as pretty-printed JSON.
pub fn save_predictions(path: &Path, predictions: &[Prediction]) -> Result<()> {
    let json = serde_json::to_string_pretty(predictions)?;
    fs::write(path, json)
        .with_context(|| format!("Cannot write predictions to '{}'", path.display()))?;

    tracing::info!("Saved {} prediction(s) to '{}'", predictions.len(), path.display());
    Ok(())
}
