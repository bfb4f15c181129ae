// ============================================================
// Layer 6 — Model Weights Store
// ============================================================
// Restores a trained model from the `model_weights` directory
// named in the configuration, using Burn's CompactRecorder.
//
//   <model_weights>/
//     model_config.json   ← TransformerQaConfig (architecture)
//     model.mpk           ← CompactRecorder record of the weights
//     tokenizer.json      ← read by TokenizerStore
//
// The architecture is rebuilt from model_config.json first; the
// record only loads into a module of the exact same shape.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{fs, path::PathBuf};

use crate::ml::model::{TransformerQaConfig, TransformerQaModel};

const CONFIG_FILE: &str = "model_config.json";
const RECORD_NAME: &str = "model";

pub struct WeightsStore {
    dir: PathBuf,
}

impl WeightsStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// Read the model architecture.
    pub fn load_config(&self) -> Result<TransformerQaConfig> {
        let path = self.dir.join(CONFIG_FILE);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read model config from '{}'", path.display()))?;

        serde_json::from_str(&json)
            .with_context(|| format!("Malformed model config '{}'", path.display()))
    }

    /// Rebuild the model and load its weights, with dropout disabled.
    pub fn load_model<B: Backend>(&self, device: &B::Device) -> Result<TransformerQaModel<B>> {
        let config = self.load_config()?.with_dropout(0.0);
        let model  = config.init::<B>(device);
        let path   = self.dir.join(RECORD_NAME);

        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| format!("Cannot load model weights '{}'", path.display()))?;

        tracing::info!(
            "Model loaded from '{}' ({} layers, d_model={})",
            self.dir.display(),
            config.num_layers,
            config.d_model
        );
        Ok(model.load_record(record))
    }
}
