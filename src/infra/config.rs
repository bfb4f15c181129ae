// ============================================================
// Layer 6 — Configuration
// ============================================================
// An experiment is described by two YAML files:
//
//   configs/models/<model>.yml     — model, weights, page retrieval,
//                                    `training_parameters` mapping
//   configs/datasets/<dataset>.yml — dataset paths and options
//
// Either file may list other YAML files under `includes`; included
// values are loaded first and the including file overrides them.
//
// Merge order (later wins):
//   dataset → model → model.training_parameters → CLI overrides
//
// The merged mapping is deserialised into DocQaConfig and checked
// before anything is built from it.

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{DocQaError, Result};
use crate::ml::retrieval::PageRetrieval;

const HIERARCHICAL_MODELS: [&str; 2] = ["hilt5", "hi-lt5"];
const MAX_INCLUDE_DEPTH: usize = 16;

/// Resolved configuration of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocQaConfig {
    #[serde(default = "default_model_name")]
    pub model_name: String,

    pub batch_size: usize,

    /// Directory holding `tokenizer.json`, `model_config.json` and the
    /// model record.
    pub model_weights: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_retrieval: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<usize>,

    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,

    /// Seed for the span labeler's random answer choice.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Every other key (dataset paths, training parameters, ...).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

fn default_model_name() -> String {
    "bertqa".to_string()
}

fn default_max_sequence_length() -> usize {
    512
}

impl DocQaConfig {
    pub fn new(batch_size: usize, model_weights: impl Into<String>) -> Self {
        Self {
            model_name: default_model_name(),
            batch_size,
            model_weights: model_weights.into(),
            page_retrieval: None,
            max_pages: None,
            max_sequence_length: default_max_sequence_length(),
            seed: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_page_retrieval(mut self, mode: impl Into<String>) -> Self {
        self.page_retrieval = Some(mode.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_sequence_length(mut self, max_len: usize) -> Self {
        self.max_sequence_length = max_len;
        self
    }

    pub fn page_retrieval(&self) -> Result<PageRetrieval> {
        PageRetrieval::from_config(self.page_retrieval.as_deref())
    }

    pub fn is_hierarchical(&self) -> bool {
        HIERARCHICAL_MODELS.contains(&self.model_name.to_lowercase().as_str())
    }

    /// Reject combinations no model can run, and warn about ignored keys.
    pub fn check(&self) -> Result<()> {
        let mode = self.validate()?;

        if let Some(max_pages) = self.max_pages {
            if matches!(mode, PageRetrieval::Concat | PageRetrieval::Logits) {
                tracing::warn!(
                    "max_pages ({}) is ignored for {} retrieval",
                    max_pages,
                    mode
                );
            }
        }

        Ok(())
    }

    /// The error half of `check`; returns the parsed retrieval mode.
    pub fn validate(&self) -> Result<PageRetrieval> {
        if self.batch_size == 0 {
            return Err(DocQaError::config("batch_size must be at least 1"));
        }

        let mode = self.page_retrieval()?;
        let hierarchical = self.is_hierarchical();

        if !hierarchical && mode == PageRetrieval::Custom {
            return Err(DocQaError::config(format!(
                "'custom' retrieval is not allowed for {}",
                self.model_name
            )));
        }
        if hierarchical && matches!(mode, PageRetrieval::Concat | PageRetrieval::Logits) {
            return Err(DocQaError::config(format!(
                "hierarchical model {} can't run with {} retrieval; only 'oracle' and 'custom' are allowed",
                self.model_name, mode
            )));
        }

        Ok(mode)
    }
}

// ─── Loading ──────────────────────────────────────────────────────────────────

/// Resolves model/dataset names to files under `<root>/configs`.
pub struct ConfigLoader {
    root: PathBuf,
}

impl ConfigLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn model_path(&self, model: &str) -> PathBuf {
        self.root.join("configs").join("models").join(format!("{model}.yml"))
    }

    pub fn dataset_path(&self, dataset: &str) -> PathBuf {
        self.root.join("configs").join("datasets").join(format!("{dataset}.yml"))
    }

    /// Load, merge and check the configuration of a model/dataset pair.
    pub fn load(&self, model: &str, dataset: &str, overrides: Mapping) -> Result<DocQaConfig> {
        let mut model_cfg = read_with_includes(&self.model_path(model), 0)?;
        let dataset_cfg   = read_with_includes(&self.dataset_path(dataset), 0)?;

        let training = match model_cfg.remove("training_parameters") {
            Some(Value::Mapping(training)) => training,
            Some(Value::Null) | None => Mapping::new(),
            Some(_) => {
                return Err(DocQaError::config("training_parameters must be a mapping"));
            }
        };

        let mut merged = dataset_cfg;
        merge_into(&mut merged, model_cfg);
        merge_into(&mut merged, training);
        merge_into(&mut merged, overrides);

        let config: DocQaConfig = serde_yaml::from_value(Value::Mapping(merged))
            .map_err(|e| DocQaError::yaml("resolving merged configuration", e))?;
        config.check()?;

        tracing::info!(
            "Configuration resolved: model={} page_retrieval={}",
            config.model_name,
            config.page_retrieval.as_deref().unwrap_or("none"),
        );
        Ok(config)
    }
}

/// Read one YAML mapping, resolving its `includes` relative to its folder.
fn read_with_includes(path: &Path, depth: usize) -> Result<Mapping> {
    if depth > MAX_INCLUDE_DEPTH {
        return Err(DocQaError::config(format!(
            "includes nested too deeply at '{}'",
            path.display()
        )));
    }

    let text = std::fs::read_to_string(path).map_err(|e| DocQaError::io("reading config", e))?;
    let mut current = match serde_yaml::from_str::<Value>(&text)
        .map_err(|e| DocQaError::yaml("parsing config", e))?
    {
        Value::Mapping(mapping) => mapping,
        Value::Null => Mapping::new(),
        _ => {
            return Err(DocQaError::config(format!(
                "'{}' is not a YAML mapping",
                path.display()
            )));
        }
    };

    let includes: Vec<String> = match current.remove("includes") {
        Some(value) => serde_yaml::from_value(value)
            .map_err(|e| DocQaError::yaml("reading includes", e))?,
        None => Vec::new(),
    };

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut resolved = Mapping::new();
    for include in includes {
        tracing::debug!("'{}' includes '{}'", path.display(), include);
        merge_into(&mut resolved, read_with_includes(&base_dir.join(include), depth + 1)?);
    }
    merge_into(&mut resolved, std::mem::take(&mut current));

    Ok(resolved)
}

/// Shallow merge: keys of `overrides` replace those of `base`.
fn merge_into(base: &mut Mapping, overrides: Mapping) {
    for (key, value) in overrides {
        base.insert(key, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "configs/models/bertqa.yml",
            "model_name: BertQA\n\
             model_weights: weights/bert\n\
             page_retrieval: Logits\n\
             includes: [common.yml]\n\
             training_parameters:\n  batch_size: 4\n  lr: 0.0002\n",
        );
        write(
            dir.path(),
            "configs/models/common.yml",
            "batch_size: 16\nseed: 3\nmodel_weights: overridden\n",
        );
        write(
            dir.path(),
            "configs/datasets/docvqa.yml",
            "dataset_name: DocVQA\nimdb_dir: data/imdb\nbatch_size: 32\n",
        );
        dir
    }

    #[test]
    fn test_merge_order() {
        let dir    = fixture();
        let config = ConfigLoader::new(dir.path()).load("bertqa", "docvqa", Mapping::new()).unwrap();

        assert_eq!(config.model_name, "BertQA");
        // training parameters beat both the model and the dataset file
        assert_eq!(config.batch_size, 4);
        // the including file beats its include
        assert_eq!(config.model_weights, "weights/bert");
        assert_eq!(config.seed, Some(3));
        assert_eq!(config.page_retrieval().unwrap(), PageRetrieval::Logits);
        assert_eq!(config.max_sequence_length, 512);
        assert_eq!(config.extra["dataset_name"], Value::from("DocVQA"));
        assert!(config.extra.contains_key("lr"));
        assert!(!config.extra.contains_key("includes"));
    }

    #[test]
    fn test_overrides_win() {
        let dir = fixture();
        let mut overrides = Mapping::new();
        overrides.insert("page_retrieval".into(), "oracle".into());
        let config = ConfigLoader::new(dir.path()).load("bertqa", "docvqa", overrides).unwrap();
        assert_eq!(config.page_retrieval().unwrap(), PageRetrieval::Oracle);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = fixture();
        let err = ConfigLoader::new(dir.path()).load("nope", "docvqa", Mapping::new());
        assert!(matches!(err, Err(DocQaError::Io { .. })));
    }

    #[test]
    fn test_missing_required_key() {
        let dir = fixture();
        write(dir.path(), "configs/models/bare.yml", "model_name: bertqa\n");
        write(dir.path(), "configs/datasets/empty.yml", "");
        let err = ConfigLoader::new(dir.path()).load("bare", "empty", Mapping::new());
        assert!(matches!(err, Err(DocQaError::Yaml { .. })));
    }

    #[test]
    fn test_include_cycle_is_rejected() {
        let dir = fixture();
        write(dir.path(), "configs/models/loop.yml", "includes: [loop.yml]\n");
        let err = ConfigLoader::new(dir.path()).load("loop", "docvqa", Mapping::new());
        assert!(matches!(err, Err(DocQaError::Config { .. })));
    }

    #[test]
    fn test_custom_only_for_hierarchical_models() {
        let flat = DocQaConfig::new(2, "w").with_page_retrieval("custom");
        assert!(matches!(flat.check(), Err(DocQaError::Config { .. })));

        let mut hier = DocQaConfig::new(2, "w").with_page_retrieval("Custom");
        hier.model_name = "Hi-LT5".into();
        assert!(hier.check().is_ok());

        hier.page_retrieval = Some("concat".into());
        assert!(hier.check().is_err());
        hier.page_retrieval = Some("oracle".into());
        assert!(hier.check().is_ok());
    }

    #[test]
    fn test_check_rejects_bad_values() {
        assert!(DocQaConfig::new(0, "w").check().is_err());
        assert!(DocQaConfig::new(1, "w").with_page_retrieval("pages").check().is_err());

        let mut with_max = DocQaConfig::new(1, "w").with_page_retrieval("concat");
        with_max.max_pages = Some(2);
        // only a warning
        assert!(with_max.check().is_ok());
        assert_eq!(with_max.validate().unwrap(), PageRetrieval::Concat);
    }
}
