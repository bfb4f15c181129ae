// ============================================================
// Layer 2 — Configuration Use Case
// ============================================================
// Resolves the configuration of a model/dataset pair, applying
// `key=value` overrides given on the command line.

use anyhow::{bail, Context, Result};
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

use crate::infra::config::{ConfigLoader, DocQaConfig};

pub struct ConfigUseCase {
    loader: ConfigLoader,
}

impl ConfigUseCase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { loader: ConfigLoader::new(root) }
    }

    pub fn resolve(&self, model: &str, dataset: &str, overrides: &[String]) -> Result<DocQaConfig> {
        let overrides = parse_overrides(overrides)?;
        self.loader
            .load(model, dataset, overrides)
            .with_context(|| format!("Cannot resolve configuration for {model} on {dataset}"))
    }

    /// The resolved configuration as YAML.
    pub fn render(config: &DocQaConfig) -> Result<String> {
        Ok(serde_yaml::to_string(config)?)
    }
}

/// Parse `key=value` pairs; values are read as YAML scalars so
/// `seed=3` is a number and `page_retrieval=oracle` a string.
fn parse_overrides(pairs: &[String]) -> Result<Mapping> {
    let mut mapping = Mapping::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("Override '{pair}' is not of the form key=value");
        };
        let value: Value = serde_yaml::from_str(raw)
            .with_context(|| format!("Cannot parse value of override '{pair}'"))?;
        mapping.insert(Value::from(key.trim()), value);
    }
    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_are_typed() {
        let parsed = parse_overrides(&["seed=3".into(), "page_retrieval=oracle".into()]).unwrap();
        assert_eq!(parsed.get("seed").and_then(Value::as_u64), Some(3));
        assert_eq!(parsed.get("page_retrieval"), Some(&Value::from("oracle")));
    }

    #[test]
    fn test_override_without_equals_is_rejected() {
        assert!(parse_overrides(&["seed".into()]).is_err());
    }

    #[test]
    fn test_resolve_and_render() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("configs/models")).unwrap();
        std::fs::create_dir_all(dir.path().join("configs/datasets")).unwrap();
        std::fs::write(
            dir.path().join("configs/models/bertqa.yml"),
            "model_weights: w\nbatch_size: 2\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("configs/datasets/mp.yml"), "dataset_name: MP\n").unwrap();

        let use_case = ConfigUseCase::new(dir.path());
        let config   = use_case
            .resolve("bertqa", "mp", &["page_retrieval=concat".into()])
            .unwrap();
        assert_eq!(config.page_retrieval.as_deref(), Some("concat"));

        let yaml = ConfigUseCase::render(&config).unwrap();
        assert!(yaml.contains("page_retrieval: concat"));
        assert!(yaml.contains("dataset_name: MP"));
    }
}
