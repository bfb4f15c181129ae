// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Two subcommands: `check-config` and `ask`.
//
// Both name a model and a dataset; their YAML files are read
// from <root>/configs/models and <root>/configs/datasets.

use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve and validate a configuration, then print it
    CheckConfig(ConfigArgs),

    /// Answer questions against a multi-page document
    Ask(AskArgs),
}

/// Selects the configuration files to merge.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Model configuration name (configs/models/<model>.yml)
    #[arg(long, short = 'm')]
    pub model: String,

    /// Dataset configuration name (configs/datasets/<dataset>.yml)
    #[arg(long, short = 'd')]
    pub dataset: String,

    /// Directory holding the `configs` folder
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Override a configuration value, e.g. --set page_retrieval=oracle
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,
}

#[derive(Args, Debug)]
pub struct AskArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// The question to answer (ignored when --input is given)
    #[arg(long, required_unless_present = "input")]
    pub question: Option<String>,

    /// Page text, repeated once per page in document order
    #[arg(long = "page", required_unless_present = "input")]
    pub pages: Vec<String>,

    /// JSON array of items ({question, context, answers?, answer_page?})
    #[arg(long, conflicts_with_all = ["question", "pages"])]
    pub input: Option<PathBuf>,

    /// Write predictions to this JSON file
    #[arg(long)]
    pub output: Option<PathBuf>,
}
