// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap and routes to the use cases in
// Layer 2. Only this layer prints.
//
//   check-config — merge the YAML files and print the result
//   ask          — answer one question (--question + --page...)
//                  or a file of items (--input)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{AskArgs, Commands, ConfigArgs};

use crate::application::ask_use_case::{load_items, save_predictions, AskUseCase};
use crate::application::config_use_case::ConfigUseCase;
use crate::domain::document::{Context, DocBatch, DocItem};
use crate::infra::config::DocQaConfig;

#[derive(Parser, Debug)]
#[command(
    name = "doc-qa",
    version,
    about = "Extractive question answering over multi-page documents."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::CheckConfig(args) => run_check_config(args),
            Commands::Ask(args)         => run_ask(args),
        }
    }
}

fn resolve(args: &ConfigArgs) -> Result<DocQaConfig> {
    ConfigUseCase::new(&args.root).resolve(&args.model, &args.dataset, &args.overrides)
}

fn run_check_config(args: ConfigArgs) -> Result<()> {
    let config = resolve(&args)?;
    print!("{}", ConfigUseCase::render(&config)?);
    Ok(())
}

fn run_ask(args: AskArgs) -> Result<()> {
    let config = resolve(&args.config)?;

    let batch = match &args.input {
        Some(path) => load_items(path)?,
        None => DocBatch::new(vec![DocItem::new(
            args.question.clone().unwrap_or_default(),
            Context::Pages(args.pages.clone()),
        )]),
    };

    let mut use_case = AskUseCase::new(&config)?;
    let predictions  = use_case.answer(&batch)?;

    for prediction in &predictions {
        let page = prediction
            .answer_page
            .map_or_else(|| "-".to_string(), |p| p.to_string());
        println!("\nQuestion: {}", prediction.question);
        println!("Answer:   {}", prediction.answer);
        println!("Page:     {}  (confidence {:.4})", page, prediction.confidence);
    }

    if let Some(path) = &args.output {
        save_predictions(path, &predictions)?;
    }
    Ok(())
}
