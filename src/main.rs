use anyhow::Result;
use clap::Parser;
use doc_qa::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("doc_qa=info")),
        )
        .init();

    let cli = Cli::parse();
    cli.run()
}
