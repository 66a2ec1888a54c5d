//! chaos-master binary

use anyhow::Context;
use chaos_controller::{init_tracing, Master, MasterConfig};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "chaos-master")]
#[command(about = "Chaos experiment control plane", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the controllers until interrupted
    Run {
        /// Configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed file, overrides the configured one
        #[arg(short, long)]
        seed: Option<PathBuf>,
    },
    /// Render a failure definition into a failure spec
    Render {
        /// Configuration file supplying the default timeout
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// YAML failure definition
        definition: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Command::Run { config, seed } => run(config, seed).await,
        Command::Render { config, definition } => render(config, &definition),
    }
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<MasterConfig> {
    Ok(match path {
        Some(path) => MasterConfig::from_file(&path)?,
        None => MasterConfig::default(),
    })
}

async fn run(config: Option<PathBuf>, seed: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = load_config(config)?;
    if let Some(seed) = seed {
        config = config.with_seed_file(seed);
    }
    init_tracing(&config.log)?;

    let master = Master::new(config);
    master.seed_from_config().await?;
    master
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "cannot listen for ctrl-c");
            }
        })
        .await?;
    Ok(())
}

fn render(config: Option<PathBuf>, definition: &Path) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let source = std::fs::read_to_string(definition)
        .with_context(|| format!("cannot read {}", definition.display()))?;
    let spec = config.render_definition(&source)?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}
