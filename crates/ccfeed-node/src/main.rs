use std::path::Path;

use anyhow::Result;
use ccfeed_core::{serialize, Checkpoint};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;
mod config;
mod node;

use cli::{Cli, Commands};
use config::{generate_sample_config, NodeConfig};
use node::Node;

#[tokio::main]
async fn main() -> Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            run_node(&config).await?;
        }
        Commands::Init { output } => {
            init_config(&output)?;
        }
        Commands::Status { config } => {
            show_status(&config)?;
        }
        Commands::Import { config, file } => {
            import_mutations(&config, &file)?;
        }
        Commands::Changes {
            config,
            from,
            limit,
        } => {
            print_changes(&config, from, limit)?;
        }
    }

    Ok(())
}

fn load_config(config_path: &Path) -> Result<NodeConfig> {
    if !config_path.exists() {
        error!(
            "Configuration file not found: {:?}. Run 'ccfeed init' to create one.",
            config_path
        );
        return Err(anyhow::anyhow!("Configuration file not found"));
    }
    info!("Loading configuration from {:?}", config_path);
    NodeConfig::load(config_path)
}

/// Run a ccfeed node
async fn run_node(config_path: &Path) -> Result<()> {
    let node = Node::open(load_config(config_path)?)?;
    node.run().await
}

/// Initialize a new configuration file
fn init_config(output: &Path) -> Result<()> {
    info!("Generating sample configuration");

    let config = generate_sample_config();
    config.save(output)?;

    info!("Configuration saved to {:?}", output);

    println!("\nConfiguration file created: {}", output.display());
    println!("Edit the genesis section before the first run; it cannot change afterwards.");
    println!("\nTo start following the feed, run:");
    println!("  ccfeed run --config {} < mutations.jsonl", output.display());

    Ok(())
}

fn show_status(config_path: &Path) -> Result<()> {
    let node = Node::open(load_config(config_path)?)?;
    let status = node.status()?;

    println!("Node Status:");
    println!("{}", serialize::to_json_pretty(&status)?);

    Ok(())
}

fn import_mutations(config_path: &Path, file: &Path) -> Result<()> {
    let node = Node::open(load_config(config_path)?)?;
    let entries = node.import(file)?;
    for entry in &entries {
        println!("{}", entry.id);
    }
    info!("Imported {} mutations from {:?}", entries.len(), file);
    Ok(())
}

fn print_changes(config_path: &Path, from: Checkpoint, limit: Option<usize>) -> Result<()> {
    let node = Node::open(load_config(config_path)?)?;
    for change in node.changes(from, limit)? {
        println!("{}", serialize::to_json(&change)?);
    }
    Ok(())
}
