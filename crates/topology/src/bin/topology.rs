//! Topology CLI - resolve cluster specs into provisioning resource graphs.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use topology::backend::{NetworkFacts, StaticFacts};
use topology::builder::TopologyBuilder;
use topology::spec::ClusterSpec;
use topology::validate;

/// Topology CLI - build the resource graph for a Kubernetes cluster spec.
#[derive(Parser)]
#[command(name = "topology")]
#[command(about = "Resolve a cluster spec into a provisioning resource graph")]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a cluster spec without building anything.
    Validate {
        /// Path to the cluster spec (YAML).
        #[arg(long)]
        spec: PathBuf,
    },

    /// Build the resource graph for a cluster spec.
    Build {
        /// Path to the cluster spec (YAML).
        #[arg(long)]
        spec: PathBuf,

        /// Path to a network facts file (YAML). When omitted, the spec's
        /// VPC is assumed to exist with no known subnet detail.
        #[arg(long)]
        facts: Option<PathBuf>,

        /// Write the graph JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()))
        .init();

    match cli.command {
        Commands::Validate { spec } => {
            let spec = load_spec(&spec)?;
            validate::validate(&spec).context("Spec validation failed")?;
            info!("spec is valid (cluster: {})", spec.cluster_name());
            Ok(())
        }
        Commands::Build {
            spec,
            facts,
            output,
        } => {
            let spec = load_spec(&spec)?;
            let backend = match facts {
                Some(path) => StaticFacts::new(load_facts(&path)?),
                None => StaticFacts::for_vpc(spec.vpc_id.clone()),
            };

            let graph = TopologyBuilder::new()
                .build(&spec, &backend)
                .context("Topology build failed")?;

            let json =
                serde_json::to_string_pretty(&graph).context("Failed to serialize graph")?;
            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("graph written to {}", path.display());
                }
                None => println!("{json}"),
            }
            Ok(())
        }
    }
}

fn load_spec(path: &PathBuf) -> Result<ClusterSpec> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read spec file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse spec file {}", path.display()))
}

fn load_facts(path: &PathBuf) -> Result<NetworkFacts> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read facts file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse facts file {}", path.display()))
}
