//! Cost Estimator
//!
//! Prices a resource graph against the cloud pricing catalog and prints a
//! hierarchical cost breakdown as JSON.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use domain_cost_estimation::{PriceSpec, default_registry};
use eyre::{Result, WrapErr};
use serde::Serialize;
use std::path::PathBuf;

mod config;
mod estimate;

use config::Config;

#[derive(Parser)]
#[command(name = "cost-estimator")]
#[command(about = "Estimate hourly and monthly costs for cloud resources")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate a resource graph and print the cost breakdown
    Estimate {
        /// Resource graph JSON ({"resources": [...]})
        #[arg(short, long)]
        graph: PathBuf,

        /// Usage estimates, plain or versioned usage file
        #[arg(short, long)]
        usage: Option<PathBuf>,

        /// Pretty-print the breakdown
        #[arg(short, long)]
        pretty: bool,

        /// Dump Prometheus metrics to stderr after the run
        #[arg(long)]
        metrics: bool,
    },

    /// Print the price hash of a price spec
    Hash {
        /// Price spec JSON file
        #[arg(short, long)]
        spec: PathBuf,
    },

    /// List supported resource types and their usage keys
    ResourceTypes,
}

#[derive(Serialize)]
struct ResourceTypeSummary<'a> {
    resource_type: &'a str,
    usage_keys: Vec<&'a str>,
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{json}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();

    match cli.command {
        Commands::Estimate {
            graph,
            usage,
            pretty,
            metrics,
        } => {
            observability::init_metrics().wrap_err("Failed to install metrics recorder")?;
            let config = Config::from_env().wrap_err("Invalid configuration")?;

            let breakdown = estimate::run(&config, &graph, usage.as_deref()).await?;
            print_json(&breakdown, pretty)?;

            if metrics {
                eprint!("{}", observability::render_metrics());
            }
        }

        Commands::Hash { spec } => {
            let json = tokio::fs::read_to_string(&spec)
                .await
                .wrap_err_with(|| format!("Failed to read price spec {}", spec.display()))?;
            let spec: PriceSpec = serde_json::from_str(&json).wrap_err("Invalid price spec")?;
            println!("{}", spec.hash());
        }

        Commands::ResourceTypes => {
            let summaries: Vec<ResourceTypeSummary> = default_registry()
                .kinds()
                .into_iter()
                .map(|kind| ResourceTypeSummary {
                    resource_type: kind.resource_type,
                    usage_keys: kind.usage_schema.keys().map(|k| k.key.as_str()).collect(),
                })
                .collect();
            print_json(&summaries, true)?;
        }
    }

    Ok(())
}
