//! dynaq: query and bulk-manage DynamoDB tables with shorthand key and
//! filter expressions.
//!
//! Configuration comes from environment variables (see
//! [`DynaqConfig::from_env`]); global flags override them per invocation.
//! Logs go to stderr so stdout stays machine-readable.

mod commands;
mod records;

use anyhow::{Context, Result};
use clap::Parser;
use dynaq_aws::DynamoClient;
use dynaq_core::DynaqConfig;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::commands::Command;

/// Query and bulk-manage DynamoDB tables.
#[derive(Debug, Parser)]
#[command(name = "dynaq", version, about)]
struct Cli {
    /// Custom endpoint, e.g. http://localhost:4566.
    #[arg(long, global = true)]
    endpoint_url: Option<String>,

    /// AWS region.
    #[arg(long, global = true)]
    region: Option<String>,

    /// Items per read request.
    #[arg(long, global = true)]
    page_size: Option<i32>,

    /// Log level filter; `RUST_LOG` takes precedence.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    /// Environment configuration with flag overrides applied.
    fn config(&self, mut config: DynaqConfig) -> DynaqConfig {
        if let Some(endpoint) = &self.endpoint_url {
            config.endpoint_url = Some(endpoint.clone());
        }
        if let Some(region) = &self.region {
            config.region.clone_from(region);
        }
        if self.page_size.is_some() {
            config.page_size = self.page_size;
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
        config.normalized()
    }
}

/// Initialize the tracing subscriber on stderr.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.config(DynaqConfig::from_env());
    init_tracing(&config.log_level)?;
    debug!(
        region = %config.region,
        endpoint = ?config.endpoint_url,
        page_size = ?config.page_size,
        "starting dynaq"
    );

    let client = DynamoClient::connect(&config).await;
    commands::run(cli.command, &client, &config).await
}
