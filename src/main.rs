use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use onms_query::{metrics, ClientConfig, Datasource, QueryOptions, TemplateVariables};

#[derive(Parser, Debug)]
#[command(name = "onms-query", about = "Query the OpenNMS measurements API")]
struct Cli {
    /// Base URL, overrides ONMS_URL
    #[arg(long)]
    url: Option<String>,

    /// Address to expose Prometheus metrics on
    #[arg(long, env = "ONMS_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a panel request read from a JSON file
    Query { file: PathBuf },
    /// Check that the server is reachable
    Test,
    /// Resolve a template variable query such as `nodeFilter(...)`
    Find { query: String },
    /// Search nodes by label, name, address or foreign id
    Search { query: String },
    /// List the filters supported by the server
    Filters,
}

/// A panel request: the query options plus the dashboard's variables
#[derive(Debug, Deserialize)]
struct PanelRequest {
    #[serde(flatten)]
    options: QueryOptions,
    #[serde(default)]
    variables: TemplateVariables,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr {
        match metrics::init_metrics(addr) {
            Ok(()) => info!("Metrics server listening on {}", addr),
            Err(e) => eprintln!("Failed to initialize metrics: {}", e),
        }
    }

    let mut config =
        ClientConfig::from_env().context("failed to parse ONMS_* environment variables")?;
    if let Some(url) = cli.url {
        config.url = url;
    }
    let datasource = Datasource::new(&config)?;

    let output = match cli.command {
        Command::Query { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let request: PanelRequest =
                serde_json::from_str(&raw).context("failed to parse panel request")?;
            serde_json::to_value(datasource.query(&request.options, &request.variables).await?)?
        }
        Command::Test => serde_json::to_value(datasource.test_datasource().await?)?,
        Command::Find { query } => serde_json::to_value(
            datasource
                .metric_find_query(&query, &TemplateVariables::new())
                .await?,
        )?,
        Command::Search { query } => {
            serde_json::to_value(datasource.search_for_nodes(&query).await?)?
        }
        Command::Filters => serde_json::to_value(datasource.available_filters().await?)?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
