//! pagesync CLI
//!
//! Command-line access to the CRM collections through the sync engine.
//!
//! # Commands
//!
//! - `list` - Fetch one page of a collection
//! - `delete` - Delete a record after confirmation
//! - `mark-read` / `mark-all-read` / `unread` - Notification handling
//! - `export` - Download the CSV export for the current criteria
//! - `areas` - Search active areas locally
//! - `dashboard` - Show the dashboard summary for a period
//! - `salesmen` - List the salesmen of a city

mod client;
mod commands;

use clap::{Parser, Subcommand};
use client::ReqwestClient;
use commands::list::ListOptions;
use commands::Target;
use pagesync_engine::{EngineConfig, HttpTransport};
use pagesync_protocol::{FilterKey, Period};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Paginated CRM collections from the command line.
#[derive(Parser)]
#[command(name = "pagesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// API base URL (overrides the configuration file)
    #[arg(global = true, long)]
    base_url: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch one page of a collection
    List {
        /// Collection to list
        #[arg(value_enum)]
        target: Target,

        /// Page number
        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Search term
        #[arg(short, long)]
        search: Option<String>,

        /// Filter as key=value (repeatable, `all` clears)
        #[arg(long = "filter", value_parser = commands::parse_filter)]
        filters: Vec<(FilterKey, String)>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Delete a record
    Delete {
        /// Collection the record belongs to
        #[arg(value_enum)]
        target: Target,

        /// Record id
        id: String,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Mark one notification as read
    MarkRead {
        /// Notification id
        id: String,
    },

    /// Mark all listed notifications as read
    MarkAllRead,

    /// Show the unread notification count
    Unread,

    /// Download the CSV export of a collection
    Export {
        /// Collection to export
        #[arg(value_enum)]
        target: Target,

        /// Search term
        #[arg(short, long)]
        search: Option<String>,

        /// Filter as key=value (repeatable)
        #[arg(long = "filter", value_parser = commands::parse_filter)]
        filters: Vec<(FilterKey, String)>,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Search active areas
    Areas {
        /// Term matched against name, city and state
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Show the dashboard summary
    Dashboard {
        /// Chart period (day, week, month)
        #[arg(short, long, default_value = "month")]
        period: Period,
    },

    /// List the salesmen working in a city
    Salesmen {
        /// City name
        #[arg(long)]
        city: String,
    },

    /// Show version information
    Version,
}

fn load_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    if let Some(url) = &cli.base_url {
        config.base_url = url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&cli)?;
    let transport = Arc::new(HttpTransport::new(
        config.base_url.clone(),
        ReqwestClient::new(config.timeout)?,
    ));
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::List {
            target,
            page,
            search,
            filters,
            format,
        } => {
            let options = ListOptions {
                page,
                search,
                filters,
                format,
            };
            commands::list::run(transport, &config, target, &options, &mut out).await?;
        }
        Commands::Delete { target, id, yes } => {
            let mut input = std::io::stdin().lock();
            commands::delete::run(transport, &config, target, &id, yes, &mut input, &mut out)
                .await?;
        }
        Commands::MarkRead { id } => {
            commands::notifications::mark_read(transport, &config, &id, &mut out).await?;
        }
        Commands::MarkAllRead => {
            commands::notifications::mark_all_read(transport, &config, &mut out).await?;
        }
        Commands::Unread => {
            commands::notifications::unread(transport, &config, &mut out).await?;
        }
        Commands::Export {
            target,
            search,
            filters,
            out: path,
        } => {
            commands::export::run(
                transport,
                &config,
                target,
                search.as_deref(),
                &filters,
                &path,
                &mut out,
            )
            .await?;
        }
        Commands::Areas { search } => {
            commands::areas::run(transport, &config, search.as_deref(), &mut out).await?;
        }
        Commands::Dashboard { period } => {
            commands::dashboard::run(transport, period, &mut out).await?;
        }
        Commands::Salesmen { city } => {
            commands::dashboard::salesmen(transport, &city, &mut out).await?;
        }
        Commands::Version => {
            writeln!(out, "pagesync CLI v{}", env!("CARGO_PKG_VERSION"))?;
            writeln!(out, "pagesync engine v{}", pagesync_engine::VERSION)?;
        }
    }

    Ok(())
}
