//! catalog-fanout - Marketplace catalog fan-out proxy
//!
//! Runs the HTTP proxy, or a one-off scan from the command line.

use anyhow::{Context, Result};
use catalog_fanout::config::{Config, OutputFormat};
use catalog_fanout::dispatch::clamp_concurrency;
use catalog_fanout::format::Formatter;
use catalog_fanout::marketplace::{Marketplace, RegionRouter};
use catalog_fanout::server::app_router;
use catalog_fanout::service::{BatchRequest, CatalogService};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "catalog-fanout",
    version,
    about = "Marketplace catalog fan-out proxy",
    long_about = "Checks listing restrictions and offers for batches of ASINs across Amazon marketplaces."
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format for scans (table, json, csv)
    #[arg(short, long, global = true)]
    format: Option<OutputFormat>,

    /// Seller id for restriction lookups
    #[arg(long, global = true, env = "FANOUT_SELLER_ID")]
    seller_id: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP proxy
    Serve {
        /// Interface to bind
        #[arg(long, env = "FANOUT_HOST")]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
    },

    /// Scan ASINs across marketplaces
    #[command(alias = "s")]
    Scan {
        /// ASINs to scan (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        asins: Vec<String>,

        /// Marketplace ids or codes (comma-separated)
        #[arg(short, long, value_delimiter = ',', required = true)]
        marketplaces: Vec<String>,

        /// Remote calls in flight (1-20)
        #[arg(long)]
        concurrency: Option<usize>,

        /// Listing condition for restriction lookups
        #[arg(long)]
        condition_type: Option<String>,

        /// Item condition for offer lookups
        #[arg(long)]
        item_condition: Option<String>,
    },

    /// List supported marketplaces
    Marketplaces,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let serving = matches!(cli.command, Commands::Serve { .. });

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new(Level::DEBUG.to_string())
    } else if serving {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    // Load config with layered overrides
    let mut config = Config::load(cli.config.as_deref())?.with_env();

    // Apply CLI overrides
    if let Some(format) = cli.format {
        config.format = format;
    }
    if let Some(seller_id) = cli.seller_id {
        config.seller_id = Some(seller_id);
    }

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            let router = Arc::new(RegionRouter::from_config(&config));
            let service = Arc::new(CatalogService::new(&config, router));
            let app = app_router(service);

            let addr = config.listen_addr();
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;
            info!("Listening on {}", addr);
            axum::serve(listener, app).await?;
        }

        Commands::Scan { asins, marketplaces, concurrency, condition_type, item_condition } => {
            let router = Arc::new(RegionRouter::from_config(&config));
            let service = CatalogService::new(&config, router);

            let request = BatchRequest {
                asins,
                marketplace_ids: marketplaces,
                condition_type,
                item_condition,
                // Same rule as the HTTP body: 0 means the configured default
                concurrency: concurrency.filter(|&n| n != 0).map(clamp_concurrency),
            };
            let scan = service.scan(request).await?;
            println!("{}", Formatter::new(config.format).format_scan(&scan));
        }

        Commands::Marketplaces => {
            println!("Supported marketplaces:\n");
            println!("{:<6} {:<16} {:<8} {:<10}", "Code", "Id", "Region", "Currency");
            println!("{:-<6} {:-<16} {:-<8} {:-<10}", "", "", "", "");

            for marketplace in Marketplace::all() {
                println!(
                    "{:<6} {:<16} {:<8} {:<10}",
                    marketplace.to_string(),
                    marketplace.id(),
                    marketplace.region_key().to_string(),
                    marketplace.currency()
                );
            }
        }
    }

    Ok(())
}
