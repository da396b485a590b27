//! Liftline CLI
//!
//! Runs the resort cache server, or performs one fetch and prints the result.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use liftline_api::{ApiServer, AppState, ServerConfig};
use liftline_core::lift_count;
use liftline_scraper::{resort_keys, terrain_url};

/// Liftline - ski resort lift status and trail maps
#[derive(Parser)]
#[command(name = "liftline")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT")]
        port: Option<u16>,
        /// Bind address
        #[arg(short, long, env = "BIND")]
        bind: Option<IpAddr>,
    },

    /// Scrape one resort's terrain feed and print it
    Scrape {
        /// Resort key, e.g. `vail`
        resort: String,
    },

    /// Resolve one resort's trail map
    Trailmap {
        /// Resort key, e.g. `stowe`
        resort: String,
        /// Write the image here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch the Alta lift report and print it
    Alta,

    /// List known resorts
    Resorts,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json);

    match cli.command {
        Commands::Serve { port, bind } => cmd_serve(port, bind).await,
        Commands::Scrape { resort } => cmd_scrape(&resort).await,
        Commands::Trailmap { resort, output } => cmd_trailmap(&resort, output).await,
        Commands::Alta => cmd_alta().await,
        Commands::Resorts => cmd_resorts(),
    }
}

fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        "liftline=debug,info"
    } else {
        "liftline=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_state() -> Result<Arc<AppState>> {
    let config = ServerConfig::from_env().context("Invalid configuration")?;
    let state = AppState::new(config).context("Failed to build app state")?;
    Ok(Arc::new(state))
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler failed");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler failed");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Run API server
async fn cmd_serve(port: Option<u16>, bind: Option<IpAddr>) -> Result<()> {
    let mut config = ServerConfig::from_env().context("Invalid configuration")?;
    if let Some(port) = port {
        config.port = port;
    }
    if let Some(bind) = bind {
        config.bind = bind;
    }
    let addr: SocketAddr = config.socket_addr();

    println!("{}", "Starting Liftline API server...".cyan().bold());
    println!("   {} http://{}", "Listening on:".green(), addr);
    println!("   {} http://{}/health", "Health check:".dimmed(), addr);
    println!("\n   Press Ctrl+C to stop.\n");

    let state = AppState::new(config).context("Failed to build app state")?;
    ApiServer::new(Arc::new(state))
        .run(addr, shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

/// Scrape one resort
async fn cmd_scrape(resort: &str) -> Result<()> {
    if terrain_url(resort).is_none() {
        bail!("Unknown resort '{}'. Run `liftline resorts` for the list.", resort);
    }
    println!("{} {}", "Scraping:".cyan().bold(), resort);

    let state = load_state()?;
    let result = state.scraper.scrape(resort).await;
    state.browser.shutdown().await;

    match result.context("Scrape failed")? {
        Some(feed) => {
            println!("{} {} lifts", "Feed found:".green().bold(), lift_count(&feed));
            println!("{}", serde_json::to_string_pretty(feed.as_ref())?);
        }
        None => println!("{}", "Page loaded but carried no terrain feed".yellow()),
    }
    Ok(())
}

/// Resolve one trail map
async fn cmd_trailmap(resort: &str, output: Option<PathBuf>) -> Result<()> {
    println!("{} {}", "Resolving trail map:".cyan().bold(), resort);

    let state = load_state()?;
    let result = state.trailmap_service.fetch(resort).await;
    state.browser.shutdown().await;

    let Some(payload) = result.context("Trail map resolution failed")? else {
        println!("{}", "Source found but it was empty".yellow());
        return Ok(());
    };

    println!(
        "   {} {} bytes, {}",
        "Image:".green(),
        payload.len(),
        payload.content_type
    );
    if let Some(path) = output {
        tokio::fs::write(&path, &payload.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} {}", "Saved to:".green(), path.display());
    }
    Ok(())
}

/// Fetch the Alta report
async fn cmd_alta() -> Result<()> {
    let state = load_state()?;
    let Some(report) = state.alta_client.fetch_report().await.context("Alta fetch failed")? else {
        println!("{}", "No lift data on the Alta page".yellow());
        return Ok(());
    };

    println!(
        "{} {}/{} lifts open",
        "Alta:".cyan().bold(),
        report.open_count(),
        report.lifts.len()
    );
    for lift in &report.lifts {
        let status = if lift.open { "open".green() } else { "closed".red() };
        let hours = match (&lift.opening_at, &lift.closing_at) {
            (Some(open), Some(close)) => format!("{} - {}", open, close),
            (Some(open), None) => format!("from {}", open),
            _ => String::new(),
        };
        println!("   {:<20} {:<8} {}", lift.name, status, hours.dimmed());
    }
    Ok(())
}

/// List resort keys
fn cmd_resorts() -> Result<()> {
    for key in resort_keys() {
        let url = terrain_url(key).unwrap_or_default();
        println!("{:<20} {}", key.bold(), url.dimmed());
    }
    Ok(())
}
