use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

use unifeed::aggregate::Aggregator;
use unifeed::config::Config;
use unifeed::server;

#[derive(Parser, Debug)]
#[command(name = "unifeed", about = "Unified RSS feed built from several source feeds")]
struct Args {
    /// Path to the TOML config file (defaults apply when it does not exist)
    #[arg(long, value_name = "FILE", default_value = "unifeed.toml")]
    config: PathBuf,

    /// Listen address, overriding `server.bind`
    #[arg(long, value_name = "ADDR")]
    bind: Option<SocketAddr>,

    /// Build the feed once, print it to stdout and exit
    #[arg(long)]
    once: bool,

    /// With --once, print the document without indentation
    #[arg(long, requires = "once")]
    compact: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,unifeed=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }

    let aggregator = Aggregator::new(config).context("Failed to initialize feed aggregator")?;

    if args.once {
        let xml = aggregator
            .build_document(!args.compact)
            .await
            .context("Failed to build feed")?;
        writeln!(std::io::stdout().lock(), "{xml}").context("Failed to write feed to stdout")?;
        return Ok(());
    }

    let bind = aggregator.config().server.bind;
    let path = aggregator.config().server.path.clone();
    let sources = aggregator.config().sources.len();

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    tracing::info!(addr = %bind, path = %path, sources, "Serving unified feed");

    axum::serve(listener, server::router(aggregator))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
