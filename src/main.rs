//! TxnScope Relay - transfer watcher binary.
//!
//! Polls the explorer continuously, or runs a single cycle with `--once` and
//! prints a `FINAL_RESPONSE:` line for the calling process.

use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use txnscope_relay::{
    final_response_line, stop_signal, AnalysisClient, CommandPublisher, ExplorerClient, Pipeline,
    Scheduler, WatcherConfig,
};

/// Token transfer watcher and analysis relay.
#[derive(Parser, Debug)]
#[command(name = "txnscope-relay")]
#[command(about = "Relay new token transfers to an analysis service and publisher", long_about = None)]
struct Args {
    /// Run one cycle, print the FINAL_RESPONSE line and exit.
    #[arg(long)]
    once: bool,

    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,

    /// Override the polling interval in seconds.
    #[arg(long)]
    interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let dotenv_loaded = std::path::Path::new(&args.dotenv).exists();
    if dotenv_loaded {
        dotenvy::from_path(&args.dotenv)?;
    }

    // Logs go to stderr; stdout carries only the single-shot result line
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if dotenv_loaded {
        info!("Loaded environment from {}", args.dotenv);
    }

    let mut config = WatcherConfig::from_env()?;
    if let Some(secs) = args.interval_secs.filter(|s| *s > 0) {
        config = config.with_interval(Duration::from_secs(secs));
    }

    let source = ExplorerClient::new(config.explorer.clone())?;
    let analyzer = AnalysisClient::new(config.analysis.clone())?;
    let publisher = CommandPublisher::new(config.publish.clone());
    let mut pipeline = Pipeline::new(source, analyzer, publisher, config.locale);
    let scheduler = Scheduler::new(config.interval);

    if args.once {
        let outcome = scheduler.run_once(&mut pipeline).await;
        println!("{}", final_response_line(&outcome));
        return Ok(());
    }

    let (handle, stop) = stop_signal();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received CTRL+C, shutting down");
                handle.stop();
            }
            Err(err) => error!("Failed to listen for CTRL+C: {}", err),
        }
    });

    info!(
        "Watching {} on {}",
        config.explorer.address, config.explorer.base_url
    );
    scheduler.run_continuous(&mut pipeline, stop).await;

    Ok(())
}
