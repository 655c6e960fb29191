//! pagecast service binary
//!
//! Loads configuration, launches the shared browser, wires the manager,
//! and serves the control surface until SIGINT/SIGTERM, then drains every
//! stream before exiting.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use pagecast::capture::{BlockList, CaptureEngine, ChromiumEngine};
use pagecast::config::AppConfig;
use pagecast::encode::{EncoderLauncher, FfmpegLauncher};
use pagecast::relay::{HttpRelay, RelayService};
use pagecast::stream::{sweeper, StreamManager};
use pagecast::{server, Result};

#[derive(Parser)]
#[command(name = "pagecast", about = "Bridge browser pages to an RTSP relay")]
struct Args {
    /// Configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the control surface bind address
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pagecast=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = args.bind {
        config = config.bind(bind);
    }

    // Startup validation: bad block-list rules or an unreadable script are
    // fatal here, never at request time
    let block_list = BlockList::compile(&config.capture.block_list)?;
    let capture_script = config.capture.load_script()?;

    let relay: Arc<dyn RelayService> = Arc::new(HttpRelay::new(&config.relay.api_url));
    let engine: Arc<dyn CaptureEngine> = Arc::new(ChromiumEngine::launch(&config.capture).await?);
    let launcher: Arc<dyn EncoderLauncher> =
        Arc::new(FfmpegLauncher::new(config.encoder.clone()));

    let sweep_interval = config.lifecycle.sweep_interval();
    let bind_addr = config.server.bind_addr;

    let manager = Arc::new(StreamManager::new(
        config,
        block_list,
        capture_script,
        relay,
        engine,
        launcher,
    ));

    let sweeper = sweeper::spawn(Arc::clone(&manager), sweep_interval);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %bind_addr, "control surface listening");

    let app = server::router(Arc::clone(&manager));
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(server::shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "control surface failed");
    }

    tracing::info!("shutting down");
    sweeper.abort();
    manager.shutdown().await;

    Ok(())
}
