use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;

use graceful_serve::config::{load_config, validate_config, ConfigError, ServeConfig};
use graceful_serve::http::HttpService;
use graceful_serve::lifecycle::global;
use graceful_serve::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "graceful-serve")]
#[command(about = "Serve HTTP with cleanup actions around graceful shutdown", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override shutdown.timeout_secs (0 waits indefinitely).
    #[arg(long)]
    shutdown_timeout_secs: Option<u64>,
}

impl Cli {
    fn apply(&self, config: &mut ServeConfig) {
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(secs) = self.shutdown_timeout_secs {
            config.shutdown.timeout_secs = secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServeConfig::default(),
    };
    cli.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_logging(&config.observability.log_level)?;

    tracing::info!("graceful-serve v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        shutdown_timeout_secs = config.shutdown.timeout_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    global::pre_cleanup_push(cleanup_step, 2)?;
    global::pre_cleanup_push(cleanup_step, 1)?;
    global::post_cleanup_push(cleanup_step, 4)?;
    global::post_cleanup_push(cleanup_step, 3)?;
    global::post_cleanup_push(
        |addr: String| tracing::info!(address = %addr, "Listener released"),
        config.listener.bind_address.clone(),
    )?;

    let service = Arc::new(HttpService::hello(config.listener.bind_address.clone()));
    global::serve(service, config.shutdown.timeout()).await;

    tracing::info!("Exiting");
    Ok(())
}

fn cleanup_step(step: u32) {
    tracing::info!(step, "Clean-up step");
}
