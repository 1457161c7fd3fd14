use anyhow::Result;
use clap::{Parser, Subcommand};
use pulse_core::PulseConfig;
use std::net::SocketAddr;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Live telemetry for the infrastructure console", long_about = None)]
struct Cli {
    /// Configuration file (defaults to $PULSE_CONFIG or the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset (e.g., "debug", "pulse_core=trace")
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a live summary of every channel
    Watch {
        /// Telemetry WebSocket endpoint
        #[arg(short, long, env = "PULSE_ENDPOINT")]
        endpoint: Option<String>,

        /// Redraw interval in milliseconds
        #[arg(long, default_value = "1000")]
        refresh_ms: u64,

        /// Serve Prometheus metrics on this address (e.g., 127.0.0.1:9464)
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },

    /// Follow the newest entries of one channel
    Tail {
        /// Channel name (e.g., "log", "alert", "metric:cpu")
        channel: String,

        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        lines: usize,

        /// Telemetry WebSocket endpoint
        #[arg(short, long, env = "PULSE_ENDPOINT")]
        endpoint: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

fn load_config(path: Option<&PathBuf>) -> Result<PulseConfig> {
    let config = match path {
        Some(path) => PulseConfig::load_from(path)?,
        None => PulseConfig::load()?,
    };
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    pulse_core::init_observability(&config.log_level)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    match cli.command {
        Commands::Watch { endpoint, refresh_ms, metrics_addr } => {
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            commands::watch(&config, refresh_ms, metrics_addr).await?;
        }

        Commands::Tail { channel, lines, endpoint } => {
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }
            commands::tail(&config, &channel, lines).await?;
        }

        Commands::Config => {
            commands::config(&config, cli.config.as_deref())?;
        }
    }

    Ok(())
}
