mod config;
mod scan_cmd;
mod status_cmd;
mod terminal_output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{info, warn};

use pantry_core::VisionModel;
use pantry_logging::init_logger;
use pantry_relay::{build_router, cors_layer, serve, shutdown_signal, RelayState, SHUTDOWN_GRACE};
use pantry_vision::build_provider;

use config::Config;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(about = "Pantry: turn grocery receipt photos into pantry items")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the relay server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Probe the relay's health endpoint once
    Status {
        /// Relay API base URL
        #[arg(long)]
        api_url: Option<String>,
    },
    /// Extract food items from a receipt image
    Scan {
        /// Image file, or a saved camera frame with --captured
        path: PathBuf,
        /// Treat the file as a base64 camera frame
        #[arg(long)]
        captured: bool,
        /// Relay API base URL
        #[arg(long)]
        api_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse flags first so --help and --version work with a broken environment.
    let cli = Cli::parse();

    let _ = dotenvy::dotenv();
    let config = Config::from_env()?;

    init_logger(&config.log_level, config.log_dir.as_deref());

    let succeeded = match cli.command {
        Commands::Serve { port } => {
            let config = Config {
                port: port.unwrap_or(config.port),
                ..config
            };
            run_server(config).await?;
            true
        }
        Commands::Status { api_url } => {
            status_cmd::run(api_url.as_deref().unwrap_or(&config.api_url)).await?
        }
        Commands::Scan {
            path,
            captured,
            api_url,
        } => scan_cmd::run(&path, captured, api_url.as_deref().unwrap_or(&config.api_url)).await?,
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn run_server(config: Config) -> Result<()> {
    info!(
        port = config.port,
        bind = %config.bind_address,
        provider = %config.provider.kind,
        "Starting Pantry relay"
    );

    let model = build_provider(&config.provider);
    if !model.is_configured() {
        warn!(provider = model.name(), "No model credential configured; analysis requests will fail");
    }

    let state = RelayState::new(model);
    let app = build_router(state, cors_layer(config.cors_origins.as_slice()));

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;

    serve(listener, app, shutdown_signal(), SHUTDOWN_GRACE).await
}
