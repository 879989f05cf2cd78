//! Rallypoint coordinator server.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin rallypoint-server
//! cargo run --bin rallypoint-server -- --bind 0.0.0.0:9000 --config rallypoint.json
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rallypoint::logging::init_logging;
use rallypoint::{RallypointError, RallypointServer, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "rallypoint-server")]
#[command(about = "Real-time multiplayer session coordinator", long_about = None)]
struct Args {
    /// Address to listen on; overrides the config file
    #[arg(short, long)]
    bind: Option<String>,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), RallypointError> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }

    let server = RallypointServer::builder().config(config).build().await?;
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}
