mod config;
mod context;
mod db;
mod detector;
mod error;
mod ndjson;
mod pipeline;
mod scorer;
mod standardize;
mod stats;
mod tracking;
mod types;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::error::Result;

const USAGE: &str = "usage: navscan <scan|track|query>";

#[derive(Debug, Clone, Copy)]
enum Command {
    Scan,
    Track,
    Query,
}

impl Command {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "scan" => Some(Command::Scan),
            "track" => Some(Command::Track),
            "query" => Some(Command::Query),
            _ => None,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let command = match std::env::args().nth(1).as_deref().and_then(Command::parse) {
        Some(c) => c,
        None => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(command, &cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Command, cfg: &Config) -> Result<()> {
    info!(?command, db = %cfg.db_path.display(), "navscan starting");
    match command {
        Command::Scan => {
            pipeline::run_scan(cfg)?;
        }
        Command::Track => {
            pipeline::run_track(cfg).await?;
        }
        Command::Query => {
            let summary = pipeline::run_query(cfg).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
