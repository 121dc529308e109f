//! Sequence word game - dedicated server

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use wordgame_server::error::Result;
use wordgame_server::supervisor::{SessionSupervisor, EXIT_STARTUP_FAILURE};
use wordgame_server::{ReplayPolicy, ServerConfig};

#[derive(Parser)]
#[command(name = "wordgame_server")]
#[command(about = "Turn-based sequence word game server")]
#[command(version)]
struct Cli {
    /// RON config file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Word list, one word per line
    #[arg(short, long)]
    dictionary: Option<PathBuf>,

    /// Players required to start
    #[arg(long)]
    min_players: Option<usize>,

    /// Lobby capacity
    #[arg(long)]
    max_players: Option<usize>,

    /// Seconds per turn
    #[arg(long)]
    round_secs: Option<u64>,

    /// Starting lives per player
    #[arg(long)]
    lives: Option<u32>,

    /// Seed for reproducible sequences
    #[arg(long)]
    seed: Option<u64>,

    /// After a match: prompt, always, or never
    #[arg(long)]
    replay: Option<ReplayPolicy>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::load(path)?,
            None => ServerConfig::default(),
        };

        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dictionary) = self.dictionary {
            config.dictionary = dictionary;
        }
        if let Some(min) = self.min_players {
            config.min_players = min;
        }
        if let Some(max) = self.max_players {
            config.max_players = max;
        }
        if let Some(secs) = self.round_secs {
            config.round_time_secs = secs;
        }
        if let Some(lives) = self.lives {
            config.lives_per_player = lives;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if let Some(replay) = self.replay {
            config.replay = replay;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    tracing::info!("Starting word game server");

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    let supervisor = match SessionSupervisor::bind(config).await {
        Ok(supervisor) => supervisor,
        Err(e) => {
            tracing::error!("Startup failed: {e}");
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    match supervisor.run().await {
        Ok(end) => {
            tracing::info!(?end, "Server shutting down");
            ExitCode::from(end.exit_code())
        }
        Err(e) => {
            tracing::error!("Server error: {e}");
            ExitCode::FAILURE
        }
    }
}
