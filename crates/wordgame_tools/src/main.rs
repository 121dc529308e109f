//! Word game - development tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "wordgame-tools")]
#[command(about = "Development tools for the word game server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a dictionary file
    DictCheck {
        /// Path to the word list
        #[arg(default_value = "words.txt")]
        path: PathBuf,

        /// Number of sample sequences to print
        #[arg(short, long, default_value = "5")]
        samples: usize,
    },
    /// Check a RON server config file
    ConfigCheck {
        /// Path to the config file
        path: PathBuf,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::DictCheck { path, samples } => {
            match wordgame_tools::validate::check_dictionary(&path, samples) {
                Ok(report) => {
                    println!("{}: {} words", path.display(), report.words);
                    println!("word length: {}..={}", report.shortest, report.longest);
                    println!("sample sequences: {}", report.samples.join(", "));
                }
                Err(e) => {
                    tracing::error!("Dictionary check failed: {e}");
                    std::process::exit(1);
                }
            }
        }
        Commands::ConfigCheck { path } => match wordgame_tools::validate::check_config(&path) {
            Ok(config) => {
                tracing::info!("Config is valid");
                println!("{config:#?}");
            }
            Err(e) => {
                tracing::error!("Config check failed: {e}");
                std::process::exit(1);
            }
        },
    }
}
