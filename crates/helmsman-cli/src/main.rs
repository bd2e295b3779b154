#![deny(unsafe_code)]

//! Helmsman CLI — command-line control plane for the balancer.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use helmsman_config::Format;
use helmsman_core::Balancer;

mod settings;

use settings::Settings;

/// Helmsman — control plane for an HAProxy-compatible load balancer.
#[derive(Parser)]
#[command(name = "helmsman", version, about, long_about = None)]
struct Cli {
    /// Path to the settings file.
    #[arg(short, long, default_value = "helmsman.toml")]
    settings: PathBuf,

    /// Increase log verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the balancer configuration.
    Verify,

    /// Start the balancer daemonized.
    Start,

    /// Stop the balancer without waiting for connections to finish.
    Stop {
        /// Terminate every balancer instance system-wide.
        #[arg(long)]
        all: bool,
    },

    /// Gracefully drain and stop all instances.
    Softstop,

    /// Reload the configuration with live hand-off to a new instance.
    Reload {
        /// Terminate the predecessor immediately instead of draining it.
        #[arg(long)]
        hard: bool,
    },

    /// Show whether a balancer instance is running.
    Status,

    /// Dump status information from the admin socket.
    Info,

    /// Show the parsed configuration.
    Config {
        /// Render as JSON instead of the balancer's text format.
        #[arg(long)]
        json: bool,
    },

    /// Show a server's weight, or set it when a value is given.
    Weight {
        backend: String,
        server: String,
        weight: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up tracing subscriber with verbosity level
    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    let settings = load_settings(&cli.settings).await?;
    let mut balancer = Balancer::new(settings.balancer_options()).await?;

    match cli.command {
        Commands::Verify => {
            balancer.verify().await?;
            println!("Configuration is valid.");
        }
        Commands::Start => match balancer.start().await? {
            Some(warnings) => println!("Started with warnings:\n{warnings}"),
            None => println!("Started."),
        },
        Commands::Stop { all } => {
            balancer.stop(all).await?;
            println!("Stopped.");
        }
        Commands::Softstop => {
            balancer.softstop().await?;
            println!("Drained and stopped.");
        }
        Commands::Reload { hard } => {
            balancer.reload(hard).await?;
            match balancer.pid() {
                Some(pid) => println!("Reloaded; new pid {pid}."),
                None => println!("Reloaded."),
            }
        }
        Commands::Status => {
            let running = balancer.running().await?;
            match balancer.pid() {
                Some(pid) if running => println!("Running (pid {pid})."),
                _ => println!("Not running."),
            }
        }
        Commands::Info => {
            for (key, value) in balancer.info().await? {
                println!("{key}: {value}");
            }
        }
        Commands::Config { json } => {
            balancer.load(None).await?;
            let format = if json { Format::Json } else { Format::Text };
            print!("{}", balancer.store().compose(format)?);
        }
        Commands::Weight {
            backend,
            server,
            weight,
        } => match weight {
            Some(value) => {
                balancer.set_weight(&backend, &server, value).await?;
                println!("Weight of {backend}/{server} set to {value}.");
            }
            None => {
                let weight = balancer.weight(&backend, &server).await?;
                println!("{} (initial {})", weight.current, weight.initial);
            }
        },
    }

    Ok(())
}

async fn load_settings(path: &Path) -> Result<Settings> {
    if path.exists() {
        Ok(Settings::load(path).await?)
    } else {
        info!(path = %path.display(), "Settings file not found, using defaults");
        Ok(Settings::default())
    }
}
