//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use super::enums::ModalityArg;

/// Gesture-driven pointer cluster: camera sensors stream cursor points to an actuator
#[derive(Parser, Debug)]
#[command(name = "theremin")]
#[command(version, about = "Gesture-driven pointer cluster", long_about = None)]
#[command(after_help = "EXAMPLES:
    # Launch actuator and sensors as one cluster
    theremin launch

    # Run a hand sensor on landmarks produced by an external detector
    detector | theremin sensor --modality hand

    # Run the actuator endpoint on its own
    theremin actuator --listen 127.0.0.1:50051")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the actuator and all sensors, and stop them together
    Launch,
    /// Run one sensor process
    Sensor {
        /// Tracked body signal
        #[arg(long, short, default_value = "hand")]
        modality: ModalityArg,

        /// Landmark feed (JSON lines), `-` for stdin
        #[arg(long, short, default_value = "-")]
        feed: PathBuf,
    },
    /// Run the actuator endpoint
    Actuator {
        /// Address to listen on (default: sink address from config)
        #[arg(long, short)]
        listen: Option<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Show effective configuration
    Show,
    /// Create default config file
    Init,
}
