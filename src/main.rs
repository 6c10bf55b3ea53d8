mod cli;

use clap::Parser;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use cli::{Args, Command, ConfigAction};
use theremin::config::Config;
use theremin::supervisor::install_interrupt_handler;

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}

/// Ctrl+C flag, or a flag nobody raises if the handler cannot be installed.
fn interrupt_flag() -> Arc<AtomicBool> {
    match install_interrupt_handler() {
        Ok(flag) => flag,
        Err(e) => {
            log::warn!("Could not set up Ctrl+C handler: {}", e);
            Arc::new(AtomicBool::new(false))
        }
    }
}

fn main() {
    init_logging();
    let args = Args::parse();
    let config_path = args.config.as_deref();

    // `config init` must work before any config file exists
    let config = match args.command {
        Command::Config {
            action: ConfigAction::Init,
        } => Config::default(),
        _ => match Config::load(config_path) {
            Ok(c) => c,
            Err(e) => {
                log::error!("{}", e);
                std::process::exit(1);
            }
        },
    };

    let result = match args.command {
        Command::Launch => cli::run_launch(&config, config_path, interrupt_flag()),
        Command::Sensor { modality, feed } => {
            cli::run_sensor(&config, modality, feed, interrupt_flag())
        }
        Command::Actuator { listen } => cli::run_actuator(&config, listen),
        Command::Config { action } => cli::handle_config_action(action, &config, config_path),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
