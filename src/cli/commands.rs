//! Subcommand handlers.

use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::args::ConfigAction;
use super::enums::ModalityArg;
use theremin::config::{default_path as get_config_path, Config};
use theremin::sensor::{self, SensorOptions};
use theremin::supervisor::{default_cluster, ProcessStatus, Supervisor, SupervisorOptions};

type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Launch the whole cluster and block until it is stopped.
pub fn run_launch(config: &Config, config_path: Option<&Path>, interrupt: Arc<AtomicBool>) -> CommandResult {
    let specs = if config.processes.is_empty() {
        let exe = std::env::current_exe()?;
        default_cluster(&exe, config_path)
    } else {
        config.processes.clone()
    };

    let mut supervisor = Supervisor::new(SupervisorOptions::from(config.supervisor), specs, interrupt)?;
    let report = supervisor.run()?;

    log::info!("Cluster shut down: {}", report.cause);
    for handle in &report.processes {
        if handle.status != ProcessStatus::Terminated {
            log::info!("  {} '{}' (pid {}): {}", handle.role, handle.name, handle.pid, handle.status);
        }
    }
    Ok(())
}

/// Run a single sensor until its feed ends or it is interrupted.
pub fn run_sensor(config: &Config, modality: ModalityArg, feed: PathBuf, stop: Arc<AtomicBool>) -> CommandResult {
    let options = SensorOptions {
        modality: modality.into(),
        feed,
    };
    sensor::run(config, &options, stop)?;
    Ok(())
}

/// Run the actuator endpoint until the process is stopped.
pub fn run_actuator(config: &Config, listen: Option<String>) -> CommandResult {
    let address = listen.unwrap_or_else(|| config.sink.address.clone());
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(theremin::actuator::run(&address))?;
    Ok(())
}

/// Handle config subcommand actions.
pub fn handle_config_action(action: ConfigAction, config: &Config, config_path: Option<&Path>) -> CommandResult {
    match action {
        ConfigAction::Show => {
            let path = config_path.map(Path::to_path_buf).unwrap_or_else(get_config_path);
            if path.exists() {
                println!("# Config file: {} (exists)", path.display());
            } else {
                println!("# Config file: {} (not found, using defaults)", path.display());
            }
            println!();
            print!("{}", config.to_toml()?);
        }
        ConfigAction::Init => {
            let path = config_path.map(Path::to_path_buf).unwrap_or_else(get_config_path);
            if path.exists() {
                return Err(format!(
                    "Config file already exists: {}\nUse 'theremin config show' to view current settings.",
                    path.display()
                )
                .into());
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let contents = format!("# theremin configuration\n\n{}", Config::default().to_toml()?);
            std::fs::write(&path, contents)?;
            println!("Created config file: {}", path.display());
        }
    }
    Ok(())
}
