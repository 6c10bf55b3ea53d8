//! Cluster supervision: one actuator and any number of sensors, launched as
//! separate OS processes and torn down together.

mod cluster;
mod process;

pub use cluster::{
    ClusterState, ShutdownCause, ShutdownReport, Supervisor, SupervisorOptions,
};
pub use process::{ManagedProcess, ProcessHandle, ProcessStatus};

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::{ProcessConfig, Role};

/// Errors from supervising the cluster.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("A cluster needs exactly one actuator process, found {0}")]
    ActuatorCount(usize),

    #[error("Failed to start '{name}' ({command}): {source}")]
    SpawnFailed {
        name: String,
        command: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Install the Ctrl+C handler and return the flag it raises.
///
/// This should be called once at program startup.
pub fn install_interrupt_handler() -> Result<Arc<AtomicBool>, ctrlc::Error> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })?;
    Ok(flag)
}

/// The cluster launched when the configuration lists no processes: this
/// binary as the actuator plus one hand sensor reading landmarks from stdin.
pub fn default_cluster(exe: &Path, config_path: Option<&Path>) -> Vec<ProcessConfig> {
    let command = exe.display().to_string();
    let with_config = |mut args: Vec<String>| {
        if let Some(path) = config_path {
            args.insert(0, path.display().to_string());
            args.insert(0, "--config".to_string());
        }
        args
    };

    vec![
        ProcessConfig {
            role: Role::Actuator,
            name: "actuator".to_string(),
            command: command.clone(),
            args: with_config(vec!["actuator".to_string()]),
            cwd: None,
            critical: None,
        },
        ProcessConfig {
            role: Role::Sensor,
            name: "hand".to_string(),
            command,
            args: with_config(vec![
                "sensor".to_string(),
                "--modality".to_string(),
                "hand".to_string(),
                "--feed".to_string(),
                "-".to_string(),
            ]),
            cwd: None,
            critical: None,
        },
    ]
}
