//! Cluster lifecycle: start, monitor, cascade shutdown.
//!
//! ```text
//! Init -> Running -> { Crashed | Interrupted } -> Terminating -> Stopped
//! ```
//!
//! The actuator starts first; sensors follow after the startup delay so the
//! actuator's endpoint is listening when they dial it. While running, every
//! critical process is polled once per interval. The first critical exit, or
//! an operator interrupt, tears down every tracked process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::process::{ManagedProcess, ProcessHandle, ProcessStatus, GRACE_POLL};
use super::SupervisorError;
use crate::config::{ProcessConfig, Role, SupervisorConfig};

/// Upper bound on how long the supervisor sleeps before rechecking the
/// interrupt flag.
const INTERRUPT_CHECK: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterState {
    Init,
    Running,
    Crashed,
    Interrupted,
    Terminating,
    Stopped,
}

/// Why the cluster went down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownCause {
    /// A critical process exited on its own
    Crashed { name: String, code: Option<i32> },
    /// The operator asked for a stop
    Interrupted,
}

impl std::fmt::Display for ShutdownCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownCause::Crashed { name, code: Some(code) } => {
                write!(f, "'{}' exited with code {}", name, code)
            }
            ShutdownCause::Crashed { name, code: None } => {
                write!(f, "'{}' was killed by a signal", name)
            }
            ShutdownCause::Interrupted => write!(f, "interrupted"),
        }
    }
}

/// Final account of a supervised run.
#[derive(Debug, Clone)]
pub struct ShutdownReport {
    pub cause: ShutdownCause,
    pub processes: Vec<ProcessHandle>,
}

/// Timing knobs for the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorOptions {
    pub startup_delay: Duration,
    pub poll_interval: Duration,
    /// `None` kills immediately on shutdown
    pub grace_period: Option<Duration>,
}

impl From<SupervisorConfig> for SupervisorOptions {
    fn from(config: SupervisorConfig) -> Self {
        Self {
            startup_delay: Duration::from_millis(config.startup_delay_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            grace_period: config.grace_period_ms.map(Duration::from_millis),
        }
    }
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        SupervisorConfig::default().into()
    }
}

/// Owns every process in the cluster.
#[derive(Debug)]
pub struct Supervisor {
    options: SupervisorOptions,
    actuator: ProcessConfig,
    sensors: Vec<ProcessConfig>,
    processes: Vec<ManagedProcess>,
    state: ClusterState,
    interrupt: Arc<AtomicBool>,
}

impl Supervisor {
    /// Build a supervisor for `specs`, which must contain exactly one actuator.
    pub fn new(
        options: SupervisorOptions,
        specs: Vec<ProcessConfig>,
        interrupt: Arc<AtomicBool>,
    ) -> Result<Self, SupervisorError> {
        let (mut actuators, sensors): (Vec<_>, Vec<_>) =
            specs.into_iter().partition(|s| s.role == Role::Actuator);
        if actuators.len() != 1 {
            return Err(SupervisorError::ActuatorCount(actuators.len()));
        }
        let actuator = actuators.remove(0);

        Ok(Self {
            options,
            actuator,
            sensors,
            processes: Vec::new(),
            state: ClusterState::Init,
            interrupt,
        })
    }

    pub fn state(&self) -> ClusterState {
        self.state
    }

    /// Snapshots of every tracked process, in start order.
    pub fn handles(&self) -> Vec<ProcessHandle> {
        self.processes.iter().map(ManagedProcess::handle).collect()
    }

    /// Start, monitor, and tear down the cluster.
    pub fn run(&mut self) -> Result<ShutdownReport, SupervisorError> {
        self.start()?;
        let outcome = self.monitor();
        self.finish(outcome)
    }

    /// Tear the cluster down whatever the monitor reported.
    fn finish(
        &mut self,
        outcome: Result<ShutdownCause, SupervisorError>,
    ) -> Result<ShutdownReport, SupervisorError> {
        let cause = match outcome {
            Ok(cause) => cause,
            Err(e) => {
                log::error!("Lost track of the cluster: {}", e);
                self.shutdown();
                return Err(e);
            }
        };
        self.shutdown();
        Ok(ShutdownReport {
            cause,
            processes: self.handles(),
        })
    }

    /// Launch the actuator, wait out the startup delay, then launch sensors.
    ///
    /// Any spawn failure kills what was already started and is returned.
    pub fn start(&mut self) -> Result<(), SupervisorError> {
        log::info!("Starting cluster...");
        let complete = match self.start_all() {
            Ok(complete) => complete,
            Err(e) => {
                log::error!("{}", e);
                self.shutdown();
                return Err(e);
            }
        };
        self.state = ClusterState::Running;
        if complete {
            log::info!(
                "All {} processes running. Press Ctrl+C to stop the cluster.",
                self.processes.len()
            );
        }
        Ok(())
    }

    /// Returns false if the startup delay was interrupted before the sensors
    /// were launched.
    fn start_all(&mut self) -> Result<bool, SupervisorError> {
        let actuator = ManagedProcess::spawn(self.actuator.clone())?;
        self.processes.push(actuator);

        if !self.sleep_unless_interrupted(self.options.startup_delay) {
            log::info!(
                "Interrupted during startup, {} sensors not started",
                self.sensors.len()
            );
            return Ok(false);
        }

        for spec in self.sensors.clone() {
            let sensor = ManagedProcess::spawn(spec)?;
            self.processes.push(sensor);
        }
        Ok(true)
    }

    /// Poll until a critical process exits or the interrupt flag is set.
    pub fn monitor(&mut self) -> Result<ShutdownCause, SupervisorError> {
        loop {
            if self.interrupt.load(Ordering::SeqCst) {
                self.state = ClusterState::Interrupted;
                log::info!("Interrupt received. Shutting down cluster...");
                return Ok(ShutdownCause::Interrupted);
            }

            for process in &mut self.processes {
                if !process.status().is_running() {
                    continue;
                }
                let status = process.poll()?;
                let ProcessStatus::Exited { code } = status else {
                    continue;
                };
                if process.is_critical() {
                    self.state = ClusterState::Crashed;
                    log::error!(
                        "{} '{}' crashed ({}). Shutting down cluster...",
                        process.role(),
                        process.name(),
                        status
                    );
                    return Ok(ShutdownCause::Crashed {
                        name: process.name().to_string(),
                        code,
                    });
                }
                log::warn!("{} '{}' {}", process.role(), process.name(), status);
            }

            self.sleep_unless_interrupted(self.options.poll_interval);
        }
    }

    /// Terminate every tracked process and reap it.
    ///
    /// With a grace period every process is asked to stop at once and they
    /// share one deadline; whatever is still alive after it is killed.
    pub fn shutdown(&mut self) {
        self.state = ClusterState::Terminating;
        if let Some(grace) = self.options.grace_period {
            self.stop_gracefully(grace);
        }
        for process in &mut self.processes {
            match process.kill() {
                Ok(status) => log::debug!("'{}' {}", process.name(), status),
                Err(e) => log::error!("Failed to stop '{}': {}", process.name(), e),
            }
        }
        self.state = ClusterState::Stopped;
        log::info!("Cluster stopped");
    }

    fn stop_gracefully(&mut self, grace: Duration) {
        let mut signalled = 0;
        for process in &mut self.processes {
            match process.request_stop() {
                Ok(true) => signalled += 1,
                Ok(false) => {}
                Err(e) => log::error!("Failed to signal '{}': {}", process.name(), e),
            }
        }
        if signalled == 0 {
            return;
        }

        let deadline = Instant::now() + grace;
        loop {
            let mut alive = 0;
            for process in &mut self.processes {
                match process.reap_stopped() {
                    Ok(true) => alive += 1,
                    Ok(false) => {}
                    Err(e) => log::error!("Failed to check '{}': {}", process.name(), e),
                }
            }
            if alive == 0 {
                return;
            }
            if Instant::now() >= deadline {
                for process in self.processes.iter().filter(|p| p.status().is_running()) {
                    log::warn!("'{}' did not stop within {:?}, killing", process.name(), grace);
                }
                return;
            }
            std::thread::sleep(GRACE_POLL);
        }
    }

    /// Sleep for `duration`, waking early on interrupt. Returns false if
    /// interrupted.
    fn sleep_unless_interrupted(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.interrupt.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep((deadline - now).min(INTERRUPT_CHECK));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(role: Role, name: &str) -> ProcessConfig {
        ProcessConfig {
            role,
            name: name.to_string(),
            command: "true".to_string(),
            args: Vec::new(),
            cwd: None,
            critical: None,
        }
    }

    #[test]
    fn test_requires_one_actuator() {
        let interrupt = Arc::new(AtomicBool::new(false));
        let none = Supervisor::new(
            SupervisorOptions::default(),
            vec![spec(Role::Sensor, "hand")],
            interrupt.clone(),
        );
        assert!(matches!(none, Err(SupervisorError::ActuatorCount(0))));

        let two = Supervisor::new(
            SupervisorOptions::default(),
            vec![spec(Role::Actuator, "a"), spec(Role::Actuator, "b")],
            interrupt,
        );
        assert!(matches!(two, Err(SupervisorError::ActuatorCount(2))));
    }

    #[test]
    fn test_options_from_config() {
        let options = SupervisorOptions::from(SupervisorConfig {
            startup_delay_ms: 250,
            poll_interval_ms: 100,
            grace_period_ms: Some(500),
        });
        assert_eq!(options.startup_delay, Duration::from_millis(250));
        assert_eq!(options.poll_interval, Duration::from_millis(100));
        assert_eq!(options.grace_period, Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_initial_state() {
        let supervisor = Supervisor::new(
            SupervisorOptions::default(),
            vec![spec(Role::Sensor, "hand"), spec(Role::Actuator, "action")],
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        assert_eq!(supervisor.state(), ClusterState::Init);
        assert!(supervisor.handles().is_empty());
    }

    #[cfg(unix)]
    fn sleeper(role: Role, name: &str) -> ProcessConfig {
        ProcessConfig {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "exec sleep 30".to_string()],
            ..spec(role, name)
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_monitor_error_still_tears_down() {
        let mut supervisor = Supervisor::new(
            SupervisorOptions {
                startup_delay: Duration::ZERO,
                ..SupervisorOptions::default()
            },
            vec![sleeper(Role::Actuator, "action"), sleeper(Role::Sensor, "hand")],
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();
        supervisor.start().unwrap();

        let lost = std::io::Error::other("wait failed");
        let result = supervisor.finish(Err(SupervisorError::Io(lost)));
        assert!(matches!(result, Err(SupervisorError::Io(_))));
        assert_eq!(supervisor.state(), ClusterState::Stopped);
        assert!(supervisor
            .handles()
            .iter()
            .all(|h| h.status == ProcessStatus::Terminated));
    }

    #[cfg(unix)]
    #[test]
    fn test_interrupted_startup_skips_sensors() {
        let mut supervisor = Supervisor::new(
            SupervisorOptions::default(),
            vec![sleeper(Role::Actuator, "action"), sleeper(Role::Sensor, "hand")],
            Arc::new(AtomicBool::new(true)),
        )
        .unwrap();
        assert!(!supervisor.start_all().unwrap());
        assert_eq!(supervisor.handles().len(), 1);
        supervisor.shutdown();
    }

    #[test]
    fn test_shutdown_cause_display() {
        let crashed = ShutdownCause::Crashed {
            name: "action".to_string(),
            code: Some(1),
        };
        assert_eq!(crashed.to_string(), "'action' exited with code 1");
        assert_eq!(ShutdownCause::Interrupted.to_string(), "interrupted");
    }
}
