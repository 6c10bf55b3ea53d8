//! A single managed cluster process.
//!
//! Wraps the OS child together with the configuration it was launched from,
//! and knows how to poll and terminate it.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use super::SupervisorError;
use crate::config::{ProcessConfig, Role};

/// Interval between liveness checks while waiting out a grace period.
pub(super) const GRACE_POLL: Duration = Duration::from_millis(20);

/// Lifecycle status of a managed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Exited on its own; `code` is `None` when a signal ended it
    Exited { code: Option<i32> },
    /// Stopped by the supervisor and reaped
    Terminated,
}

impl ProcessStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }
}

impl std::fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessStatus::Running => write!(f, "running"),
            ProcessStatus::Exited { code: Some(code) } => write!(f, "exited with code {}", code),
            ProcessStatus::Exited { code: None } => write!(f, "exited by signal"),
            ProcessStatus::Terminated => write!(f, "terminated"),
        }
    }
}

/// Snapshot of a managed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub role: Role,
    pub name: String,
    pub working_directory: Option<PathBuf>,
    pub command: String,
    pub pid: u32,
    pub status: ProcessStatus,
}

/// A running (or reaped) cluster member.
#[derive(Debug)]
pub struct ManagedProcess {
    spec: ProcessConfig,
    child: Child,
    status: ProcessStatus,
}

impl ManagedProcess {
    /// Launch the process described by `spec`. Standard streams are inherited
    /// so children log straight to the operator's terminal.
    pub fn spawn(spec: ProcessConfig) -> Result<Self, SupervisorError> {
        let mut cmd = Command::new(&spec.command);
        cmd.args(&spec.args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(ref cwd) = spec.cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd.spawn().map_err(|source| SupervisorError::SpawnFailed {
            name: spec.name.clone(),
            command: spec.command.clone(),
            source,
        })?;

        log::info!(
            "Started {} '{}' (pid {})",
            spec.role,
            spec.name,
            child.id()
        );

        Ok(Self {
            spec,
            child,
            status: ProcessStatus::Running,
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn role(&self) -> Role {
        self.spec.role
    }

    pub fn is_critical(&self) -> bool {
        self.spec.is_critical()
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    pub fn handle(&self) -> ProcessHandle {
        ProcessHandle {
            role: self.spec.role,
            name: self.spec.name.clone(),
            working_directory: self.spec.cwd.clone(),
            command: self.spec.command.clone(),
            pid: self.child.id(),
            status: self.status,
        }
    }

    /// Check whether the process has exited, without blocking.
    pub fn poll(&mut self) -> Result<ProcessStatus, SupervisorError> {
        if self.status.is_running() {
            if let Some(exit) = self.child.try_wait()? {
                self.status = ProcessStatus::Exited { code: exit.code() };
            }
        }
        Ok(self.status)
    }

    /// Stop the process and reap it.
    ///
    /// With a grace period the process is first asked to terminate (SIGTERM
    /// on unix) and only killed if it is still alive when the period ends.
    /// Without one it is killed immediately.
    pub fn terminate(&mut self, grace: Option<Duration>) -> Result<ProcessStatus, SupervisorError> {
        if let Some(grace) = grace {
            if self.request_stop()? {
                let deadline = Instant::now() + grace;
                while self.reap_stopped()? && Instant::now() < deadline {
                    std::thread::sleep(GRACE_POLL);
                }
            }
            if !self.status.is_running() {
                return Ok(self.status);
            }
            log::warn!(
                "'{}' did not stop within {:?}, killing",
                self.spec.name,
                grace
            );
        }
        self.kill()
    }

    /// Ask the process to exit (SIGTERM on unix) without waiting for it.
    ///
    /// Returns true if the request was delivered to a running process.
    pub fn request_stop(&mut self) -> Result<bool, SupervisorError> {
        if !self.poll()?.is_running() {
            return Ok(false);
        }
        Ok(self.send_term())
    }

    /// Reap the process if it has exited since a stop request.
    ///
    /// Returns true while it is still running.
    pub fn reap_stopped(&mut self) -> Result<bool, SupervisorError> {
        if self.status.is_running() && self.child.try_wait()?.is_some() {
            self.status = ProcessStatus::Terminated;
        }
        Ok(self.status.is_running())
    }

    /// Kill the process if it is still running and reap it.
    pub fn kill(&mut self) -> Result<ProcessStatus, SupervisorError> {
        if !self.poll()?.is_running() {
            return Ok(self.status);
        }
        // Fails only if the child already exited, which wait() then reaps
        let _ = self.child.kill();
        self.child.wait()?;
        self.status = ProcessStatus::Terminated;
        Ok(self.status)
    }

    #[cfg(unix)]
    fn send_term(&mut self) -> bool {
        let pid = self.child.id() as libc::pid_t;
        // SAFETY: pid belongs to our own unreaped child, so it cannot have been recycled
        unsafe { libc::kill(pid, libc::SIGTERM) == 0 }
    }

    #[cfg(not(unix))]
    fn send_term(&mut self) -> bool {
        false
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if self.status.is_running() {
            let _ = self.kill();
        }
    }
}
