//! Integration tests for the cluster supervisor.
//!
//! These spawn real short-lived shell processes, so they only run on unix.

#![cfg(unix)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use theremin::config::{ProcessConfig, Role};
use theremin::supervisor::{
    ClusterState, ProcessStatus, ShutdownCause, Supervisor, SupervisorError, SupervisorOptions,
};

fn shell(role: Role, name: &str, script: &str) -> ProcessConfig {
    ProcessConfig {
        role,
        name: name.to_string(),
        command: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        cwd: None,
        critical: None,
    }
}

fn fast_options(poll_ms: u64) -> SupervisorOptions {
    SupervisorOptions {
        startup_delay: Duration::from_millis(50),
        poll_interval: Duration::from_millis(poll_ms),
        grace_period: None,
    }
}

fn all_stopped(supervisor: &Supervisor) -> bool {
    supervisor
        .handles()
        .iter()
        .all(|h| !h.status.is_running())
}

#[test]
fn test_actuator_crash_cascades_within_one_poll() {
    let poll = Duration::from_millis(200);
    let specs = vec![
        shell(Role::Actuator, "action", "sleep 0.4; exit 2"),
        shell(Role::Sensor, "hand", "exec sleep 30"),
        shell(Role::Sensor, "gaze", "exec sleep 30"),
    ];
    let mut supervisor =
        Supervisor::new(fast_options(200), specs, Arc::new(AtomicBool::new(false))).unwrap();

    supervisor.start().unwrap();
    assert_eq!(supervisor.state(), ClusterState::Running);
    assert_eq!(supervisor.handles().len(), 3);

    let cause = supervisor.monitor().unwrap();
    let observed = Instant::now();
    assert_eq!(
        cause,
        ShutdownCause::Crashed {
            name: "action".to_string(),
            code: Some(2),
        }
    );
    assert_eq!(supervisor.state(), ClusterState::Crashed);

    supervisor.shutdown();
    assert!(observed.elapsed() < poll);
    assert_eq!(supervisor.state(), ClusterState::Stopped);
    assert!(all_stopped(&supervisor));

    let handles = supervisor.handles();
    assert_eq!(handles[0].status, ProcessStatus::Exited { code: Some(2) });
    assert_eq!(handles[1].status, ProcessStatus::Terminated);
    assert_eq!(handles[2].status, ProcessStatus::Terminated);
}

#[test]
fn test_run_reports_crash() {
    let specs = vec![
        shell(Role::Actuator, "action", "exit 1"),
        shell(Role::Sensor, "hand", "exec sleep 30"),
    ];
    let mut supervisor =
        Supervisor::new(fast_options(50), specs, Arc::new(AtomicBool::new(false))).unwrap();

    let start = Instant::now();
    let report = supervisor.run().unwrap();
    assert!(matches!(report.cause, ShutdownCause::Crashed { .. }));
    assert_eq!(report.processes.len(), 2);
    assert!(report.processes.iter().all(|h| !h.status.is_running()));
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_interrupt_stops_everything() {
    let interrupt = Arc::new(AtomicBool::new(false));
    let specs = vec![
        shell(Role::Actuator, "action", "exec sleep 30"),
        shell(Role::Sensor, "hand", "exec sleep 30"),
    ];
    let mut supervisor = Supervisor::new(fast_options(1000), specs, Arc::clone(&interrupt)).unwrap();

    let trigger = Arc::clone(&interrupt);
    let raiser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        trigger.store(true, Ordering::SeqCst);
    });

    let start = Instant::now();
    let report = supervisor.run().unwrap();
    raiser.join().unwrap();

    assert_eq!(report.cause, ShutdownCause::Interrupted);
    assert_eq!(supervisor.state(), ClusterState::Stopped);
    assert!(report
        .processes
        .iter()
        .all(|h| h.status == ProcessStatus::Terminated));
    // Interrupts are noticed well before the next one-second poll
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_sensor_exit_does_not_cascade_by_default() {
    let interrupt = Arc::new(AtomicBool::new(false));
    let specs = vec![
        shell(Role::Actuator, "action", "exec sleep 30"),
        shell(Role::Sensor, "hand", "exit 0"),
    ];
    let mut supervisor = Supervisor::new(fast_options(50), specs, Arc::clone(&interrupt)).unwrap();

    let trigger = Arc::clone(&interrupt);
    let raiser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(500));
        trigger.store(true, Ordering::SeqCst);
    });

    let report = supervisor.run().unwrap();
    raiser.join().unwrap();

    // Only the interrupt brought the cluster down
    assert_eq!(report.cause, ShutdownCause::Interrupted);
    assert_eq!(report.processes[0].status, ProcessStatus::Terminated);
    assert_eq!(report.processes[1].status, ProcessStatus::Exited { code: Some(0) });
}

#[test]
fn test_critical_sensor_exit_cascades() {
    let mut sensor = shell(Role::Sensor, "hand", "sleep 0.2; exit 4");
    sensor.critical = Some(true);
    let specs = vec![shell(Role::Actuator, "action", "exec sleep 30"), sensor];
    let mut supervisor =
        Supervisor::new(fast_options(50), specs, Arc::new(AtomicBool::new(false))).unwrap();

    let report = supervisor.run().unwrap();
    assert_eq!(
        report.cause,
        ShutdownCause::Crashed {
            name: "hand".to_string(),
            code: Some(4),
        }
    );
    assert_eq!(report.processes[0].status, ProcessStatus::Terminated);
}

#[test]
fn test_sensor_spawn_failure_is_fatal() {
    let mut broken = shell(Role::Sensor, "gaze", "");
    broken.command = "/nonexistent/theremin-sensor".to_string();
    let specs = vec![
        shell(Role::Actuator, "action", "exec sleep 30"),
        shell(Role::Sensor, "hand", "exec sleep 30"),
        broken,
    ];
    let mut supervisor =
        Supervisor::new(fast_options(50), specs, Arc::new(AtomicBool::new(false))).unwrap();

    let err = supervisor.start().unwrap_err();
    assert!(matches!(err, SupervisorError::SpawnFailed { ref name, .. } if name == "gaze"));
    assert_eq!(supervisor.state(), ClusterState::Stopped);
    // The processes that did start were torn down
    assert_eq!(supervisor.handles().len(), 2);
    assert!(all_stopped(&supervisor));
}

#[test]
fn test_actuator_starts_before_sensors() {
    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("order.log");
    let m = marker.display();
    let specs = vec![
        shell(Role::Sensor, "hand", &format!("echo sensor >> {}; exec sleep 30", m)),
        shell(Role::Actuator, "action", &format!("echo actuator >> {}; exec sleep 30", m)),
    ];
    let options = SupervisorOptions {
        startup_delay: Duration::from_millis(300),
        ..fast_options(50)
    };
    let mut supervisor = Supervisor::new(options, specs, Arc::new(AtomicBool::new(false))).unwrap();

    supervisor.start().unwrap();
    assert_eq!(supervisor.handles()[0].role, Role::Actuator);
    thread::sleep(Duration::from_millis(200));
    supervisor.shutdown();

    let order = std::fs::read_to_string(&marker).unwrap();
    assert_eq!(order.lines().collect::<Vec<_>>(), vec!["actuator", "sensor"]);
}

#[test]
fn test_graceful_shutdown_uses_grace_period() {
    let interrupt = Arc::new(AtomicBool::new(true));
    let specs = vec![
        shell(Role::Actuator, "action", "exec sleep 30"),
        shell(Role::Sensor, "hand", "exec sleep 30"),
    ];
    let options = SupervisorOptions {
        startup_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(50),
        grace_period: Some(Duration::from_secs(5)),
    };
    let mut supervisor = Supervisor::new(options, specs, interrupt).unwrap();

    let start = Instant::now();
    let report = supervisor.run().unwrap();
    assert_eq!(report.cause, ShutdownCause::Interrupted);
    // sleep honours SIGTERM, so the grace period is not used up
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_grace_period_is_shared_across_processes() {
    let stubborn = "trap '' TERM; while :; do sleep 0.05; done";
    let specs = vec![
        shell(Role::Actuator, "action", stubborn),
        shell(Role::Sensor, "hand", stubborn),
        shell(Role::Sensor, "gaze", stubborn),
    ];
    let grace = Duration::from_millis(400);
    let options = SupervisorOptions {
        startup_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(50),
        grace_period: Some(grace),
    };
    let mut supervisor = Supervisor::new(options, specs, Arc::new(AtomicBool::new(false))).unwrap();

    supervisor.start().unwrap();
    // Let every shell install its trap
    thread::sleep(Duration::from_millis(200));

    let start = Instant::now();
    supervisor.shutdown();
    let elapsed = start.elapsed();

    assert_eq!(supervisor.handles().len(), 3);
    assert!(all_stopped(&supervisor));
    assert!(elapsed >= grace);
    // One deadline for all three, not one each
    assert!(elapsed < grace * 2, "shutdown took {:?}", elapsed);
}
