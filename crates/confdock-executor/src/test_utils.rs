//! Gating for tests that talk to a real docker daemon.
use std::process::{Command, Stdio};

/// True when `docker info` succeeds, i.e. the CLI exists and the daemon answers.
pub fn docker_daemon_reachable() -> bool {
    Command::new("docker")
        .arg("info")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Returns early from the enclosing test when no docker daemon is reachable.
#[macro_export]
macro_rules! require_docker {
    () => {
        if !$crate::test_utils::docker_daemon_reachable() {
            eprintln!("skipping {}: docker daemon not reachable", module_path!());
            return;
        }
    };
}
