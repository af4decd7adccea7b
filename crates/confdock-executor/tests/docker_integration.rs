//! Checks against a real docker daemon; skipped when docker is unavailable.

use confdock_executor::{
    network_exists, probe, require_docker, run_docker, ContainerState, DockerCommand, ShellRunner,
};

#[tokio::test]
async fn test_docker_version_reports_client() {
    require_docker!();
    let runner = ShellRunner::new();
    let version = run_docker(&runner, &DockerCommand::Version).await.unwrap();
    assert!(version.to_lowercase().contains("docker"));
}

#[tokio::test]
async fn test_unknown_container_is_absent() {
    require_docker!();
    let runner = ShellRunner::new();
    let name = format!("confdock-missing-{}", std::process::id());
    assert_eq!(probe(&runner, &name).await, ContainerState::Absent);
    assert!(!network_exists(&runner, &name).await);
}
