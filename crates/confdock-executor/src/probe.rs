use confdock_common::CommandRunner;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::docker::DockerCommand;
use crate::run_docker;

/// Lifecycle state of a named container, derived fresh on every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Absent,
    Stopped,
    Running,
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContainerState::Absent => "absent",
            ContainerState::Stopped => "stopped",
            ContainerState::Running => "running",
        };
        f.write_str(s)
    }
}

/// Classifies a container without side effects.
///
/// A failed existence check means `Absent`; the running-state check is then
/// never issued. A failed or non-`true` running check means `Stopped`.
pub async fn probe(runner: &dyn CommandRunner, name: &str) -> ContainerState {
    let exists = DockerCommand::InspectContainer {
        name: name.to_string(),
    };
    if let Err(e) = run_docker(runner, &exists).await {
        debug!(container = name, error = %e, "existence check failed, treating as absent");
        return ContainerState::Absent;
    }

    let running = DockerCommand::InspectRunning {
        name: name.to_string(),
    };
    match run_docker(runner, &running).await {
        Ok(state) if state == "true" => ContainerState::Running,
        Ok(_) => ContainerState::Stopped,
        Err(e) => {
            debug!(container = name, error = %e, "running check failed, treating as stopped");
            ContainerState::Stopped
        }
    }
}

pub async fn network_exists(runner: &dyn CommandRunner, network: &str) -> bool {
    let inspect = DockerCommand::InspectNetwork {
        network: network.to_string(),
    };
    run_docker(runner, &inspect).await.is_ok()
}
