use confdock_common::{CommandRunner, ProcessFailure};
use thiserror::Error;

pub use confdock_common as common;

pub mod docker;
pub mod probe;
pub mod readiness;
pub mod runner;
pub mod test_utils;

pub use docker::{DockerCommand, PortBinding, RunOptions};
pub use probe::{network_exists, probe, ContainerState};
pub use readiness::{ReadinessChecker, ReadinessConfig, ReadinessError, ReadinessStatus, SettlePolicy};
pub use runner::ShellRunner;

#[derive(Error, Debug, Clone)]
pub enum ExecutorError {
    #[error(transparent)]
    Process(#[from] ProcessFailure),
    #[error("Invalid docker command: {0}")]
    InvalidCommand(String),
}

pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Renders `command` and runs it through `runner`.
pub async fn run_docker(runner: &dyn CommandRunner, command: &DockerCommand) -> Result<String> {
    let line = command.render()?;
    Ok(runner.run(&line).await?)
}
