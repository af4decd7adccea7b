//! Typed docker CLI verbs.
//!
//! Every command the orchestrator issues is built from a [`DockerCommand`] and
//! rendered to a single command line with shell quoting, so values such as
//! JDBC URLs or passwords never need hand escaping.

use serde::{Deserialize, Serialize};

use crate::{ExecutorError, Result};

pub const RUNNING_FORMAT: &str = "{{.State.Running}}";
pub const ADDRESS_FORMAT: &str = "{{.Config.Image}} | {{range .NetworkSettings.Networks}}{{.IPAddress}}{{end}}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host: u16,
    pub container: u16,
}

impl PortBinding {
    pub fn new(host: u16, container: u16) -> Self {
        Self { host, container }
    }
}

impl std::fmt::Display for PortBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

/// Options for `docker run -d`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunOptions {
    pub name: String,
    pub network: Option<String>,
    pub ports: Vec<PortBinding>,
    pub env: Vec<(String, String)>,
    pub image: String,
}

impl RunOptions {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(ExecutorError::InvalidCommand(
                "container name must not be empty".to_string(),
            ));
        }
        if self.image.trim().is_empty() {
            return Err(ExecutorError::InvalidCommand(format!(
                "image for container {} must not be empty",
                self.name
            )));
        }
        if let Some((key, _)) = self
            .env
            .iter()
            .find(|(key, _)| key.is_empty() || key.contains('='))
        {
            return Err(ExecutorError::InvalidCommand(format!(
                "invalid environment variable name {key:?} for container {}",
                self.name
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DockerCommand {
    Version,
    InspectNetwork { network: String },
    CreateNetwork { network: String },
    InspectContainer { name: String },
    InspectRunning { name: String },
    InspectAddress { name: String },
    Pull { image: String },
    Run(RunOptions),
    Start { name: String },
    Stop { name: String },
    Exec { name: String, args: Vec<String> },
}

impl DockerCommand {
    /// Argument vector, starting with `docker`.
    pub fn args(&self) -> Result<Vec<String>> {
        let mut args = vec!["docker".to_string()];
        match self {
            DockerCommand::Version => args.push("--version".to_string()),
            DockerCommand::InspectNetwork { network } => {
                args.extend(["network".into(), "inspect".into(), network.clone()])
            }
            DockerCommand::CreateNetwork { network } => {
                args.extend(["network".into(), "create".into(), network.clone()])
            }
            DockerCommand::InspectContainer { name } => {
                args.extend(["inspect".into(), name.clone()])
            }
            DockerCommand::InspectRunning { name } => args.extend([
                "inspect".into(),
                "--format".into(),
                RUNNING_FORMAT.into(),
                name.clone(),
            ]),
            DockerCommand::InspectAddress { name } => args.extend([
                "inspect".into(),
                "--format".into(),
                ADDRESS_FORMAT.into(),
                name.clone(),
            ]),
            DockerCommand::Pull { image } => args.extend(["pull".into(), image.clone()]),
            DockerCommand::Run(options) => {
                options.validate()?;
                args.extend(["run".into(), "-d".into(), "--name".into(), options.name.clone()]);
                if let Some(network) = &options.network {
                    args.extend(["--network".into(), network.clone()]);
                }
                for port in &options.ports {
                    args.extend(["-p".into(), port.to_string()]);
                }
                for (key, value) in &options.env {
                    args.extend(["-e".into(), format!("{key}={value}")]);
                }
                args.push(options.image.clone());
            }
            DockerCommand::Start { name } => args.extend(["start".into(), name.clone()]),
            DockerCommand::Stop { name } => args.extend(["stop".into(), name.clone()]),
            DockerCommand::Exec { name, args: exec_args } => {
                if exec_args.is_empty() {
                    return Err(ExecutorError::InvalidCommand(format!(
                        "exec in {name} needs a command"
                    )));
                }
                args.extend(["exec".into(), name.clone()]);
                args.extend(exec_args.iter().cloned());
            }
        }
        Ok(args)
    }

    /// Renders a quoted command line suitable for `sh -c`.
    pub fn render(&self) -> Result<String> {
        Ok(shell_words::join(self.args()?))
    }
}
