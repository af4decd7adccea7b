use confdock_common::{CommandRunner, ProcessFailure};
use confdock_executor::{
    network_exists, probe, run_docker, ContainerState, DockerCommand, ExecutorError, PortBinding,
    ReadinessConfig, RunOptions, SettlePolicy,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

pub mod stack;

pub use confdock_executor as executor;
pub use stack::{confluence_stack, StackConfig};

// --- Custom Error Type ---
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Docker is not installed or not accessible: {0}")]
    DockerUnavailable(ProcessFailure),
    #[error("Service {service} depends on unknown service {dependency}")]
    UnknownDependency { service: String, dependency: String },
    #[error("Dependency cycle involving service {0}")]
    DependencyCycle(String),
    #[error("Duplicate service name: {0}")]
    DuplicateService(String),
    #[error("Failed to prepare network {network}: {source}")]
    Network {
        network: String,
        #[source]
        source: ExecutorError,
    },
    #[error("Failed to stop {service}: {source}")]
    Teardown {
        service: String,
        #[source]
        source: ExecutorError,
        /// Services handled before the failure.
        completed: TeardownReport,
    },
}
pub type Result<T> = std::result::Result<T, Error>;

/// Static descriptor of one container in the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub name: String,
    pub network: String,
    pub image: String,
    pub ports: Vec<PortBinding>,
    pub env: Vec<(String, String)>,
    pub depends_on: Option<String>,
    /// Command that exits zero once the service accepts connections.
    pub readiness: Option<DockerCommand>,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, network: impl Into<String>, image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            network: network.into(),
            image: image.into(),
            ports: Vec::new(),
            env: Vec::new(),
            depends_on: None,
            readiness: None,
        }
    }

    pub fn port(mut self, host: u16, container: u16) -> Self {
        self.ports.push(PortBinding::new(host, container));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on = Some(name.into());
        self
    }

    pub fn readiness(mut self, command: DockerCommand) -> Self {
        self.readiness = Some(command);
        self
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            name: self.name.clone(),
            network: Some(self.network.clone()),
            ports: self.ports.clone(),
            env: self.env.clone(),
            image: self.image.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkAction {
    Created,
    Existing,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "detail")]
pub enum ServiceOutcome {
    /// Image pulled and a fresh container run.
    Created,
    /// Existing stopped container started.
    Started,
    AlreadyRunning,
    Failed(String),
    /// Not attempted because a dependency failed.
    Skipped { blocked_by: String },
}

impl ServiceOutcome {
    pub fn is_up(&self) -> bool {
        matches!(
            self,
            ServiceOutcome::Created | ServiceOutcome::Started | ServiceOutcome::AlreadyRunning
        )
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EnvironmentReport {
    pub networks: Vec<(String, NetworkAction)>,
    pub services: Vec<(String, ServiceOutcome)>,
}

impl EnvironmentReport {
    pub fn is_success(&self) -> bool {
        self.services.iter().all(|(_, outcome)| outcome.is_up())
    }

    pub fn outcome(&self, name: &str) -> Option<&ServiceOutcome> {
        self.services
            .iter()
            .find(|(service, _)| service == name)
            .map(|(_, outcome)| outcome)
    }

    fn set(&mut self, name: &str, outcome: ServiceOutcome) {
        match self.services.iter_mut().find(|(service, _)| service == name) {
            Some(entry) => entry.1 = outcome,
            None => self.services.push((name.to_string(), outcome)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownOutcome {
    Stopped,
    /// The container exists but was already down.
    AlreadyStopped,
    /// No container by that name exists.
    NotPresent,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    pub services: Vec<(String, TeardownOutcome)>,
}

impl TeardownReport {
    pub fn outcome(&self, name: &str) -> Option<&TeardownOutcome> {
        self.services
            .iter()
            .find(|(service, _)| service == name)
            .map(|(_, outcome)| outcome)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ContainerState,
    /// `image | address` for running containers.
    pub detail: Option<String>,
}

/// How long to wait on a dependency that declares no readiness command.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

// --- Orchestrator Implementation ---
#[derive(Clone)]
pub struct EnvironmentOrchestrator {
    runner: Arc<dyn CommandRunner>,
    settle_delay: Duration,
    readiness: ReadinessConfig,
}

impl EnvironmentOrchestrator {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            settle_delay: DEFAULT_SETTLE_DELAY,
            readiness: ReadinessConfig::default(),
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn with_readiness(mut self, config: ReadinessConfig) -> Self {
        self.readiness = config;
        self
    }

    /// Fails when the docker CLI cannot be invoked at all.
    pub async fn preflight(&self) -> Result<String> {
        run_docker(self.runner.as_ref(), &DockerCommand::Version)
            .await
            .map_err(|e| match e {
                ExecutorError::Process(failure) => Error::DockerUnavailable(failure),
                ExecutorError::InvalidCommand(message) => {
                    Error::DockerUnavailable(ProcessFailure::new("docker --version", None, message))
                }
            })
    }

    #[instrument(skip_all, fields(services = specs.len()))]
    pub async fn ensure_environment(&self, specs: &[ServiceSpec]) -> Result<EnvironmentReport> {
        let ordered = dependency_order(specs)?;
        let mut report = EnvironmentReport::default();

        let mut seen = HashSet::new();
        for spec in &ordered {
            if seen.insert(spec.network.as_str()) {
                let action = self.ensure_network(&spec.network).await?;
                report.networks.push((spec.network.clone(), action));
            }
        }

        let by_name: HashMap<&str, &ServiceSpec> =
            ordered.iter().map(|spec| (spec.name.as_str(), *spec)).collect();
        let mut settled: HashSet<String> = HashSet::new();

        for spec in &ordered {
            if let Some(dependency) = &spec.depends_on {
                let dependency_up = report
                    .outcome(dependency)
                    .map(ServiceOutcome::is_up)
                    .unwrap_or(false);
                if !dependency_up {
                    warn!(service = %spec.name, %dependency, "skipping, dependency is not up");
                    report.set(
                        &spec.name,
                        ServiceOutcome::Skipped {
                            blocked_by: dependency.clone(),
                        },
                    );
                    continue;
                }

                if !settled.contains(dependency) {
                    let dep_spec = by_name[dependency.as_str()];
                    match self.settle_policy(dep_spec).wait(self.runner.as_ref(), dependency).await {
                        Ok(_) => {
                            settled.insert(dependency.clone());
                        }
                        Err(e) => {
                            error!(%dependency, error = %e, "dependency never became ready");
                            report.set(dependency, ServiceOutcome::Failed(e.to_string()));
                            report.set(
                                &spec.name,
                                ServiceOutcome::Skipped {
                                    blocked_by: dependency.clone(),
                                },
                            );
                            continue;
                        }
                    }
                }
            }

            let outcome = match self.bring_up(spec).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(service = %spec.name, error = %e, "failed to bring up service");
                    ServiceOutcome::Failed(e.to_string())
                }
            };
            report.set(&spec.name, outcome);
        }

        Ok(report)
    }

    #[instrument(skip_all, fields(services = specs.len()))]
    pub async fn teardown_environment(&self, specs: &[ServiceSpec]) -> Result<TeardownReport> {
        let mut ordered = dependency_order(specs)?;
        ordered.reverse();

        let mut report = TeardownReport::default();
        for spec in ordered {
            let outcome = match probe(self.runner.as_ref(), &spec.name).await {
                ContainerState::Running => {
                    let stop = DockerCommand::Stop {
                        name: spec.name.clone(),
                    };
                    if let Err(source) = run_docker(self.runner.as_ref(), &stop).await {
                        error!(service = %spec.name, error = %source, "stop failed, aborting teardown");
                        return Err(Error::Teardown {
                            service: spec.name.clone(),
                            source,
                            completed: report,
                        });
                    }
                    info!(service = %spec.name, "container stopped");
                    TeardownOutcome::Stopped
                }
                ContainerState::Stopped => TeardownOutcome::AlreadyStopped,
                ContainerState::Absent => TeardownOutcome::NotPresent,
            };
            report.services.push((spec.name.clone(), outcome));
        }
        Ok(report)
    }

    pub async fn status(&self, specs: &[ServiceSpec]) -> Result<Vec<ServiceStatus>> {
        let ordered = dependency_order(specs)?;
        let mut statuses = Vec::with_capacity(ordered.len());
        for spec in ordered {
            let state = probe(self.runner.as_ref(), &spec.name).await;
            let detail = if state == ContainerState::Running {
                let inspect = DockerCommand::InspectAddress {
                    name: spec.name.clone(),
                };
                run_docker(self.runner.as_ref(), &inspect).await.ok()
            } else {
                None
            };
            statuses.push(ServiceStatus {
                name: spec.name.clone(),
                state,
                detail,
            });
        }
        Ok(statuses)
    }

    async fn ensure_network(&self, network: &str) -> Result<NetworkAction> {
        if network_exists(self.runner.as_ref(), network).await {
            return Ok(NetworkAction::Existing);
        }
        let create = DockerCommand::CreateNetwork {
            network: network.to_string(),
        };
        run_docker(self.runner.as_ref(), &create)
            .await
            .map_err(|source| Error::Network {
                network: network.to_string(),
                source,
            })?;
        info!(%network, "created docker network");
        Ok(NetworkAction::Created)
    }

    #[instrument(skip(self, spec), fields(service = %spec.name, image = %spec.image))]
    async fn bring_up(&self, spec: &ServiceSpec) -> std::result::Result<ServiceOutcome, ExecutorError> {
        let runner = self.runner.as_ref();
        match probe(runner, &spec.name).await {
            ContainerState::Absent => {
                info!("pulling image and creating container");
                run_docker(
                    runner,
                    &DockerCommand::Pull {
                        image: spec.image.clone(),
                    },
                )
                .await?;
                run_docker(runner, &DockerCommand::Run(spec.run_options())).await?;
                Ok(ServiceOutcome::Created)
            }
            ContainerState::Stopped => {
                info!("starting existing container");
                run_docker(
                    runner,
                    &DockerCommand::Start {
                        name: spec.name.clone(),
                    },
                )
                .await?;
                Ok(ServiceOutcome::Started)
            }
            ContainerState::Running => {
                info!("container already running");
                Ok(ServiceOutcome::AlreadyRunning)
            }
        }
    }

    fn settle_policy(&self, dependency: &ServiceSpec) -> SettlePolicy {
        match &dependency.readiness {
            Some(command) => SettlePolicy::Poll {
                command: command.clone(),
                config: self.readiness.clone(),
            },
            None => SettlePolicy::Fixed(self.settle_delay),
        }
    }
}

/// Stable topological order: dependencies first, otherwise input order.
pub fn dependency_order(specs: &[ServiceSpec]) -> Result<Vec<&ServiceSpec>> {
    let mut index = HashMap::new();
    for (i, spec) in specs.iter().enumerate() {
        if index.insert(spec.name.as_str(), i).is_some() {
            return Err(Error::DuplicateService(spec.name.clone()));
        }
    }
    for spec in specs {
        if let Some(dependency) = &spec.depends_on {
            if !index.contains_key(dependency.as_str()) {
                return Err(Error::UnknownDependency {
                    service: spec.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }

    // 0 = unvisited, 1 = on stack, 2 = done
    let mut marks = vec![0u8; specs.len()];
    let mut ordered = Vec::with_capacity(specs.len());
    for start in 0..specs.len() {
        let mut chain = Vec::new();
        let mut cursor = Some(start);
        while let Some(i) = cursor {
            match marks[i] {
                2 => break,
                1 => return Err(Error::DependencyCycle(specs[i].name.clone())),
                _ => {
                    marks[i] = 1;
                    chain.push(i);
                    cursor = specs[i]
                        .depends_on
                        .as_deref()
                        .map(|dependency| index[dependency]);
                }
            }
        }
        for i in chain.into_iter().rev() {
            marks[i] = 2;
            ordered.push(&specs[i]);
        }
    }
    Ok(ordered)
}
