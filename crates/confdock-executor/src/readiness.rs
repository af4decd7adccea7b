use chrono::{DateTime, Utc};
use confdock_common::CommandRunner;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, info};

use crate::docker::DockerCommand;

#[derive(Debug, Clone)]
pub struct ReadinessError {
    pub message: String,
}

impl std::fmt::Display for ReadinessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ReadinessError {}

impl From<String> for ReadinessError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

/// Backoff schedule for polling a dependency's health command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    pub initial_interval: Duration,
    pub max_interval: Duration,
    pub multiplier: u32,
    pub timeout: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(8),
            multiplier: 2,
            timeout: Duration::from_secs(120),
        }
    }
}

impl ReadinessConfig {
    /// Interval to sleep after the `attempt`-th failed check (zero based).
    pub fn interval_after(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1).saturating_pow(attempt);
        self.initial_interval
            .saturating_mul(factor)
            .min(self.max_interval)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessStatus {
    pub ready: bool,
    pub checks_performed: u32,
    pub last_check: Option<DateTime<Utc>>,
    pub message: String,
}

impl Default for ReadinessStatus {
    fn default() -> Self {
        Self {
            ready: false,
            checks_performed: 0,
            last_check: None,
            message: "Not checked yet".to_string(),
        }
    }
}

/// How the orchestrator waits for a dependency before touching its dependents.
#[derive(Debug, Clone)]
pub enum SettlePolicy {
    /// Poll the health command with exponential backoff.
    Poll {
        command: DockerCommand,
        config: ReadinessConfig,
    },
    /// No health signal is known; wait a fixed delay.
    Fixed(Duration),
}

impl SettlePolicy {
    pub async fn wait(
        &self,
        runner: &dyn CommandRunner,
        name: &str,
    ) -> Result<ReadinessStatus, ReadinessError> {
        match self {
            SettlePolicy::Poll { command, config } => {
                let line = command.render().map_err(|e| ReadinessError::from(e.to_string()))?;
                ReadinessChecker::new(config.clone())
                    .wait_for_ready(runner, name, &line)
                    .await
            }
            SettlePolicy::Fixed(delay) => {
                info!(container = name, ?delay, "waiting fixed settle delay");
                sleep(*delay).await;
                Ok(ReadinessStatus {
                    ready: true,
                    checks_performed: 0,
                    last_check: Some(Utc::now()),
                    message: format!("Waited {delay:?} without a health check"),
                })
            }
        }
    }
}

pub struct ReadinessChecker {
    config: ReadinessConfig,
    status: ReadinessStatus,
}

impl ReadinessChecker {
    pub fn new(config: ReadinessConfig) -> Self {
        Self {
            config,
            status: ReadinessStatus::default(),
        }
    }

    /// Polls `command` until it exits zero or the overall timeout elapses.
    pub async fn wait_for_ready(
        &mut self,
        runner: &dyn CommandRunner,
        name: &str,
        command: &str,
    ) -> Result<ReadinessStatus, ReadinessError> {
        let deadline = self.config.timeout;
        let check_result = timeout(deadline, async {
            let mut attempt = 0;
            loop {
                let ok = match runner.run(command).await {
                    Ok(_) => true,
                    Err(e) => {
                        debug!(container = name, error = %e, "readiness check failed");
                        false
                    }
                };
                self.update_status(ok);

                if self.status.ready {
                    return self.status.clone();
                }

                sleep(self.config.interval_after(attempt)).await;
                attempt += 1;
            }
        })
        .await;

        match check_result {
            Ok(status) => {
                info!(
                    container = name,
                    checks = status.checks_performed,
                    "dependency reported ready"
                );
                Ok(status)
            }
            Err(_) => Err(format!(
                "{name} not ready after {deadline:?} ({} checks)",
                self.status.checks_performed
            )
            .into()),
        }
    }

    fn update_status(&mut self, success: bool) {
        self.status.checks_performed += 1;
        self.status.last_check = Some(Utc::now());
        self.status.ready = success;
        self.status.message = if success {
            "Dependency is ready".to_string()
        } else {
            format!("Check {} failed", self.status.checks_performed)
        };
    }
}
