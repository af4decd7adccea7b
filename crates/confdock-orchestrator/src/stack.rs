//! The default two-container environment: PostgreSQL plus a Confluence server.

use std::time::Duration;

use confdock_executor::DockerCommand;

use crate::{ServiceSpec, DEFAULT_SETTLE_DELAY};

pub const DEFAULT_NETWORK: &str = "confluence-network";
pub const POSTGRES_CONTAINER: &str = "vscode-confluence-postgres";
pub const CONFLUENCE_CONTAINER: &str = "vscode-confluence";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackConfig {
    pub network: String,
    pub postgres_name: String,
    pub postgres_image: String,
    pub postgres_port: u16,
    pub app_name: String,
    pub app_image: String,
    pub app_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,
    pub settle_delay: Duration,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self {
            network: DEFAULT_NETWORK.to_string(),
            postgres_name: POSTGRES_CONTAINER.to_string(),
            postgres_image: "postgres:13".to_string(),
            postgres_port: 5432,
            app_name: CONFLUENCE_CONTAINER.to_string(),
            app_image: "atlassian/confluence-server:latest".to_string(),
            app_port: 8090,
            db_user: "confluence".to_string(),
            db_password: "confluence_password".to_string(),
            db_name: "confluence".to_string(),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

impl StackConfig {
    /// Defaults overridden by `CONFDOCK_*` variables. Unparseable numbers fall
    /// back to the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let text = |key: &str, default: String| {
            lookup(key).filter(|v| !v.is_empty()).unwrap_or(default)
        };
        let port = |key: &str, default: u16| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        Self {
            network: text("CONFDOCK_NETWORK", defaults.network),
            postgres_image: text("CONFDOCK_PG_IMAGE", defaults.postgres_image),
            postgres_port: port("CONFDOCK_PG_PORT", defaults.postgres_port),
            app_image: text("CONFDOCK_APP_IMAGE", defaults.app_image),
            app_port: port("CONFDOCK_HOST_PORT", defaults.app_port),
            settle_delay: lookup("CONFDOCK_SETTLE_SECS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.settle_delay),
            ..defaults
        }
    }
}

/// Database first, then the application that depends on it.
pub fn confluence_stack(config: &StackConfig) -> Vec<ServiceSpec> {
    let postgres = ServiceSpec::new(&config.postgres_name, &config.network, &config.postgres_image)
        .port(config.postgres_port, 5432)
        .env("POSTGRES_USER", &config.db_user)
        .env("POSTGRES_PASSWORD", &config.db_password)
        .env("POSTGRES_DB", &config.db_name)
        .readiness(DockerCommand::Exec {
            name: config.postgres_name.clone(),
            args: vec!["pg_isready".into(), "-U".into(), config.db_user.clone()],
        });

    let confluence = ServiceSpec::new(&config.app_name, &config.network, &config.app_image)
        .port(config.app_port, 8090)
        .env(
            "ATL_JDBC_URL",
            format!(
                "jdbc:postgresql://{}:5432/{}",
                config.postgres_name, config.db_name
            ),
        )
        .env("ATL_JDBC_USER", &config.db_user)
        .env("ATL_JDBC_PASSWORD", &config.db_password)
        .env("ATL_DB_TYPE", "postgresql")
        .depends_on(&config.postgres_name);

    vec![postgres, confluence]
}
