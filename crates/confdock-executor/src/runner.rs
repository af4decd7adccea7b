use async_trait::async_trait;
use confdock_common::{CommandRunner, ProcessFailure};
use tokio::process::Command;
use tracing::{debug, instrument};

/// Runs command lines through `sh -c`, the way a terminal would.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: String,
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self {
            shell: "sh".to_string(),
        }
    }
}

impl ShellRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    #[instrument(skip(self), level = "debug")]
    async fn run(&self, command: &str) -> Result<String, ProcessFailure> {
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(command)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProcessFailure::new(command, None, e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            debug!(bytes = stdout.len(), "command succeeded");
            Ok(stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(code = ?output.status.code(), %stderr, "command failed");
            Err(ProcessFailure::new(command, output.status.code(), stderr))
        }
    }
}
