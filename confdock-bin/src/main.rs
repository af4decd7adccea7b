use clap::{Parser, Subcommand};
use color_eyre::eyre::{self, WrapErr};
use confdock_lib::common::{Cancelled, Prompter};
use confdock_lib::{Session, SessionConfig, SyncEngine, SyncError};
use confdock_orchestrator::executor::ShellRunner;
use confdock_orchestrator::{
    confluence_stack, EnvironmentOrchestrator, Error as OrchestratorError, NetworkAction,
    ServiceOutcome, StackConfig, TeardownOutcome, TeardownReport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

mod prompt;

use prompt::DialoguerPrompter;

#[derive(Parser, Debug)]
#[command(name = "confdock", version, about = "Local Confluence environment and page sync")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the network and start PostgreSQL and Confluence.
    Start,
    /// Stop the containers, dependents first.
    Stop,
    /// Show the state of each container.
    Status,
    /// Publish a local file as a Confluence page.
    Export,
    /// Download a Confluence page into a local file.
    Import,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Start => start().await,
        Command::Stop => stop().await,
        Command::Status => status().await,
        Command::Export => export().await,
        Command::Import => import().await,
    };

    match result {
        Err(report) if is_cancelled(&report) => {
            println!("Cancelled.");
            Ok(())
        }
        other => other,
    }
}

fn is_cancelled(report: &eyre::Report) -> bool {
    report.downcast_ref::<Cancelled>().is_some()
        || report
            .downcast_ref::<SyncError>()
            .is_some_and(SyncError::is_cancelled)
}

// --- Environment ---

fn orchestrator(config: &StackConfig) -> EnvironmentOrchestrator {
    EnvironmentOrchestrator::new(Arc::new(ShellRunner::new())).with_settle_delay(config.settle_delay)
}

async fn start() -> eyre::Result<()> {
    let config = StackConfig::from_env();
    let orchestrator = orchestrator(&config);
    let version = orchestrator.preflight().await?;
    info!(%version, "docker is available");

    let report = orchestrator
        .ensure_environment(&confluence_stack(&config))
        .await?;
    for (network, action) in &report.networks {
        match action {
            NetworkAction::Created => println!("network {network}: created"),
            NetworkAction::Existing => println!("network {network}: exists"),
        }
    }
    for (name, outcome) in &report.services {
        let line = match outcome {
            ServiceOutcome::Created => "created and started".to_string(),
            ServiceOutcome::Started => "started".to_string(),
            ServiceOutcome::AlreadyRunning => "already running".to_string(),
            ServiceOutcome::Failed(reason) => format!("failed: {reason}"),
            ServiceOutcome::Skipped { blocked_by } => format!("skipped, {blocked_by} is not up"),
        };
        println!("{name}: {line}");
    }

    if !report.is_success() {
        eyre::bail!("the environment did not come up completely");
    }
    println!(
        "Confluence is starting at http://localhost:{}; first boot can take a few minutes.",
        config.app_port
    );
    Ok(())
}

async fn stop() -> eyre::Result<()> {
    let config = StackConfig::from_env();
    let orchestrator = orchestrator(&config);
    orchestrator.preflight().await?;

    match orchestrator
        .teardown_environment(&confluence_stack(&config))
        .await
    {
        Ok(report) => {
            print_teardown(&report);
            Ok(())
        }
        Err(err) => {
            if let OrchestratorError::Teardown { completed, .. } = &err {
                print_teardown(completed);
            }
            Err(err.into())
        }
    }
}

fn print_teardown(report: &TeardownReport) {
    for (name, outcome) in &report.services {
        let line = match outcome {
            TeardownOutcome::Stopped => "stopped",
            TeardownOutcome::AlreadyStopped => "already stopped",
            TeardownOutcome::NotPresent => "not present",
        };
        println!("{name}: {line}");
    }
}

async fn status() -> eyre::Result<()> {
    let config = StackConfig::from_env();
    let orchestrator = orchestrator(&config);
    orchestrator.preflight().await?;

    for service in orchestrator.status(&confluence_stack(&config)).await? {
        match service.detail {
            Some(detail) => println!("{}: {} ({detail})", service.name, service.state),
            None => println!("{}: {}", service.name, service.state),
        }
    }
    Ok(())
}

// --- Sync ---

async fn session(prompter: &dyn Prompter) -> eyre::Result<Session> {
    let mut config = SessionConfig::from_env();
    if config.workspace.is_none() {
        config.workspace = Some(std::env::current_dir().wrap_err("cannot determine the workspace")?);
    }
    Ok(Session::establish(config, prompter).await?)
}

fn engine(session: &Session, prompter: Arc<DialoguerPrompter>) -> eyre::Result<SyncEngine> {
    Ok(SyncEngine::new(
        Arc::new(session.client()?),
        Arc::new(session.metadata_store()),
        prompter,
    ))
}

/// Non-blank answer, or `Cancelled`.
async fn ask(prompter: &dyn Prompter, prompt: &str, default: Option<&str>) -> eyre::Result<String> {
    let answer = prompter.input(prompt, default).await?;
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(Cancelled.into());
    }
    Ok(answer.to_string())
}

async fn export() -> eyre::Result<()> {
    let prompter = Arc::new(DialoguerPrompter);
    let path = ask(prompter.as_ref(), "Path of the file to export", None).await?;
    let source = tokio::fs::canonicalize(&path)
        .await
        .wrap_err_with(|| format!("cannot open {path}"))?;
    let content = tokio::fs::read_to_string(&source)
        .await
        .wrap_err_with(|| format!("cannot read {}", source.display()))?;

    let session = session(prompter.as_ref()).await?;
    let engine = engine(&session, prompter)?;

    let record = engine.tracked_record(&source).await;
    let default_title = source
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.clone());
    let intent = engine.choose_intent(record.as_ref(), &default_title).await?;
    let outcome = engine.export(&content, Some(&source), intent).await?;

    println!(
        "Page \"{}\" is now at version {} in space {}.",
        outcome.title, outcome.version, outcome.space_key
    );
    println!("{}", outcome.url);
    if let Some(warning) = outcome.cache_warning {
        println!("Warning: local tracking data was not saved: {warning}");
    }
    Ok(())
}

async fn import() -> eyre::Result<()> {
    let prompter = Arc::new(DialoguerPrompter);
    let session = session(prompter.as_ref()).await?;
    let engine = engine(&session, prompter.clone())?;

    let (id, format) = engine.choose_import().await?;
    let default_target = format!("page_{id}.html");
    let target = ask(prompter.as_ref(), "Save the page to", Some(&default_target)).await?;
    let target = resolve_target(Path::new(&target)).await?;

    let outcome = engine.import(&id, format, Some(&target)).await?;
    tokio::fs::write(&target, &outcome.content)
        .await
        .wrap_err_with(|| format!("cannot write {}", target.display()))?;

    println!(
        "Imported \"{}\" (version {}, {}) into {}.",
        outcome.title,
        outcome.version,
        outcome.format.label(),
        target.display()
    );
    println!("{}", outcome.url);
    if let Some(warning) = outcome.cache_warning {
        println!("Warning: local tracking data was not saved: {warning}");
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet, matching what `export`
/// computes once the file is there.
async fn resolve_target(target: &Path) -> eyre::Result<PathBuf> {
    let name = target
        .file_name()
        .ok_or_else(|| eyre::eyre!("{} is not a file path", target.display()))?;
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let parent = tokio::fs::canonicalize(&parent)
        .await
        .wrap_err_with(|| format!("directory {} does not exist", parent.display()))?;
    Ok(parent.join(name))
}
