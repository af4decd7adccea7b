// Re-export dependencies used in public interfaces of common types

use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A command line exited non-zero or could not be spawned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("`{command}` failed{}: {stderr}", exit_suffix(.code))]
pub struct ProcessFailure {
    pub command: String,
    /// `None` when the process was killed by a signal or never started.
    pub code: Option<i32>,
    pub stderr: String,
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" with exit code {code}"),
        None => String::new(),
    }
}

impl ProcessFailure {
    pub fn new(command: impl Into<String>, code: Option<i32>, stderr: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            code,
            stderr: stderr.into(),
        }
    }
}

/// The user abandoned an interactive prompt.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cancelled by user")]
pub struct Cancelled;

/// Container control boundary: runs a single command line.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Returns trimmed stdout on a zero exit status.
    async fn run(&self, command: &str) -> Result<String, ProcessFailure>;
}

/// Interactive input boundary. Every method returns `Err(Cancelled)` when the
/// user dismisses the prompt.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn input(&self, prompt: &str, default: Option<&str>) -> Result<String, Cancelled>;

    async fn password(&self, prompt: &str) -> Result<String, Cancelled>;

    /// Returns the index of the chosen item.
    async fn select(&self, prompt: &str, items: &[String]) -> Result<usize, Cancelled>;
}

/// Content representation carried through a synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// Raw storage markup, macros included.
    #[default]
    Storage,
    /// Rendered HTML as displayed in a browser.
    Html,
}

impl ContentFormat {
    pub const ALL: [ContentFormat; 2] = [ContentFormat::Storage, ContentFormat::Html];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::Storage => "storage",
            ContentFormat::Html => "html",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ContentFormat::Storage => "Storage Format (raw markup with macros)",
            ContentFormat::Html => "HTML Format (rendered as displayed in browser)",
        }
    }
}

impl Display for ContentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "storage" => Ok(ContentFormat::Storage),
            "html" | "view" => Ok(ContentFormat::Html),
            other => Err(format!("unknown content format: {other}")),
        }
    }
}
