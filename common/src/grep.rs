//! # Execution Request / Reply
//!
//! The payload pair carried by a `RemoteGrep.Grep` call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Hostname reported when it cannot be determined.
pub const UNKNOWN_HOST: &str = "unknown";

/// What every target is asked to run. Built once per invocation and shared read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The expression handed to the search tool.
    pub pattern: String,
    /// Flags placed before the pattern (e.g. `-i`, `-n`).
    #[serde(default)]
    pub options: Vec<String>,
    /// File to search. `None` means the service's default log file.
    #[serde(default)]
    pub path: Option<String>,
}

impl ExecutionRequest {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            options: Vec::new(),
            path: None,
        }
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Builds a request from trailing command line words: the last one is the
    /// pattern, everything before it is passed through as options.
    ///
    /// Returns `None` when there are no words at all.
    pub fn from_args(args: &[String]) -> Option<Self> {
        let (pattern, options) = args.split_last()?;
        Some(Self::new(pattern.clone()).with_options(options.iter().cloned()))
    }

    /// Arguments handed to the search tool, options first.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.options.clone();
        argv.push(self.pattern.clone());
        argv
    }
}

/// Command-level failure reported by the execution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum ServiceError {
    /// The search tool exited with a status other than "no match", or could not be started.
    Command(String),
    /// The resource to search does not exist or cannot be opened.
    Resource(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Command(msg) => write!(f, "grep failed: {msg}"),
            ServiceError::Resource(msg) => write!(f, "resource unavailable: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// What a target sends back.
///
/// Empty output with no error is a valid "no matches" answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReply {
    pub hostname: String,
    pub output: String,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

impl ExecutionReply {
    pub fn success(hostname: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            output: output.into(),
            error: None,
        }
    }

    pub fn failure(hostname: impl Into<String>, output: impl Into<String>, error: ServiceError) -> Self {
        Self {
            hostname: hostname.into(),
            output: output.into(),
            error: Some(error),
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
