//! # Dispatch Results
//!
//! One [`NodeResult`] per target and the [`DispatchSummary`] computed over them.

use thiserror::Error;

use crate::grep::{ExecutionReply, ServiceError, UNKNOWN_HOST};
use crate::network::target::Target;

/// Why a single target did not produce a clean answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// The connection could not be established (refused, unroutable, dial timeout).
    #[error("connection timeout/failed: {0}")]
    Network(String),
    /// The RPC exchange itself failed (call timeout, broken stream, bad envelope).
    #[error("rpc call failed: {0}")]
    Transport(String),
    /// The search tool ran on the target and failed.
    #[error("grep failed: {0}")]
    Command(String),
    /// The file to search is missing on the target.
    #[error("resource unavailable: {0}")]
    Resource(String),
}

impl From<ServiceError> for NodeError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Command(msg) => NodeError::Command(msg),
            ServiceError::Resource(msg) => NodeError::Resource(msg),
        }
    }
}

/// Outcome for one target in one round. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeResult {
    pub target: Target,
    /// The target accepted the connection and the call was delivered,
    /// whatever the command itself did.
    pub reachable: bool,
    pub hostname: String,
    pub output: String,
    pub error: Option<NodeError>,
}

impl NodeResult {
    /// A target that never got to run the request.
    pub fn unreachable(target: Target, error: NodeError) -> Self {
        Self {
            target,
            reachable: false,
            hostname: UNKNOWN_HOST.to_string(),
            output: String::new(),
            error: Some(error),
        }
    }

    /// The call reached the service but the RPC layer rejected it.
    pub fn rejected(target: Target, message: String) -> Self {
        Self {
            target,
            reachable: true,
            hostname: UNKNOWN_HOST.to_string(),
            output: String::new(),
            error: Some(NodeError::Transport(message)),
        }
    }

    /// A completed call. Command and resource failures keep the partial output.
    pub fn from_reply(target: Target, reply: ExecutionReply) -> Self {
        Self {
            target,
            reachable: true,
            hostname: reply.hostname,
            output: reply.output,
            error: reply.error.map(NodeError::from),
        }
    }

    pub fn is_success(&self) -> bool {
        self.reachable && self.error.is_none()
    }

    /// Number of non-empty output lines.
    pub fn line_count(&self) -> usize {
        count_lines(&self.output)
    }
}

pub fn count_lines(output: &str) -> usize {
    output.lines().filter(|line| !line.trim().is_empty()).count()
}

/// Aggregate view of a dispatch round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub total: usize,
    pub reachable: usize,
    pub unreachable: usize,
    /// Reachable targets whose answer carried an error.
    pub failed: usize,
    /// Non-empty output lines across reachable, error-free results.
    pub total_lines: usize,
}

impl DispatchSummary {
    pub fn successful(&self) -> usize {
        self.reachable - self.failed
    }
}

pub fn summarize(results: &[NodeResult]) -> DispatchSummary {
    results.iter().fold(
        DispatchSummary {
            total: results.len(),
            ..Default::default()
        },
        |mut summary, result| {
            if !result.reachable {
                summary.unreachable += 1;
                return summary;
            }

            summary.reachable += 1;
            match result.error {
                Some(_) => summary.failed += 1,
                None => summary.total_lines += result.line_count(),
            }
            summary
        },
    )
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
