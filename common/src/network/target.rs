//! # Target Registry
//!
//! A target is one remote execution endpoint written as `host:port`.
//!
//! The registry is a JSON array of such strings (by default `./sources.json`),
//! loaded once per invocation. A missing, unparseable or empty file is a
//! configuration error: the coordinator refuses to start a round without targets.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

/// One remote machine the coordinator can dispatch to. Identity is the address string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    addr: String,
}

impl Target {
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

impl FromStr for Target {
    type Err = String;

    /// Accepts `host:port`, `ip:port` and `[v6]:port`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some((host, port)) = s.rsplit_once(':') else {
            return Err(format!("missing port in target '{s}'"));
        };

        if host.is_empty() || host == "[]" {
            return Err(format!("missing host in target '{s}'"));
        }

        port.parse::<u16>()
            .map_err(|e| format!("invalid port in target '{s}': {e}"))?;

        Ok(Target { addr: s.to_string() })
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read target list {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse target list {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid entry #{index} in target list: {reason}")]
    InvalidTarget { index: usize, reason: String },
    #[error("no target addresses found in {0}")]
    Empty(PathBuf),
}

/// Reads the registry file and returns its targets in file order.
pub fn load_targets(path: &Path) -> Result<Vec<Target>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let targets = parse_targets(&raw).map_err(|err| match err {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        ConfigError::Empty(_) => ConfigError::Empty(path.to_path_buf()),
        other => other,
    })?;

    debug!(count = targets.len(), path = %path.display(), "loaded target list");
    Ok(targets)
}

/// Parses the JSON body of a registry file.
pub fn parse_targets(raw: &str) -> Result<Vec<Target>, ConfigError> {
    let entries: Vec<String> = serde_json::from_str(raw).map_err(|source| ConfigError::Parse {
        path: PathBuf::new(),
        source,
    })?;

    if entries.is_empty() {
        return Err(ConfigError::Empty(PathBuf::new()));
    }

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            Target::from_str(entry).map_err(|reason| ConfigError::InvalidTarget { index, reason })
        })
        .collect()
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
