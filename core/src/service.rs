//! # Remote Execution Service
//!
//! Target-side half of the protocol. One call runs the search tool once against a
//! local file and always produces a reply:
//!
//! * exit status `0`: matches found, output returned.
//! * exit status `1`: nothing matched. Still a success, with empty output.
//! * any other status, or a tool that cannot be started: [`ServiceError::Command`]
//!   together with whatever the tool printed.
//! * missing file: [`ServiceError::Resource`], reported before anything is spawned.
//! * output past the configured limit: the tool is killed and the reply carries
//!   [`ServiceError::Command`] with the lines captured up to the limit.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use fanout_common::grep::{ExecutionReply, ExecutionRequest, ServiceError, UNKNOWN_HOST};
use fanout_protocols::frame::MAX_FRAME_LEN;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit status the search tool uses for "no lines selected".
pub const NO_MATCH_STATUS: i32 = 1;
pub const DEFAULT_GREP_BIN: &str = "grep";
/// JSON escaping can grow one output byte to six, so this keeps any reply inside a frame.
pub const DEFAULT_OUTPUT_LIMIT: usize = MAX_FRAME_LEN / 8;

/// Anything that can answer a `RemoteGrep.Grep` call.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn grep(&self, request: ExecutionRequest) -> ExecutionReply;
}

/// Runs the system search tool against files on this machine.
#[derive(Debug, Clone)]
pub struct GrepExecutor {
    grep_bin: PathBuf,
    default_path: Option<PathBuf>,
    output_limit: usize,
}

impl GrepExecutor {
    /// `default_path` is searched when a request names no file.
    pub fn new(default_path: Option<PathBuf>) -> Self {
        Self {
            grep_bin: PathBuf::from(DEFAULT_GREP_BIN),
            default_path,
            output_limit: DEFAULT_OUTPUT_LIMIT,
        }
    }

    pub fn with_binary(mut self, grep_bin: impl Into<PathBuf>) -> Self {
        self.grep_bin = grep_bin.into();
        self
    }

    /// Caps how many bytes of stdout a reply may carry.
    pub fn with_output_limit(mut self, output_limit: usize) -> Self {
        self.output_limit = output_limit;
        self
    }

    fn resolve_path(&self, request: &ExecutionRequest) -> Option<PathBuf> {
        request
            .path
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| self.default_path.clone())
    }

    async fn run(&self, request: &ExecutionRequest) -> Result<String, (String, ServiceError)> {
        let path: PathBuf = self.resolve_path(request).ok_or_else(|| {
            (String::new(), ServiceError::Resource("no file to search".to_string()))
        })?;

        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            warn!(path = %path.display(), error = %e, "failed to open file");
            (
                String::new(),
                ServiceError::Resource(format!("failed to open file '{}': {e}", path.display())),
            )
        })?;
        let file: std::fs::File = file.into_std().await;

        let mut child = Command::new(&self.grep_bin)
            .args(request.argv())
            .stdin(Stdio::from(file))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                warn!(bin = %self.grep_bin.display(), error = %e, "failed to start command");
                (
                    String::new(),
                    ServiceError::Command(format!("failed to start grep command: {e}")),
                )
            })?;

        let (Some(mut stdout_pipe), Some(mut stderr_pipe)) = (child.stdout.take(), child.stderr.take())
        else {
            return Err((
                String::new(),
                ServiceError::Command("grep output pipes unavailable".to_string()),
            ));
        };

        let stderr_task = tokio::spawn(async move {
            let mut buf: Vec<u8> = Vec::new();
            let _ = stderr_pipe.read_to_end(&mut buf).await;
            buf
        });

        let mut captured: Vec<u8> = Vec::new();
        (&mut stdout_pipe)
            .take(self.output_limit as u64 + 1)
            .read_to_end(&mut captured)
            .await
            .map_err(|e| {
                (
                    String::new(),
                    ServiceError::Command(format!("error reading grep output: {e}")),
                )
            })?;

        let overflowed: bool = captured.len() > self.output_limit;
        if overflowed {
            truncate_to_line(&mut captured, self.output_limit);
            let _ = child.start_kill();
        }
        drop(stdout_pipe);

        let status = child.wait().await.map_err(|e| {
            (
                String::new(),
                ServiceError::Command(format!("error waiting for grep: {e}")),
            )
        })?;
        let stderr_bytes: Vec<u8> = stderr_task.await.unwrap_or_default();
        let stdout: String = String::from_utf8_lossy(&captured).into_owned();

        if overflowed {
            warn!(limit = self.output_limit, "command output truncated");
            return Err((
                stdout,
                ServiceError::Command(format!("output exceeds {} bytes", self.output_limit)),
            ));
        }

        match status.code() {
            Some(0) | Some(NO_MATCH_STATUS) => Ok(stdout),
            _ => {
                let stderr = String::from_utf8_lossy(&stderr_bytes);
                let mut message: String = status.to_string();
                if !stderr.trim().is_empty() {
                    message = format!("{message}: {}", stderr.trim());
                }
                warn!(%status, "command finished with unexpected status");
                Err((stdout, ServiceError::Command(message)))
            }
        }
    }
}

/// Cuts `buf` to at most `limit` bytes, preferring to end on a whole line.
fn truncate_to_line(buf: &mut Vec<u8>, limit: usize) {
    buf.truncate(limit);
    if let Some(last_newline) = buf.iter().rposition(|&b| b == b'\n') {
        buf.truncate(last_newline + 1);
    }
}

#[async_trait]
impl RemoteExecutor for GrepExecutor {
    async fn grep(&self, request: ExecutionRequest) -> ExecutionReply {
        let hostname: String = local_hostname();
        debug!(pattern = %request.pattern, options = ?request.options, "executing grep");

        match self.run(&request).await {
            Ok(output) => ExecutionReply::success(hostname, output),
            Err((output, error)) => ExecutionReply::failure(hostname, output, error),
        }
    }
}

pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNKNOWN_HOST.to_string())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
