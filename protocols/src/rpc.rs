//! # RPC Envelopes
//!
//! A call names a method and carries its params; a reply carries either a result
//! or an RPC-level error string. Command failures are *not* RPC errors: they live
//! inside [`ExecutionReply::error`] so the caller can tell "the service ran the
//! command and it failed" apart from "the call never completed".

use fanout_common::grep::{ExecutionReply, ExecutionRequest};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::ProtocolError;
use crate::frame::{read_frame, write_frame};

pub const GREP_METHOD: &str = "RemoteGrep.Grep";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEnvelope {
    pub id: u64,
    pub method: String,
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyEnvelope {
    pub id: u64,
    #[serde(default)]
    pub result: Option<ExecutionReply>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ReplyEnvelope {
    pub fn ok(id: u64, reply: ExecutionReply) -> Self {
        Self { id, result: Some(reply), error: None }
    }

    pub fn err(id: u64, message: impl Into<String>) -> Self {
        Self { id, result: None, error: Some(message.into()) }
    }
}

impl CallEnvelope {
    pub fn grep(id: u64, request: &ExecutionRequest) -> Result<Self, ProtocolError> {
        Ok(Self {
            id,
            method: GREP_METHOD.to_string(),
            params: serde_json::to_value(request)?,
        })
    }

    /// Decodes a frame that is valid JSON but may not be a well-formed call.
    ///
    /// On failure the ready-to-send error reply carries the caller's id when the
    /// frame has one, so the connection stays usable for later calls.
    pub fn from_value(raw: serde_json::Value) -> Result<Self, ReplyEnvelope> {
        let id: u64 = raw.get("id").and_then(serde_json::Value::as_u64).unwrap_or(0);
        serde_json::from_value(raw)
            .map_err(|e| ReplyEnvelope::err(id, format!("rpc: malformed call: {e}")))
    }

    /// Extracts the grep request, or the message to send back as an RPC error.
    pub fn grep_request(&self) -> Result<ExecutionRequest, String> {
        if self.method != GREP_METHOD {
            return Err(format!("rpc: can't find method {}", self.method));
        }
        serde_json::from_value(self.params.clone())
            .map_err(|e| format!("rpc: invalid params for {}: {e}", GREP_METHOD))
    }
}

/// How a completed call ended from the caller's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The service ran the request. The reply may still carry a command error.
    Reply(ExecutionReply),
    /// The service received the call but refused it at the RPC layer.
    Rejected(String),
}

/// Client half of a connection. Owns the stream, so dropping it closes the socket.
pub struct RpcClient<S> {
    stream: S,
    next_id: u64,
}

impl<S> RpcClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self { stream, next_id: 0 }
    }

    pub async fn grep(&mut self, request: &ExecutionRequest) -> Result<CallOutcome, ProtocolError> {
        let id: u64 = self.next_id;
        self.next_id += 1;

        let call = CallEnvelope::grep(id, request)?;
        write_frame(&mut self.stream, &call).await?;
        debug!(id, method = GREP_METHOD, "call sent");

        let reply: ReplyEnvelope = read_frame(&mut self.stream)
            .await?
            .ok_or(ProtocolError::Closed)?;

        if reply.id != id {
            return Err(ProtocolError::IdMismatch { expected: id, got: reply.id });
        }

        match (reply.result, reply.error) {
            (_, Some(message)) => Ok(CallOutcome::Rejected(message)),
            (Some(result), None) => Ok(CallOutcome::Reply(result)),
            (None, None) => Ok(CallOutcome::Rejected("rpc: empty reply".to_string())),
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
