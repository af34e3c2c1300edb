//! Wire protocol spoken between the coordinator and the execution daemons.
//!
//! Calls and replies are JSON documents wrapped in length-prefixed [`frame`]s.
//! The [`rpc`] module defines the envelopes and the client stub, [`http`]
//! implements the optional `CONNECT` upgrade used by the HTTP transport.

pub mod frame;
pub mod http;
pub mod rpc;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed payload: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
    #[error("connection closed by peer")]
    Closed,
    #[error("http upgrade failed: {0}")]
    Handshake(String),
    #[error("connection idle for {0}ms")]
    IdleTimeout(u128),
    #[error("reply id {got} does not match call id {expected}")]
    IdMismatch { expected: u64, got: u64 },
}
