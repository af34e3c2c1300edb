//! Accept loop for the execution daemon.
//!
//! Every inbound connection gets its own task; a semaphore caps how many run at
//! once. Errors on one connection are logged and only close that connection.
//! A connection that sends nothing for `idle_timeout` is closed so it cannot
//! pin a permit forever.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use fanout_common::config::TransportKind;
use fanout_protocols::frame::{read_frame, write_frame};
use fanout_protocols::http;
use fanout_protocols::rpc::{CallEnvelope, ReplyEnvelope};
use fanout_protocols::ProtocolError;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::service::RemoteExecutor;

pub const DEFAULT_MAX_CONNECTIONS: usize = 64;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub struct Server {
    listener: TcpListener,
    executor: Arc<dyn RemoteExecutor>,
    transport: TransportKind,
    limiter: Arc<Semaphore>,
    idle_timeout: Duration,
}

impl Server {
    pub async fn bind<A: ToSocketAddrs>(
        addr: A,
        executor: Arc<dyn RemoteExecutor>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .context("failed to bind listener")?;

        Ok(Self {
            listener,
            executor,
            transport: TransportKind::Tcp,
            limiter: Arc::new(Semaphore::new(DEFAULT_MAX_CONNECTIONS)),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        })
    }

    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max_connections.max(1)));
        self
    }

    /// How long a connection may wait between calls (or before its HTTP upgrade).
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until the process is terminated.
    pub async fn run(self) -> anyhow::Result<()> {
        info!(
            addr = %self.local_addr()?,
            transport = %self.transport,
            "execution service listening"
        );

        loop {
            let permit = self
                .limiter
                .clone()
                .acquire_owned()
                .await
                .context("connection limiter closed")?;

            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let executor = self.executor.clone();
            let transport = self.transport;
            let idle_timeout = self.idle_timeout;
            tokio::spawn(async move {
                let _permit = permit;
                debug!(%peer, "connection accepted");
                match serve_connection(stream, executor, transport, idle_timeout).await {
                    Ok(()) => debug!(%peer, "connection closed"),
                    Err(e) => warn!(%peer, error = %e, "connection closed with error"),
                }
            });
        }
    }
}

/// Answers calls on one connection until the peer hangs up or stays silent
/// for longer than `idle_timeout`.
pub async fn serve_connection<S>(
    mut stream: S,
    executor: Arc<dyn RemoteExecutor>,
    transport: TransportKind,
    idle_timeout: Duration,
) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let idle = || ProtocolError::IdleTimeout(idle_timeout.as_millis());

    if transport == TransportKind::Http {
        timeout(idle_timeout, http::server_upgrade(&mut stream))
            .await
            .map_err(|_| idle())??;
    }

    loop {
        let raw: serde_json::Value = match timeout(idle_timeout, read_frame(&mut stream)).await {
            Err(_elapsed) => return Err(idle()),
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => return Ok(()),
            Ok(Err(ProtocolError::Codec(e))) => {
                // Not JSON at all, so the caller's id is unknown; 0 matches a
                // coordinator's first call and the connection is closed after.
                let reply = ReplyEnvelope::err(0, format!("rpc: malformed call: {e}"));
                write_frame(&mut stream, &reply).await?;
                return Err(ProtocolError::Codec(e));
            }
            Ok(Err(e)) => return Err(e),
        };

        let call: CallEnvelope = match CallEnvelope::from_value(raw) {
            Ok(call) => call,
            Err(reply) => {
                warn!(id = reply.id, "rejecting malformed call");
                write_frame(&mut stream, &reply).await?;
                continue;
            }
        };

        let reply: ReplyEnvelope = match call.grep_request() {
            Ok(request) => ReplyEnvelope::ok(call.id, executor.grep(request).await),
            Err(message) => {
                warn!(method = %call.method, "rejecting call");
                ReplyEnvelope::err(call.id, message)
            }
        };

        match write_frame(&mut stream, &reply).await {
            Ok(()) => {}
            Err(ProtocolError::FrameTooLarge(len)) => {
                warn!(id = call.id, len, "reply exceeds frame limit");
                let fallback = ReplyEnvelope::err(
                    call.id,
                    format!("rpc: reply of {len} bytes exceeds the frame limit"),
                );
                write_frame(&mut stream, &fallback).await?;
            }
            Err(e) => return Err(e),
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
