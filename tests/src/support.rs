use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fanout_common::config::TransportKind;
use fanout_common::grep::{ExecutionReply, ExecutionRequest};
use fanout_common::network::target::Target;
use fanout_core::server::Server;
use fanout_core::service::{GrepExecutor, RemoteExecutor};
use tempfile::NamedTempFile;
use tokio::net::TcpListener;

/// Writes a log file with the given lines.
pub fn log_with(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create log fixture");
    for line in lines {
        writeln!(file, "{line}").expect("write log fixture");
    }
    file
}

/// Starts an execution daemon on an ephemeral loopback port.
pub async fn spawn_node(executor: Arc<dyn RemoteExecutor>, transport: TransportKind) -> Target {
    let server = Server::bind("127.0.0.1:0", executor)
        .await
        .expect("bind execution daemon")
        .with_transport(transport);
    let addr = server.local_addr().expect("local addr");
    tokio::spawn(server.run());
    Target::from_str(&addr.to_string()).expect("valid target")
}

/// A daemon searching `log` with the system grep.
pub async fn grep_node(log: &NamedTempFile) -> Target {
    let executor = GrepExecutor::new(Some(log.path().to_path_buf()));
    spawn_node(Arc::new(executor), TransportKind::Tcp).await
}

/// An address nothing listens on.
pub async fn dead_node() -> Target {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);
    Target::from_str(&addr.to_string()).expect("valid target")
}

/// Wraps the real executor and sleeps before answering.
pub struct Sluggish {
    pub inner: GrepExecutor,
    pub delay: Duration,
}

#[async_trait]
impl RemoteExecutor for Sluggish {
    async fn grep(&self, request: ExecutionRequest) -> ExecutionReply {
        tokio::time::sleep(self.delay).await;
        self.inner.grep(request).await
    }
}

/// Answers every call with more output than one frame can carry.
pub struct Flood;

#[async_trait]
impl RemoteExecutor for Flood {
    async fn grep(&self, _request: ExecutionRequest) -> ExecutionReply {
        ExecutionReply::success("flood", "ERROR line\n".repeat(2_000_000))
    }
}
