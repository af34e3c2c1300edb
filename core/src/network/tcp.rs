use std::time::Duration;

use fanout_common::network::target::Target;
use fanout_common::result::NodeError;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

/// Opens a TCP connection to `target`, giving up after `dial_timeout`.
///
/// Name resolution counts against the same budget.
pub async fn dial(target: &Target, dial_timeout: Duration) -> Result<TcpStream, NodeError> {
    match timeout(dial_timeout, TcpStream::connect(target.addr())).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                debug!(target = %target, error = %e, "failed to set TCP_NODELAY");
            }
            Ok(stream)
        }
        Ok(Err(e)) => Err(NodeError::Network(e.to_string())),
        Err(_elapsed) => Err(NodeError::Network(format!(
            "dial timed out after {}ms",
            dial_timeout.as_millis()
        ))),
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
