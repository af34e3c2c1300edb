//! # Fan-out Dispatcher
//!
//! Issues one `RemoteGrep.Grep` call to every target at once and waits for all of
//! them. Each target runs in its own task with its own dial and call timeouts, so a
//! slow or dead machine costs at most `dial_timeout + call_timeout` and never delays
//! the others.
//!
//! **Ordering:** task *i* is spawned for `targets[i]` and its join handle sits in
//! slot *i* of a pre-sized vector. Results are read back slot by slot, so the output
//! follows input order no matter which target answers first, and no task ever
//! touches another task's slot.
//!
//! **Cancellation:** the call future owns the connection. When the call timeout
//! fires the future is dropped, which closes the socket instead of leaving the
//! abandoned call running in the background.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use fanout_common::config::{DispatchConfig, TransportKind};
use fanout_common::grep::ExecutionRequest;
use fanout_common::network::target::Target;
use fanout_common::result::{NodeError, NodeResult};
use fanout_protocols::ProtocolError;
use fanout_protocols::http;
use fanout_protocols::rpc::{CallOutcome, RpcClient};
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::network::tcp;

/// Invoked with the number of targets finished so far, every time one finishes.
pub type ProgressCallback = Box<dyn Fn(usize) + Send + Sync>;

/// Everything a dispatch round produced.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// One entry per target, in target order.
    pub results: Vec<NodeResult>,
    /// Wall-clock time of the whole round.
    pub elapsed: Duration,
}

/// Sends `request` to every target and collects one [`NodeResult`] per target.
///
/// Per-target failures are recorded in that target's result; this function itself
/// cannot fail. It returns only after every task has finished or timed out.
pub async fn dispatch(
    targets: &[Target],
    request: &ExecutionRequest,
    cfg: &DispatchConfig,
    on_node_done: Option<ProgressCallback>,
) -> DispatchReport {
    let start: Instant = Instant::now();
    let request: Arc<ExecutionRequest> = Arc::new(request.clone());
    let limiter: Option<Arc<Semaphore>> = cfg
        .max_in_flight
        .map(|limit| Arc::new(Semaphore::new(limit.max(1))));
    let finished: Arc<AtomicUsize> = Arc::new(AtomicUsize::new(0));
    let callback: Option<Arc<dyn Fn(usize) + Send + Sync>> = on_node_done.map(Arc::from);

    let slots: Vec<JoinHandle<NodeResult>> = targets
        .iter()
        .cloned()
        .map(|target| {
            let request = request.clone();
            let cfg = cfg.clone();
            let limiter = limiter.clone();
            let finished = finished.clone();
            let callback = callback.clone();

            tokio::spawn(async move {
                let _permit = match limiter {
                    Some(sem) => sem.acquire_owned().await.ok(),
                    None => None,
                };

                let result: NodeResult = query_node(target, &request, &cfg).await;

                let done: usize = finished.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(cb) = &callback {
                    cb(done);
                }
                result
            })
        })
        .collect();

    let mut results: Vec<NodeResult> = Vec::with_capacity(targets.len());
    for (slot, target) in slots.into_iter().zip(targets) {
        let result: NodeResult = match slot.await {
            Ok(result) => result,
            Err(e) => {
                warn!(node = %target, error = %e, "dispatch task failed");
                NodeResult::unreachable(
                    target.clone(),
                    NodeError::Transport(format!("dispatch task failed: {e}")),
                )
            }
        };
        results.push(result);
    }

    DispatchReport {
        results,
        elapsed: start.elapsed(),
    }
}

/// Dial, call, classify. Never returns early without a result.
async fn query_node(target: Target, request: &ExecutionRequest, cfg: &DispatchConfig) -> NodeResult {
    let stream: TcpStream = match tcp::dial(&target, cfg.dial_timeout).await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(node = %target, error = %err, "target unreachable");
            return NodeResult::unreachable(target, err);
        }
    };

    match timeout(cfg.call_timeout, call(stream, request, cfg.transport)).await {
        Err(_elapsed) => {
            warn!(node = %target, "rpc call timed out");
            NodeResult::unreachable(
                target,
                NodeError::Transport(format!(
                    "rpc call timed out after {}ms",
                    cfg.call_timeout.as_millis()
                )),
            )
        }
        Ok(Err(err)) => {
            warn!(node = %target, error = %err, "rpc call failed");
            NodeResult::unreachable(target, NodeError::Transport(err.to_string()))
        }
        Ok(Ok(CallOutcome::Rejected(message))) => {
            warn!(node = %target, %message, "rpc call rejected");
            NodeResult::rejected(target, message)
        }
        Ok(Ok(CallOutcome::Reply(reply))) => {
            debug!(node = %target, host = %reply.hostname, "reply received");
            NodeResult::from_reply(target, reply)
        }
    }
}

/// Takes ownership of the stream so that dropping this future closes the socket.
async fn call(
    mut stream: TcpStream,
    request: &ExecutionRequest,
    transport: TransportKind,
) -> Result<CallOutcome, ProtocolError> {
    if transport == TransportKind::Http {
        http::client_upgrade(&mut stream).await?;
    }
    RpcClient::new(stream).grep(request).await
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Server;
    use crate::service::RemoteExecutor;
    use async_trait::async_trait;
    use fanout_common::grep::ExecutionReply;
    use std::str::FromStr;
    use std::sync::Mutex;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Answers after a fixed delay with its name as hostname.
    struct Delayed {
        name: &'static str,
        delay: Duration,
    }

    #[async_trait]
    impl RemoteExecutor for Delayed {
        async fn grep(&self, request: ExecutionRequest) -> ExecutionReply {
            tokio::time::sleep(self.delay).await;
            ExecutionReply::success(self.name, format!("{}\n", request.pattern))
        }
    }

    async fn serve(name: &'static str, delay: Duration) -> Target {
        let server = Server::bind("127.0.0.1:0", Arc::new(Delayed { name, delay }))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(server.run());
        Target::from_str(&addr.to_string()).unwrap()
    }

    async fn closed_port() -> Target {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        Target::from_str(&addr.to_string()).unwrap()
    }

    /// Accepts connections and reads forever without answering.
    async fn silent() -> Target {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut sink = [0u8; 256];
                    while let Ok(n) = stream.read(&mut sink).await {
                        if n == 0 {
                            break;
                        }
                    }
                });
            }
        });
        Target::from_str(&addr.to_string()).unwrap()
    }

    fn quick() -> DispatchConfig {
        DispatchConfig {
            dial_timeout: Duration::from_millis(500),
            call_timeout: Duration::from_millis(500),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn results_follow_target_order_not_completion_order() {
        let targets = vec![
            serve("slow", Duration::from_millis(300)).await,
            serve("fast-1", Duration::ZERO).await,
            serve("fast-2", Duration::ZERO).await,
        ];

        let report = dispatch(&targets, &ExecutionRequest::new("x"), &quick(), None).await;

        assert_eq!(report.results.len(), targets.len());
        for (result, target) in report.results.iter().zip(&targets) {
            assert_eq!(&result.target, target);
            assert!(result.is_success());
        }
        assert_eq!(report.results[0].hostname, "slow");
        assert_eq!(report.results[1].hostname, "fast-1");
        assert_eq!(report.results[2].hostname, "fast-2");
    }

    #[tokio::test]
    async fn targets_are_contacted_concurrently() {
        let mut targets = Vec::new();
        for _ in 0..4 {
            targets.push(serve("n", Duration::from_millis(300)).await);
        }

        let report = dispatch(&targets, &ExecutionRequest::new("x"), &quick(), None).await;

        assert!(report.results.iter().all(NodeResult::is_success));
        assert!(report.elapsed < Duration::from_millis(1000), "{:?}", report.elapsed);
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let targets = vec![closed_port().await];

        let report = dispatch(&targets, &ExecutionRequest::new("x"), &quick(), None).await;

        let result = &report.results[0];
        assert!(!result.reachable);
        assert_eq!(result.hostname, "unknown");
        assert!(matches!(result.error, Some(NodeError::Network(_))));
    }

    #[tokio::test]
    async fn call_timeout_marks_target_unreachable() {
        let targets = vec![silent().await, serve("ok", Duration::ZERO).await];
        let cfg = DispatchConfig {
            call_timeout: Duration::from_millis(200),
            ..quick()
        };

        let report = dispatch(&targets, &ExecutionRequest::new("x"), &cfg, None).await;

        let stuck = &report.results[0];
        assert!(!stuck.reachable);
        assert!(matches!(&stuck.error, Some(NodeError::Transport(msg)) if msg.contains("timed out")));
        assert!(report.results[1].is_success());
        assert!(report.elapsed < Duration::from_millis(700), "{:?}", report.elapsed);
    }

    #[tokio::test]
    async fn in_flight_cap_still_answers_everyone() {
        let mut targets = Vec::new();
        for _ in 0..3 {
            targets.push(serve("n", Duration::from_millis(100)).await);
        }
        let cfg = DispatchConfig {
            max_in_flight: Some(1),
            call_timeout: Duration::from_secs(2),
            ..quick()
        };

        let report = dispatch(&targets, &ExecutionRequest::new("x"), &cfg, None).await;

        assert!(report.results.iter().all(NodeResult::is_success));
        assert!(report.elapsed >= Duration::from_millis(300), "{:?}", report.elapsed);
    }

    #[tokio::test]
    async fn progress_callback_counts_every_target() {
        let targets = vec![
            serve("a", Duration::ZERO).await,
            closed_port().await,
            serve("b", Duration::ZERO).await,
        ];
        let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        dispatch(
            &targets,
            &ExecutionRequest::new("x"),
            &quick(),
            Some(Box::new(move |n| sink.lock().unwrap().push(n))),
        )
        .await;

        let mut counts = seen.lock().unwrap().clone();
        counts.sort();
        assert_eq!(counts, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn empty_target_list_yields_empty_report() {
        let report = dispatch(&[], &ExecutionRequest::new("x"), &quick(), None).await;
        assert!(report.results.is_empty());
    }
}
