use std::sync::Arc;
use std::time::Duration;

use fanout_common::config::{DispatchConfig, TransportKind};
use fanout_common::grep::ExecutionRequest;
use fanout_common::result::{self, NodeError, NodeResult};
use fanout_core::dispatcher;
use fanout_core::service::GrepExecutor;

use crate::support::{self, Flood, Sluggish};

const LOG: &[&str] = &[
    "2025-09-14 INFO worker started",
    "2025-09-14 ERROR replica lagging",
    "2025-09-14 INFO checkpoint written",
];

const QUIET_LOG: &[&str] = &[
    "2025-09-14 INFO worker started",
    "2025-09-14 INFO worker idle",
    "2025-09-14 INFO checkpoint written",
];

fn cfg() -> DispatchConfig {
    DispatchConfig {
        dial_timeout: Duration::from_millis(500),
        call_timeout: Duration::from_secs(2),
        ..Default::default()
    }
}

/// Reachability plus error kind; what must stay stable between rounds.
fn classification(result: &NodeResult) -> (bool, Option<std::mem::Discriminant<NodeError>>) {
    (result.reachable, result.error.as_ref().map(std::mem::discriminant))
}

#[tokio::test]
async fn match_no_match_and_unreachable_nodes() {
    let log_a = support::log_with(LOG);
    let log_b = support::log_with(QUIET_LOG);
    let targets = vec![
        support::grep_node(&log_a).await,
        support::grep_node(&log_b).await,
        support::dead_node().await,
    ];

    let report = dispatcher::dispatch(&targets, &ExecutionRequest::new("ERROR"), &cfg(), None).await;
    let results = &report.results;

    assert_eq!(results.len(), 3);
    for (result, target) in results.iter().zip(&targets) {
        assert_eq!(&result.target, target);
    }

    let a = &results[0];
    assert!(a.reachable);
    assert!(a.error.is_none());
    assert_eq!(a.line_count(), 1);
    assert!(a.output.contains("replica lagging"));

    let b = &results[1];
    assert!(b.reachable);
    assert!(b.error.is_none());
    assert!(b.output.is_empty());

    let c = &results[2];
    assert!(!c.reachable);
    assert_eq!(c.hostname, "unknown");
    assert!(matches!(c.error, Some(NodeError::Network(_))));

    let summary = result::summarize(results);
    assert_eq!(summary.reachable, 2);
    assert_eq!(summary.unreachable, 1);
    assert_eq!(summary.total_lines, 1);
    assert_eq!(summary.reachable + summary.unreachable, targets.len());
}

#[tokio::test]
async fn slowest_first_target_still_lands_at_index_zero() {
    let log = support::log_with(LOG);
    let slow = Sluggish {
        inner: GrepExecutor::new(Some(log.path().to_path_buf())),
        delay: Duration::from_millis(400),
    };
    let targets = vec![
        support::spawn_node(Arc::new(slow), TransportKind::Tcp).await,
        support::grep_node(&log).await,
        support::grep_node(&log).await,
    ];

    let report = dispatcher::dispatch(&targets, &ExecutionRequest::new("INFO"), &cfg(), None).await;

    assert_eq!(report.results.len(), 3);
    for (result, target) in report.results.iter().zip(&targets) {
        assert_eq!(&result.target, target);
        assert!(result.is_success());
        assert_eq!(result.line_count(), 2);
    }
    assert!(report.elapsed >= Duration::from_millis(400));
}

#[tokio::test]
async fn dead_target_does_not_hold_up_the_round() {
    let log = support::log_with(LOG);
    let targets = vec![support::dead_node().await, support::grep_node(&log).await];
    let cfg = DispatchConfig {
        dial_timeout: Duration::from_millis(200),
        ..cfg()
    };

    let report = dispatcher::dispatch(&targets, &ExecutionRequest::new("ERROR"), &cfg, None).await;

    assert!(!report.results[0].reachable);
    assert!(report.results[1].is_success());
    assert!(report.elapsed < cfg.dial_timeout + Duration::from_millis(500), "{:?}", report.elapsed);
}

#[tokio::test]
async fn command_failure_is_reachable_with_error() {
    let log = support::log_with(LOG);
    let targets = vec![support::grep_node(&log).await];

    let report = dispatcher::dispatch(&targets, &ExecutionRequest::new("["), &cfg(), None).await;

    let node = &report.results[0];
    assert!(node.reachable);
    assert!(matches!(node.error, Some(NodeError::Command(_))));
    assert_ne!(node.hostname, "unknown");

    let summary = result::summarize(&report.results);
    assert_eq!(summary.reachable, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.total_lines, 0);
}

#[tokio::test]
async fn failing_command_keeps_output_printed_before_exit() {
    let log = support::log_with(LOG);
    let executor = GrepExecutor::new(Some(log.path().to_path_buf())).with_binary("sh");
    let target = support::spawn_node(Arc::new(executor), TransportKind::Tcp).await;

    let request = ExecutionRequest::new("grep ERROR; exit 2").with_options(["-c"]);
    let report = dispatcher::dispatch(&[target], &request, &cfg(), None).await;

    let node = &report.results[0];
    assert!(node.reachable);
    assert!(matches!(node.error, Some(NodeError::Command(_))));
    assert_eq!(node.output, "2025-09-14 ERROR replica lagging\n");
    assert!(!node.is_success());
}

#[tokio::test]
async fn oversized_reply_is_reachable_rpc_error() {
    let target = support::spawn_node(Arc::new(Flood), TransportKind::Tcp).await;
    let cfg = DispatchConfig {
        call_timeout: Duration::from_secs(10),
        ..cfg()
    };

    let report = dispatcher::dispatch(&[target], &ExecutionRequest::new("ERROR"), &cfg, None).await;

    let node = &report.results[0];
    assert!(node.reachable, "{node:?}");
    match &node.error {
        Some(NodeError::Transport(msg)) => assert!(msg.contains("frame limit"), "{msg}"),
        other => panic!("expected transport error, got {other:?}"),
    }

    let summary = result::summarize(&report.results);
    assert_eq!(summary.reachable, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn missing_file_is_resource_error_and_daemon_keeps_serving() {
    let log = support::log_with(LOG);
    let target = support::grep_node(&log).await;
    let targets = vec![target.clone()];

    let missing = ExecutionRequest::new("ERROR").with_path("/nonexistent/fanout/machine.log");
    let report = dispatcher::dispatch(&targets, &missing, &cfg(), None).await;
    assert!(report.results[0].reachable);
    assert!(matches!(report.results[0].error, Some(NodeError::Resource(_))));

    let report = dispatcher::dispatch(&targets, &ExecutionRequest::new("ERROR"), &cfg(), None).await;
    assert!(report.results[0].is_success());
    assert_eq!(report.results[0].line_count(), 1);
}

#[tokio::test]
async fn repeated_rounds_classify_the_same_way() {
    let log = support::log_with(LOG);
    let targets = vec![
        support::grep_node(&log).await,
        support::dead_node().await,
        support::grep_node(&log).await,
    ];
    let request = ExecutionRequest::new("ERROR").with_options(["-n"]);

    let first = dispatcher::dispatch(&targets, &request, &cfg(), None).await;
    let second = dispatcher::dispatch(&targets, &request, &cfg(), None).await;

    let a: Vec<_> = first.results.iter().map(classification).collect();
    let b: Vec<_> = second.results.iter().map(classification).collect();
    assert_eq!(a, b);
}

#[tokio::test]
async fn http_transport_round() {
    let log = support::log_with(LOG);
    let executor = Arc::new(GrepExecutor::new(Some(log.path().to_path_buf())));
    let targets = vec![
        support::spawn_node(executor.clone(), TransportKind::Http).await,
        support::spawn_node(executor, TransportKind::Http).await,
    ];
    let cfg = DispatchConfig {
        transport: TransportKind::Http,
        ..cfg()
    };

    let report = dispatcher::dispatch(&targets, &ExecutionRequest::new("ERROR"), &cfg, None).await;

    assert!(report.results.iter().all(NodeResult::is_success));
    assert_eq!(result::summarize(&report.results).total_lines, 2);
}

#[tokio::test]
async fn transport_mismatch_is_not_mistaken_for_success() {
    let log = support::log_with(LOG);
    let targets = vec![support::grep_node(&log).await];
    let cfg = DispatchConfig {
        transport: TransportKind::Http,
        call_timeout: Duration::from_millis(500),
        ..cfg()
    };

    let report = dispatcher::dispatch(&targets, &ExecutionRequest::new("ERROR"), &cfg, None).await;

    let node = &report.results[0];
    assert!(!node.is_success());
    assert!(matches!(node.error, Some(NodeError::Transport(_))));
}
