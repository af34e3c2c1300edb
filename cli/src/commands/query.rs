use std::time::Duration;

use anyhow::Context;
use colored::*;
use fanout_common::config::{DispatchConfig, TransportKind};
use fanout_common::grep::ExecutionRequest;
use fanout_common::network::target::{self, Target};
use fanout_common::result::{self, DispatchSummary, NodeResult};
use fanout_core::dispatcher::{self, DispatchReport};
use tracing::info;

use super::QueryArgs;
use crate::terminal::{colors, format, print, spinner};

pub async fn query(args: QueryArgs, quiet: bool) -> anyhow::Result<()> {
    let mut request: ExecutionRequest = ExecutionRequest::from_args(&args.grep_args)
        .context("usage: fanout query [OPTIONS] -- <grep options>... <pattern>")?;
    request.path = args.path.clone();

    let targets: Vec<Target> = target::load_targets(&args.targets)
        .context("failed to load target addresses")?;

    let cfg = DispatchConfig {
        dial_timeout: Duration::from_millis(args.dial_timeout_ms),
        call_timeout: Duration::from_millis(args.call_timeout_ms),
        max_in_flight: args.max_in_flight,
        transport: if args.http { TransportKind::Http } else { TransportKind::Tcp },
    };

    info!(
        "Sending {} to {} machines",
        request.argv().join(" ").bold(),
        targets.len()
    );

    let spinner = spinner::start_dispatch_spinner(targets.len());
    let progress = spinner.clone();
    let total: usize = targets.len();

    let report: DispatchReport = dispatcher::dispatch(
        &targets,
        &request,
        &cfg,
        Some(Box::new(move |done| spinner::report_progress(&progress, done, total))),
    )
    .await;

    spinner.finish_and_clear();

    let summary: DispatchSummary = result::summarize(&report.results);
    dispatch_ends(&report, &summary, quiet);
    Ok(())
}

fn dispatch_ends(report: &DispatchReport, summary: &DispatchSummary, quiet: bool) {
    if !quiet {
        print::header("results", quiet);
        print_nodes(&report.results);
    }
    print_summary(summary, report.elapsed);
}

fn print_nodes(results: &[NodeResult]) {
    for (idx, node) in results.iter().enumerate() {
        print_node_tree(node, idx);
        if idx + 1 != results.len() {
            print::print("");
        }
    }
}

fn print_node_tree(node: &NodeResult, idx: usize) {
    print::tree_head(idx, &node.hostname);
    print::as_tree_one_level(format::node_to_details(node));

    if node.reachable {
        for line in node.output.lines().filter(|line| !line.trim().is_empty()) {
            print::output_line(line);
        }
    }
}

fn print_summary(summary: &DispatchSummary, elapsed: Duration) {
    let successful: ColoredString = format!("{} successful", summary.successful()).bold().green();
    let failed: ColoredString =
        format!("{} failed", summary.failed + summary.unreachable).bold().red();
    let latency: ColoredString = format!("{:.2}s", elapsed.as_secs_f64()).bold().yellow();

    print::fat_separator();
    print::centerln(&format!(
        "{}",
        format!("{successful}, {failed} out of {} machines", summary.total).color(colors::TEXT_DEFAULT)
    ));
    print::aligned_line("Reachable", summary.reachable.to_string());
    print::aligned_line("Unreachable", summary.unreachable.to_string());
    if summary.total_lines > 0 {
        print::aligned_line("Matches", format!("{} lines", summary.total_lines));
    }
    print::aligned_line("Latency", latency);
    print::end_of_program();
}
