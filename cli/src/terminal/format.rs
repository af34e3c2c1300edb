use colored::*;
use fanout_common::result::{NodeError, NodeResult};

use crate::terminal::colors;

type Detail = (String, ColoredString);

/// Short label for how a node ended. Mirrors the dispatcher's classification, never refines it.
pub fn status_label(node: &NodeResult) -> &'static str {
    match (&node.error, node.reachable) {
        (None, _) if node.line_count() == 0 => "no matches",
        (None, _) => "ok",
        (Some(NodeError::Network(_)), _) => "unreachable",
        (Some(NodeError::Transport(_)), false) => "no reply",
        (Some(NodeError::Transport(_)), true) => "rejected",
        (Some(NodeError::Command(_)), _) => "command failed",
        (Some(NodeError::Resource(_)), _) => "missing file",
    }
}

pub fn node_to_details(node: &NodeResult) -> Vec<Detail> {
    let mut details: Vec<Detail> = vec![(
        "Address".to_string(),
        node.target.addr().color(colors::ADDRESS),
    )];

    let label: &str = status_label(node);
    let status: ColoredString = match &node.error {
        None => label.color(colors::OK),
        Some(_) if node.reachable => label.color(colors::WARNING),
        Some(_) => label.color(colors::FAILURE),
    };
    details.push(("Status".to_string(), status.bold()));

    if let Some(err) = &node.error {
        details.push(("Error".to_string(), err.to_string().color(colors::FAILURE)));
    }

    if node.reachable {
        let lines: usize = node.line_count();
        let unit: &str = if lines == 1 { "line" } else { "lines" };
        details.push(("Matches".to_string(), format!("{lines} {unit}").normal()));
    }

    details
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
