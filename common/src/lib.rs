//! # Fanout Common
//!
//! Shared vocabulary of the workspace: what a target is, what gets sent to it,
//! what comes back and how a round of results is summarized.
//!
//! * **[`network`]**: target addresses and the target registry file.
//! * **[`grep`]**: the execution request/reply carried over the wire.
//! * **[`result`]**: per-node outcomes and the dispatch summary.
//! * **[`config`]**: dispatcher tuning and transport selection.

pub mod config;
pub mod grep;
pub mod network;
pub mod result;
