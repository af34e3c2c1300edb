pub mod query;
pub mod serve;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use fanout_common::config::{DEFAULT_PORT, DEFAULT_TARGETS_FILE};
use fanout_core::server::DEFAULT_MAX_CONNECTIONS;
use fanout_core::service::DEFAULT_GREP_BIN;

#[derive(Parser)]
#[command(name = "fanout")]
#[command(about = "Run grep on a fleet of machines and collect the answers.")]
pub struct CommandLine {
    #[command(subcommand)]
    pub command: Commands,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only print the summary
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a grep to every machine in the target list
    #[command(alias = "q")]
    Query(QueryArgs),
    /// Answer grep requests from coordinators
    #[command(alias = "s")]
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// JSON array of "host:port" strings
    #[arg(short, long, default_value = DEFAULT_TARGETS_FILE)]
    pub targets: PathBuf,

    /// Time allowed to connect to a single machine
    #[arg(long, default_value_t = 3000)]
    pub dial_timeout_ms: u64,

    /// Time allowed for the call once connected
    #[arg(long, default_value_t = 5000)]
    pub call_timeout_ms: u64,

    /// Contact at most this many machines at once
    #[arg(long)]
    pub max_in_flight: Option<usize>,

    /// Tunnel calls through an HTTP CONNECT upgrade
    #[arg(long)]
    pub http: bool,

    /// File to search on the remote side instead of its default log
    #[arg(long)]
    pub path: Option<String>,

    /// grep options followed by the pattern, e.g. `-- -i -n ERROR`
    #[arg(required = true, num_args = 1.., trailing_var_arg = true, allow_hyphen_values = true)]
    pub grep_args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// File searched when a request names none
    #[arg(short, long)]
    pub log: Option<PathBuf>,

    /// Search tool to execute
    #[arg(long, default_value = DEFAULT_GREP_BIN)]
    pub grep_bin: PathBuf,

    /// Expect callers to upgrade via HTTP CONNECT
    #[arg(long)]
    pub http: bool,

    /// Maximum number of connections served at once
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: usize,
}

impl CommandLine {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
