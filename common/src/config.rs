use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_PORT: u16 = 1234;
pub const DEFAULT_TARGETS_FILE: &str = "./sources.json";

/// How RPC frames reach the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// Frames are written straight onto the TCP stream.
    #[default]
    Tcp,
    /// The stream is first upgraded with an HTTP `CONNECT` exchange.
    Http,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Tcp => write!(f, "tcp"),
            TransportKind::Http => write!(f, "http"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(TransportKind::Tcp),
            "http" => Ok(TransportKind::Http),
            other => Err(format!("unknown transport: {other}")),
        }
    }
}

/// Knobs for one dispatch round.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Upper bound for establishing the TCP connection to a single target.
    pub dial_timeout: Duration,
    /// Upper bound for one RPC call, measured from the moment it is issued.
    ///
    /// When it fires the connection is dropped, so the socket is released
    /// instead of lingering behind an abandoned call.
    pub call_timeout: Duration,
    /// Caps how many targets are contacted at once. `None` contacts all of them.
    pub max_in_flight: Option<usize>,
    pub transport: TransportKind,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            max_in_flight: None,
            transport: TransportKind::Tcp,
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
