//! HTTP `CONNECT` upgrade for the HTTP transport.
//!
//! The client asks to tunnel into the RPC path, the server confirms with a 200 and
//! from then on the stream carries ordinary frames.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::ProtocolError;

pub const RPC_PATH: &str = "/_fanout_rpc_";
pub const CONNECTED_STATUS: &str = "200 Connected to fanout RPC";

const MAX_HEAD_LEN: usize = 8 * 1024;

pub async fn client_upgrade<S>(stream: &mut S) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request: String = format!("CONNECT {RPC_PATH} HTTP/1.0\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let head: String = read_head(stream).await?;
    let status_line: &str = head.lines().next().unwrap_or_default();

    match status_line.split_once(' ') {
        Some((version, status)) if version.starts_with("HTTP/1.") && status.starts_with("200") => {
            Ok(())
        }
        _ => Err(ProtocolError::Handshake(format!(
            "unexpected HTTP response: {status_line}"
        ))),
    }
}

/// Validates the client's `CONNECT` and answers it. Anything else gets a 405.
pub async fn server_upgrade<S>(stream: &mut S) -> Result<(), ProtocolError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let head: String = read_head(stream).await?;
    let request_line: &str = head.lines().next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();

    match (parts.next(), parts.next()) {
        (Some("CONNECT"), Some(RPC_PATH)) => {
            let response: String = format!("HTTP/1.0 {CONNECTED_STATUS}\r\n\r\n");
            stream.write_all(response.as_bytes()).await?;
            stream.flush().await?;
            Ok(())
        }
        _ => {
            stream
                .write_all(b"HTTP/1.0 405 Method Not Allowed\r\nContent-Type: text/plain\r\n\r\n405 must CONNECT\n")
                .await?;
            stream.flush().await?;
            Err(ProtocolError::Handshake(format!(
                "rejected request: {request_line}"
            )))
        }
    }
}

/// Reads up to and including the blank line that ends an HTTP head.
///
/// Reads byte by byte so no frame bytes following the head are consumed.
async fn read_head<S>(stream: &mut S) -> Result<String, ProtocolError>
where
    S: AsyncRead + Unpin,
{
    let mut head: Vec<u8> = Vec::with_capacity(128);
    loop {
        let byte: u8 = match stream.read_u8().await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::Closed);
            }
            Err(e) => return Err(e.into()),
        };
        head.push(byte);

        if head.ends_with(b"\r\n\r\n") || head.ends_with(b"\n\n") {
            break;
        }
        if head.len() > MAX_HEAD_LEN {
            return Err(ProtocolError::Handshake("HTTP head too large".to_string()));
        }
    }

    Ok(String::from_utf8_lossy(&head).into_owned())
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
