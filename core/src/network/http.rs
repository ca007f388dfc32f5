//! Service detection over a plain HTTP `GET /`.
//!
//! The only evidence used is the status line and the `Server` header, so the
//! strongest conclusion is [`Certainty::Advertised`].

use std::net::SocketAddr;
use std::time::Duration;

use portstream_common::{Certainty, ServiceDetectionConclusion};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

const MAX_RESPONSE_BYTES: usize = 8 * 1024;

/// Sends one request and draws conclusions from the response headers.
///
/// Any I/O failure just means nothing could be concluded.
pub async fn detect_service(
    addr: SocketAddr,
    host: &str,
    connect_timeout: Duration,
) -> Vec<ServiceDetectionConclusion> {
    match timeout(connect_timeout, fetch_head(addr, host)).await {
        Ok(Ok(response)) => conclusions_from_response(&response),
        Ok(Err(e)) => {
            debug!("http check on {addr} failed: {e}");
            Vec::new()
        }
        Err(_) => {
            debug!("http check on {addr} timed out");
            Vec::new()
        }
    }
}

async fn fetch_head(addr: SocketAddr, host: &str) -> std::io::Result<Vec<u8>> {
    let mut stream = TcpStream::connect(addr).await?;
    let request = format!(
        "GET / HTTP/1.0\r\nHost: {host}\r\nUser-Agent: portstream/{}\r\nAccept: */*\r\n\r\n",
        env!("CARGO_PKG_VERSION")
    );
    stream.write_all(request.as_bytes()).await?;

    let mut response = Vec::new();
    let mut chunk = [0u8; 1024];
    while response.len() < MAX_RESPONSE_BYTES {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        response.extend_from_slice(&chunk[..read]);
        if response.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    Ok(response)
}

/// Parses an HTTP response head.
///
/// A `Server` banner gives an advertised conclusion, listed first. A valid
/// status line alone still tells us the port speaks HTTP.
pub fn conclusions_from_response(response: &[u8]) -> Vec<ServiceDetectionConclusion> {
    let text = String::from_utf8_lossy(response);
    let mut lines = text.split("\r\n");

    let speaks_http = lines
        .next()
        .is_some_and(|status| status.starts_with("HTTP/"));
    if !speaks_http {
        return Vec::new();
    }

    let mut conclusions = Vec::new();
    let banner = lines
        .take_while(|line| !line.is_empty())
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("server"))
        .map(|(_, value)| value.trim());

    if let Some(banner) = banner.filter(|b| !b.is_empty()) {
        conclusions.push(parse_server_banner(banner));
    }

    conclusions.push(ServiceDetectionConclusion {
        certainty: Certainty::High,
        service_name: "HTTP".to_string(),
        service_version: None,
    });
    conclusions
}

/// "nginx/1.25.3 (Ubuntu)" becomes name "nginx HTTP server", version "1.25.3".
fn parse_server_banner(banner: &str) -> ServiceDetectionConclusion {
    let product = banner.split_whitespace().next().unwrap_or(banner);
    let (name, version) = match product.split_once('/') {
        Some((name, version)) if !version.is_empty() => (name, Some(version.to_string())),
        Some((name, _)) => (name, None),
        None => (product, None),
    };

    let service_name = if name.eq_ignore_ascii_case("nginx") {
        "nginx HTTP server".to_string()
    } else {
        name.to_string()
    };

    ServiceDetectionConclusion {
        certainty: Certainty::Advertised,
        service_name,
        service_version: version,
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
