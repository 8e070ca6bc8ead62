//! Banner grabbing for open TCP ports.
//!
//! Reads whatever the service sends first; HTTP-ish ports get a HEAD probe
//! when they stay silent.

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

const MAX_BANNER_SIZE: usize = 1024;

/// Longest wait for a banner regardless of the probe timeout.
const BANNER_TIMEOUT: Duration = Duration::from_secs(3);

const HTTP_PROBE: &[u8] = b"HEAD / HTTP/1.0\r\n\r\n";

/// Grab a banner from an already connected stream.
///
/// Returns `None` when the service sends nothing printable in time.
pub async fn grab_banner_from_stream(
    mut stream: TcpStream,
    port: u16,
    wait: Duration,
) -> Option<String> {
    let wait = wait.min(BANNER_TIMEOUT);
    let mut buffer = vec![0u8; MAX_BANNER_SIZE];

    if let Ok(Ok(n)) = timeout(wait, stream.read(&mut buffer)).await {
        if n > 0 {
            return non_empty(sanitize_banner(&buffer[..n]));
        }
    }

    if !is_http_port(port) || stream.write_all(HTTP_PROBE).await.is_err() {
        return None;
    }

    match timeout(wait, stream.read(&mut buffer)).await {
        Ok(Ok(n)) if n > 0 => non_empty(sanitize_banner(&buffer[..n])),
        _ => None,
    }
}

fn non_empty(banner: String) -> Option<String> {
    (!banner.is_empty()).then_some(banner)
}

fn is_http_port(port: u16) -> bool {
    matches!(
        port,
        80 | 443 | 8000 | 8008 | 8080 | 8081 | 8443 | 8888 | 9000 | 9090
    )
}

/// Replace control bytes, fold line breaks into spaces and cap the length.
fn sanitize_banner(data: &[u8]) -> String {
    let printable: String = data
        .iter()
        .take(256)
        .map(|&b| match b {
            b'\r' | b'\n' | b'\t' => ' ',
            b if b.is_ascii_graphic() || b == b' ' => b as char,
            _ => '.',
        })
        .collect();

    printable.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn test_sanitize_banner() {
        assert_eq!(
            sanitize_banner(b"SSH-2.0-OpenSSH_8.9\r\n"),
            "SSH-2.0-OpenSSH_8.9"
        );
        assert_eq!(sanitize_banner(b"\x00\x01Hello\x02World"), "..Hello.World");
        assert_eq!(sanitize_banner(b"220  mail\r\n\r\nready"), "220 mail ready");
    }

    #[tokio::test]
    async fn test_grab_greeting() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(b"220 ftp ready\r\n").await.unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let banner = grab_banner_from_stream(stream, addr.port(), Duration::from_secs(1)).await;
        assert_eq!(banner.as_deref(), Some("220 ftp ready"));
    }
}
