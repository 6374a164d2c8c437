//! Network transport for sending ESC/POS data
//!
//! Most thermal printers accept raw byte streams over TCP port 9100.
//! Delivery is reported as an explicit [`TransportOutcome`] instead of
//! being inferred from socket close/error callback ordering.

use crate::error::{PrintError, PrintResult};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

/// Explicit record of what a transport attempt achieved
///
/// Success requires all three stages: the connection opened, the full
/// payload was written, and the stream shut down cleanly afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportOutcome {
    pub connected: bool,
    pub wrote: bool,
    pub closed_cleanly: bool,
}

impl TransportOutcome {
    pub fn is_success(&self) -> bool {
        self.connected && self.wrote && self.closed_cleanly
    }
}

/// Network printer (TCP port 9100)
#[derive(Debug, Clone)]
pub struct NetworkPrinter {
    addr: SocketAddr,
    timeout: Duration,
}

impl NetworkPrinter {
    /// Create a new network printer
    pub fn new(host: &str, port: u16) -> PrintResult<Self> {
        let addr_str = format!("{}:{}", host, port);
        let addr = addr_str
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr_str)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
        })
    }

    /// Create from a socket address string (e.g., "192.168.1.100:9100")
    pub fn from_addr(addr: &str) -> PrintResult<Self> {
        let addr: SocketAddr = addr
            .parse()
            .map_err(|_| PrintError::InvalidConfig(format!("Invalid address: {}", addr)))?;

        Ok(Self {
            addr,
            timeout: Duration::from_secs(5),
        })
    }

    /// Set connection timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get the printer address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Send raw ESC/POS data to the printer
    ///
    /// Connect (bounded by the configured timeout), write the full
    /// payload, flush, shut down. Every stage is recorded in the
    /// returned outcome; connect/write failures map to errors.
    #[instrument(skip(data), fields(addr = %self.addr, data_len = data.len()))]
    pub async fn send(&self, data: &[u8]) -> PrintResult<TransportOutcome> {
        let mut outcome = TransportOutcome {
            connected: false,
            wrote: false,
            closed_cleanly: false,
        };

        info!("Connecting to printer");

        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.addr))
            .await
            .map_err(|_| PrintError::Timeout(format!("Connection timeout: {}", self.addr)))?
            .map_err(|e| PrintError::Connection(format!("{}: {}", self.addr, e)))?;
        outcome.connected = true;

        info!("Connected, sending {} bytes", data.len());

        tokio::time::timeout(self.timeout, async {
            stream.write_all(data).await?;
            stream.flush().await
        })
        .await
        .map_err(|_| PrintError::Timeout(format!("Write timeout: {}", self.addr)))?
        .map_err(|e| {
            PrintError::Io(std::io::Error::new(e.kind(), format!("Write failed: {}", e)))
        })?;
        outcome.wrote = true;

        // A failed shutdown is not an error: the payload is already on the
        // wire, but the outcome records it so callers can distinguish.
        match stream.shutdown().await {
            Ok(()) => outcome.closed_cleanly = true,
            Err(e) => warn!(error = %e, "Stream shutdown failed after write"),
        }

        info!("Print job sent successfully");
        Ok(outcome)
    }

    /// Check if the printer is reachable
    ///
    /// Opens and immediately drops a connection, bounded by `timeout`.
    #[instrument(fields(addr = %self.addr))]
    pub async fn probe(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_)) => {
                info!("Printer online");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Printer offline");
                false
            }
            Err(_) => {
                warn!("Printer check timeout");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    #[test]
    fn test_network_printer_new() {
        let printer = NetworkPrinter::new("192.168.1.100", 9100).unwrap();
        assert_eq!(printer.addr().port(), 9100);
    }

    #[test]
    fn test_network_printer_from_addr() {
        let printer = NetworkPrinter::from_addr("192.168.1.100:9100").unwrap();
        assert_eq!(printer.addr().port(), 9100);
    }

    #[test]
    fn test_invalid_addr() {
        let result = NetworkPrinter::from_addr("invalid");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_send_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            socket.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let printer = NetworkPrinter::from_addr(&addr.to_string()).unwrap();
        let outcome = printer.send(b"hello printer").await.unwrap();

        assert!(outcome.is_success());
        assert_eq!(server.await.unwrap(), b"hello printer");
    }

    #[tokio::test]
    async fn test_send_connection_refused() {
        // Port 1 on localhost is almost certainly closed
        let printer = NetworkPrinter::from_addr("127.0.0.1:1").unwrap();
        let result = printer.send(b"data").await;
        assert!(matches!(
            result,
            Err(PrintError::Connection(_)) | Err(PrintError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_probe_unreachable() {
        let printer = NetworkPrinter::from_addr("127.0.0.1:1").unwrap();
        assert!(!printer.probe(Duration::from_millis(200)).await);
    }
}
