//! Transport seam between the queue processor and physical devices
//!
//! A dyn-safe trait so the service can run against the real network
//! transport in production and test doubles in tests.

use async_trait::async_trait;
use ember_printer::{NetworkPrinter, PrintError, PrintResult, TransportOutcome};
use shared::models::{DeviceStatus, PrinterDevice};
use std::time::Duration;

#[async_trait]
pub trait PrintTransport: Send + Sync {
    /// Deliver a payload to a device, bounded by `timeout`
    async fn send(
        &self,
        device: &PrinterDevice,
        payload: &[u8],
        timeout: Duration,
    ) -> PrintResult<TransportOutcome>;

    /// Best-effort reachability check, bounded by `timeout`
    async fn probe(&self, device: &PrinterDevice, timeout: Duration) -> bool;
}

/// Production transport: raw TCP to `device.ip:device.port`
pub struct NetworkTransport;

#[async_trait]
impl PrintTransport for NetworkTransport {
    async fn send(
        &self,
        device: &PrinterDevice,
        payload: &[u8],
        timeout: Duration,
    ) -> PrintResult<TransportOutcome> {
        let printer = NetworkPrinter::new(&device.ip, device.port)?.with_timeout(timeout);
        printer.send(payload).await
    }

    async fn probe(&self, device: &PrinterDevice, timeout: Duration) -> bool {
        match NetworkPrinter::new(&device.ip, device.port) {
            Ok(printer) => printer.probe(timeout).await,
            Err(_) => false,
        }
    }
}

/// Map a transport failure to the device status it evidences
pub fn classify_failure(err: &PrintError) -> DeviceStatus {
    match err {
        PrintError::Connection(_) => DeviceStatus::Offline,
        PrintError::Timeout(_) => DeviceStatus::Timeout,
        PrintError::Io(_) | PrintError::InvalidConfig(_) => DeviceStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure(&PrintError::Connection("refused".into())),
            DeviceStatus::Offline
        );
        assert_eq!(
            classify_failure(&PrintError::Timeout("connect".into())),
            DeviceStatus::Timeout
        );
        assert_eq!(
            classify_failure(&PrintError::Io(std::io::Error::other("broken pipe"))),
            DeviceStatus::Error
        );
    }
}
