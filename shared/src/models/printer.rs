//! Printer Device Model

use serde::{Deserialize, Serialize};

/// Device reachability as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Unknown,
    Online,
    Offline,
    Timeout,
    Error,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Unknown => "unknown",
            DeviceStatus::Online => "online",
            DeviceStatus::Offline => "offline",
            DeviceStatus::Timeout => "timeout",
            DeviceStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network thermal printer entity
///
/// Created once at startup from configuration, mutated by transport
/// attempts and health checks, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterDevice {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub enabled: bool,
    pub status: DeviceStatus,
    pub last_check: Option<i64>,
    pub success_count: u64,
    pub error_count: u64,
}

impl PrinterDevice {
    /// Socket address string for the raw-9100 transport
    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

/// Startup configuration shape for one device (JSON, from the
/// `PRINTER_DEVICES` environment variable)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterDeviceConfig {
    pub id: String,
    pub name: String,
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_port() -> u16 {
    9100
}

fn default_true() -> bool {
    true
}

impl From<PrinterDeviceConfig> for PrinterDevice {
    fn from(cfg: PrinterDeviceConfig) -> Self {
        Self {
            id: cfg.id,
            name: cfg.name,
            ip: cfg.ip,
            port: cfg.port,
            enabled: cfg.enabled,
            status: DeviceStatus::Unknown,
            last_check: None,
            success_count: 0,
            error_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let cfg: PrinterDeviceConfig =
            serde_json::from_str(r#"{"id":"kitchen","name":"Kitchen","ip":"192.168.1.50"}"#)
                .unwrap();
        assert_eq!(cfg.port, 9100);
        assert!(cfg.enabled);

        let device = PrinterDevice::from(cfg);
        assert_eq!(device.status, DeviceStatus::Unknown);
        assert_eq!(device.addr(), "192.168.1.50:9100");
    }
}
