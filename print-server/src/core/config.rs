//! Server configuration - everything the print server needs, resolved
//! once from the environment at startup.
//!
//! # Environment variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | WORK_DIR | /var/lib/ember/print | Working directory (attempt log) |
//! | HTTP_PORT | 3800 | Admin API port |
//! | POS_INTEGRATION_ENABLED | false | Delegate printing to the POS |
//! | CONSTRAINED_HOSTING | false | No LAN route to printers; use the relay |
//! | PRINTER_DEVICES | [] | JSON array of devices (id, name, ip, port?, enabled?) |
//! | KITCHEN_PRINTER_ID | kitchen | Device receiving kitchen tickets |
//! | BILL_PRINTER_ID | bill | Device receiving bills |
//! | PAPER_WIDTH | 32 | Receipt column width |
//! | CURRENCY_SYMBOL | € | Currency prefix on bills |
//! | QUEUE_TICK_MS | 1000 | Queue tick interval |
//! | HEALTH_CHECK_SECS | 30 | Health check interval |
//! | HISTORY_SWEEP_SECS | 60 | History sweep interval |
//! | TRANSPORT_TIMEOUT_MS | 5000 | Per-attempt transport cutoff |
//! | PROBE_TIMEOUT_MS | 3000 | Per-probe cutoff |
//! | BASE_RETRY_DELAY_MS | 1000 | First retry delay (doubles per attempt) |
//! | MAX_ATTEMPTS | 3 | Transport attempts per job |
//! | HISTORY_CAP | 500 | Terminal jobs retained in memory |
//! | ATTEMPT_LOG_RETENTION_DAYS | 7 | Durable attempt log retention |
//! | PRINT_AGENT_URL | (unset) | Local print agent base URL (relay mode) |
//! | PRINT_AGENT_SECRET | (unset) | Shared secret for the print agent |
//! | RELAY_TIMEOUT_MS | 10000 | Relay request cutoff |
//! | POS_SERVER_URL | (unset) | POS endpoint (pos mode) |
//! | POS_MODE | rest | POS adapter: rest, tcp or custom |
//! | POS_API_KEY | (unset) | POS credential |
//! | POS_TIMEOUT_MS | 10000 | POS request cutoff |
//!
//! # Example
//!
//! ```ignore
//! PRINTER_DEVICES='[{"id":"kitchen","name":"Kitchen","ip":"192.168.1.50"}]' cargo run
//! ```

use shared::models::PrinterDeviceConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid PRINTER_DEVICES: {0}")]
    InvalidDevices(String),

    #[error("Missing configuration: {0}")]
    Missing(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Which printing backend this deployment uses
///
/// Resolved once at startup. Fixed priority: POS delegation wins over
/// the relay, the relay wins over direct transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStrategy {
    Pos,
    Relay,
    Direct,
}

impl PrintStrategy {
    pub fn resolve(pos_enabled: bool, constrained_hosting: bool) -> Self {
        if pos_enabled {
            PrintStrategy::Pos
        } else if constrained_hosting {
            PrintStrategy::Relay
        } else {
            PrintStrategy::Direct
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PrintStrategy::Pos => "pos",
            PrintStrategy::Relay => "relay",
            PrintStrategy::Direct => "direct",
        }
    }
}

/// Print server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory (attempt log lives here)
    pub work_dir: String,
    /// Admin API port
    pub http_port: u16,
    /// Resolved printing strategy
    pub strategy: PrintStrategy,

    // === Devices & rendering ===
    pub devices: Vec<PrinterDeviceConfig>,
    pub kitchen_printer_id: String,
    pub bill_printer_id: String,
    pub paper_width: usize,
    pub currency_symbol: String,

    // === Queue & retries ===
    pub queue_tick_ms: u64,
    pub health_check_secs: u64,
    pub history_sweep_secs: u64,
    pub transport_timeout_ms: u64,
    pub probe_timeout_ms: u64,
    pub base_retry_delay_ms: i64,
    pub max_attempts: u32,
    pub history_cap: usize,
    pub attempt_log_retention_days: i64,

    // === Relay (constrained hosting) ===
    pub print_agent_url: String,
    pub print_agent_secret: String,
    pub relay_timeout_ms: u64,

    // === POS delegation ===
    pub pos_server_url: String,
    pub pos_mode: String,
    pub pos_api_key: String,
    pub pos_timeout_ms: u64,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset variables fall back to defaults; call [`Config::validate`]
    /// afterwards to fail fast on operator misconfiguration.
    pub fn from_env() -> Self {
        let pos_enabled = env_or("POS_INTEGRATION_ENABLED", false);
        let constrained = env_or("CONSTRAINED_HOSTING", false);

        let devices = std::env::var("PRINTER_DEVICES")
            .ok()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default();

        Self {
            work_dir: env_string("WORK_DIR", "/var/lib/ember/print"),
            http_port: env_or("HTTP_PORT", 3800),
            strategy: PrintStrategy::resolve(pos_enabled, constrained),

            devices,
            kitchen_printer_id: env_string("KITCHEN_PRINTER_ID", "kitchen"),
            bill_printer_id: env_string("BILL_PRINTER_ID", "bill"),
            paper_width: env_or("PAPER_WIDTH", 32),
            currency_symbol: env_string("CURRENCY_SYMBOL", "€"),

            queue_tick_ms: env_or("QUEUE_TICK_MS", 1000),
            health_check_secs: env_or("HEALTH_CHECK_SECS", 30),
            history_sweep_secs: env_or("HISTORY_SWEEP_SECS", 60),
            transport_timeout_ms: env_or("TRANSPORT_TIMEOUT_MS", 5000),
            probe_timeout_ms: env_or("PROBE_TIMEOUT_MS", 3000),
            base_retry_delay_ms: env_or("BASE_RETRY_DELAY_MS", 1000),
            max_attempts: env_or("MAX_ATTEMPTS", 3),
            history_cap: env_or("HISTORY_CAP", 500),
            attempt_log_retention_days: env_or("ATTEMPT_LOG_RETENTION_DAYS", 7),

            print_agent_url: env_string("PRINT_AGENT_URL", ""),
            print_agent_secret: env_string("PRINT_AGENT_SECRET", ""),
            relay_timeout_ms: env_or("RELAY_TIMEOUT_MS", 10000),

            pos_server_url: env_string("POS_SERVER_URL", ""),
            pos_mode: env_string("POS_MODE", "rest"),
            pos_api_key: env_string("POS_API_KEY", ""),
            pos_timeout_ms: env_or("POS_TIMEOUT_MS", 10000),
        }
    }

    /// Fail fast on operator misconfiguration
    ///
    /// Checked synchronously at startup, before anything is queued.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.strategy {
            PrintStrategy::Pos => {
                if self.pos_server_url.is_empty() {
                    return Err(ConfigError::Missing(
                        "POS_SERVER_URL (POS integration is enabled)".to_string(),
                    ));
                }
            }
            PrintStrategy::Relay => {
                if self.print_agent_url.is_empty() {
                    return Err(ConfigError::Missing(
                        "PRINT_AGENT_URL (constrained hosting is enabled)".to_string(),
                    ));
                }
            }
            PrintStrategy::Direct => {
                if self.devices.is_empty() {
                    return Err(ConfigError::Missing(
                        "PRINTER_DEVICES (direct printing needs at least one device)".to_string(),
                    ));
                }
                for routed in [&self.kitchen_printer_id, &self.bill_printer_id] {
                    if !self.devices.iter().any(|d| &d.id == routed) {
                        return Err(ConfigError::Invalid(format!(
                            "routed printer '{}' is not in PRINTER_DEVICES",
                            routed
                        )));
                    }
                }
            }
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("MAX_ATTEMPTS must be >= 1".to_string()));
        }
        if self.paper_width < 16 {
            return Err(ConfigError::Invalid(
                "PAPER_WIDTH below 16 cannot fit receipt columns".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
