//! Relay client for constrained hosting
//!
//! When the process has no LAN route to the printers (cloud/serverless
//! deployment), print requests are relayed over HTTP to an operator-run
//! local print agent that does have one. Shared-secret auth rides in the
//! request body; relay failures are non-retryable per call.

use serde::Serialize;
use shared::models::{JobTypeSelector, Order};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Print agent unreachable: {0}")]
    Unavailable(String),

    #[error("Print agent rejected request: HTTP {status}")]
    Rejected { status: u16 },

    #[error("Invalid relay configuration: {0}")]
    InvalidConfig(String),
}

pub type RelayResult<T> = Result<T, RelayError>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayPrintRequest<'a> {
    order: &'a Order,
    printer_type: JobTypeSelector,
    shared_secret: &'a str,
}

/// HTTP client for the operator-run local print agent
#[derive(Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    base_url: String,
    shared_secret: String,
}

impl RelayClient {
    /// Build the client; a missing agent URL is operator misconfiguration
    pub fn new(
        base_url: &str,
        shared_secret: &str,
        timeout: Duration,
    ) -> RelayResult<Self> {
        if base_url.is_empty() {
            return Err(RelayError::InvalidConfig(
                "print agent URL is not configured".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            shared_secret: shared_secret.to_string(),
        })
    }

    /// POST the order to the agent for local printing
    #[instrument(skip(self, order), fields(order_number = %order.order_number))]
    pub async fn print_order(
        &self,
        order: &Order,
        printer_type: JobTypeSelector,
    ) -> RelayResult<()> {
        let url = format!("{}/print-order", self.base_url);
        let body = RelayPrintRequest {
            order,
            printer_type,
            shared_secret: &self.shared_secret,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::Rejected {
                status: response.status().as_u16(),
            });
        }

        info!("Order relayed to print agent");
        Ok(())
    }

    /// Ask the agent to run a test print on one of its devices
    pub async fn test_print(&self, device_id: &str) -> RelayResult<()> {
        let url = format!("{}/test-print/{}", self.base_url, device_id);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "sharedSecret": self.shared_secret }))
            .send()
            .await
            .map_err(|e| RelayError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RelayError::Rejected {
                status: response.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_url_fails_fast() {
        let result = RelayClient::new("", "secret", Duration::from_secs(5));
        assert!(matches!(result, Err(RelayError::InvalidConfig(_))));
    }

    #[test]
    fn test_trailing_slash_normalized() {
        let client =
            RelayClient::new("http://agent.local:4000/", "secret", Duration::from_secs(5))
                .unwrap();
        assert_eq!(client.base_url, "http://agent.local:4000");
    }
}
