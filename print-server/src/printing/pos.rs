//! POS integration adapter
//!
//! Forwards print requests to a pre-existing operator POS system instead
//! of talking to printers directly. One strategy is configured at
//! startup: REST (JSON + bearer/API-key auth), raw TCP carrying ESC/POS
//! bytes, or a form/XML payload for bespoke vendor APIs. All three
//! normalize to the same result shape.

use super::renderer::ReceiptRenderer;
use super::service::synthetic_order;
use serde::Serialize;
use shared::models::{JobTypeSelector, Order};
use shared::util::now_millis;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{info, instrument, warn};

#[derive(Debug, Error)]
pub enum PosError {
    #[error("Invalid POS configuration: {0}")]
    InvalidConfig(String),
}

/// How the POS accepts print requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PosMode {
    Rest,
    Tcp,
    Custom,
}

impl PosMode {
    pub fn parse(s: &str) -> Result<Self, PosError> {
        match s.to_ascii_lowercase().as_str() {
            "rest" => Ok(PosMode::Rest),
            "tcp" => Ok(PosMode::Tcp),
            "custom" => Ok(PosMode::Custom),
            other => Err(PosError::InvalidConfig(format!(
                "unknown POS mode: {}",
                other
            ))),
        }
    }
}

/// Normalized adapter result - POS failures are reported, never thrown
#[derive(Debug, Clone, Serialize)]
pub struct PosPrintResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PosPrintResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    fn err(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PosRestRequest<'a> {
    order: &'a Order,
    printer_type: JobTypeSelector,
}

/// POS integration service
pub struct PosIntegrationService {
    mode: PosMode,
    server_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
    renderer: ReceiptRenderer,
}

impl PosIntegrationService {
    /// Build the adapter; a missing POS URL is operator misconfiguration
    /// and fails fast before anything is queued.
    pub fn new(
        mode: PosMode,
        server_url: &str,
        api_key: &str,
        timeout: Duration,
        renderer: ReceiptRenderer,
    ) -> Result<Self, PosError> {
        if server_url.is_empty() {
            return Err(PosError::InvalidConfig(
                "POS server URL is not configured".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PosError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            mode,
            server_url: server_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            timeout,
            client,
            renderer,
        })
    }

    /// Forward an order to the POS
    #[instrument(skip(self, order), fields(order_number = %order.order_number, mode = ?self.mode))]
    pub async fn print_order(
        &self,
        order: &Order,
        selector: JobTypeSelector,
    ) -> PosPrintResult {
        let result = match self.mode {
            PosMode::Rest => self.print_rest(order, selector).await,
            PosMode::Tcp => self.print_tcp(order, selector).await,
            PosMode::Custom => self.print_custom(order).await,
        };

        match &result {
            r if r.success => info!("Order forwarded to POS"),
            r => warn!(error = ?r.error, "POS forwarding failed"),
        }
        result
    }

    /// Validate reachability/credentials with a synthetic minimal order
    pub async fn test_connection(&self) -> PosPrintResult {
        self.print_order(&synthetic_order(), JobTypeSelector::Kitchen)
            .await
    }

    /// REST POST {url}/print with bearer + API-key headers
    async fn print_rest(&self, order: &Order, selector: JobTypeSelector) -> PosPrintResult {
        let url = format!("{}/print", self.server_url);
        let body = PosRestRequest {
            order,
            printer_type: selector,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("X-API-Key", &self.api_key)
            .json(&body)
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => PosPrintResult::ok("accepted by POS"),
            Ok(r) => PosPrintResult::err(format!("POS returned HTTP {}", r.status().as_u16())),
            Err(e) => PosPrintResult::err(format!("POS unreachable: {}", e)),
        }
    }

    /// Raw TCP carrying the rendered ESC/POS bytes
    async fn print_tcp(&self, order: &Order, selector: JobTypeSelector) -> PosPrintResult {
        // "host:port", no scheme
        let addr = self
            .server_url
            .trim_start_matches("tcp://")
            .to_string();

        let now = now_millis();
        let mut payload = Vec::new();
        for &job_type in selector.job_types() {
            match self.renderer.render(order, job_type, now) {
                Ok(receipt) => payload.extend_from_slice(&receipt.bytes),
                Err(e) => {
                    warn!(job_type = %job_type, error = %e, "Skipping unrenderable receipt type");
                }
            }
        }
        if payload.is_empty() {
            return PosPrintResult::err("no printable receipt could be rendered");
        }

        let connect = tokio::time::timeout(self.timeout, TcpStream::connect(&addr)).await;
        let mut stream = match connect {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => return PosPrintResult::err(format!("{}: {}", addr, e)),
            Err(_) => return PosPrintResult::err(format!("connect timeout: {}", addr)),
        };

        let write = tokio::time::timeout(self.timeout, async {
            stream.write_all(&payload).await?;
            stream.flush().await?;
            stream.shutdown().await
        })
        .await;

        match write {
            Ok(Ok(())) => PosPrintResult::ok(format!("{} bytes sent", payload.len())),
            Ok(Err(e)) => PosPrintResult::err(format!("write failed: {}", e)),
            Err(_) => PosPrintResult::err(format!("write timeout: {}", addr)),
        }
    }

    /// Form POST with an XML order document, for vendor APIs that predate JSON
    async fn print_custom(&self, order: &Order) -> PosPrintResult {
        let url = format!("{}/print", self.server_url);
        let form = [
            ("apiKey", self.api_key.clone()),
            ("orderNumber", order.order_number.clone()),
            ("document", order_to_xml(order)),
        ];

        let response = self.client.post(&url).form(&form).send().await;

        match response {
            Ok(r) if r.status().is_success() => PosPrintResult::ok("accepted by POS"),
            Ok(r) => PosPrintResult::err(format!("POS returned HTTP {}", r.status().as_u16())),
            Err(e) => PosPrintResult::err(format!("POS unreachable: {}", e)),
        }
    }
}

/// Flat XML rendering of an order for bespoke vendor endpoints
fn order_to_xml(order: &Order) -> String {
    let mut xml = String::with_capacity(512);
    xml.push_str("<order>");
    xml.push_str(&format!(
        "<number>{}</number>",
        xml_escape(&order.order_number)
    ));
    xml.push_str(&format!(
        "<customer>{}</customer>",
        xml_escape(&order.customer_name)
    ));
    xml.push_str(&format!(
        "<address>{}</address>",
        xml_escape(&order.delivery_address)
    ));
    xml.push_str("<items>");
    for item in &order.items {
        xml.push_str(&format!(
            r#"<item name="{}" quantity="{}" price="{:.2}"/>"#,
            xml_escape(&item.name),
            item.quantity,
            item.price
        ));
    }
    xml.push_str("</items>");
    xml.push_str(&format!("<subtotal>{:.2}</subtotal>", order.subtotal()));
    if let Some(total) = order.total_amount {
        xml.push_str(&format!("<total>{:.2}</total>", total));
    }
    xml.push_str("</order>");
    xml
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::models::OrderItem;

    #[test]
    fn test_mode_parse() {
        assert_eq!(PosMode::parse("rest").unwrap(), PosMode::Rest);
        assert_eq!(PosMode::parse("TCP").unwrap(), PosMode::Tcp);
        assert!(PosMode::parse("soap").is_err());
    }

    #[test]
    fn test_missing_url_fails_fast() {
        let result = PosIntegrationService::new(
            PosMode::Rest,
            "",
            "key",
            Duration::from_secs(10),
            ReceiptRenderer::default(),
        );
        assert!(matches!(result, Err(PosError::InvalidConfig(_))));
    }

    #[test]
    fn test_order_to_xml() {
        let order = Order {
            order_number: "ORD000123".to_string(),
            customer_name: "Ana & Luis".to_string(),
            customer_phone: "600111222".to_string(),
            items: vec![OrderItem {
                name: "Fish <Chips>".to_string(),
                quantity: 2,
                price: Decimal::new(1050, 2),
                selected_size: None,
                notes: None,
            }],
            delivery_address: "Calle Mayor 1".to_string(),
            special_instructions: None,
            delivery_fee: None,
            discount: None,
            total_amount: Some(Decimal::new(2100, 2)),
            payment_method: None,
            payment_status: None,
        };

        let xml = order_to_xml(&order);
        assert!(xml.contains("<customer>Ana &amp; Luis</customer>"));
        assert!(xml.contains(r#"name="Fish &lt;Chips&gt;""#));
        assert!(xml.contains(r#"price="10.50""#));
        assert!(xml.contains("<total>21.00</total>"));
    }

    #[tokio::test]
    async fn test_tcp_unreachable_reports_error() {
        let service = PosIntegrationService::new(
            PosMode::Tcp,
            "127.0.0.1:1",
            "",
            Duration::from_millis(300),
            ReceiptRenderer::default(),
        )
        .unwrap();

        let result = service.test_connection().await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
