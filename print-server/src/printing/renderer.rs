//! Receipt renderer
//!
//! Renders orders into kitchen tickets and bills, each in two forms:
//! plain text (for relay payloads and manual-recovery logs) and an
//! ESC/POS byte stream ending in a cut command.
//!
//! Pure transform: no I/O, deterministic for a given order and timestamp.

use chrono::DateTime;
use ember_printer::{EscPosBuilder, text_width};
use rust_decimal::Decimal;
use shared::models::{JobType, Order, OrderItem};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Order has no items")]
    EmptyOrder,

    #[error("Item '{0}' has zero quantity")]
    ZeroQuantity(String),

    #[error("Order carries no billing information")]
    MissingBilling,
}

pub type RenderResult<T> = Result<T, RenderError>;

/// A rendered receipt in both output forms
#[derive(Debug, Clone)]
pub struct Receipt {
    /// Plain text, one line per row
    pub text: String,
    /// ESC/POS byte stream, cut command included
    pub bytes: Vec<u8>,
}

/// Accumulates the plain-text and ESC/POS forms in lockstep so the two
/// never drift apart. Style calls only touch the byte stream.
struct TicketWriter {
    text: String,
    escpos: EscPosBuilder,
    width: usize,
}

impl TicketWriter {
    fn new(width: usize) -> Self {
        Self {
            text: String::new(),
            escpos: EscPosBuilder::new(width),
            width,
        }
    }

    fn line(&mut self, s: &str) {
        self.text.push_str(s);
        self.text.push('\n');
        self.escpos.line(s);
    }

    fn blank(&mut self) {
        self.text.push('\n');
        self.escpos.newline();
    }

    /// Left and right text on the same row, gap filled with spaces
    fn line_lr(&mut self, left: &str, right: &str) {
        let lw = text_width(left);
        let rw = text_width(right);
        if lw + rw >= self.width {
            self.line(&format!("{} {}", left, right));
        } else {
            let gap = self.width - lw - rw;
            self.line(&format!("{}{}{}", left, " ".repeat(gap), right));
        }
    }

    fn sep_double(&mut self) {
        self.line(&"=".repeat(self.width));
    }

    fn sep_single(&mut self) {
        self.line(&"-".repeat(self.width));
    }

    /// Centered banner line, double-size + bold on the device
    fn banner(&mut self, s: &str) {
        self.text.push_str(s);
        self.text.push('\n');
        self.escpos.center();
        self.escpos.double_size();
        self.escpos.bold();
        self.escpos.line(s);
        self.escpos.bold_off();
        self.escpos.reset_size();
        self.escpos.left();
    }

    /// Centered plain line
    fn centered(&mut self, s: &str) {
        self.text.push_str(s);
        self.text.push('\n');
        self.escpos.center();
        self.escpos.line(s);
        self.escpos.left();
    }

    /// Emphasized line (bold on the device, plain in text form)
    fn emphasized(&mut self, s: &str) {
        self.text.push_str(s);
        self.text.push('\n');
        self.escpos.bold();
        self.escpos.line(s);
        self.escpos.bold_off();
    }

    fn finish(mut self) -> Receipt {
        self.escpos.cut_feed(3);
        Receipt {
            text: self.text,
            bytes: self.escpos.build(),
        }
    }
}

/// Receipt renderer
///
/// Fixed-width layout (default 32 columns for 58mm paper) with
/// right-aligned, two-decimal, symbol-prefixed prices.
#[derive(Debug, Clone)]
pub struct ReceiptRenderer {
    width: usize,
    currency: String,
}

impl ReceiptRenderer {
    pub fn new(width: usize, currency: impl Into<String>) -> Self {
        Self {
            width,
            currency: currency.into(),
        }
    }

    /// Render the receipt kind a job asks for
    pub fn render(&self, order: &Order, job_type: JobType, printed_at: i64) -> RenderResult<Receipt> {
        match job_type {
            JobType::Kitchen => self.render_kitchen(order, printed_at),
            JobType::Bill => self.render_bill(order, printed_at),
        }
    }

    /// Kitchen ticket: what the cooks need, nothing about money
    pub fn render_kitchen(&self, order: &Order, printed_at: i64) -> RenderResult<Receipt> {
        self.check_items(order)?;

        let mut w = TicketWriter::new(self.width);

        w.banner("KITCHEN");
        w.centered(&order.order_number);
        w.centered(&format_timestamp(printed_at));
        w.sep_double();

        for item in &order.items {
            w.emphasized(&format!("{}x {}", item.quantity, item.name));
            if let Some(ref size) = item.selected_size
                && !size.is_empty()
            {
                w.line(&format!("   ({})", size));
            }
            if let Some(ref notes) = item.notes
                && !notes.is_empty()
            {
                w.line(&format!("   * {}", notes));
            }
        }

        w.sep_single();
        w.line(&format!("Customer: {}", order.customer_name));
        w.line(&format!("Phone: {}", order.customer_phone));
        w.line(&format!("Address: {}", order.delivery_address));
        if let Some(ref instructions) = order.special_instructions
            && !instructions.is_empty()
        {
            w.emphasized(&format!("!! {}", instructions));
        }

        Ok(w.finish())
    }

    /// Bill: itemized amounts, monetary breakdown, payment summary
    pub fn render_bill(&self, order: &Order, printed_at: i64) -> RenderResult<Receipt> {
        self.check_items(order)?;
        if !order.has_billing() {
            return Err(RenderError::MissingBilling);
        }

        let mut w = TicketWriter::new(self.width);

        w.banner("RECEIPT");
        w.centered(&order.order_number);
        w.centered(&format_timestamp(printed_at));
        w.sep_double();

        for item in &order.items {
            self.render_bill_item(&mut w, item);
        }

        w.sep_single();

        let subtotal = order.subtotal();
        let delivery_fee = order.delivery_fee.unwrap_or(Decimal::ZERO);
        let discount = order.discount.unwrap_or(Decimal::ZERO);
        let total = subtotal + delivery_fee - discount;

        w.line_lr("Subtotal", &self.money(subtotal));
        if order.delivery_fee.is_some() {
            w.line_lr("Delivery", &self.money(delivery_fee));
        }
        if order.discount.is_some() {
            w.line_lr("Discount", &format!("-{}", self.money(discount)));
        }
        w.sep_double();
        w.line_lr("TOTAL", &self.money(total));

        if let Some(ref method) = order.payment_method {
            match order.payment_status {
                Some(ref status) => w.line(&format!("Payment: {} ({})", method, status)),
                None => w.line(&format!("Payment: {}", method)),
            }
        }

        w.blank();
        w.line(&format!("Customer: {}", order.customer_name));
        w.line(&format!("Address: {}", order.delivery_address));
        w.blank();
        w.centered("Thank you!");

        Ok(w.finish())
    }

    fn render_bill_item(&self, w: &mut TicketWriter, item: &OrderItem) {
        let label = match item.selected_size {
            Some(ref size) if !size.is_empty() => {
                format!("{}x {} ({})", item.quantity, item.name, size)
            }
            _ => format!("{}x {}", item.quantity, item.name),
        };
        w.line_lr(&label, &self.money(item.line_total()));
        if let Some(ref notes) = item.notes
            && !notes.is_empty()
        {
            w.line(&format!("   {}", notes));
        }
    }

    fn check_items(&self, order: &Order) -> RenderResult<()> {
        if order.items.is_empty() {
            return Err(RenderError::EmptyOrder);
        }
        for item in &order.items {
            if item.quantity == 0 {
                return Err(RenderError::ZeroQuantity(item.name.clone()));
            }
        }
        Ok(())
    }

    /// Currency-prefixed amount with exactly two decimals
    fn money(&self, amount: Decimal) -> String {
        format!("{}{:.2}", self.currency, amount.round_dp(2))
    }
}

impl Default for ReceiptRenderer {
    fn default() -> Self {
        Self::new(32, "€")
    }
}

/// Format a unix millisecond timestamp as `MM-DD HH:MM` (UTC)
fn format_timestamp(ts: i64) -> String {
    match DateTime::from_timestamp_millis(ts) {
        Some(dt) => dt.format("%m-%d %H:%M").to_string(),
        None => "--".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, quantity: u32, cents: i64) -> OrderItem {
        OrderItem {
            name: name.to_string(),
            quantity,
            price: Decimal::new(cents, 2),
            selected_size: None,
            notes: None,
        }
    }

    fn test_order() -> Order {
        Order {
            order_number: "ORD000123".to_string(),
            customer_name: "Ana García".to_string(),
            customer_phone: "600111222".to_string(),
            items: vec![item("Margherita", 2, 1000), item("Cola", 1, 550)],
            delivery_address: "Calle Mayor 1".to_string(),
            special_instructions: Some("ring twice".to_string()),
            delivery_fee: Some(Decimal::new(200, 2)),
            discount: Some(Decimal::new(100, 2)),
            total_amount: None,
            payment_method: Some("cash".to_string()),
            payment_status: Some("pending".to_string()),
        }
    }

    const PRINTED_AT: i64 = 1705912335000; // 2024-01-22 08:32 UTC

    #[test]
    fn test_bill_totals() {
        let renderer = ReceiptRenderer::default();
        let receipt = renderer.render_bill(&test_order(), PRINTED_AT).unwrap();

        // subtotal 25.50 + fee 2.00 - discount 1.00 = 26.50
        assert!(receipt.text.contains("€26.50"));
        assert!(receipt.text.contains("€25.50"));
        assert!(receipt.text.contains("-€1.00"));
        assert!(receipt.text.contains("Payment: cash (pending)"));
    }

    #[test]
    fn test_bill_prices_right_aligned() {
        let renderer = ReceiptRenderer::default();
        let receipt = renderer.render_bill(&test_order(), PRINTED_AT).unwrap();

        for line in receipt.text.lines() {
            if line.starts_with("TOTAL") {
                // Right edge of the column
                assert_eq!(text_width(line), 32);
                assert!(line.ends_with("€26.50"));
            }
        }
    }

    #[test]
    fn test_kitchen_omits_money() {
        let renderer = ReceiptRenderer::default();
        let receipt = renderer.render_kitchen(&test_order(), PRINTED_AT).unwrap();

        assert!(receipt.text.contains("2x Margherita"));
        assert!(receipt.text.contains("!! ring twice"));
        assert!(!receipt.text.contains('€'));
    }

    #[test]
    fn test_optional_fields_omitted_entirely() {
        let mut order = test_order();
        order.items[0].selected_size = Some("Familiar".to_string());
        order.discount = None;

        let renderer = ReceiptRenderer::default();
        let receipt = renderer.render_bill(&order, PRINTED_AT).unwrap();

        assert!(receipt.text.contains("(Familiar)"));
        // No zero placeholder for the absent discount
        assert!(!receipt.text.contains("Discount"));
    }

    #[test]
    fn test_bill_requires_billing_fields() {
        let mut order = test_order();
        order.delivery_fee = None;
        order.discount = None;
        order.total_amount = None;
        order.payment_method = None;
        order.payment_status = None;

        let renderer = ReceiptRenderer::default();
        assert!(matches!(
            renderer.render_bill(&order, PRINTED_AT),
            Err(RenderError::MissingBilling)
        ));
        // The kitchen ticket still renders
        assert!(renderer.render_kitchen(&order, PRINTED_AT).is_ok());
    }

    #[test]
    fn test_zero_quantity_rejected() {
        let mut order = test_order();
        order.items[0].quantity = 0;

        let renderer = ReceiptRenderer::default();
        assert!(matches!(
            renderer.render_kitchen(&order, PRINTED_AT),
            Err(RenderError::ZeroQuantity(_))
        ));
    }

    #[test]
    fn test_deterministic() {
        let renderer = ReceiptRenderer::default();
        let order = test_order();
        let a = renderer.render_bill(&order, PRINTED_AT).unwrap();
        let b = renderer.render_bill(&order, PRINTED_AT).unwrap();
        assert_eq!(a.text, b.text);
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn test_escpos_ends_with_cut() {
        let renderer = ReceiptRenderer::default();
        let receipt = renderer.render_kitchen(&test_order(), PRINTED_AT).unwrap();
        // GS V 66 n cut-with-feed tail
        assert_eq!(&receipt.bytes[receipt.bytes.len() - 4..], &[0x1D, 0x56, 0x42, 3]);
    }
}
