//! Order Model
//!
//! Read-only view of a placed order as the printing pipeline receives it.
//! Orders are owned by the surrounding platform; this subsystem only
//! renders them onto paper.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A single ordered line item
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    #[validate(length(min = 1, message = "item name is required"))]
    pub name: String,
    #[validate(range(min = 1, message = "quantity must be positive"))]
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl OrderItem {
    /// Line total (price x quantity)
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// A placed order (external, read-only)
///
/// Kitchen tickets need the item list and fulfillment fields; bills
/// additionally need the monetary breakdown and payment fields.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[validate(length(min = 1, message = "order number is required"))]
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    #[validate(length(min = 1, message = "order has no items"), nested)]
    pub items: Vec<OrderItem>,
    pub delivery_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,

    // -- Bill fields (absent for kitchen-only flows) --
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_fee: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<String>,
}

impl Order {
    /// Sum of all line totals
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(|i| i.line_total()).sum()
    }

    /// Whether the order carries any billing information at all
    pub fn has_billing(&self) -> bool {
        self.delivery_fee.is_some()
            || self.discount.is_some()
            || self.total_amount.is_some()
            || self.payment_method.is_some()
            || self.payment_status.is_some()
    }
}
