//! # ember-printer
//!
//! ESC/POS thermal printer library - low-level printing capabilities only.
//!
//! ## Scope
//!
//! This crate handles HOW to print:
//! - ESC/POS command building (the subset receipts need)
//! - Windows-1252 encoding for Western-European receipt text
//! - Network printing (TCP port 9100) with explicit transport outcomes
//! - Reachability probing
//!
//! Business logic (WHAT to print) stays in application code:
//! - Kitchen ticket / bill rendering -> print-server
//!
//! ## Example
//!
//! ```ignore
//! use ember_printer::{EscPosBuilder, NetworkPrinter};
//!
//! // Build ESC/POS content
//! let mut builder = EscPosBuilder::new(32);
//! builder.center();
//! builder.double_size();
//! builder.line("KITCHEN");
//! builder.reset_size();
//! builder.sep_double();
//! builder.left();
//! builder.line("Order ORD000123");
//! builder.cut_feed(3);
//!
//! // Send to network printer
//! let printer = NetworkPrinter::new("192.168.1.50", 9100)?;
//! let outcome = printer.send(&builder.build()).await?;
//! assert!(outcome.is_success());
//! ```

mod encoding;
mod error;
mod escpos;
mod transport;

// Re-exports
pub use encoding::{encode_cp1252, encode_payload, pad_text, text_width, truncate_text};
pub use error::{PrintError, PrintResult};
pub use escpos::EscPosBuilder;
pub use transport::{NetworkPrinter, TransportOutcome};
