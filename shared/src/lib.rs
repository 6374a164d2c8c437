//! Shared types for the Ember printing subsystem
//!
//! Data model used across the print server and its admin clients:
//! order payloads, print job records, printer device state and
//! print lifecycle events.

pub mod models;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
