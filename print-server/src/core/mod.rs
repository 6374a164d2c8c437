//! Core module - server configuration, state and errors
//!
//! # Structure
//!
//! - [`Config`] - environment-resolved configuration
//! - [`ServerState`] - shared service handles
//! - [`Server`] - HTTP server + background tasks
//! - [`ServerError`] - admin API error type

pub mod config;
pub mod error;
pub mod server;
pub mod state;
pub mod tasks;

pub use config::{Config, ConfigError, PrintStrategy};
pub use error::{Result, ServerError};
pub use server::Server;
pub use state::ServerState;
pub use tasks::{BackgroundTasks, TaskKind};
