//! Ember Print Server - print-job orchestration for the ordering platform
//!
//! # Architecture overview
//!
//! Reliably turns a completed order into physical kitchen/bill receipts
//! on network thermal printers, without ever letting a printing failure
//! abort order placement:
//!
//! - **Dispatch** (`printing::dispatch`): one stable interface over three
//!   deployment topologies (POS delegation, HTTP relay, direct transport)
//! - **Jobs** (`printing::jobs`): lifecycle, retry/backoff, history, stats
//! - **Queue** (`printing::service` + `printing::worker`): priority queue
//!   processor and device health monitoring over raw sockets
//! - **Rendering** (`printing::renderer`): order -> receipt, text + ESC/POS
//! - **Attempt log** (`printing::oplog`): durable per-attempt record
//! - **Admin API** (`api`): operational surface for dashboards
//!
//! # Module structure
//!
//! ```text
//! print-server/src/
//! ├── core/          # Config, state, server, background tasks
//! ├── printing/      # Renderer, jobs, queue, dispatch, POS, relay
//! ├── api/           # Admin HTTP routes and handlers
//! └── utils/         # Logging
//! ```

pub mod api;
pub mod core;
pub mod printing;
pub mod utils;

// Re-export public types
pub use crate::core::{Config, ConfigError, PrintStrategy, Server, ServerState};
pub use crate::printing::{
    HybridPrintService, PrintJobManager, PrintOutcome, ReceiptRenderer, ThermalPrinterService,
};
pub use crate::utils::{init_logger, init_logger_with_file};

pub fn print_banner() {
    println!(
        r#"
    ______      __
   / ____/___ _/ /_  ___  _____
  / __/ / __ `/ __ \/ _ \/ ___/
 / /___/ / / / /_/ /  __/ /
/_____/_/ /_/_.___/\___/_/
    ____       _       __
   / __ \_____(_)___  / /_
  / /_/ / ___/ / __ \/ __/
 / ____/ /  / / / / / /_
/_/   /_/  /_/_/ /_/\__/
    "#
    );
}
