//! Data models for the printing subsystem

pub mod event;
pub mod order;
pub mod print_job;
pub mod printer;

pub use event::PrintEvent;
pub use order::{Order, OrderItem};
pub use print_job::{
    JobMetadata, JobStatus, JobSummary, JobType, JobTypeSelector, PrintJob, PrinterJobStats,
    QueueSnapshot, QueueStats,
};
pub use printer::{DeviceStatus, PrinterDevice, PrinterDeviceConfig};
