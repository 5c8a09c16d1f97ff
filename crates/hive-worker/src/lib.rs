//! Worker side of the hive: one process per device reserving and running jobs.

mod error;
pub use error::WorkerError;

mod fs;
pub use fs::JobFileSystem;

mod checkout;
pub use checkout::checkout_code;

pub mod diagnostic;

pub mod platform;
pub use platform::{DeviceHealth, PlatformRegistry, ShellPlatform, WorkerPlatform, WorkerSetup};

mod worker;
pub use worker::{KeepRunning, Worker, WorkerOptions};
