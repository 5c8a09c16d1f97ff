mod error;
pub use error::CoreError;

pub mod config;
pub use config::HiveConfig;

pub mod controller;
pub use controller::{Controller, ControllerOptions, DetectionError};

pub mod device;
pub use device::{Device, Supervision};

pub mod mind;
pub use mind::{Mind, MindError};

pub mod ports;
pub use ports::{Port, PortAllocator, PortError};

pub mod process;
pub use process::{OsProcessControl, ProcessControl, ProcessSignal, WorkerLaunch};

mod context;
pub use context::{HiveContext, register_hive};

pub mod register;
pub use register::Register;

pub mod system;

#[cfg(test)]
mod testing;
