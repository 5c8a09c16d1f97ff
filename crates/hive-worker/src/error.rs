use hive_core::{CoreError, MindError, PortError};
use hive_exec::ExecError;
use hive_model::ModelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("registry call failed: {0}")]
    Mind(#[from] MindError),

    #[error("execution failed: {0}")]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Ports(#[from] PortError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid job reserved: {0}")]
    InvalidJobReservation(#[from] ModelError),

    #[error("current device status: '{0}'")]
    DeviceNotReady(String),

    #[error("unable to checkout repository {repository} using {branch}: {reason}")]
    Checkout {
        repository: String,
        branch: String,
        reason: String,
    },

    #[error("errors raised by execution script, see errors file")]
    ScriptErrors,

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("worker terminated")]
    Terminated,

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for WorkerError {
    fn from(e: std::io::Error) -> Self {
        WorkerError::Io(e.to_string())
    }
}
