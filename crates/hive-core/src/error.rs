use thiserror::Error;

use crate::ports::PortError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Ports(#[from] PortError),

    #[error("worker for {identity} already running with pid {pid}")]
    AlreadyRunning { identity: String, pid: u32 },

    #[error("failed to spawn worker for {identity}: {reason}")]
    Spawn { identity: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}
