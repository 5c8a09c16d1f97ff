//! Logging bootstrap shared by the hive daemon and its worker processes.

mod config;
pub use config::{LoggerConfig, LoggerSink};

mod error;
pub use error::LoggerError;

mod format;
pub use format::LoggerFormat;

mod init;
pub use init::logger_init;
