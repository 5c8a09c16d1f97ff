use std::{
    io::IsTerminal,
    path::{Path, PathBuf},
};

use crate::format::LoggerFormat;

/// Where formatted events go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggerSink {
    Stdout,
    /// Appended to; parent directories are created.
    File(PathBuf),
}

impl LoggerSink {
    pub fn path(&self) -> Option<&Path> {
        match self {
            LoggerSink::Stdout => None,
            LoggerSink::File(path) => Some(path),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `hive.worker=debug,info`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
    pub sink: LoggerSink,
}

impl LoggerConfig {
    /// Console logger at `level`; colour only on a terminal.
    pub fn console(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Self::default()
        }
    }

    /// Logger for a process that writes into its own file (daemon main log, worker log).
    pub fn to_file(path: impl Into<PathBuf>, level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            use_color: false,
            sink: LoggerSink::File(path.into()),
            ..Self::default()
        }
    }

    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.format = format;
        self
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color: std::io::stdout().is_terminal(),
            sink: LoggerSink::Stdout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_logger_never_colours() {
        let cfg = LoggerConfig::to_file("logs/1.Shell-1.log", "debug");
        assert!(!cfg.use_color);
        assert_eq!(cfg.sink.path(), Some(Path::new("logs/1.Shell-1.log")));
        assert_eq!(cfg.level, "debug");
    }
}
