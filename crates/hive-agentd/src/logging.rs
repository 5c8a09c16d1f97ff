use hive_core::config::LoggingConfig;
use hive_observe::{LoggerConfig, LoggerError, LoggerFormat};

/// Daemon logger: the main log file when configured, the console otherwise.
pub fn daemon_logger(logging: &LoggingConfig) -> Result<LoggerConfig, LoggerError> {
    let format: LoggerFormat = logging.format.parse()?;
    let cfg = match logging.main_log_path() {
        Some(path) => LoggerConfig::to_file(path, logging.main_level.clone()),
        None => LoggerConfig::console(
            logging
                .console_level
                .clone()
                .unwrap_or_else(|| logging.main_level.clone()),
        ),
    };
    Ok(cfg.with_format(format))
}

/// Worker logger: `<directory>/<pid>.<identity>.log`.
pub fn worker_logger(
    logging: &LoggingConfig,
    pid: u32,
    identity: &str,
) -> Result<LoggerConfig, LoggerError> {
    let format: LoggerFormat = logging.format.parse()?;
    Ok(LoggerConfig::to_file(
        logging.worker_log_path(pid, identity),
        logging.worker_level.clone(),
    )
    .with_format(format))
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use hive_observe::LoggerSink;

    use super::*;

    #[test]
    fn daemon_logs_to_console_by_default() {
        let mut logging = LoggingConfig::default();
        logging.console_level = Some("debug".into());
        let cfg = daemon_logger(&logging).unwrap();
        assert_eq!(cfg.sink, LoggerSink::Stdout);
        assert_eq!(cfg.level, "debug");
    }

    #[test]
    fn daemon_main_file_wins_over_console() {
        let mut logging = LoggingConfig::default();
        logging.main_filename = Some("hive.log".into());
        logging.main_level = "warn".into();
        logging.format = "json".into();
        let cfg = daemon_logger(&logging).unwrap();
        assert_eq!(cfg.sink, LoggerSink::File(PathBuf::from("logs/hive.log")));
        assert_eq!(cfg.level, "warn");
        assert_eq!(cfg.format, LoggerFormat::Json);
    }

    #[test]
    fn worker_logs_to_its_own_file() {
        let mut logging = LoggingConfig::default();
        logging.worker_level = "trace".into();
        let cfg = worker_logger(&logging, 321, "Shell-1").unwrap();
        assert_eq!(cfg.sink, LoggerSink::File(PathBuf::from("logs/321.Shell-1.log")));
        assert_eq!(cfg.level, "trace");
        assert!(!cfg.use_color);
    }

    #[test]
    fn unknown_format_is_an_error() {
        let mut logging = LoggingConfig::default();
        logging.format = "xml".into();
        assert!(matches!(
            daemon_logger(&logging),
            Err(LoggerError::InvalidFormat(_))
        ));
    }
}
