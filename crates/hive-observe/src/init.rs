use std::{fs::OpenOptions, path::Path, sync::Mutex};

use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::OffsetTime, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::{
    config::{LoggerConfig, LoggerSink},
    error::LoggerError,
    format::LoggerFormat,
};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the process-wide subscriber described by `cfg`.
///
/// Fails when a subscriber is already installed; each process calls this once.
pub fn logger_init(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = EnvFilter::try_new(&cfg.level)
        .map_err(|_| LoggerError::InvalidLogLevel(cfg.level.clone()))?;
    let layer: BoxedLayer = match cfg.format {
        LoggerFormat::Text => fmt::layer()
            .with_ansi(cfg.use_color && cfg.sink == LoggerSink::Stdout)
            .with_target(cfg.with_targets)
            .with_timer(local_timer())
            .with_writer(make_writer(&cfg.sink)?)
            .with_filter(filter)
            .boxed(),
        LoggerFormat::Json => fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_timer(local_timer())
            .with_writer(make_writer(&cfg.sink)?)
            .with_filter(filter)
            .boxed(),
        LoggerFormat::Journald => journald_layer(filter)?,
    };
    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| {
            let msg = e.to_string();
            if msg.contains("SetGlobalDefaultError") {
                LoggerError::AlreadyInitialized
            } else {
                LoggerError::InitializationFailed(msg)
            }
        })
}

fn local_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn make_writer(sink: &LoggerSink) -> Result<BoxMakeWriter, LoggerError> {
    match sink {
        LoggerSink::Stdout => Ok(BoxMakeWriter::new(std::io::stdout)),
        LoggerSink::File(path) => open_log_file(path).map(BoxMakeWriter::new),
    }
}

fn open_log_file(path: &Path) -> Result<Mutex<std::fs::File>, LoggerError> {
    let to_err = |e: std::io::Error| LoggerError::LogFile {
        path: path.display().to_string(),
        reason: e.to_string(),
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(to_err)?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)?;
    Ok(Mutex::new(file))
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_layer(filter: EnvFilter) -> Result<BoxedLayer, LoggerError> {
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?;
    Ok(layer.with_filter(filter).boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_layer(_filter: EnvFilter) -> Result<BoxedLayer, LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}
