//! Clients for the device registry and the job scheduler.

mod http;
pub use http::HttpMind;

mod offline;
pub use offline::OfflineMind;

use std::sync::Arc;

use hive_core::{Mind, MindError, config::NetworkConfig};
use tracing::info;

/// HTTP client when a registry URL is configured, the offline stand-in otherwise.
pub fn connect(cfg: &NetworkConfig) -> Result<Arc<dyn Mind>, MindError> {
    if cfg.hive_mind.is_none() {
        info!(target: "hive.mind", "no registry configured, running offline");
        return Ok(Arc::new(OfflineMind));
    }
    Ok(Arc::new(HttpMind::new(cfg)?))
}
