use std::sync::Arc;

use tracing::{info, warn};

use crate::{config::HiveConfig, device::Supervision, mind::Mind, system};

/// Everything the daemon's components share, built once at startup.
#[derive(Clone)]
pub struct HiveContext {
    pub config: Arc<HiveConfig>,
    pub mind: Arc<dyn Mind>,
    pub supervision: Supervision,
}

impl HiveContext {
    /// Registry id of the hive, once registered.
    pub fn hive_id(&self) -> Option<&str> {
        self.supervision.hive_id.as_deref()
    }
}

/// Register the hive host with the mind and send its static statistics.
///
/// Returns the registry id, or `None` when registration failed.
pub async fn register_hive(mind: &dyn Mind, cfg: &HiveConfig) -> Option<String> {
    let details = system::hive_details(cfg);
    let registered = match mind.register(&details).await {
        Ok(r) => r,
        Err(e) => {
            warn!(target: "hive.core.context", error = %e, "hive registration failed");
            return None;
        }
    };
    info!(target: "hive.core.context", hive_id = %registered.id, "hive registered");

    if let Some(version) = &details.operating_system_version
        && let Err(e) = mind.update_os_version(&registered.id, version).await
    {
        warn!(target: "hive.core.context", error = %e, "failed to update os version");
    }
    if let Err(e) = mind
        .push_statistics(&registered.id, &system::registration_statistics(cfg))
        .await
    {
        warn!(target: "hive.core.context", error = %e, "failed to send hive statistics");
    }
    Some(registered.id)
}
