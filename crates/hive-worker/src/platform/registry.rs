use std::collections::BTreeMap;

use hive_core::{
    Controller, ControllerOptions, CoreError, HiveConfig,
    controller::{SHELL_PLATFORM, ShellController},
};
use tracing::info;

use super::{ShellPlatform, WorkerPlatform, WorkerSetup};
use crate::error::WorkerError;

pub type ControllerFactory = fn(&ControllerOptions) -> Box<dyn Controller>;
pub type WorkerFactory = fn(WorkerSetup) -> Box<dyn WorkerPlatform>;

/// Maps a platform tag to its controller and worker constructors.
#[derive(Default)]
pub struct PlatformRegistry {
    entries: BTreeMap<&'static str, (ControllerFactory, WorkerFactory)>,
}

impl PlatformRegistry {
    /// Registry with every platform shipped in this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register(
            SHELL_PLATFORM,
            |opts| Box::new(ShellController::new(opts)),
            |setup| Box::new(ShellPlatform::new(setup)),
        );
        registry
    }

    pub fn register(
        &mut self,
        tag: &'static str,
        controller: ControllerFactory,
        worker: WorkerFactory,
    ) {
        self.entries.insert(tag, (controller, worker));
    }

    /// One controller per entry of the `controllers` config section.
    pub fn controllers(&self, cfg: &HiveConfig) -> Result<Vec<Box<dyn Controller>>, CoreError> {
        cfg.controllers
            .iter()
            .map(|(tag, opts)| {
                let (make, _) = self
                    .entries
                    .get(tag.as_str())
                    .ok_or_else(|| CoreError::UnknownPlatform(tag.clone()))?;
                info!(target: "hive.worker.platform", platform = %tag, "adding controller");
                Ok(make(opts))
            })
            .collect()
    }

    pub fn worker(&self, tag: &str, setup: WorkerSetup) -> Result<Box<dyn WorkerPlatform>, WorkerError> {
        let (_, make) = self
            .entries
            .get(tag)
            .ok_or_else(|| WorkerError::UnknownPlatform(tag.to_string()))?;
        Ok(make(setup))
    }
}
