//! Fleet-wide reconciliation of detected devices against supervised workers.

mod reconcile;
mod workspaces;
pub use workspaces::clear_workspaces;

use std::collections::BTreeMap;

use hive_model::Statistic;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    context::HiveContext, controller::Controller, device::Device, error::CoreError,
    ports::PortAllocator, system,
};

/// Component name used for the registry-side log buffer of the daemon.
pub const REGISTER_COMPONENT: &str = "Hive core";

/// Owns the device set of every controller and the shared port pool.
pub struct Register {
    ctx: HiveContext,
    controllers: Vec<Box<dyn Controller>>,
    devices: BTreeMap<String, Vec<Device>>,
    ports: PortAllocator,
    next_stat_update: Option<Instant>,
}

impl Register {
    pub fn new(ctx: HiveContext, controllers: Vec<Box<dyn Controller>>) -> Result<Self, CoreError> {
        let ports = ctx.config.port_pool()?;
        for c in &controllers {
            info!(target: "hive.core.register", platform = c.platform(), "adding controller");
        }
        Ok(Self {
            ctx,
            controllers,
            devices: BTreeMap::new(),
            ports,
            next_stat_update: None,
        })
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values().flatten()
    }

    /// Last known worker pids of all devices.
    pub fn worker_pids(&self) -> Vec<u32> {
        self.devices().filter_map(Device::recorded_pid).collect()
    }

    pub fn ports(&self) -> &PortAllocator {
        &self.ports
    }

    /// Main loop; returns after `shutdown` is cancelled.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(target: "hive.core.register", "register loop started");
        let interval = self.ctx.config.timings.controller_loop();
        loop {
            self.poll().await;
            self.housekeeping(Instant::now()).await;
            self.check_controllers().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(interval) => {}
            }

            self.clear_mind_logs().await;
        }
        self.stop_all();
        info!(target: "hive.core.register", "register loop stopped");
    }

    /// One reconciliation pass over every controller.
    ///
    /// A failing controller is logged and its devices are left untouched.
    pub async fn check_controllers(&mut self) {
        for controller in &self.controllers {
            let platform = controller.platform();
            debug!(target: "hive.core.register", platform, "checking controller");
            let detected = match controller.detect().await {
                Ok(d) => d,
                Err(e) => {
                    warn!(target: "hive.core.register", platform, error = %e, "device detection failed");
                    continue;
                }
            };
            let tracked = self.devices.entry(platform.to_string()).or_default();
            reconcile::reconcile(
                tracked,
                detected,
                controller.port_range_size(),
                &mut self.ports,
                &self.ctx.supervision,
            );
            debug!(target: "hive.core.register", platform, devices = tracked.len(), "controller checked");
        }
    }

    /// Workspace cleanup and the periodic statistics push.
    ///
    /// The push is due at an absolute instant; after firing it is rescheduled from `now`,
    /// so a late iteration never causes catch-up pushes.
    pub async fn housekeeping(&mut self, now: Instant) {
        let logging = &self.ctx.config.logging;
        clear_workspaces(&logging.home, logging.homes_to_keep);

        let Some(interval) = self.ctx.config.timings.stats_update() else {
            return;
        };
        let due = *self.next_stat_update.get_or_insert(now);
        if due > now {
            return;
        }
        self.send_statistics().await;
        self.next_stat_update = Some(now + interval);
    }

    async fn send_statistics(&self) {
        let Some(hive_id) = self.ctx.hive_id() else {
            debug!(target: "hive.core.register", "hive not registered, statistics skipped");
            return;
        };
        let Some(load) = system::load_average() else {
            return;
        };
        let stats = [Statistic::float("Load average", load)];
        if let Err(e) = self.ctx.mind.push_statistics(hive_id, &stats).await {
            warn!(target: "hive.core.register", error = %e, "failed to send statistics");
        }
    }

    async fn poll(&self) {
        let Some(hive_id) = self.ctx.hive_id() else {
            return;
        };
        match self.ctx.mind.poll(&[hive_id.to_string()]).await {
            Ok(()) => debug!(target: "hive.core.register", "polled hive"),
            Err(e) => warn!(target: "hive.core.register", error = %e, "hive polling failed"),
        }
    }

    async fn clear_mind_logs(&self) {
        let Some(hive_id) = self.ctx.hive_id() else {
            return;
        };
        let level = &self.ctx.config.logging.hm_logs_to_delete;
        if let Err(e) = self
            .ctx
            .mind
            .clear_logs(hive_id, REGISTER_COMPONENT, level)
            .await
        {
            debug!(target: "hive.core.register", error = %e, "failed to clear registry logs");
        }
    }

    /// Ask every worker to stop once. Workers also exit on their own when the daemon dies.
    fn stop_all(&mut self) {
        let sup = &self.ctx.supervision;
        for device in self.devices.values_mut().flatten() {
            if device.recorded_pid().is_some() && !device.stop(sup) {
                debug!(target: "hive.core.register", device = %device.identity(), "worker still running at shutdown");
            }
        }
    }
}
