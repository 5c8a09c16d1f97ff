//! The per-device worker process: queue refresh, health gate, reservation and execution.

mod abort;
mod job;
mod keep_running;
pub use keep_running::KeepRunning;

use std::{fs, sync::Arc, time::Duration};

use hive_core::{
    HiveConfig, Mind,
    device::ProtectGuard,
    process::pid_alive,
};
use hive_model::{Job, QueueName, ReservationDetails};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    diagnostic::DiagnosticRunner,
    error::WorkerError,
    platform::{DeviceHealth, WorkerPlatform, normalize_queue_names},
};

/// Process-level facts handed to a worker at spawn time.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub identity: String,
    pub parent_pid: u32,
    pub hive_id: Option<String>,
    /// Pid of this worker process.
    pub pid: u32,
}

pub struct Worker {
    config: Arc<HiveConfig>,
    mind: Arc<dyn Mind>,
    platform: Box<dyn WorkerPlatform>,
    diagnostics: Option<DiagnosticRunner>,
    opts: WorkerOptions,
    /// Registry id of the device, once registered.
    device_id: Option<String>,
    queues: Vec<QueueName>,
    /// Length of one `job_timeout` unit.
    timeout_unit: Duration,
}

impl Worker {
    pub fn new(
        config: Arc<HiveConfig>,
        mind: Arc<dyn Mind>,
        platform: Box<dyn WorkerPlatform>,
        opts: WorkerOptions,
    ) -> Self {
        let diagnostics = DiagnosticRunner::from_config(platform.platform(), &config);
        Self {
            config,
            mind,
            platform,
            diagnostics,
            opts,
            device_id: None,
            queues: Vec::new(),
            timeout_unit: Duration::from_secs(60),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: DiagnosticRunner) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    #[cfg(test)]
    pub(crate) fn with_timeout_unit(mut self, unit: Duration) -> Self {
        self.timeout_unit = unit;
        self
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn queues(&self) -> &[QueueName] {
        &self.queues
    }

    /// Register the device with the mind. Failure leaves the worker unregistered.
    pub async fn register(&mut self) {
        match self.mind.register(&self.platform.mind_identifiers()).await {
            Ok(registered) => {
                info!(target: "hive.worker", device_id = %registered.id, "device registered");
                self.device_id = Some(registered.id);
            }
            Err(e) => warn!(target: "hive.worker", error = %e, "device registration failed"),
        }
    }

    /// Loop until the parent dies or `shutdown` is cancelled.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(target: "hive.worker", identity = %self.opts.identity, "starting worker");
        let interval = self.config.timings.worker_loop();
        while self.keep_worker_running() && !shutdown.is_cancelled() {
            match self.iteration(&shutdown).await {
                Ok(()) => {}
                Err(WorkerError::Terminated) => break,
                Err(e @ WorkerError::DeviceNotReady(_)) => {
                    warn!(target: "hive.worker", error = %e, "device not ready")
                }
                Err(e) => warn!(target: "hive.worker", error = %e, "worker loop aborted"),
            }
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = sleep(interval) => {}
            }
        }
        info!(target: "hive.worker", "exiting worker");
    }

    async fn iteration(&mut self, shutdown: &CancellationToken) -> Result<(), WorkerError> {
        self.clear_mind_logs().await;
        self.update_queues().await;
        if self.diagnostics().await? {
            self.poll_queue(shutdown).await?;
        }
        Ok(())
    }

    fn keep_worker_running(&self) -> bool {
        if pid_alive(self.opts.parent_pid) {
            return true;
        }
        info!(target: "hive.worker", parent = self.opts.parent_pid, "parent process is dead");
        false
    }

    async fn clear_mind_logs(&self) {
        let Some(device_id) = &self.device_id else {
            return;
        };
        let level = &self.config.logging.hm_logs_to_delete;
        if let Err(e) = self
            .mind
            .clear_logs(device_id, &self.opts.identity, level)
            .await
        {
            debug!(target: "hive.worker", error = %e, "failed to clear registry logs");
        }
    }

    /// Autogenerated queues plus the registry's, then snapshot them to disk.
    pub async fn update_queues(&mut self) {
        let mut queues = self.platform.autogenerated_queues();
        if let Some(device_id) = &self.device_id {
            match self.mind.hive_queues(device_id).await {
                Ok(assigned) => queues.extend(assigned),
                Err(e) => warn!(target: "hive.worker", error = %e, "failed to fetch queues"),
            }
        }
        let mut unique: Vec<QueueName> = Vec::with_capacity(queues.len());
        for q in queues {
            if !unique.contains(&q) {
                unique.push(q);
            }
        }
        debug!(target: "hive.worker", queues = ?unique, "full list of queues");
        self.queues = unique;
        self.write_queue_snapshot();
    }

    fn write_queue_snapshot(&self) {
        let path = self.config.logging.queue_snapshot_path(self.opts.pid);
        let written = serde_json::to_vec_pretty(&self.queues)
            .map_err(|e| e.to_string())
            .and_then(|body| fs::write(&path, body).map_err(|e| e.to_string()));
        if let Err(e) = written {
            debug!(target: "hive.worker", path = %path.display(), error = %e, "failed to write queue snapshot");
        }
    }

    /// Run diagnostics under a protect sentinel, then gate on device status.
    ///
    /// Returns whether diagnostics passed; a device that is not happy is an error.
    async fn diagnostics(&mut self) -> Result<bool, WorkerError> {
        let passed = {
            let _guard = ProtectGuard::acquire(self.config.logging.pids_dir(), self.opts.pid)
                .inspect_err(|e| warn!(target: "hive.worker", error = %e, "failed to protect worker"))
                .ok();
            match &self.diagnostics {
                Some(runner) => runner.run().await,
                None => true,
            }
        };
        if !passed {
            info!(target: "hive.worker", "diagnostics failed");
        }

        let mut status = self.platform.device_status();
        if status == DeviceHealth::Busy {
            status = self.platform.set_device_status(DeviceHealth::Happy);
        }
        if status != DeviceHealth::Happy {
            return Err(WorkerError::DeviceNotReady(status.to_string()));
        }
        Ok(passed)
    }

    async fn poll_queue(&mut self, shutdown: &CancellationToken) -> Result<(), WorkerError> {
        let Some(job) = self.reserve_job().await? else {
            info!(target: "hive.worker", "no job found");
            return Ok(());
        };
        info!(target: "hive.worker", job = %job.job_id, "job starting");
        let result = self.execute_job(&job, shutdown).await;
        self.platform.cleanup();
        match result {
            Ok(success) => info!(target: "hive.worker", job = %job.job_id, success, "job finished"),
            Err(WorkerError::Terminated) => return Err(WorkerError::Terminated),
            Err(e) => info!(target: "hive.worker", job = %job.job_id, error = %e, "error running test"),
        }
        Ok(())
    }

    /// Reserve one job from the current queues. A malformed job is an error.
    pub async fn reserve_job(&self) -> Result<Option<Job>, WorkerError> {
        info!(target: "hive.worker", queues = ?self.queues, "trying to reserve job");
        let details = ReservationDetails {
            hive_id: self.opts.hive_id.clone(),
            worker_pid: self.opts.pid,
            device_id: self.device_id.clone(),
        };
        debug!(target: "hive.worker", ?details, "reservation details");
        let job = self.mind.reserve_job(&self.queues, &details).await?;
        if let Some(job) = &job {
            job.validate()?;
        }
        Ok(job)
    }
}
