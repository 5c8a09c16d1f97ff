//! A supervised device and the worker process it owns.

mod protect;
pub use protect::{ProtectGuard, is_protected, protect_path};

use std::{collections::BTreeMap, path::PathBuf, sync::Arc};

use hive_model::{DevicePresence, DeviceStatus};
use tracing::{debug, info, warn};

use crate::{
    error::CoreError,
    ports::PortAllocator,
    process::{ProcessControl, ProcessSignal, WorkerLaunch, is_no_such_process},
};

/// Number of graceful `stop` attempts before the worker is killed outright.
pub const FORCE_KILL_AFTER: u32 = 30;

/// Process-level dependencies of device supervision.
#[derive(Clone)]
pub struct Supervision {
    pub processes: Arc<dyn ProcessControl>,
    /// Directory holding protect sentinels.
    pub pids_dir: PathBuf,
    /// Pid handed to workers as their parent.
    pub parent_pid: u32,
    /// Registry id of this hive, forwarded to workers.
    pub hive_id: Option<String>,
}

/// One physical or virtual test target.
///
/// Equality is by identity only: a rediscovered device with a new status is the same device.
#[derive(Debug, Clone)]
pub struct Device {
    platform: String,
    identity: String,
    device_id: String,
    pub status: DeviceStatus,
    presence: DevicePresence,
    pub ports: PortAllocator,
    attributes: BTreeMap<String, String>,
    worker_pid: Option<u32>,
    stop_count: Option<u32>,
}

impl Device {
    /// `raw_id` must be unique within `platform`; the identity becomes `"<Platform>-<raw_id>"`.
    pub fn new(platform: &str, raw_id: impl Into<String>) -> Self {
        let device_id = raw_id.into();
        Self {
            identity: format!("{}-{}", capitalize(platform), device_id),
            platform: platform.to_string(),
            device_id,
            status: DeviceStatus::None,
            presence: DevicePresence::Device,
            ports: PortAllocator::empty(),
            attributes: BTreeMap::new(),
            worker_pid: None,
            stop_count: None,
        }
    }

    pub fn with_status(mut self, status: DeviceStatus) -> Self {
        self.status = status;
        self
    }

    /// Connection state as enumerated by the platform; devices start out connected.
    pub fn with_presence(mut self, presence: DevicePresence) -> Self {
        self.presence = presence;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn presence(&self) -> &DevicePresence {
        &self.presence
    }

    pub fn is_claimed(&self) -> bool {
        self.status == DeviceStatus::Claimed
    }

    /// Last recorded worker pid, without probing it.
    pub fn recorded_pid(&self) -> Option<u32> {
        self.worker_pid
    }

    /// Worker pid if the worker is still alive; forgets it otherwise.
    pub fn worker_pid(&mut self, sup: &Supervision) -> Option<u32> {
        if !self.is_running(sup) {
            self.worker_pid = None;
        }
        self.worker_pid
    }

    pub fn is_running(&self, sup: &Supervision) -> bool {
        self.worker_pid
            .is_some_and(|pid| sup.processes.is_alive(pid))
    }

    /// Spawn the worker process for this device.
    pub fn start(&mut self, sup: &Supervision) -> Result<u32, CoreError> {
        if let Some(pid) = self.worker_pid
            && sup.processes.is_alive(pid)
        {
            return Err(CoreError::AlreadyRunning {
                identity: self.identity.clone(),
                pid,
            });
        }

        let launch = WorkerLaunch {
            platform: self.platform.clone(),
            identity: self.identity.clone(),
            device_id: self.device_id.clone(),
            ports: self.ports.ports(),
            parent_pid: sup.parent_pid,
            hive_id: sup.hive_id.clone(),
            attributes: self.attributes.clone(),
        };
        let pid = sup
            .processes
            .spawn_worker(&launch)
            .map_err(|e| CoreError::Spawn {
                identity: self.identity.clone(),
                reason: e.to_string(),
            })?;

        self.worker_pid = Some(pid);
        self.stop_count = None;
        info!(target: "hive.core.device", device = %self.identity, pid, "worker started");
        Ok(pid)
    }

    /// Ask the worker to stop. Returns `true` once it is confirmed dead.
    ///
    /// Repeated calls escalate: the first [`FORCE_KILL_AFTER`] attempts send `SIGTERM`,
    /// later ones `SIGKILL`. A protected pid is never signalled.
    pub fn stop(&mut self, sup: &Supervision) -> bool {
        let Some(pid) = self.worker_pid else {
            self.stop_count = None;
            return true;
        };

        if is_protected(&sup.pids_dir, pid) {
            debug!(target: "hive.core.device", device = %self.identity, pid, "worker is protected");
            return false;
        }

        let attempt = self.stop_count.map_or(0, |c| c + 1);
        self.stop_count = Some(attempt);

        if sup.processes.is_alive(pid) {
            let signal = if attempt < FORCE_KILL_AFTER {
                info!(target: "hive.core.device", device = %self.identity, pid, attempt, "terminating worker");
                ProcessSignal::Terminate
            } else {
                info!(target: "hive.core.device", device = %self.identity, pid, attempt, "killing worker");
                ProcessSignal::Kill
            };
            if let Err(e) = sup.processes.signal(pid, signal)
                && !is_no_such_process(&e)
            {
                warn!(target: "hive.core.device", device = %self.identity, pid, error = %e, "failed to signal worker");
            }
        }

        if sup.processes.is_alive(pid) {
            false
        } else {
            self.worker_pid = None;
            self.stop_count = None;
            true
        }
    }
}

impl PartialEq for Device {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for Device {}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProcesses;

    fn supervision(processes: Arc<FakeProcesses>, dir: &std::path::Path) -> Supervision {
        Supervision {
            processes,
            pids_dir: dir.to_path_buf(),
            parent_pid: 1,
            hive_id: None,
        }
    }

    #[test]
    fn identity_is_platform_prefixed_and_drives_equality() {
        let a = Device::new("shell", "1").with_status(DeviceStatus::Idle);
        let b = Device::new("shell", "1").with_status(DeviceStatus::Claimed);
        assert_eq!(a.identity(), "Shell-1");
        assert_eq!(a, b);
        assert_ne!(a, Device::new("shell", "2"));
    }

    #[test]
    fn start_records_pid_and_refuses_double_start() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::default());
        let sup = supervision(procs.clone(), dir.path());
        let mut device = Device::new("shell", "1");

        let pid = device.start(&sup).unwrap();
        assert!(device.is_running(&sup));
        assert!(matches!(
            device.start(&sup),
            Err(CoreError::AlreadyRunning { .. })
        ));
        assert_eq!(procs.spawned().len(), 1);
        assert_eq!(device.worker_pid(&sup), Some(pid));
    }

    #[test]
    fn stop_on_dead_worker_returns_true_without_signals() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::default());
        let sup = supervision(procs.clone(), dir.path());
        let mut device = Device::new("shell", "1");
        let pid = device.start(&sup).unwrap();
        procs.kill_silently(pid);

        assert!(device.stop(&sup));
        assert!(procs.signals().is_empty());
        assert_eq!(device.recorded_pid(), None);
    }

    #[test]
    fn stop_escalates_to_kill_after_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::stubborn());
        let sup = supervision(procs.clone(), dir.path());
        let mut device = Device::new("shell", "1");
        let pid = device.start(&sup).unwrap();

        for _ in 0..FORCE_KILL_AFTER {
            assert!(!device.stop(&sup));
        }
        assert!(
            procs
                .signals()
                .iter()
                .all(|(p, s)| *p == pid && *s == ProcessSignal::Terminate)
        );
        assert_eq!(procs.signals().len(), FORCE_KILL_AFTER as usize);

        assert!(!device.stop(&sup));
        assert_eq!(procs.signals().last(), Some(&(pid, ProcessSignal::Kill)));
    }

    #[test]
    fn graceful_stop_succeeds_when_worker_exits() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::default());
        let sup = supervision(procs.clone(), dir.path());
        let mut device = Device::new("shell", "1");
        let pid = device.start(&sup).unwrap();

        assert!(device.stop(&sup));
        assert_eq!(procs.signals(), vec![(pid, ProcessSignal::Terminate)]);
        assert!(!device.is_running(&sup));
    }

    #[test]
    fn protected_worker_is_never_signalled() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::stubborn());
        let sup = supervision(procs.clone(), dir.path());
        let mut device = Device::new("shell", "1");
        let pid = device.start(&sup).unwrap();

        for _ in 0..(FORCE_KILL_AFTER + 5) {
            assert!(!device.stop(&sup));
        }
        let guard = ProtectGuard::acquire(dir.path(), pid).unwrap();
        let sent = procs.signals().len();
        for _ in 0..3 {
            assert!(!device.stop(&sup));
        }
        assert_eq!(procs.signals().len(), sent);
        drop(guard);
        assert!(!device.stop(&sup));
        assert_eq!(procs.signals().len(), sent + 1);
    }

    #[test]
    fn claimed_reflects_status() {
        let device = Device::new("shell", "1").with_status(DeviceStatus::Claimed);
        assert!(device.is_claimed());
        assert!(!Device::new("shell", "1").is_claimed());
    }
}
