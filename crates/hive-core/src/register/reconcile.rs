use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::{
    device::{Device, Supervision},
    ports::PortAllocator,
};

/// Reconcile one platform's tracked devices against a fresh detection result.
///
/// Devices whose presence rules them out (offline, unauthorized, ...) count as not
/// detected. Devices are matched by identity. A rediscovered device only takes the new status.
/// A new device gets `range_size` ports from `pool`. A vanished device is stopped and
/// only forgotten, with its ports returned, once the stop is confirmed. Finally every
/// tracked device gets a worker unless it is claimed, in which case its worker is stopped.
pub(crate) fn reconcile(
    tracked: &mut Vec<Device>,
    detected: Vec<Device>,
    range_size: usize,
    pool: &mut PortAllocator,
    sup: &Supervision,
) {
    let mut seen: HashSet<String> = HashSet::with_capacity(detected.len());
    let mut fresh: Vec<Device> = Vec::new();

    for mut candidate in detected {
        if !candidate.presence().is_present() {
            debug!(target: "hive.core.register", device = %candidate.identity(), presence = ?candidate.presence(), "device not present, skipped");
            continue;
        }
        if !seen.insert(candidate.identity().to_string()) {
            continue;
        }
        if let Some(existing) = tracked.iter_mut().find(|d| **d == candidate) {
            existing.status = candidate.status;
            continue;
        }
        match pool.allocate_port_range(range_size) {
            Ok(range) => {
                candidate.ports = range;
                info!(target: "hive.core.register", device = %candidate.identity(), ports = ?candidate.ports.ports(), "new device");
                fresh.push(candidate);
            }
            Err(e) => {
                warn!(target: "hive.core.register", device = %candidate.identity(), error = %e, "cannot allocate ports, device skipped");
            }
        }
    }

    let mut lingering: HashSet<String> = HashSet::new();
    tracked.retain_mut(|device| {
        if seen.contains(device.identity()) {
            return true;
        }
        if device.stop(sup) {
            pool.release_port_range(&device.ports);
            info!(target: "hive.core.register", device = %device.identity(), "device removed");
            false
        } else {
            debug!(target: "hive.core.register", device = %device.identity(), "stale device still running");
            lingering.insert(device.identity().to_string());
            true
        }
    });

    tracked.extend(fresh);

    for device in tracked.iter_mut() {
        if lingering.contains(device.identity()) {
            continue;
        }
        if device.is_claimed() {
            if device.is_running(sup) {
                info!(target: "hive.core.register", device = %device.identity(), "device claimed, stopping worker");
                device.stop(sup);
            }
        } else if !device.is_running(sup)
            && let Err(e) = device.start(sup)
        {
            warn!(target: "hive.core.register", device = %device.identity(), error = %e, "failed to start worker");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, sync::Arc};

    use hive_model::{DevicePresence, DeviceStatus};

    use super::*;
    use crate::{
        device::ProtectGuard,
        process::ProcessSignal,
        testing::FakeProcesses,
    };

    fn sup(procs: Arc<FakeProcesses>, dir: &Path) -> Supervision {
        Supervision {
            processes: procs,
            pids_dir: dir.to_path_buf(),
            parent_pid: 1,
            hive_id: Some("hive-1".into()),
        }
    }

    fn shell(id: &str, status: DeviceStatus) -> Device {
        Device::new("shell", id).with_status(status)
    }

    #[test]
    fn new_device_gets_ports_and_worker() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::default());
        let sup = sup(procs.clone(), dir.path());
        let mut pool = PortAllocator::from_range(4000, 4009).unwrap();
        let mut tracked = Vec::new();

        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Idle)], 4, &mut pool, &sup);

        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].ports.ports(), vec![4000, 4001, 4002, 4003]);
        assert_eq!(pool.available_count(), 6);
        assert!(tracked[0].is_running(&sup));
        let launch = &procs.spawned()[0];
        assert_eq!(launch.ports, vec![4000, 4001, 4002, 4003]);
        assert_eq!(launch.hive_id.as_deref(), Some("hive-1"));
    }

    #[test]
    fn rediscovered_device_keeps_pid_and_ports() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::default());
        let sup = sup(procs.clone(), dir.path());
        let mut pool = PortAllocator::from_range(4000, 4009).unwrap();
        let mut tracked = Vec::new();

        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Idle)], 2, &mut pool, &sup);
        let pid = tracked[0].recorded_pid();
        let ports = tracked[0].ports.clone();

        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Busy)], 2, &mut pool, &sup);

        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].status, DeviceStatus::Busy);
        assert_eq!(tracked[0].recorded_pid(), pid);
        assert_eq!(tracked[0].ports, ports);
        assert_eq!(procs.spawned().len(), 1);
        assert!(procs.signals().is_empty());
    }

    #[test]
    fn stale_device_is_removed_after_stop() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::default());
        let sup = sup(procs.clone(), dir.path());
        let mut pool = PortAllocator::from_range(4000, 4009).unwrap();
        let before = pool.clone();
        let mut tracked = Vec::new();

        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Idle)], 4, &mut pool, &sup);
        reconcile(&mut tracked, Vec::new(), 4, &mut pool, &sup);

        assert!(tracked.is_empty());
        assert_eq!(pool, before);
        assert_eq!(procs.signals().len(), 1);
    }

    #[test]
    fn unstoppable_stale_device_keeps_its_ports() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::stubborn());
        let sup = sup(procs.clone(), dir.path());
        let mut pool = PortAllocator::from_range(4000, 4003).unwrap();
        let mut tracked = Vec::new();

        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Idle)], 4, &mut pool, &sup);
        let pid = tracked[0].recorded_pid().unwrap();
        let _guard = ProtectGuard::acquire(dir.path(), pid).unwrap();

        for _ in 0..3 {
            reconcile(&mut tracked, Vec::new(), 4, &mut pool, &sup);
        }

        assert_eq!(tracked.len(), 1);
        assert_eq!(pool.available_count(), 0);
        assert!(procs.signals().is_empty());
        assert_eq!(procs.spawned().len(), 1);
    }

    #[test]
    fn claimed_device_worker_is_stopped_and_not_restarted() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::default());
        let sup = sup(procs.clone(), dir.path());
        let mut pool = PortAllocator::from_range(4000, 4009).unwrap();
        let mut tracked = Vec::new();

        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Idle)], 1, &mut pool, &sup);
        let pid = tracked[0].recorded_pid().unwrap();
        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Claimed)], 1, &mut pool, &sup);
        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Claimed)], 1, &mut pool, &sup);

        assert_eq!(procs.signals(), vec![(pid, ProcessSignal::Terminate)]);
        assert_eq!(procs.spawned().len(), 1);
        assert_eq!(tracked.len(), 1);
        assert!(!tracked[0].is_running(&sup));

        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Idle)], 1, &mut pool, &sup);
        assert_eq!(procs.spawned().len(), 2);
    }

    #[test]
    fn exhausted_pool_skips_device_until_ports_free_up() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::default());
        let sup = sup(procs.clone(), dir.path());
        let mut pool = PortAllocator::from_range(4000, 4003).unwrap();
        let mut tracked = Vec::new();

        reconcile(
            &mut tracked,
            vec![shell("1", DeviceStatus::Idle), shell("2", DeviceStatus::Idle)],
            3,
            &mut pool,
            &sup,
        );
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].identity(), "Shell-1");

        // Shell-1 leaves; its ports only return after the allocation step of this pass.
        reconcile(&mut tracked, vec![shell("2", DeviceStatus::Idle)], 3, &mut pool, &sup);
        assert!(tracked.is_empty());
        assert_eq!(pool.available_count(), 4);

        reconcile(&mut tracked, vec![shell("2", DeviceStatus::Idle)], 3, &mut pool, &sup);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].identity(), "Shell-2");
    }

    #[test]
    fn dead_worker_is_restarted() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::default());
        let sup = sup(procs.clone(), dir.path());
        let mut pool = PortAllocator::empty();
        let mut tracked = Vec::new();

        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Idle)], 0, &mut pool, &sup);
        procs.kill_silently(tracked[0].recorded_pid().unwrap());
        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Idle)], 0, &mut pool, &sup);

        assert_eq!(procs.spawned().len(), 2);
        assert!(tracked[0].is_running(&sup));
    }

    #[test]
    fn absent_devices_are_neither_tracked_nor_kept() {
        let dir = tempfile::tempdir().unwrap();
        let procs = Arc::new(FakeProcesses::default());
        let sup = sup(procs.clone(), dir.path());
        let mut pool = PortAllocator::from_range(4000, 4009).unwrap();
        let before = pool.clone();
        let mut tracked = Vec::new();

        let unauthorized = shell("2", DeviceStatus::Idle).with_presence(DevicePresence::Unauthorized);
        reconcile(&mut tracked, vec![shell("1", DeviceStatus::Idle), unauthorized], 2, &mut pool, &sup);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked[0].identity(), "Shell-1");
        assert_eq!(procs.spawned().len(), 1);

        let offline = shell("1", DeviceStatus::Idle).with_presence(DevicePresence::Offline);
        reconcile(&mut tracked, vec![offline], 2, &mut pool, &sup);

        assert!(tracked.is_empty());
        assert_eq!(pool, before);
        assert_eq!(procs.signals().len(), 1);
    }
}
