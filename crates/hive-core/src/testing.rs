//! Hand-written fakes shared by the unit tests of this crate.

use std::{
    collections::BTreeSet,
    io,
    sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use hive_model::{
    DeviceDetails, Job, JobId, QueueName, RegisteredDevice, ReservationDetails, Statistic,
};

use crate::{
    controller::{Controller, DetectionError},
    device::Device,
    mind::{Mind, MindError},
    process::{ProcessControl, ProcessSignal, WorkerLaunch},
};

#[derive(Default)]
struct ProcState {
    next_pid: u32,
    alive: BTreeSet<u32>,
    spawned: Vec<WorkerLaunch>,
    signals: Vec<(u32, ProcessSignal)>,
}

/// In-memory process table. Signalled processes die unless the fake is stubborn.
#[derive(Default)]
pub struct FakeProcesses {
    state: Mutex<ProcState>,
    stubborn: bool,
}

impl FakeProcesses {
    pub fn stubborn() -> Self {
        Self {
            stubborn: true,
            ..Self::default()
        }
    }

    pub fn kill_silently(&self, pid: u32) {
        self.state.lock().unwrap().alive.remove(&pid);
    }

    pub fn spawned(&self) -> Vec<WorkerLaunch> {
        self.state.lock().unwrap().spawned.clone()
    }

    pub fn signals(&self) -> Vec<(u32, ProcessSignal)> {
        self.state.lock().unwrap().signals.clone()
    }
}

impl ProcessControl for FakeProcesses {
    fn spawn_worker(&self, launch: &WorkerLaunch) -> io::Result<u32> {
        let mut st = self.state.lock().unwrap();
        st.next_pid += 1;
        let pid = 10_000 + st.next_pid;
        st.alive.insert(pid);
        st.spawned.push(launch.clone());
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        self.state.lock().unwrap().alive.contains(&pid)
    }

    fn signal(&self, pid: u32, signal: ProcessSignal) -> io::Result<()> {
        let mut st = self.state.lock().unwrap();
        st.signals.push((pid, signal));
        if !self.stubborn {
            st.alive.remove(&pid);
        }
        Ok(())
    }
}

/// Controller returning a scripted device list; `None` simulates a detection failure.
pub struct FakeController {
    pub platform: &'static str,
    pub range: usize,
    pub next: Mutex<Option<Vec<Device>>>,
}

impl FakeController {
    pub fn new(platform: &'static str, range: usize) -> Self {
        Self {
            platform,
            range,
            next: Mutex::new(Some(Vec::new())),
        }
    }

    pub fn set(&self, devices: Option<Vec<Device>>) {
        *self.next.lock().unwrap() = devices;
    }
}

#[async_trait]
impl Controller for FakeController {
    fn platform(&self) -> &str {
        self.platform
    }

    fn port_range_size(&self) -> usize {
        self.range
    }

    async fn detect(&self) -> Result<Vec<Device>, DetectionError> {
        self.next
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| DetectionError::Failed {
                platform: self.platform.to_string(),
                reason: "scripted failure".into(),
            })
    }
}

/// Mind recording the calls the register makes.
#[derive(Default)]
pub struct RecordingMind {
    pub polls: AtomicUsize,
    pub stats: Mutex<Vec<Statistic>>,
    pub cleared: AtomicUsize,
}

#[async_trait]
impl Mind for RecordingMind {
    async fn register(&self, _details: &DeviceDetails) -> Result<RegisteredDevice, MindError> {
        Ok(RegisteredDevice {
            id: "hive-1".into(),
            name: None,
        })
    }

    async fn update_os_version(&self, _device_id: &str, _version: &str) -> Result<(), MindError> {
        Ok(())
    }

    async fn poll(&self, _device_ids: &[String]) -> Result<(), MindError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn hive_queues(&self, _device_id: &str) -> Result<Vec<QueueName>, MindError> {
        Ok(Vec::new())
    }

    async fn reserve_job(
        &self,
        _queues: &[QueueName],
        _details: &ReservationDetails,
    ) -> Result<Option<Job>, MindError> {
        Ok(None)
    }

    async fn push_statistics(&self, _device_id: &str, stats: &[Statistic]) -> Result<(), MindError> {
        self.stats.lock().unwrap().extend_from_slice(stats);
        Ok(())
    }

    async fn clear_logs(&self, _device_id: &str, _component: &str, _level: &str) -> Result<(), MindError> {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn prepare_job(&self, _job: &JobId, _device_id: &str) -> Result<(), MindError> {
        Ok(())
    }

    async fn start_job(&self, _job: &JobId) -> Result<(), MindError> {
        Ok(())
    }

    async fn end_job(&self, _job: &JobId, _exit_code: Option<i32>) -> Result<(), MindError> {
        Ok(())
    }

    async fn complete_job(&self, _job: &JobId) -> Result<(), MindError> {
        Ok(())
    }

    async fn error_job(&self, _job: &JobId, _message: &str) -> Result<(), MindError> {
        Ok(())
    }

    async fn report_artifact(&self, _job: &JobId, _path: &std::path::Path) -> Result<(), MindError> {
        Ok(())
    }
}
