//! OS process primitives: liveness probes, signals and worker spawning.
//!
//! [`ProcessControl`] is the seam between supervision logic and the operating system;
//! [`OsProcessControl`] is the real implementation, tests substitute their own.

use std::{
    collections::{BTreeMap, HashMap},
    ffi::OsString,
    io,
    path::PathBuf,
    process::{Child, Command, Stdio},
    sync::Mutex,
};

use tracing::{debug, trace};

use crate::ports::Port;

/// Signals the supervisor sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    /// `SIGTERM`
    Terminate,
    /// `SIGKILL`
    Kill,
}

impl ProcessSignal {
    fn raw(self) -> libc::c_int {
        match self {
            ProcessSignal::Terminate => libc::SIGTERM,
            ProcessSignal::Kill => libc::SIGKILL,
        }
    }
}

/// Probe a pid with the null signal.
///
/// Only `ESRCH` counts as dead. Any other failure (`EPERM` included) is reported as
/// alive so the caller never spawns a second worker on top of a live one.
pub fn pid_alive(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    if pid <= 0 {
        return false;
    }
    // SAFETY: kill with signal 0 performs permission and existence checks only.
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return true;
    }
    io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH)
}

/// Send `signal` to a single process.
pub fn send_signal(pid: u32, signal: ProcessSignal) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: plain kill(2) on a positive pid with a valid signal number.
    let rc = unsafe { libc::kill(pid, signal.raw()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// Send `signal` to every member of process group `pgid`.
pub fn signal_group(pgid: u32, signal: ProcessSignal) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pgid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pgid out of range"))?;
    if pgid <= 1 {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "refusing to signal pgid <= 1"));
    }
    // SAFETY: a negative pid addresses the whole process group.
    let rc = unsafe { libc::kill(-pgid, signal.raw()) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

/// `true` when the error means the target no longer exists.
pub fn is_no_such_process(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::ESRCH)
}

/// Pid of the calling process.
pub fn current_pid() -> u32 {
    std::process::id()
}

/// Everything a worker process needs to know about its device, passed at spawn time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerLaunch {
    pub platform: String,
    pub identity: String,
    pub device_id: String,
    pub ports: Vec<Port>,
    pub parent_pid: u32,
    pub hive_id: Option<String>,
    pub attributes: BTreeMap<String, String>,
}

impl WorkerLaunch {
    /// Command-line arguments understood by the `worker` subcommand.
    pub fn to_args(&self) -> Vec<OsString> {
        let ports: Vec<String> = self.ports.iter().map(ToString::to_string).collect();
        let mut args: Vec<OsString> = vec![
            "worker".into(),
            "--platform".into(),
            self.platform.clone().into(),
            "--identity".into(),
            self.identity.clone().into(),
            "--device-id".into(),
            self.device_id.clone().into(),
            "--parent-pid".into(),
            self.parent_pid.to_string().into(),
        ];
        if !ports.is_empty() {
            args.push("--ports".into());
            args.push(ports.join(",").into());
        }
        if let Some(hive_id) = &self.hive_id {
            args.push("--hive-id".into());
            args.push(hive_id.clone().into());
        }
        if !self.attributes.is_empty() {
            let json = serde_json::to_string(&self.attributes).unwrap_or_else(|_| "{}".into());
            args.push("--attributes".into());
            args.push(json.into());
        }
        args
    }
}

/// Process operations used by device supervision.
pub trait ProcessControl: Send + Sync {
    /// Start a worker process and return its pid without waiting for readiness.
    fn spawn_worker(&self, launch: &WorkerLaunch) -> io::Result<u32>;

    fn is_alive(&self, pid: u32) -> bool;

    fn signal(&self, pid: u32, signal: ProcessSignal) -> io::Result<()>;
}

/// Spawns workers by re-executing a program (normally the running binary).
pub struct OsProcessControl {
    program: PathBuf,
    base_args: Vec<OsString>,
    children: Mutex<HashMap<u32, Child>>,
}

impl OsProcessControl {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            children: Mutex::new(HashMap::new()),
        }
    }

    /// Arguments placed before the `worker` subcommand (e.g. `--config <path>`).
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Reap `pid` if it is our child and has exited. Returns `true` when it was reaped.
    fn reap(&self, pid: u32) -> bool {
        let Ok(mut children) = self.children.lock() else {
            return false;
        };
        let exited = match children.get_mut(&pid) {
            Some(child) => matches!(child.try_wait(), Ok(Some(_))),
            None => return false,
        };
        if exited {
            children.remove(&pid);
            trace!(target: "hive.core.process", pid, "reaped worker");
        }
        exited
    }
}

impl ProcessControl for OsProcessControl {
    fn spawn_worker(&self, launch: &WorkerLaunch) -> io::Result<u32> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.base_args)
            .args(launch.to_args())
            .stdin(Stdio::null());

        trace!(target: "hive.core.process", program = %self.program.display(), identity = %launch.identity, "spawn worker");
        let child = cmd.spawn()?;
        let pid = child.id();
        if let Ok(mut children) = self.children.lock() {
            children.insert(pid, child);
        }
        debug!(target: "hive.core.process", pid, identity = %launch.identity, "worker spawned");
        Ok(pid)
    }

    fn is_alive(&self, pid: u32) -> bool {
        if self.reap(pid) {
            return false;
        }
        pid_alive(pid)
    }

    fn signal(&self, pid: u32, signal: ProcessSignal) -> io::Result<()> {
        send_signal(pid, signal)
    }
}
