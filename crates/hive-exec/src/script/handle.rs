use std::sync::{Arc, Mutex};

use hive_core::process::{ProcessSignal, is_no_such_process, pid_alive, signal_group};
use tracing::{debug, warn};

/// Shared view of a running script's process group.
///
/// Cloned into whoever may need to kill the script; `terminate` is idempotent.
#[derive(Debug, Clone, Default)]
pub struct ScriptHandle {
    pgid: Arc<Mutex<Option<u32>>>,
}

impl ScriptHandle {
    pub(crate) fn set(&self, pgid: u32) {
        if let Ok(mut slot) = self.pgid.lock() {
            *slot = Some(pgid);
        }
    }

    /// Process group of the running script, if any.
    pub fn pgid(&self) -> Option<u32> {
        self.pgid.lock().ok().and_then(|slot| *slot)
    }

    /// Kill the whole process group. Safe to call when nothing is running.
    pub fn terminate(&self) {
        if let Some(pgid) = self.take() {
            kill_group(pgid);
        }
    }

    /// Kill children left behind by a script whose leader has already been reaped.
    ///
    /// A pid is never handed out while a group with that id has members, so a live
    /// process owning the pgid means the group emptied and the id was reused.
    pub(crate) fn terminate_stragglers(&self) {
        let Some(pgid) = self.take() else {
            return;
        };
        if pid_alive(pgid) {
            debug!(target: "hive.exec.script", pgid, "group id reused by another process, nothing left to kill");
            return;
        }
        kill_group(pgid);
    }

    fn take(&self) -> Option<u32> {
        self.pgid.lock().ok().and_then(|mut slot| slot.take())
    }
}

fn kill_group(pgid: u32) {
    debug!(target: "hive.exec.script", pgid, "ensuring process group is terminated");
    match signal_group(pgid, ProcessSignal::Kill) {
        Ok(()) => {}
        Err(e) if is_no_such_process(&e) => {
            debug!(target: "hive.exec.script", pgid, "process group already dead");
        }
        Err(e) => {
            warn!(target: "hive.exec.script", pgid, error = %e, "unexpected error while terminating process group");
        }
    }
}
