use std::{
    fs,
    path::PathBuf,
    time::{Duration, Instant},
};

use hive_core::process::pid_alive;
use tracing::{debug, warn};

/// Watchdog predicate for a running job script.
///
/// The script stops once the job timeout elapsed, the daemon died, or the script
/// wrote to its errors file.
#[derive(Debug, Clone)]
pub struct KeepRunning {
    started: Instant,
    timeout: Option<Duration>,
    parent_pid: u32,
    errors_file: PathBuf,
}

impl KeepRunning {
    pub fn new(
        started: Instant,
        timeout: Option<Duration>,
        parent_pid: u32,
        errors_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            started,
            timeout,
            parent_pid,
            errors_file: errors_file.into(),
        }
    }

    pub fn check(&self) -> bool {
        debug!(target: "hive.worker.job", "keep running check");
        if let Some(max) = self.timeout {
            let elapsed = self.started.elapsed();
            if elapsed > max {
                warn!(target: "hive.worker.job", elapsed = elapsed.as_secs(), max = max.as_secs(), "job has exceeded its time limit");
                return false;
            }
        }
        if !pid_alive(self.parent_pid) {
            warn!(target: "hive.worker.job", parent = self.parent_pid, "parent process appears to have terminated");
            return false;
        }
        if fs::metadata(&self.errors_file).is_ok_and(|m| m.len() > 0) {
            warn!(target: "hive.worker.job", "script reported errors");
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use hive_core::process::current_pid;

    use super::*;

    #[test]
    fn stops_on_timeout_dead_parent_or_errors() {
        let dir = tempfile::tempdir().unwrap();
        let errors = dir.path().join("errors");
        fs::write(&errors, "").unwrap();
        let me = current_pid();
        let now = Instant::now();

        assert!(KeepRunning::new(now, None, me, &errors).check());
        assert!(KeepRunning::new(now, Some(Duration::from_secs(60)), me, &errors).check());

        let long_ago = now - Duration::from_secs(61);
        assert!(!KeepRunning::new(long_ago, Some(Duration::from_secs(60)), me, &errors).check());

        assert!(!KeepRunning::new(now, None, 5_000_000, &errors).check());

        fs::write(&errors, "failure\n").unwrap();
        assert!(!KeepRunning::new(now, None, me, &errors).check());
    }
}
