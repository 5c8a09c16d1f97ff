use std::{fs, os::unix::fs::PermissionsExt, process::Stdio};

use tokio::{process::Command, time::timeout};
use tracing::{debug, info, warn};

use super::ExecutionScript;
use crate::error::{ExecError, ExecResult};

impl ExecutionScript {
    /// Write the script, run it as a new process group and wait for it.
    ///
    /// Every poll interval `keep_running` is consulted; once it returns `false` the whole
    /// group is killed and the run fails with [`ExecError::Terminated`]. Returns the exit
    /// code, `None` when the script died from a signal.
    pub async fn run<F>(&self, mut keep_running: F) -> ExecResult<Option<i32>>
    where
        F: FnMut() -> bool,
    {
        info!(target: "hive.exec.script", path = %self.path.display(), "writing script");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, self.render())?;
        fs::set_permissions(&self.path, fs::Permissions::from_mode(0o700))?;

        fs::create_dir_all(&self.logs_dir)?;
        let stdout = fs::File::create(self.logs_dir.join("stdout.log"))?;
        let stderr = fs::File::create(self.logs_dir.join("stderr.log"))?;

        let mut cmd = Command::new("bash");
        cmd.arg(&self.path)
            .envs(&self.env_secure)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .process_group(0);

        let mut child = cmd.spawn().map_err(|e| ExecError::Spawn(e.to_string()))?;
        let Some(pgid) = child.id() else {
            return Err(ExecError::Spawn("script exited before its pid was read".into()));
        };
        self.handle.set(pgid);
        debug!(target: "hive.exec.script", pgid, "script started");

        let status = loop {
            match timeout(self.poll_interval, child.wait()).await {
                Ok(status) => break status?,
                Err(_) => {
                    debug!(target: "hive.exec.script", pgid, "keep running check");
                    if !keep_running() {
                        warn!(target: "hive.exec.script", pgid, "stopping script");
                        self.handle.terminate();
                        if let Err(e) = child.wait().await {
                            debug!(target: "hive.exec.script", pgid, error = %e, "wait after kill failed");
                        }
                        return Err(ExecError::Terminated);
                    }
                }
            }
        };

        // Leftover children of the script share its group.
        self.handle.terminate_stragglers();

        info!(target: "hive.exec.script", pgid, code = ?status.code(), "script finished");
        Ok(status.code())
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use super::*;
    use crate::script::WORKING_DIRECTORY_VAR;

    fn script(dir: &Path) -> ExecutionScript {
        let mut s = ExecutionScript::new(dir.join("executed_script.sh"), dir.join("logs"));
        fs::create_dir_all(dir.join("testbed")).unwrap();
        s.set_env(WORKING_DIRECTORY_VAR, dir.join("testbed").as_path());
        s
    }

    fn stdout(dir: &Path) -> String {
        fs::read_to_string(dir.join("logs").join("stdout.log")).unwrap()
    }

    #[tokio::test]
    async fn runs_script_and_captures_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = script(dir.path());
        s.set_env("HIVE_GREETING", "it's alive");
        s.append_bash_cmd("echo \"$HIVE_GREETING\"");
        s.append_bash_cmd("pwd");

        let code = s.run(|| true).await.unwrap();

        assert_eq!(code, Some(0));
        let out = stdout(dir.path());
        assert!(out.contains("it's alive"));
        assert!(out.contains("testbed"));
        let mode = fs::metadata(s.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
        assert_eq!(s.handle().pgid(), None);
    }

    /// Dead or waiting to be reaped.
    fn gone(pid: &str) -> bool {
        fs::read_to_string(format!("/proc/{pid}/stat"))
            .map(|stat| stat.rsplit_once(')').is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')))
            .unwrap_or(true)
    }

    #[tokio::test]
    async fn background_children_die_with_the_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = script(dir.path());
        s.append_bash_cmd("sleep 30 &");
        s.append_bash_cmd("echo $!");

        assert_eq!(s.run(|| true).await.unwrap(), Some(0));

        let pid = stdout(dir.path()).trim().to_string();
        assert!(!pid.is_empty());
        let mut waited = Duration::ZERO;
        while !gone(&pid) && waited < Duration::from_secs(5) {
            tokio::time::sleep(Duration::from_millis(50)).await;
            waited += Duration::from_millis(50);
        }
        assert!(gone(&pid), "background child {pid} survived");
    }

    #[tokio::test]
    async fn reports_non_zero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = script(dir.path());
        s.append_bash_cmd("echo oops >&2");
        s.append_bash_cmd("exit 3");

        assert_eq!(s.run(|| true).await.unwrap(), Some(3));
        let err = fs::read_to_string(dir.path().join("logs").join("stderr.log")).unwrap();
        assert_eq!(err.trim(), "oops");
    }

    #[tokio::test]
    async fn secure_env_reaches_process_but_not_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = script(dir.path());
        s.set_secure_env("HIVE_CERT", "top-secret");
        s.append_bash_cmd("echo \"$HIVE_CERT\"");

        s.run(|| true).await.unwrap();

        assert!(stdout(dir.path()).contains("top-secret"));
        assert!(!fs::read_to_string(s.path()).unwrap().contains("top-secret"));
    }

    #[tokio::test]
    async fn watchdog_kills_group_when_told_to_stop() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = script(dir.path()).with_poll_interval(Duration::from_millis(50));
        s.append_bash_cmd("sleep 300");

        let mut checks = 0;
        let started = std::time::Instant::now();
        let result = s
            .run(|| {
                checks += 1;
                checks < 3
            })
            .await;

        assert!(matches!(result, Err(ExecError::Terminated)));
        assert_eq!(checks, 3);
        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(s.handle().pgid(), None);
    }

    #[tokio::test]
    async fn keep_running_not_consulted_for_quick_scripts() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = script(dir.path()).with_poll_interval(Duration::from_secs(30));
        s.append_bash_cmd("true");

        let mut consulted = false;
        s.run(|| {
            consulted = true;
            true
        })
        .await
        .unwrap();
        assert!(!consulted);
    }
}
