//! Job execution: preparing -> running -> uploading -> completed.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use hive_exec::{ExecutionScript, WORKING_DIRECTORY_VAR, shell_quote};
use hive_model::{Job, JobState};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{KeepRunning, Worker, abort::AbortResources};
use crate::{checkout::checkout_code, error::WorkerError, fs::JobFileSystem};

impl Worker {
    /// Execute a reserved job and report its outcome.
    ///
    /// Returns whether the script exited with zero. Setup failures and script-reported
    /// errors mark the job as errored and are returned as errors. When `shutdown` fires
    /// mid-job the script is killed, what exists is uploaded, and the job is errored.
    pub async fn execute_job(
        &mut self,
        job: &Job,
        shutdown: &CancellationToken,
    ) -> Result<bool, WorkerError> {
        let mut abort = AbortResources::default();
        let outcome = tokio::select! {
            result = self.run_job(job, &mut abort) => Some(result),
            _ = shutdown.cancelled() => None,
        };
        match outcome {
            Some(result) => result,
            None => {
                self.abort_job(job, abort).await;
                Err(WorkerError::Terminated)
            }
        }
    }

    async fn run_job(&mut self, job: &Job, abort: &mut AbortResources) -> Result<bool, WorkerError> {
        let started = Instant::now();
        let fs = match JobFileSystem::create(&self.config.logging.home, &job.job_id, self.opts.pid) {
            Ok(fs) => fs,
            Err(e) => {
                let err = WorkerError::from(e);
                self.report_error(job, &err.to_string()).await;
                abort.reported = true;
                return Err(err);
            }
        };
        abort.fs = Some(fs.clone());
        set_state(&fs, JobState::Preparing);

        let result = self.prepare_and_run(job, &fs, abort, started).await;
        if let Err(e) = &result {
            error!(target: "hive.worker.job", job = %job.job_id, error = %e, "error starting job");
        }

        info!(target: "hive.worker.job", "post-execution cleanup");
        set_state(&fs, JobState::Uploading);
        if let Err(e) = self.platform.post_script(job, &fs).await {
            error!(target: "hive.worker.job", error = %e, "post execution failed");
        }
        if let Err(e) = fs.finalise_results_directory() {
            error!(target: "hive.worker.job", error = %e, "failed to finalise results");
        }

        let outcome = match result {
            Err(e) => Err(e),
            Ok(_) if fs.script_errors_present() => Err(WorkerError::ScriptErrors),
            Ok(code) => Ok(code == Some(0)),
        };

        match &outcome {
            Err(e) => {
                if let Err(hook) = self.platform.after_error(job, &fs).await {
                    error!(target: "hive.worker.job", error = %hook, "after error hook failed");
                }
                self.upload_files(job, &[fs.results_path(), fs.logs_path()]).await;
                self.report_error(job, &e.to_string()).await;
                abort.reported = true;
            }
            Ok(_) => {
                if let Err(e) = self.mind.complete_job(&job.job_id).await {
                    warn!(target: "hive.worker.job", error = %e, "failed to mark job complete");
                }
                abort.reported = true;
                self.upload_files(job, &[fs.results_path(), fs.logs_path()]).await;
            }
        }
        set_state(&fs, JobState::Completed);
        outcome
    }

    /// Steps whose failure still leads to uploads and an error report.
    async fn prepare_and_run(
        &mut self,
        job: &Job,
        fs: &JobFileSystem,
        abort: &mut AbortResources,
        started: Instant,
    ) -> Result<Option<i32>, WorkerError> {
        self.mind
            .prepare_job(&job.job_id, self.device_id.as_deref().unwrap_or_default())
            .await?;

        if let Some(repository) = job.repository() {
            checkout_code(repository, &fs.testbed_path(), job.checkout_branch().as_deref()).await?;
        }

        info!(target: "hive.worker.job", "initialising execution script");
        let mut script = self.build_script(job, fs);
        abort.script = Some(script.handle());

        set_state(fs, JobState::Running);
        info!(target: "hive.worker.job", "pre-execution setup");
        self.platform.pre_script(job, fs, &mut script).await?;

        self.mind.start_job(&job.job_id).await?;
        let timeout = job.execution_variables.job_timeout().map(|minutes| {
            self.timeout_unit
                .saturating_mul(u32::try_from(minutes).unwrap_or(u32::MAX))
        });
        let keep = KeepRunning::new(started, timeout, self.opts.parent_pid, fs.script_errors_file());

        info!(target: "hive.worker.job", "running execution script");
        let code = script.run(|| keep.check()).await?;
        self.mind.end_job(&job.job_id, code).await?;
        Ok(code)
    }

    fn build_script(&self, job: &Job, fs: &JobFileSystem) -> ExecutionScript {
        let cfg = &self.config;
        let mut script = ExecutionScript::new(fs.executed_script_path(), fs.logs_path())
            .with_poll_interval(cfg.timings.script_poll());
        if let Some(helper) = &cfg.execution.script_helper {
            script = script.with_helper(helper);
        }

        script.set_env("HIVE_SCHEDULER", cfg.network.scheduler.clone().unwrap_or_default());
        script.set_env(WORKING_DIRECTORY_VAR, fs.testbed_path().as_path());
        for var in &cfg.execution.unset_env {
            script.unset_env(var.clone());
        }
        if let Some(cert) = &cfg.network.cert {
            script.set_secure_env("HIVE_CERT", cert.display().to_string());
        }

        let exec_dir = shell_quote(
            &fs.testbed_path()
                .join(job.execution_directory())
                .display()
                .to_string(),
        );
        script.append_bash_cmd(format!("mkdir -p {exec_dir}"));
        script.append_bash_cmd(format!("cd {exec_dir}"));

        script.set_env("HIVE_RESULTS", fs.results_path().as_path());
        script.set_env("HIVE_SCRIPT_ERRORS", fs.script_errors_file().as_path());
        for (name, value) in job.execution_variables.scalars() {
            script.set_env(format!("HIVE_{}", name.to_uppercase()), value);
        }

        let retry_urns = job.execution_variables.retry_urns();
        if !retry_urns.is_empty() {
            script.set_env("RETRY_URNS", retry_urns);
        }
        let tests = job.execution_variables.tests();
        if !tests.is_empty() && tests != [""] {
            script.set_env("TEST_NAMES", tests);
        }

        script.append_bash_cmd(job.command.clone());
        script
    }

    /// Report every entry of each directory as an artifact; failures are logged and skipped.
    async fn upload_files(&self, job: &Job, dirs: &[PathBuf]) {
        info!(target: "hive.worker.job", "uploading assets");
        for dir in dirs {
            if !dir.is_dir() {
                warn!(target: "hive.worker.job", dir = %dir.display(), "nothing to upload");
                continue;
            }
            let mut paths = Vec::new();
            collect_files(dir, &mut paths);
            paths.sort();
            for path in paths {
                self.report_artifact(job, &path).await;
            }
        }
    }

    async fn report_artifact(&self, job: &Job, path: &Path) {
        match self.mind.report_artifact(&job.job_id, path).await {
            Ok(()) => info!(target: "hive.worker.job", path = %path.display(), "artifact uploaded"),
            Err(e) => {
                error!(target: "hive.worker.job", path = %path.display(), error = %e, "error uploading artifact")
            }
        }
    }

    async fn report_error(&self, job: &Job, message: &str) {
        if let Err(e) = self.mind.error_job(&job.job_id, message).await {
            warn!(target: "hive.worker.job", error = %e, "failed to mark job as errored");
        }
    }

    /// Termination path: no waiting on normal cleanup.
    async fn abort_job(&mut self, job: &Job, abort: AbortResources) {
        info!(target: "hive.worker.job", job = %job.job_id, "caught termination signal");
        if let Some(script) = &abort.script {
            info!(target: "hive.worker.job", "terminating script, if running");
            script.terminate();
        }
        if let Some(fs) = &abort.fs {
            self.platform.signal_safe_post_script(job, fs);
            if let Err(e) = fs.finalise_results_directory() {
                error!(target: "hive.worker.job", error = %e, "failed to finalise results");
            }
            self.upload_files(job, &[fs.results_path(), fs.logs_path()]).await;
            set_state(fs, JobState::Completed);
        }
        if !abort.reported {
            self.report_error(job, "Worker killed").await;
        }
        info!(target: "hive.worker.job", "worker terminated");
    }
}

/// Regular files below `dir`, descending into subdirectories.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        warn!(target: "hive.worker.job", dir = %dir.display(), "cannot list directory");
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(t) if t.is_dir() => collect_files(&path, out),
            Ok(t) if t.is_file() => out.push(path),
            _ => debug!(target: "hive.worker.job", path = %path.display(), "skipping non-regular file"),
        }
    }
}

fn set_state(fs: &JobFileSystem, state: JobState) {
    if let Err(e) = fs.set_job_state(state) {
        warn!(target: "hive.worker.job", %state, error = %e, "failed to record job state");
    }
}
