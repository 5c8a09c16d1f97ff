//! On-disk layout of one job.
//!
//! ```text
//! <home>/<job_id>/
//!     job_info            "<pid> <state>"
//!     test_code/          checkout and working directory
//!     results/            uploaded after the run
//!     logs/               uploaded after the run
//!         executed_script.sh
//!         script_errors.txt
//!         stdout.log, stderr.log
//! ```

use std::{
    fs, io,
    os::unix::fs::PermissionsExt,
    path::{Path, PathBuf},
};

use hive_model::{JOB_INFO_FILE, JobId, JobInfo, JobState};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct JobFileSystem {
    home: PathBuf,
    pid: u32,
}

impl JobFileSystem {
    /// Create the workspace of `job` under `root`, owned by worker `pid`.
    pub fn create(root: &Path, job: &JobId, pid: u32) -> io::Result<Self> {
        let dir_name: String = job
            .as_str()
            .chars()
            .map(|c| if c == '/' || c == '\\' { '_' } else { c })
            .collect();
        let fs = Self {
            home: root.join(dir_name),
            pid,
        };
        for dir in [fs.testbed_path(), fs.results_path(), fs.logs_path()] {
            fs::create_dir_all(dir)?;
        }
        fs::File::create(fs.script_errors_file())?;
        debug!(target: "hive.worker.fs", home = %fs.home.display(), "job workspace created");
        Ok(fs)
    }

    pub fn home_path(&self) -> &Path {
        &self.home
    }

    pub fn testbed_path(&self) -> PathBuf {
        self.home.join("test_code")
    }

    pub fn results_path(&self) -> PathBuf {
        self.home.join("results")
    }

    pub fn logs_path(&self) -> PathBuf {
        self.home.join("logs")
    }

    pub fn script_errors_file(&self) -> PathBuf {
        self.logs_path().join("script_errors.txt")
    }

    pub fn executed_script_path(&self) -> PathBuf {
        self.logs_path().join("executed_script.sh")
    }

    /// Record the local job checkpoint.
    pub fn set_job_state(&self, state: JobState) -> io::Result<()> {
        debug!(target: "hive.worker.fs", %state, "job state");
        fs::write(
            self.home.join(JOB_INFO_FILE),
            format!("{}\n", JobInfo::new(self.pid, state)),
        )
    }

    pub fn job_info(&self) -> io::Result<JobInfo> {
        let raw = fs::read_to_string(self.home.join(JOB_INFO_FILE))?;
        JobInfo::parse(raw.trim())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
    }

    /// The script reported errors by writing to its errors file.
    pub fn script_errors_present(&self) -> bool {
        fs::metadata(self.script_errors_file()).is_ok_and(|m| m.len() > 0)
    }

    /// Make the results directory safe to upload: present, readable, no dangling links.
    pub fn finalise_results_directory(&self) -> io::Result<()> {
        let results = self.results_path();
        fs::create_dir_all(&results)?;
        fs::set_permissions(&results, fs::Permissions::from_mode(0o755))?;
        for entry in fs::read_dir(&results)?.flatten() {
            let path = entry.path();
            if path.is_symlink() && !path.exists() {
                warn!(target: "hive.worker.fs", path = %path.display(), "removing dangling link from results");
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_layout_and_tracks_state() {
        let root = tempfile::tempdir().unwrap();
        let fs = JobFileSystem::create(root.path(), &JobId::new("42"), 777).unwrap();

        assert!(fs.testbed_path().is_dir());
        assert!(fs.results_path().is_dir());
        assert!(!fs.script_errors_present());

        fs.set_job_state(JobState::Running).unwrap();
        assert_eq!(
            fs::read_to_string(fs.home_path().join(JOB_INFO_FILE)).unwrap(),
            "777 running\n"
        );
        assert_eq!(fs.job_info().unwrap(), JobInfo::new(777, JobState::Running));
    }

    #[test]
    fn job_id_cannot_escape_root() {
        let root = tempfile::tempdir().unwrap();
        let fs = JobFileSystem::create(root.path(), &JobId::new("../x"), 1).unwrap();
        assert_eq!(fs.home_path().parent(), Some(root.path()));
    }

    #[test]
    fn detects_script_errors() {
        let root = tempfile::tempdir().unwrap();
        let fs = JobFileSystem::create(root.path(), &JobId::new("1"), 1).unwrap();
        fs::write(fs.script_errors_file(), "boom\n").unwrap();
        assert!(fs.script_errors_present());
    }

    #[test]
    fn finalise_drops_dangling_links() {
        let root = tempfile::tempdir().unwrap();
        let fs = JobFileSystem::create(root.path(), &JobId::new("1"), 1).unwrap();
        let results = fs.results_path();
        fs::write(results.join("report.xml"), "<ok/>").unwrap();
        std::os::unix::fs::symlink(results.join("missing"), results.join("broken")).unwrap();

        fs.finalise_results_directory().unwrap();

        assert!(results.join("report.xml").exists());
        assert!(!results.join("broken").is_symlink());
    }
}
