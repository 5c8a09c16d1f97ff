use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// File name of the per-job status checkpoint inside a job's home directory.
pub const JOB_INFO_FILE: &str = "job_info";

/// Local execution checkpoint of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Preparing,
    Running,
    Uploading,
    Completed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Preparing => "preparing",
            JobState::Running => "running",
            JobState::Uploading => "uploading",
            JobState::Completed => "completed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "preparing" => Ok(JobState::Preparing),
            "running" => Ok(JobState::Running),
            "uploading" => Ok(JobState::Uploading),
            "completed" => Ok(JobState::Completed),
            other => Err(ModelError::InvalidJobState(other.to_string())),
        }
    }
}

/// Contents of a job status file: `"<pid> <state>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobInfo {
    pub pid: u32,
    pub state: JobState,
}

impl JobInfo {
    pub fn new(pid: u32, state: JobState) -> Self {
        Self { pid, state }
    }

    pub fn parse(line: &str) -> Result<Self, ModelError> {
        let mut parts = line.split_whitespace();
        let (Some(pid), Some(state), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(ModelError::InvalidJobInfo(line.to_string()));
        };
        let pid = pid
            .parse()
            .map_err(|_| ModelError::InvalidJobInfo(line.to_string()))?;
        Ok(Self {
            pid,
            state: state.parse()?,
        })
    }
}

impl fmt::Display for JobInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pid, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_info_line_format() {
        let info = JobInfo::new(4242, JobState::Completed);
        assert_eq!(info.to_string(), "4242 completed");
        assert_eq!(JobInfo::parse("4242 completed\n"), Ok(info));
    }

    #[test]
    fn job_info_rejects_garbage() {
        assert!(JobInfo::parse("completed").is_err());
        assert!(JobInfo::parse("abc running").is_err());
        assert!(JobInfo::parse("1 done").is_err());
        assert!(JobInfo::parse("1 running extra").is_err());
    }
}
