use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{ExecutionVariables, ModelError};

/// Scheduler-assigned job identifier.
///
/// Accepts both numeric and string ids on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => JobId(s),
            Raw::Number(n) => JobId(n.to_string()),
        })
    }
}

/// Job descriptor returned by a successful reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: JobId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default)]
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_directory: Option<String>,
    #[serde(default)]
    pub execution_variables: ExecutionVariables,
}

impl Job {
    /// Returns an error when the reserved payload cannot be executed.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.job_id.as_str().trim().is_empty() {
            return Err(ModelError::InvalidJob("missing job id".into()));
        }
        if self.command.trim().is_empty() {
            return Err(ModelError::InvalidJob(format!(
                "job {} has no command",
                self.job_id
            )));
        }
        Ok(())
    }

    /// Repository to check out, ignoring blank values.
    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref().filter(|r| !r.trim().is_empty())
    }

    /// Branch to check out; the `git_branch` execution variable wins over the job default.
    pub fn checkout_branch(&self) -> Option<String> {
        self.execution_variables
            .git_branch()
            .or_else(|| self.branch.clone())
            .filter(|b| !b.trim().is_empty())
    }

    pub fn execution_directory(&self) -> &str {
        self.execution_directory.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_numeric_job_id() {
        let job: Job = serde_json::from_str(r#"{"job_id": 42, "command": "echo hi"}"#).unwrap();
        assert_eq!(job.job_id.as_str(), "42");
        assert!(job.validate().is_ok());
        assert!(job.repository().is_none());
    }

    #[test]
    fn job_without_command_is_invalid() {
        let job: Job = serde_json::from_str(r#"{"job_id": "7"}"#).unwrap();
        assert!(matches!(job.validate(), Err(ModelError::InvalidJob(_))));
    }

    #[test]
    fn git_branch_variable_overrides_default_branch() {
        let job: Job = serde_json::from_str(
            r#"{"job_id": 1, "command": "x", "branch": "main",
                "execution_variables": {"git_branch": "feature"}}"#,
        )
        .unwrap();
        assert_eq!(job.checkout_branch().as_deref(), Some("feature"));

        let job: Job =
            serde_json::from_str(r#"{"job_id": 1, "command": "x", "branch": "main"}"#).unwrap();
        assert_eq!(job.checkout_branch().as_deref(), Some("main"));
    }
}
