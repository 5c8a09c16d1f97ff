use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown device status: {0} (expected: none|idle|busy|claimed)")]
    InvalidStatus(String),
    #[error("unknown job state: {0}")]
    InvalidJobState(String),
    #[error("malformed job info line: {0:?}")]
    InvalidJobInfo(String),
    #[error("invalid job: {0}")]
    InvalidJob(String),
}
