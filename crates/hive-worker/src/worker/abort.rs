use hive_exec::ScriptHandle;

use crate::fs::JobFileSystem;

/// What the termination path needs to wind a job down.
///
/// Filled in by the job as it progresses, read after the job future was dropped.
#[derive(Debug, Default)]
pub(crate) struct AbortResources {
    pub fs: Option<JobFileSystem>,
    pub script: Option<ScriptHandle>,
    /// A terminal outcome (complete or error) was already reported.
    pub reported: bool,
}
