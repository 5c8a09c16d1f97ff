use std::{path::Path, process::Stdio};

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::WorkerError;

/// Shallow clone of `repository` into `dest`, on `branch` when given.
pub async fn checkout_code(
    repository: &str,
    dest: &Path,
    branch: Option<&str>,
) -> Result<(), WorkerError> {
    info!(target: "hive.worker.checkout", repository, ?branch, "checking out the repository");

    let mut cmd = Command::new("git");
    cmd.arg("clone").arg("--depth").arg("1");
    if let Some(branch) = branch {
        cmd.arg("--branch").arg(branch);
    }
    cmd.arg(repository)
        .arg(dest)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let failed = |reason: String| WorkerError::Checkout {
        repository: repository.to_string(),
        branch: branch.unwrap_or("default branch").to_string(),
        reason,
    };

    let output = cmd.output().await.map_err(|e| failed(e.to_string()))?;
    if !output.status.success() {
        return Err(failed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    debug!(target: "hive.worker.checkout", dest = %dest.display(), "checkout complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_repository_is_a_checkout_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = checkout_code(
            &dir.path().join("no-such-repo").display().to_string(),
            &dir.path().join("dest"),
            Some("main"),
        )
        .await
        .unwrap_err();
        match err {
            WorkerError::Checkout { branch, .. } => assert_eq!(branch, "main"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
