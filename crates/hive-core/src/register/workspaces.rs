use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use hive_model::JOB_INFO_FILE;
use tracing::{info, warn};

/// Delete completed job workspaces under `home`, keeping the `keep` most recent.
///
/// A workspace is completed when its `job_info` file mentions `completed`.
/// Returns the removed directories.
pub fn clear_workspaces(home: &Path, keep: usize) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(home) else {
        return Vec::new();
    };

    let mut completed: Vec<(SystemTime, PathBuf)> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir() && is_completed(p))
        .filter_map(|p| {
            let mtime = fs::metadata(&p).and_then(|m| m.modified()).ok()?;
            Some((mtime, p))
        })
        .collect();

    if completed.len() <= keep {
        return Vec::new();
    }
    // newest first
    completed.sort_by(|a, b| b.0.cmp(&a.0));

    let mut removed = Vec::new();
    for (_, dir) in completed.into_iter().skip(keep) {
        info!(target: "hive.core.register", dir = %dir.display(), "deleting completed workspace");
        match fs::remove_dir_all(&dir) {
            Ok(()) => removed.push(dir),
            Err(e) => {
                warn!(target: "hive.core.register", dir = %dir.display(), error = %e, "failed to delete workspace")
            }
        }
    }
    removed
}

fn is_completed(dir: &Path) -> bool {
    fs::read_to_string(dir.join(JOB_INFO_FILE)).is_ok_and(|s| s.contains("completed"))
}
