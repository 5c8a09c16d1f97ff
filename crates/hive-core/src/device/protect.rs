//! Protect sentinels: `<pids_dir>/<pid>.protect`.
//!
//! While the file exists the register will not signal that pid.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use tracing::{debug, warn};

pub fn protect_path(pids_dir: &Path, pid: u32) -> PathBuf {
    pids_dir.join(format!("{pid}.protect"))
}

pub fn is_protected(pids_dir: &Path, pid: u32) -> bool {
    protect_path(pids_dir, pid).exists()
}

/// Holds a protect sentinel for as long as it lives.
#[derive(Debug)]
pub struct ProtectGuard {
    path: PathBuf,
}

impl ProtectGuard {
    pub fn acquire(pids_dir: &Path, pid: u32) -> io::Result<Self> {
        fs::create_dir_all(pids_dir)?;
        let path = protect_path(pids_dir, pid);
        fs::File::create(&path)?;
        debug!(target: "hive.core.protect", path = %path.display(), "protecting worker");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ProtectGuard {
    fn drop(&mut self) {
        debug!(target: "hive.core.protect", path = %self.path.display(), "unprotecting worker");
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(target: "hive.core.protect", path = %self.path.display(), error = %e, "failed to remove protect file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_creates_and_removes_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        {
            let guard = ProtectGuard::acquire(dir.path(), 321).unwrap();
            assert_eq!(guard.path(), dir.path().join("321.protect"));
            assert!(is_protected(dir.path(), 321));
        }
        assert!(!is_protected(dir.path(), 321));
    }
}
