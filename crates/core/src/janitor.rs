//! Cleanup of intermediate artifacts.
//!
//! A [`CleanupGuard`] owns the paths a component created. The owner calls
//! [`CleanupGuard::sweep`] on its normal exit paths; anything still tracked
//! when the guard is dropped (panic, task abort, early return) is removed
//! synchronously in `Drop`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Removes a file or directory tree. Missing paths are not an error.
pub async fn remove_path(path: &Path) -> std::io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

fn remove_path_blocking(path: &Path) -> std::io::Result<()> {
    let metadata = match std::fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };

    match result {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Owns intermediate paths until they are swept or handed off.
#[derive(Debug)]
pub struct CleanupGuard {
    label: String,
    paths: Vec<PathBuf>,
}

impl CleanupGuard {
    /// Creates an empty guard. `label` only appears in log lines.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            paths: Vec::new(),
        }
    }

    /// Starts tracking a path. Tracking the same path twice is a no-op.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    /// Stops tracking a path, e.g. once it has been promoted to a final artifact.
    ///
    /// Returns whether the path was tracked.
    pub fn disarm(&mut self, path: &Path) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        before != self.paths.len()
    }

    pub fn is_tracking(&self, path: &Path) -> bool {
        self.paths.iter().any(|p| p == path)
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Removes every tracked path. Failures are logged, not returned, and the
    /// guard is empty afterwards.
    pub async fn sweep(&mut self) {
        // Newest first: files created inside a tracked directory go before it.
        for path in self.paths.drain(..).rev() {
            match remove_path(&path).await {
                Ok(()) => debug!("[{}] removed {}", self.label, path.display()),
                Err(e) => warn!(
                    "[{}] failed to remove intermediate {}: {}",
                    self.label,
                    path.display(),
                    e
                ),
            }
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        for path in self.paths.drain(..).rev() {
            if let Err(e) = remove_path_blocking(&path) {
                warn!(
                    "[{}] failed to remove intermediate {} on drop: {}",
                    self.label,
                    path.display(),
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sweep_removes_files_and_dirs() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("working.wav");
        let dir = temp.path().join("separated");
        std::fs::write(&file, b"data").unwrap();
        std::fs::create_dir_all(dir.join("htdemucs/track")).unwrap();
        std::fs::write(dir.join("htdemucs/track/vocals.wav"), b"data").unwrap();

        let mut guard = CleanupGuard::new("test");
        guard.track(&file);
        guard.track(&dir);
        guard.sweep().await;

        assert!(!file.exists());
        assert!(!dir.exists());
        assert!(guard.is_empty());
    }

    #[tokio::test]
    async fn test_missing_paths_are_ignored() {
        let temp = TempDir::new().unwrap();
        let mut guard = CleanupGuard::new("test");
        guard.track(temp.path().join("never-created"));
        guard.sweep().await;
        assert!(guard.is_empty());
    }

    #[test]
    fn test_drop_removes_tracked_paths() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("alias.wav");
        std::fs::write(&file, b"data").unwrap();

        {
            let mut guard = CleanupGuard::new("test");
            guard.track(&file);
        }

        assert!(!file.exists());
    }

    #[test]
    fn test_disarmed_path_survives() {
        let temp = TempDir::new().unwrap();
        let kept = temp.path().join("final.mp3");
        let dropped = temp.path().join("scratch.wav");
        std::fs::write(&kept, b"data").unwrap();
        std::fs::write(&dropped, b"data").unwrap();

        {
            let mut guard = CleanupGuard::new("test");
            guard.track(&kept);
            guard.track(&dropped);
            guard.track(&dropped);
            assert!(guard.disarm(&kept));
            assert!(!guard.disarm(&kept));
            assert!(guard.is_tracking(&dropped));
        }

        assert!(kept.exists());
        assert!(!dropped.exists());
    }
}
