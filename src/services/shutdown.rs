//! Cooperative shutdown and partial-file cleanup.
//!
//! The first Ctrl-C sets a flag the scheduler checks before each admission,
//! letting in-flight fetches finish. A second Ctrl-C removes partial files
//! and exits with status 130.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::storage::{cleanup_partial_files, CleanupReport};

/// Exit status used after a forced shutdown.
pub const FORCED_EXIT_CODE: i32 = 130;

/// Shared shutdown flag plus the directory to clean on exit.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    requested: Arc<AtomicBool>,
    cleanup_root: PathBuf,
    min_file_size: u64,
}

impl ShutdownCoordinator {
    pub fn new(cleanup_root: impl Into<PathBuf>, min_file_size: u64) -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            cleanup_root: cleanup_root.into(),
            min_file_size,
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Stop admitting new work.
    pub fn request(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            info!("Shutdown requested; finishing in-flight downloads");
        }
    }

    /// Remove stray temp files and undersized artifacts.
    pub fn cleanup(&self) -> CleanupReport {
        let report = cleanup_partial_files(&self.cleanup_root, self.min_file_size);
        if report.total() > 0 {
            info!(
                "Removed {} temp and {} undersized files under {}",
                report.temp_files.len(),
                report.undersized_files.len(),
                self.cleanup_root.display()
            );
        }
        report
    }

    /// Spawn the Ctrl-C listener.
    pub fn listen(&self) -> tokio::task::JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            eprintln!(
                "{} Interrupt received, finishing in-flight downloads (press Ctrl-C again to force quit)",
                console::style("!").yellow()
            );
            coordinator.request();

            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("Second interrupt, forcing exit");
            coordinator.cleanup();
            std::process::exit(FORCED_EXIT_CODE);
        })
    }

    /// Guard that runs [`cleanup`](Self::cleanup) when dropped unless disarmed.
    pub fn guard(&self) -> CleanupGuard {
        CleanupGuard {
            coordinator: self.clone(),
            armed: true,
        }
    }
}

/// Exit hook repeating partial-file cleanup if the normal path never ran.
#[derive(Debug)]
pub struct CleanupGuard {
    coordinator: ShutdownCoordinator,
    armed: bool,
}

impl CleanupGuard {
    /// Run cleanup now and disarm the guard.
    pub fn finish(mut self) -> CleanupReport {
        self.armed = false;
        self.coordinator.cleanup()
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if self.armed {
            self.coordinator.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_request_is_shared_across_clones() {
        let coordinator = ShutdownCoordinator::new("/nonexistent", 1024);
        let clone = coordinator.clone();
        assert!(!clone.is_requested());
        coordinator.request();
        assert!(clone.is_requested());
    }

    #[test]
    fn test_guard_cleans_on_drop() {
        let dir = tempdir().unwrap();
        let tmp = dir.path().join("a.pdf.tmp");
        std::fs::write(&tmp, b"partial").unwrap();

        let coordinator = ShutdownCoordinator::new(dir.path(), 1024);
        {
            let _guard = coordinator.guard();
        }
        assert!(!tmp.exists());
    }

    #[test]
    fn test_guard_finish_reports_and_disarms() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("small.pdf"), b"%PDF-").unwrap();

        let coordinator = ShutdownCoordinator::new(dir.path(), 1024);
        let report = coordinator.guard().finish();
        assert_eq!(report.undersized_files.len(), 1);
    }
}
