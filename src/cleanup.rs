use std::{
    path::Path,
    time::{Duration, SystemTime},
};

use crate::error::{ReelforgeError, ReelforgeResult};

/// Default retention window for job output directories.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct SweepStats {
    pub deleted_dirs: usize,
    pub freed_bytes: u64,
}

/// Delete whole job directories under `root` whose modification time is older
/// than `max_age`. Only directories are considered; a failure on one entry is
/// logged and the sweep continues. Scheduling this sweep is the host's
/// concern.
pub fn sweep_output_root(root: &Path, max_age: Duration) -> ReelforgeResult<SweepStats> {
    let mut stats = SweepStats::default();
    if !root.exists() {
        return Ok(stats);
    }

    let now = SystemTime::now();
    let entries = std::fs::read_dir(root).map_err(|e| {
        ReelforgeError::encoding(format!("failed to read output root '{}': {e}", root.display()))
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let expired = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|mtime| now.duration_since(mtime).ok())
            .is_some_and(|age| age > max_age);
        if !expired {
            continue;
        }

        let size = dir_size(&path);
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                stats.deleted_dirs += 1;
                stats.freed_bytes += size;
                tracing::info!(dir = %path.display(), "deleted expired job directory");
            }
            Err(e) => {
                tracing::warn!(dir = %path.display(), error = %e, "failed to delete job directory");
            }
        }
    }

    tracing::info!(
        deleted = stats.deleted_dirs,
        freed_mb = stats.freed_bytes / (1024 * 1024),
        "output sweep complete"
    );
    Ok(stats)
}

fn dir_size(dir: &Path) -> u64 {
    let mut total = 0u64;
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&current) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if let Ok(meta) = entry.metadata() {
                total += meta.len();
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn sweep_missing_root_is_a_noop() {
        let stats =
            sweep_output_root(Path::new("/nonexistent/sweep-root"), DEFAULT_MAX_AGE).unwrap();
        assert_eq!(stats, SweepStats::default());
    }

    #[test]
    fn sweep_deletes_expired_directories() {
        let root = tempfile::tempdir().unwrap();
        let old_job = root.path().join("job-old");
        fs::create_dir(&old_job).unwrap();
        fs::write(old_job.join("output.mp4"), vec![0u8; 1024]).unwrap();

        // std cannot backdate mtimes, so expire everything with a zero window.
        std::thread::sleep(Duration::from_millis(20));
        let stats = sweep_output_root(root.path(), Duration::ZERO).unwrap();
        assert_eq!(stats.deleted_dirs, 1);
        assert!(stats.freed_bytes >= 1024);
        assert!(!old_job.exists());
    }

    #[test]
    fn sweep_keeps_fresh_directories_and_plain_files() {
        let root = tempfile::tempdir().unwrap();
        let fresh_job = root.path().join("job-fresh");
        fs::create_dir(&fresh_job).unwrap();
        fs::write(root.path().join("stray.txt"), b"x").unwrap();

        let stats = sweep_output_root(root.path(), DEFAULT_MAX_AGE).unwrap();
        assert_eq!(stats.deleted_dirs, 0);
        assert!(fresh_job.exists());
        assert!(root.path().join("stray.txt").exists());
    }

    #[test]
    fn dir_size_counts_nested_files() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("sub")).unwrap();
        fs::write(root.path().join("a.bin"), vec![0u8; 100]).unwrap();
        fs::write(root.path().join("sub/b.bin"), vec![0u8; 50]).unwrap();
        assert_eq!(dir_size(root.path()), 150);
    }
}
