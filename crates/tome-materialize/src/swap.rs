use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tracing::{debug, warn};

use tome_fs::FileLock;

use crate::MaterializeError;

/// How long to spin on the per-source lock before giving up.
const SWAP_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Atomically replace `cache_dir/<source_id>` with the fully-built tree in
/// `staged`.
///
/// The previous directory is renamed aside to `<id>.bak-<hex>` first, so a
/// failed swap can restore it; a concurrent reader therefore only ever sees
/// the old tree or the new one, never a mixture. The advisory
/// `<id>.lock` marker serializes swaps of the same source across processes.
pub(crate) fn swap_into_place(
    cache_dir: &Path,
    source_id: &str,
    staged: TempDir,
) -> Result<(), MaterializeError> {
    let final_dir = cache_dir.join(source_id);
    let _lock = FileLock::acquire_blocking(
        cache_dir.join(format!("{source_id}.lock")),
        SWAP_LOCK_TIMEOUT,
    )?;

    let backup = if fs_err::symlink_metadata(&final_dir).is_ok() {
        let backup = cache_dir.join(format!("{source_id}.bak-{:08x}", fastrand::u32(..)));
        fs_err::rename(&final_dir, &backup)?;
        Some(backup)
    } else {
        None
    };

    // From here on the TempDir no longer owns deletion; on success the
    // directory *is* the cache entry.
    let staged = staged.into_path();

    match fs_err::rename(&staged, &final_dir) {
        Ok(()) => {
            if let Some(backup) = backup {
                if let Err(err) = tome_fs::rm_rf(&backup) {
                    debug!("failed to remove backup {}: {err}", backup.display());
                }
            }
            Ok(())
        }
        Err(err) => {
            if let Some(backup) = backup {
                // Restore failures must not mask the original error.
                if let Err(restore) = fs_err::rename(&backup, &final_dir) {
                    warn!(
                        "failed to restore {} from backup {}: {restore}",
                        final_dir.display(),
                        backup.display()
                    );
                }
            }
            if let Err(cleanup) = tome_fs::rm_rf(&staged) {
                debug!("failed to remove staged tree {}: {cleanup}", staged.display());
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(cache_dir: &Path, files: &[(&str, &str)]) -> TempDir {
        let staged = tempfile::Builder::new()
            .prefix(".tmp-docs-")
            .tempdir_in(cache_dir)
            .unwrap();
        for (name, contents) in files {
            fs_err::write(staged.path().join(name), contents).unwrap();
        }
        staged
    }

    #[test]
    fn first_swap_creates_the_directory() {
        let cache = tempfile::tempdir().unwrap();
        let staged = stage(cache.path(), &[("a.md", "one")]);
        swap_into_place(cache.path(), "docs", staged).unwrap();

        let dir = cache.path().join("docs");
        assert_eq!(fs_err::read_to_string(dir.join("a.md")).unwrap(), "one");
        assert!(!cache.path().join("docs.lock").exists());
    }

    #[test]
    fn second_swap_replaces_wholesale() {
        let cache = tempfile::tempdir().unwrap();
        swap_into_place(cache.path(), "docs", stage(cache.path(), &[("a.md", "one"), ("b.md", "two")])).unwrap();
        swap_into_place(cache.path(), "docs", stage(cache.path(), &[("a.md", "one"), ("c.md", "three")])).unwrap();

        let dir = cache.path().join("docs");
        assert!(dir.join("a.md").exists());
        assert!(!dir.join("b.md").exists());
        assert!(dir.join("c.md").exists());

        // No `.bak-*` or `.tmp-*` debris survives a successful swap.
        let leftovers = fs_err::read_dir(cache.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".bak-") || name.starts_with(".tmp-"))
            .collect::<Vec<_>>();
        assert_eq!(leftovers, Vec::<String>::new());
    }

    #[test]
    fn held_lock_blocks_the_swap() {
        let cache = tempfile::tempdir().unwrap();
        let _held =
            FileLock::acquire_blocking(cache.path().join("docs.lock"), Duration::from_secs(1))
                .unwrap();
        let staged = stage(cache.path(), &[("a.md", "one")]);
        let err = swap_into_place(cache.path(), "docs", staged).unwrap_err();
        assert!(matches!(
            err,
            MaterializeError::Lock(tome_fs::LockError::Timeout(_))
        ));
    }
}
