//! Projection of a cached tree into a user-chosen target directory.

use std::io;
use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

use tome_types::TargetMode;

/// Replace `target_dir` with a view of `source_dir`, as a directory symlink
/// (junction on Windows) or a recursive copy.
///
/// Symlink creation commonly fails on Windows without developer mode and on
/// filesystems that do not support links; those failures degrade to a copy.
/// The degradation is only worth a warning when the user explicitly asked
/// for symlinks. Returns the mode that actually got applied.
pub fn apply_target_dir(
    source_dir: &Path,
    target_dir: &Path,
    mode: TargetMode,
    explicit: bool,
) -> io::Result<TargetMode> {
    if let Some(parent) = target_dir.parent() {
        fs_err::create_dir_all(parent)?;
    }
    tome_fs::rm_rf(target_dir)?;

    match mode {
        TargetMode::Copy => {
            copy_tree(source_dir, target_dir)?;
            Ok(TargetMode::Copy)
        }
        TargetMode::Symlink => match symlink_dir(source_dir, target_dir) {
            Ok(()) => Ok(TargetMode::Symlink),
            Err(err) if symlink_unsupported(&err) => {
                if explicit {
                    warn!(
                        "could not symlink {} -> {} ({err}); falling back to a copy",
                        target_dir.display(),
                        source_dir.display()
                    );
                }
                copy_tree(source_dir, target_dir)?;
                Ok(TargetMode::Copy)
            }
            Err(err) => Err(err),
        },
    }
}

/// `EPERM | EACCES | ENOTSUP | EINVAL`, by error kind.
fn symlink_unsupported(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::Unsupported | io::ErrorKind::InvalidInput
    )
}

#[cfg(unix)]
fn symlink_dir(source: &Path, target: &Path) -> io::Result<()> {
    fs_err::os::unix::fs::symlink(source, target)
}

#[cfg(windows)]
fn symlink_dir(source: &Path, target: &Path) -> io::Result<()> {
    junction::create(source, target)
}

#[cfg(not(any(unix, windows)))]
fn symlink_dir(_source: &Path, _target: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symlinks are not supported on this platform",
    ))
}

fn copy_tree(source: &Path, target: &Path) -> io::Result<()> {
    fs_err::create_dir_all(target)?;
    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let dest = target.join(relative);
        if entry.file_type().is_dir() {
            fs_err::create_dir_all(&dest)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = dest.parent() {
                fs_err::create_dir_all(parent)?;
            }
            fs_err::copy(entry.path(), &dest)?;
        }
        // Symlinks never occur in a cache directory; anything else is
        // skipped rather than projected.
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_source(dir: &Path) {
        fs_err::create_dir_all(dir.join("guide")).unwrap();
        fs_err::write(dir.join("README.md"), "readme").unwrap();
        fs_err::write(dir.join("guide/install.md"), "install").unwrap();
    }

    #[test]
    fn copy_mode_mirrors_the_tree() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("cache/docs");
        let target = root.path().join("vendor/docs");
        fs_err::create_dir_all(&source).unwrap();
        seed_source(&source);

        let applied =
            apply_target_dir(&source, &target, TargetMode::Copy, true).unwrap();
        assert_eq!(applied, TargetMode::Copy);
        assert_eq!(
            fs_err::read_to_string(target.join("guide/install.md")).unwrap(),
            "install"
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_mode_links_the_directory() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("cache/docs");
        let target = root.path().join("vendor/docs");
        fs_err::create_dir_all(&source).unwrap();
        seed_source(&source);

        let applied =
            apply_target_dir(&source, &target, TargetMode::Symlink, true).unwrap();
        assert_eq!(applied, TargetMode::Symlink);
        assert!(fs_err::symlink_metadata(&target).unwrap().file_type().is_symlink());
        assert_eq!(
            fs_err::read_to_string(target.join("README.md")).unwrap(),
            "readme"
        );
    }

    #[test]
    fn existing_target_is_replaced() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("cache/docs");
        let target = root.path().join("vendor/docs");
        fs_err::create_dir_all(&source).unwrap();
        seed_source(&source);
        fs_err::create_dir_all(&target).unwrap();
        fs_err::write(target.join("stale.md"), "stale").unwrap();

        apply_target_dir(&source, &target, TargetMode::Copy, false).unwrap();
        assert!(!target.join("stale.md").exists());
        assert!(target.join("README.md").exists());
    }
}
