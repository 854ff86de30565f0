use std::io;
use std::path::Path;

/// Tally of a recursive removal. `bytes` sums `len()` per path, so hard
/// links are counted once per link and sparse files at their logical size.
#[derive(Debug, Default, Clone, Copy)]
pub struct Removal {
    pub files: u64,
    pub dirs: u64,
    pub bytes: u64,
}

impl std::ops::AddAssign for Removal {
    fn add_assign(&mut self, other: Self) {
        self.files += other.files;
        self.dirs += other.dirs;
        self.bytes += other.bytes;
    }
}

/// Delete a file or directory tree, returning a [`Removal`] tally.
///
/// A missing path is a no-op. Symlinks are removed, never followed.
/// Read-only files get their permission bit cleared and a second attempt.
pub fn rm_rf(path: impl AsRef<Path>) -> io::Result<Removal> {
    let path = path.as_ref();
    let mut tally = Removal::default();

    let metadata = match fs_err::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(tally),
        Err(err) => return Err(err),
    };
    if metadata.is_dir() {
        remove_tree(path, &mut tally)?;
    } else {
        tally.files += 1;
        tally.bytes += metadata.len();
        force_remove_file(path)?;
    }
    Ok(tally)
}

/// Empty out `dir` depth-first, then remove the directory itself.
fn remove_tree(dir: &Path, tally: &mut Removal) -> io::Result<()> {
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = entry.path();

        if file_type.is_dir() {
            remove_tree(&path, tally)?;
        } else if cfg!(windows) && file_type.is_symlink() {
            // Junctions look like symlinks but only `remove_dir` takes them.
            tally.files += 1;
            fs_err::remove_dir(&path)?;
        } else {
            if let Ok(metadata) = entry.metadata() {
                tally.bytes += metadata.len();
            }
            tally.files += 1;
            force_remove_file(&path)?;
        }
    }
    tally.dirs += 1;

    // Anything the OS dropped in since the listing (editor locks, indexer
    // files) would fail a plain `remove_dir`.
    match fs_err::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// `remove_file`, retried once without the read-only bit when the first
/// attempt is refused.
fn force_remove_file(path: &Path) -> io::Result<()> {
    match fs_err::remove_file(path) {
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            if clear_readonly(path).unwrap_or(false) {
                fs_err::remove_file(path)
            } else {
                Err(err)
            }
        }
        result => result,
    }
}

fn clear_readonly(path: &Path) -> io::Result<bool> {
    let mut permissions = path.metadata()?.permissions();
    if !permissions.readonly() {
        return Ok(false);
    }
    // The file is on its way out; world-writable is fine.
    #[allow(clippy::permissions_set_readonly_false)]
    permissions.set_readonly(false);
    fs_err::set_permissions(path, permissions)?;
    Ok(true)
}
