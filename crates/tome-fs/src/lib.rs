use std::io::Write;
use std::path::Path;

pub use lock::{FileLock, LockError};
pub use path::{is_descendant, normalize_path, retains_parent_refs, to_posix};
pub use removal::{rm_rf, Removal};

mod lock;
mod path;
mod removal;

/// Write `contents` to `path` atomically: the bytes land in a sibling
/// temporary file which is then renamed into place, so readers never observe
/// a half-written file and a crash leaves the previous contents intact.
pub fn write_atomic(path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> std::io::Result<()> {
    let path = path.as_ref();
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no parent directory for `{}`", path.display()),
        )
    })?;
    let mut file = tempfile::NamedTempFile::new_in(parent)?;
    file.write_all(contents.as_ref())?;
    file.flush()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_atomic_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.lock");
        write_atomic(&path, "one").unwrap();
        write_atomic(&path, "two").unwrap();
        assert_eq!(fs_err::read_to_string(&path).unwrap(), "two");
    }
}
