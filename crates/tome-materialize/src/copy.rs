//! Enumerate, filter, and copy a working directory into a staged cache tree.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;
use walkdir::WalkDir;

use tome_fs::{is_descendant, to_posix};

use crate::manifest::{ManifestEntry, ManifestWriter};
use crate::plan::FilterPlan;
use crate::swap::swap_into_place;
use crate::MaterializeError;

/// Files at or above this size are streamed instead of slurped.
const DEFAULT_STREAM_THRESHOLD: u64 = 2 * 1024 * 1024;

const STREAM_THRESHOLD_ENV: &str = "DOCS_CACHE_STREAM_THRESHOLD_MB";

#[derive(Debug, Clone)]
pub struct MaterializeRequest<'a> {
    pub source_id: &'a str,
    /// The fetched working directory at the pinned commit.
    pub repo_dir: &'a Path,
    /// The cache root; the staged tree replaces `<cache_dir>/<source_id>`.
    pub cache_dir: &'a Path,
    pub include: &'a [String],
    pub exclude: &'a [String],
    pub max_bytes: u64,
    pub max_files: Option<u64>,
    pub ignore_hidden: bool,
    pub unwrap_single_root_dir: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeOutcome {
    pub bytes: u64,
    pub file_count: u64,
    pub manifest_sha256: String,
}

/// Filter and copy the working directory into an atomically-swapped cache
/// directory, producing the manifest and its digest along the way.
///
/// Blocking; the orchestrator runs it on a blocking worker.
pub fn materialize_source(
    req: &MaterializeRequest<'_>,
) -> Result<MaterializeOutcome, MaterializeError> {
    let plan = FilterPlan::new(req.include, req.exclude, req.ignore_hidden)?;
    let mut files = enumerate(req.repo_dir, &plan)?;

    // The manifest order, and therefore the manifest hash, is fixed by the
    // POSIX rendering of the relative paths.
    files.sort();

    let strip = if req.unwrap_single_root_dir {
        common_prefix_segments(&files)
    } else {
        0
    };

    fs_err::create_dir_all(req.cache_dir)?;
    let staged = tempfile::Builder::new()
        .prefix(&format!(".tmp-{}-", req.source_id))
        .tempdir_in(req.cache_dir)?;

    let mut manifest = ManifestWriter::create(staged.path())?;
    let mut bytes = 0u64;
    let mut file_count = 0u64;

    for posix in &files {
        let emitted = strip_segments(posix, strip);
        let source = req.repo_dir.join(Path::new(posix));
        let dest = staged.path().join(Path::new(emitted));

        if !is_descendant(staged.path(), &dest) {
            return Err(MaterializeError::PathTraversal { path: dest });
        }

        let Some(mut reader) = open_no_follow(&source)? else {
            // A symlink slipped in between enumeration and open; skip it.
            debug!("skipping symlinked entry {posix}");
            continue;
        };
        let size = reader.metadata()?.len();

        file_count += 1;
        if let Some(max_files) = req.max_files {
            if file_count > max_files {
                return Err(MaterializeError::LimitExceeded {
                    id: req.source_id.to_string(),
                    field: "maxFiles",
                    actual: file_count,
                    limit: max_files,
                });
            }
        }
        bytes += size;
        if bytes > req.max_bytes {
            return Err(MaterializeError::LimitExceeded {
                id: req.source_id.to_string(),
                field: "maxBytes",
                actual: bytes,
                limit: req.max_bytes,
            });
        }

        if let Some(parent) = dest.parent() {
            fs_err::create_dir_all(parent)?;
        }
        copy_contents(&mut reader, &dest, size)?;

        manifest.push(&ManifestEntry {
            path: emitted.to_string(),
            size,
        })?;
    }

    let manifest_sha256 = manifest.finish()?;
    swap_into_place(req.cache_dir, req.source_id, staged)?;

    Ok(MaterializeOutcome {
        bytes,
        file_count,
        manifest_sha256,
    })
}

/// Walk the working directory, skipping `.git` and anything that is not a
/// regular file, and collect the POSIX relative paths the filter accepts.
fn enumerate(repo_dir: &Path, plan: &FilterPlan) -> Result<Vec<String>, MaterializeError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(repo_dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| entry.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(repo_dir) else {
            continue;
        };
        let posix = to_posix(relative);
        if plan.matches(&posix) {
            files.push(posix);
        }
    }
    Ok(files)
}

/// How many leading path segments all files share. The unwrap strips the
/// common prefix recursively, but always leaves at least one segment.
fn common_prefix_segments(files: &[String]) -> usize {
    let mut strip = 0;
    loop {
        let mut first = None;
        for file in files {
            let mut segments = file.split('/').skip(strip);
            let (Some(head), Some(_)) = (segments.next(), segments.next()) else {
                // Fewer than two remaining segments; stripping further would
                // erase the file name.
                return strip;
            };
            match first {
                None => first = Some(head),
                Some(seen) if seen == head => {}
                Some(_) => return strip,
            }
        }
        if first.is_none() {
            return strip;
        }
        strip += 1;
    }
}

fn strip_segments(path: &str, strip: usize) -> &str {
    let mut rest = path;
    for _ in 0..strip {
        match rest.split_once('/') {
            Some((_, tail)) => rest = tail,
            None => return rest,
        }
    }
    rest
}

/// Open a source file without following symlinks.
///
/// On Unix the open itself carries `O_NOFOLLOW`, and `ELOOP` (the link that
/// appeared after enumeration) maps to `None`. Elsewhere an `lstat` check
/// stands in.
#[cfg(unix)]
fn open_no_follow(path: &Path) -> Result<Option<std::fs::File>, MaterializeError> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut options = std::fs::OpenOptions::new();
    options.read(true);
    options.custom_flags(rustix::fs::OFlags::NOFOLLOW.bits() as i32);
    match options.open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.raw_os_error() == Some(rustix::io::Errno::LOOP.raw_os_error()) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

#[cfg(not(unix))]
fn open_no_follow(path: &Path) -> Result<Option<std::fs::File>, MaterializeError> {
    if fs_err::symlink_metadata(path)?.file_type().is_symlink() {
        return Ok(None);
    }
    Ok(Some(std::fs::File::open(path).map_err(std::io::Error::from)?))
}

/// Small files go through a single read+write; large ones are streamed.
fn copy_contents(
    reader: &mut std::fs::File,
    dest: &Path,
    size: u64,
) -> Result<(), MaterializeError> {
    if size < stream_threshold() {
        let mut contents = Vec::with_capacity(usize::try_from(size).unwrap_or(0));
        reader.read_to_end(&mut contents)?;
        fs_err::write(dest, contents)?;
    } else {
        let mut writer = std::io::BufWriter::new(fs_err::File::create(dest)?);
        std::io::copy(reader, &mut writer)?;
        writer.flush()?;
    }
    Ok(())
}

fn stream_threshold() -> u64 {
    static THRESHOLD: OnceLock<u64> = OnceLock::new();
    *THRESHOLD.get_or_init(|| {
        std::env::var(STREAM_THRESHOLD_ENV)
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map_or(DEFAULT_STREAM_THRESHOLD, |mib| mib * 1024 * 1024)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request<'a>(repo_dir: &'a Path, cache_dir: &'a Path, include: &'a [String]) -> MaterializeRequest<'a> {
        MaterializeRequest {
            source_id: "docs",
            repo_dir,
            cache_dir,
            include,
            exclude: &[],
            max_bytes: u64::MAX,
            max_files: None,
            ignore_hidden: false,
            unwrap_single_root_dir: true,
        }
    }

    fn all_md() -> Vec<String> {
        vec!["**/*.md".to_string()]
    }

    #[test]
    fn copies_matching_files_and_hashes_manifest() {
        let repo = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs_err::write(repo.path().join("README.md"), "hello").unwrap();
        fs_err::write(repo.path().join("main.rs"), "fn main() {}").unwrap();

        let include = all_md();
        let outcome = materialize_source(&request(repo.path(), cache.path(), &include)).unwrap();
        assert_eq!(outcome.file_count, 1);
        assert_eq!(outcome.bytes, 5);

        let source_dir = cache.path().join("docs");
        assert_eq!(
            fs_err::read_to_string(source_dir.join("README.md")).unwrap(),
            "hello"
        );
        assert_eq!(
            fs_err::read_to_string(source_dir.join(crate::MANIFEST_FILE)).unwrap(),
            "{\"path\":\"README.md\",\"size\":5}\n"
        );
        assert_eq!(
            outcome.manifest_sha256,
            crate::manifest_digest(&source_dir).unwrap()
        );
    }

    #[test]
    fn manifest_is_sorted_by_posix_path() {
        let repo = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        for name in ["z.md", "a.md", "m/inner.md"] {
            let path = repo.path().join(name);
            fs_err::create_dir_all(path.parent().unwrap()).unwrap();
            fs_err::write(path, "x").unwrap();
        }

        let include = all_md();
        materialize_source(&request(repo.path(), cache.path(), &include)).unwrap();
        let entries = crate::read_manifest(&cache.path().join("docs")).unwrap();
        let paths = entries.iter().map(|entry| entry.path.as_str()).collect::<Vec<_>>();
        assert_eq!(paths, ["a.md", "m/inner.md", "z.md"]);
    }

    #[test]
    fn unwraps_single_root_dir() {
        let repo = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs_err::create_dir_all(repo.path().join("package/docs")).unwrap();
        fs_err::write(repo.path().join("package/docs/a.md"), "a").unwrap();
        fs_err::write(repo.path().join("package/docs/b.md"), "b").unwrap();

        let include = all_md();
        materialize_source(&request(repo.path(), cache.path(), &include)).unwrap();
        // `package/docs/` is common to every file but stripping both
        // segments would leave bare file names, which is fine; stripping
        // stops when a single segment remains.
        let entries = crate::read_manifest(&cache.path().join("docs")).unwrap();
        let paths = entries.iter().map(|entry| entry.path.as_str()).collect::<Vec<_>>();
        assert_eq!(paths, ["a.md", "b.md"]);
    }

    #[test]
    fn unwrap_preserves_diverging_roots() {
        let repo = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        for name in ["one/a.md", "two/b.md"] {
            let path = repo.path().join(name);
            fs_err::create_dir_all(path.parent().unwrap()).unwrap();
            fs_err::write(path, "x").unwrap();
        }

        let include = all_md();
        materialize_source(&request(repo.path(), cache.path(), &include)).unwrap();
        let entries = crate::read_manifest(&cache.path().join("docs")).unwrap();
        let paths = entries.iter().map(|entry| entry.path.as_str()).collect::<Vec<_>>();
        assert_eq!(paths, ["one/a.md", "two/b.md"]);
    }

    #[test]
    fn max_files_fails_closed() {
        let repo = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs_err::write(repo.path().join("a.md"), "a").unwrap();
        fs_err::write(repo.path().join("b.md"), "b").unwrap();

        // Seed a previous materialization that must survive the failure.
        let include = all_md();
        let mut req = request(repo.path(), cache.path(), &include);
        materialize_source(&req).unwrap();

        fs_err::write(repo.path().join("c.md"), "c").unwrap();
        req.max_files = Some(2);
        let err = materialize_source(&req).unwrap_err();
        assert!(matches!(
            err,
            MaterializeError::LimitExceeded { field: "maxFiles", .. }
        ));

        // The old tree is untouched, and no staged debris is left behind.
        let entries = crate::read_manifest(&cache.path().join("docs")).unwrap();
        assert_eq!(entries.len(), 2);
        let debris = fs_err::read_dir(cache.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with(".tmp-"))
            .count();
        assert_eq!(debris, 0);
    }

    #[test]
    fn max_bytes_fails_closed() {
        let repo = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs_err::write(repo.path().join("big.md"), "0123456789").unwrap();

        let include = all_md();
        let mut req = request(repo.path(), cache.path(), &include);
        req.max_bytes = 9;
        let err = materialize_source(&req).unwrap_err();
        assert!(matches!(
            err,
            MaterializeError::LimitExceeded { field: "maxBytes", .. }
        ));
        assert!(!cache.path().join("docs").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_never_materialized() {
        let repo = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs_err::write(repo.path().join("real.md"), "real").unwrap();
        std::os::unix::fs::symlink(
            repo.path().join("real.md"),
            repo.path().join("link.md"),
        )
        .unwrap();

        let include = all_md();
        materialize_source(&request(repo.path(), cache.path(), &include)).unwrap();
        let source_dir = cache.path().join("docs");
        assert!(source_dir.join("real.md").exists());
        assert!(fs_err::symlink_metadata(source_dir.join("link.md")).is_err());
    }

    #[test]
    fn git_dir_is_always_ignored() {
        let repo = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        fs_err::create_dir_all(repo.path().join(".git")).unwrap();
        fs_err::write(repo.path().join(".git/description.md"), "internal").unwrap();
        fs_err::write(repo.path().join("README.md"), "hello").unwrap();

        let include = vec!["**/*".to_string()];
        let outcome = materialize_source(&request(repo.path(), cache.path(), &include)).unwrap();
        assert_eq!(outcome.file_count, 1);
    }
}
