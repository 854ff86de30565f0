//! `TOC.md` rendering.
//!
//! The table of contents is generated from the manifest, so it always agrees
//! with what was actually materialized. Up-to-date sources keep their
//! existing file untouched, which keeps repeated syncs mtime-stable.

use std::fmt::Write as _;
use std::io;
use std::path::Path;

use tome_types::TocMode;

use crate::manifest::read_manifest;
use crate::MaterializeError;

pub const TOC_FILE: &str = "TOC.md";

/// Source metadata rendered into the TOC header.
#[derive(Debug, Clone, Copy)]
pub struct TocContext<'a> {
    pub id: &'a str,
    pub repo: &'a str,
    pub git_ref: &'a str,
    pub commit: &'a str,
}

/// Render `TOC.md` into the source's cache directory.
pub fn write_toc(
    source_dir: &Path,
    ctx: &TocContext<'_>,
    mode: TocMode,
) -> Result<(), MaterializeError> {
    if !mode.is_enabled() {
        remove_toc(source_dir)?;
        return Ok(());
    }

    let mut entries = read_manifest(source_dir)?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    let mut out = String::new();
    let _ = writeln!(out, "# {}", ctx.id);
    let _ = writeln!(out);
    let _ = writeln!(out, "- repo: {}", ctx.repo);
    let _ = writeln!(out, "- ref: {}", ctx.git_ref);
    let _ = writeln!(out, "- commit: {}", ctx.commit);
    let _ = writeln!(out);
    let _ = writeln!(out, "## Contents");
    let _ = writeln!(out);

    match mode {
        TocMode::Tree => render_tree(&mut out, &entries),
        TocMode::Compressed => render_compressed(&mut out, &entries),
        TocMode::Off => unreachable!("disabled TOC handled above"),
    }

    fs_err::write(source_dir.join(TOC_FILE), out)?;
    Ok(())
}

/// Remove a stale `TOC.md`, if any.
pub fn remove_toc(source_dir: &Path) -> io::Result<()> {
    match fs_err::remove_file(source_dir.join(TOC_FILE)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err),
    }
}

/// Nested bullet list mirroring the directory structure.
fn render_tree(out: &mut String, entries: &[crate::ManifestEntry]) {
    let mut open_dirs: Vec<String> = Vec::new();
    for entry in entries {
        let segments = entry.path.split('/').collect::<Vec<_>>();
        let (dirs, name) = segments.split_at(segments.len() - 1);

        // Pop directories we have left, then print the newly-entered ones.
        let shared = open_dirs
            .iter()
            .zip(dirs)
            .take_while(|(open, dir)| open.as_str() == **dir)
            .count();
        open_dirs.truncate(shared);
        for dir in &dirs[shared..] {
            let _ = writeln!(out, "{}- {dir}/", "  ".repeat(open_dirs.len()));
            open_dirs.push((*dir).to_string());
        }
        let _ = writeln!(out, "{}- {}", "  ".repeat(open_dirs.len()), name[0]);
    }
}

/// One line per directory with a file count; compact for very large trees.
fn render_compressed(out: &mut String, entries: &[crate::ManifestEntry]) {
    let mut counts: std::collections::BTreeMap<&str, u64> = std::collections::BTreeMap::new();
    for entry in entries {
        let dir = entry.path.rsplit_once('/').map_or(".", |(dir, _)| dir);
        *counts.entry(dir).or_default() += 1;
    }
    for (dir, count) in counts {
        let files = if count == 1 { "file" } else { "files" };
        let _ = writeln!(out, "- {dir}/ ({count} {files})");
    }
}
