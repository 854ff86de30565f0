use std::path::{Component, Path, PathBuf};

use path_slash::PathExt;

/// Normalize a path lexically, without touching the filesystem.
///
/// `.` components are dropped and `..` components pop their parent where one
/// exists. Unpoppable leading `..` components are retained, which is what
/// [`retains_parent_refs`] keys off to reject escapes.
pub fn normalize_path(path: impl AsRef<Path>) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.as_ref().components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped {
                    // Rooted paths silently swallow `..` at the root; for
                    // relative paths the component has to be kept.
                    if !matches!(out.components().next_back(), Some(Component::RootDir)) {
                        out.push("..");
                    }
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Whether a normalized path still contains `..` components, i.e. escapes
/// whatever it was joined onto.
pub fn retains_parent_refs(path: impl AsRef<Path>) -> bool {
    path.as_ref()
        .components()
        .any(|component| matches!(component, Component::ParentDir))
}

/// Whether `candidate` lives strictly under `root`, compared lexically after
/// normalization. Equality does not count.
pub fn is_descendant(root: impl AsRef<Path>, candidate: impl AsRef<Path>) -> bool {
    let root = normalize_path(root);
    let candidate = normalize_path(candidate);
    candidate.starts_with(&root) && candidate != root
}

/// Render a path with forward slashes, the form every manifest and lockfile
/// stores regardless of host OS.
pub fn to_posix(path: impl AsRef<Path>) -> String {
    path.as_ref().to_slash_lossy().into_owned()
}
