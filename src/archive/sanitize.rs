//! Path checks that keep extraction inside the destination.
//!
//! Entry names are checked lexically first. Names that pass are then walked
//! on disk, since a symlink extracted earlier can turn a clean name into a
//! path that leaves the destination.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::EntryError;

/// Resolve an archive path against `dest`.
///
/// Absolute paths and any `..` component are rejected outright rather than
/// normalized, matching how hostile archives are usually built. A directory
/// between `dest` and the entry that already exists as a symlink is rejected
/// too, so nothing is ever written through a link.
pub(crate) fn resolve_entry_path(dest: &Path, entry_path: &str) -> Result<PathBuf, EntryError> {
    let relative = relative_components(Path::new(entry_path))?;
    check_parents(dest, &relative)?;
    Ok(dest.join(relative))
}

/// Walk the existing parents of `relative` under `dest`, failing on the first
/// one that is a symlink. The final component is left to the caller, which
/// replaces it.
fn check_parents(dest: &Path, relative: &Path) -> Result<(), EntryError> {
    let Some(parent) = relative.parent() else {
        return Ok(());
    };

    let mut current = dest.to_path_buf();
    for component in parent.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(meta) if meta.file_type().is_symlink() => return Err(EntryError::PathTraversal),
            Ok(_) => {}
            // Nothing deeper exists yet
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => return Err(EntryError::io(&current, e)),
        }
    }
    Ok(())
}

/// Hard link sources are resolved like entry names and may not be symlinks
/// themselves, since the copy fallback would follow them.
pub(crate) fn resolve_link_source(dest: &Path, source: &Path) -> Result<PathBuf, EntryError> {
    let resolved = resolve_entry_path(dest, &source.to_string_lossy())?;
    match fs::symlink_metadata(&resolved) {
        Ok(meta) if meta.file_type().is_symlink() => Err(EntryError::LinkEscape {
            target: source.to_path_buf(),
        }),
        _ => Ok(resolved),
    }
}

/// Check that a symlink at `link_path` (archive-relative) pointing to
/// `target` stays inside the destination once resolved.
pub(crate) fn check_symlink_target(link_path: &str, target: &Path) -> Result<(), EntryError> {
    let escape = || EntryError::LinkEscape {
        target: target.to_path_buf(),
    };

    if target.has_root() {
        return Err(escape());
    }

    let mut depth: Vec<&std::ffi::OsStr> = Path::new(link_path)
        .parent()
        .map(|p| {
            p.components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    for component in target.components() {
        match component {
            Component::Normal(part) => depth.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth.pop().is_none() {
                    return Err(escape());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }

    Ok(())
}

fn relative_components(path: &Path) -> Result<PathBuf, EntryError> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(EntryError::PathTraversal);
            }
        }
    }
    Ok(out)
}
