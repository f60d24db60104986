//! Path validation: keep model-supplied paths inside the project root.
//!
//! Paths arrive straight from model output, so they are checked lexically
//! before touching the filesystem. Absolute paths, drive prefixes and any
//! `..` component are rejected outright; `.` components are dropped.

use bolty_core::error::WorkspaceError;
use std::path::{Component, Path, PathBuf};

/// Join `relative` onto `root`, rejecting anything that could escape it.
pub fn resolve_relative(root: &Path, relative: &str) -> Result<PathBuf, WorkspaceError> {
    let reject = |reason: &str| WorkspaceError::PathRejected {
        path: relative.into(),
        reason: reason.into(),
    };

    let trimmed = relative.trim();
    if trimmed.is_empty() {
        return Err(reject("empty path"));
    }

    // Windows separators would slip past `Path` parsing on unix
    let normalized = trimmed.replace('\\', "/");
    if normalized.starts_with('/') {
        return Err(reject("absolute paths are not allowed"));
    }

    let mut clean = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => return Err(reject("path traversal is not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(reject("absolute paths are not allowed"));
            }
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(reject("path names no file"));
    }

    Ok(root.join(clean))
}
