//! Filesystem helpers for presenting source frames under new names.
//!
//! Links are preferred since they cost nothing regardless of frame size. Some
//! filesystems or accounts cannot create them (Windows without developer mode,
//! FAT volumes, some network shares), in which case the bytes are copied.

use serde::Serialize;
use std::io;
use std::path::Path;

use crate::error::{MediaError, MediaResult};

/// How a frame entry was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Link,
    Copy,
}

/// Place `src` at `dst`, linking when `prefer_link` is set and falling back to a copy.
///
/// # Errors
///
/// Returns [`MediaError::MaterializationFailure`] when neither a link nor a
/// copy could be created.
pub fn link_or_copy(src: &Path, dst: &Path, prefer_link: bool) -> MediaResult<EntryKind> {
    if prefer_link {
        match symlink(src, dst) {
            Ok(()) => return Ok(EntryKind::Link),
            Err(e) => {
                tracing::debug!(
                    "Link failed, falling back to copy: {} -> {}: {}",
                    src.display(),
                    dst.display(),
                    e
                );
                // Never copy through a leftover entry, it may be a link back to `src`.
                let _ = std::fs::remove_file(dst);
            }
        }
    }

    std::fs::copy(src, dst).map_err(|e| {
        tracing::error!(
            "Failed to copy frame: {} -> {}: {}",
            src.display(),
            dst.display(),
            e
        );
        MediaError::materialization_failed(
            dst,
            format!("link and copy from {} failed: {}", src.display(), e),
        )
    })?;

    Ok(EntryKind::Copy)
}

#[cfg(unix)]
fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(src, dst)
}

#[cfg(windows)]
fn symlink(src: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(src, dst)
}

#[cfg(not(any(unix, windows)))]
fn symlink(_src: &Path, _dst: &Path) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "links are not supported"))
}
