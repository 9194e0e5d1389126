//! Sequence materializer.
//!
//! Presents the frames of a window as a zero-based numbered sequence in
//! propagation order, inside a temporary directory owned by the returned
//! [`MaterializedSequence`]. The directory is removed by [`MaterializedSequence::release`]
//! or, on any other exit path including unwinding, when the handle is dropped.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

use mprop_models::FrameTemplate;

use crate::error::{MediaError, MediaResult};
use crate::frame_window::FrameWindow;
use crate::fs_utils::{link_or_copy, EntryKind};

/// Options controlling how entries are created.
#[derive(Debug, Clone)]
pub struct MaterializeOptions {
    /// Try filesystem links before copying
    pub prefer_links: bool,
    /// Parent directory for the temporary sequence (system temp dir when unset)
    pub scratch_root: Option<PathBuf>,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            prefer_links: true,
            scratch_root: None,
        }
    }
}

/// Entry counts of a materialized sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeStats {
    pub links: usize,
    pub copies: usize,
}

impl MaterializeStats {
    pub fn total(&self) -> usize {
        self.links + self.copies
    }
}

/// A reordered on-disk view of a source sequence.
#[derive(Debug)]
pub struct MaterializedSequence {
    template: FrameTemplate,
    dir: Option<TempDir>,
    stats: MaterializeStats,
}

impl MaterializedSequence {
    /// Template addressing entries by propagation index.
    pub fn template(&self) -> &FrameTemplate {
        &self.template
    }

    /// Path of the entry at propagation index `index`.
    pub fn entry_path(&self, index: usize) -> PathBuf {
        self.template.frame_path(index as u32)
    }

    /// Temporary directory, `None` for a single-file source.
    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    pub fn stats(&self) -> MaterializeStats {
        self.stats
    }

    /// Delete the temporary directory. A no-op for a single-file source.
    pub fn release(self) -> MediaResult<()> {
        if let Some(dir) = self.dir {
            let path = dir.path().to_path_buf();
            dir.close()?;
            debug!("Released materialized sequence {}", path.display());
        }
        Ok(())
    }
}

/// Materialize `source` in the propagation order of `window`.
///
/// # Errors
///
/// - [`MediaError::SourceFrameMissing`] if any frame of the window does not exist
/// - [`MediaError::MaterializationFailure`] if an entry can be neither linked nor copied
///
/// On error the partially built directory is removed before returning.
pub fn materialize(
    source: &FrameTemplate,
    window: &FrameWindow,
    options: &MaterializeOptions,
) -> MediaResult<MaterializedSequence> {
    let Some(width) = source.digit_width() else {
        let path = source.frame_path(window.reference());
        if !path.is_file() {
            return Err(MediaError::SourceFrameMissing {
                frame: window.reference(),
                path,
            });
        }
        return Ok(MaterializedSequence {
            template: source.clone(),
            dir: None,
            stats: MaterializeStats::default(),
        });
    };

    let dir = create_temp_dir(options.scratch_root.as_deref())?;
    let template = match source.extension() {
        Some(ext) => FrameTemplate::numbered_in(dir.path(), width, &ext)?,
        None => FrameTemplate::parse(
            dir.path()
                .join(format!("%0{}d", width))
                .to_string_lossy()
                .into_owned(),
        )?,
    };

    let mut stats = MaterializeStats::default();
    for (index, frame) in window.iter() {
        let src = source.frame_path(frame);
        if !src.is_file() {
            return Err(MediaError::SourceFrameMissing { frame, path: src });
        }
        // Relative link targets would resolve against the temporary directory.
        let src = std::path::absolute(&src)?;
        let dst = template.frame_path(index as u32);

        match link_or_copy(&src, &dst, options.prefer_links)? {
            EntryKind::Link => stats.links += 1,
            EntryKind::Copy => stats.copies += 1,
        }
    }

    info!(
        frames = window.len(),
        links = stats.links,
        copies = stats.copies,
        "Materialized {} in {}",
        source,
        dir.path().display()
    );

    Ok(MaterializedSequence {
        template,
        dir: Some(dir),
        stats,
    })
}

fn create_temp_dir(scratch_root: Option<&Path>) -> MediaResult<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("mprop-seq-");

    let result = match scratch_root {
        Some(root) => std::fs::create_dir_all(root).and_then(|_| builder.tempdir_in(root)),
        None => builder.tempdir(),
    };

    result.map_err(|e| {
        let parent = scratch_root
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);
        MediaError::materialization_failed(
            parent,
            format!("cannot create temporary directory: {}", e),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_sequence(dir: &Path, min: u32, max: u32) -> FrameTemplate {
        for frame in min..=max {
            fs::write(dir.join(format!("plate.{:04}.png", frame)), frame.to_string()).unwrap();
        }
        FrameTemplate::parse(dir.join("plate.%04d.png").to_string_lossy().into_owned()).unwrap()
    }

    #[test]
    fn test_materialize_in_propagation_order() {
        let src_dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let source = write_sequence(src_dir.path(), 1001, 1010);
        let window = FrameWindow::new(1001, 1010, 1005).unwrap();
        let options = MaterializeOptions {
            prefer_links: true,
            scratch_root: Some(scratch.path().to_path_buf()),
        };

        let seq = materialize(&source, &window, &options).unwrap();
        let dir = seq.dir().unwrap().to_path_buf();
        assert!(dir.starts_with(scratch.path()));
        assert_eq!(fs::read_dir(&dir).unwrap().count(), window.len());
        assert_eq!(seq.stats().total(), window.len());

        for (index, frame) in window.iter() {
            let entry = seq.entry_path(index);
            assert_eq!(entry, dir.join(format!("{:04}.png", index)));
            assert_eq!(fs::read_to_string(&entry).unwrap(), frame.to_string());
        }

        seq.release().unwrap();
        assert!(!dir.exists());
    }

    #[test]
    fn test_copies_when_links_disabled() {
        let src_dir = TempDir::new().unwrap();
        let source = write_sequence(src_dir.path(), 1, 3);
        let window = FrameWindow::new(1, 3, 2).unwrap();
        let options = MaterializeOptions {
            prefer_links: false,
            scratch_root: None,
        };

        let seq = materialize(&source, &window, &options).unwrap();
        assert_eq!(seq.stats(), MaterializeStats { links: 0, copies: 3 });
        assert_eq!(fs::read_to_string(seq.entry_path(2)).unwrap(), "1");
        seq.release().unwrap();
    }

    #[test]
    fn test_missing_frame_cleans_up() {
        let src_dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let source = write_sequence(src_dir.path(), 1, 5);
        fs::remove_file(src_dir.path().join("plate.0004.png")).unwrap();
        let window = FrameWindow::new(1, 5, 3).unwrap();
        let options = MaterializeOptions {
            prefer_links: true,
            scratch_root: Some(scratch.path().to_path_buf()),
        };

        let err = materialize(&source, &window, &options).unwrap_err();
        assert!(matches!(err, MediaError::SourceFrameMissing { frame: 4, .. }));
        assert_eq!(fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_three_digit_sequence() {
        let src_dir = TempDir::new().unwrap();
        for frame in 8..=12u32 {
            fs::write(src_dir.path().join(format!("f_{:03}.jpg", frame)), [frame as u8]).unwrap();
        }
        let pattern = src_dir.path().join("f_###.jpg");
        let source = FrameTemplate::parse(pattern.to_string_lossy().into_owned()).unwrap();
        let window = FrameWindow::new(8, 12, 12).unwrap();

        let seq = materialize(&source, &window, &MaterializeOptions::default()).unwrap();
        assert_eq!(seq.template().digit_width(), Some(3));
        assert!(seq.entry_path(0).ends_with("000.jpg"));
        assert_eq!(fs::read(seq.entry_path(0)).unwrap(), vec![12u8]);
        assert_eq!(fs::read(seq.entry_path(1)).unwrap(), vec![8u8]);
        seq.release().unwrap();
    }

    #[test]
    fn test_single_file_source_is_passed_through() {
        let src_dir = TempDir::new().unwrap();
        let still = src_dir.path().join("still.png");
        fs::write(&still, b"x").unwrap();
        let source = FrameTemplate::parse(still.to_string_lossy().into_owned()).unwrap();
        let window = FrameWindow::new(1, 1, 1).unwrap();

        let seq = materialize(&source, &window, &MaterializeOptions::default()).unwrap();
        assert!(seq.dir().is_none());
        assert_eq!(seq.template(), &source);
        seq.release().unwrap();
        assert!(still.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let src_dir = TempDir::new().unwrap();
        let source = write_sequence(src_dir.path(), 1, 2);
        let window = FrameWindow::new(1, 2, 1).unwrap();

        let seq = materialize(&source, &window, &MaterializeOptions::default()).unwrap();
        let dir = seq.dir().unwrap().to_path_buf();
        drop(seq);
        assert!(!dir.exists());
    }
}
