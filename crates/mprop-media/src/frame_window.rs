//! Circular reordering of a frame range around a reference frame.
//!
//! Propagation always seeds from index 0. To seed from an arbitrary reference
//! frame the range is rotated so that `reference` comes first:
//!
//! ```text
//! range [1001, 1200], reference 1112
//! index  0    1    ...  88   89   ...  199
//! frame  1112 1113 ...  1200 1001 ...  1111
//! ```

use mprop_models::FrameRange;

use crate::error::{MediaError, MediaResult};

/// Bidirectional mapping between propagation indices and real frame numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameWindow {
    range: FrameRange,
    reference: u32,
    /// Real frame number per propagation index
    frames: Vec<u32>,
}

impl FrameWindow {
    /// Build the mapping for `[min, max]` starting at `reference`.
    pub fn new(min: u32, max: u32, reference: u32) -> MediaResult<Self> {
        if min > max || reference < min || reference > max {
            return Err(MediaError::InvalidReferenceFrame { reference, min, max });
        }

        let frames: Vec<u32> = (reference..=max).chain(min..reference).collect();
        let window = Self {
            range: FrameRange { min, max },
            reference,
            frames,
        };
        window.verify()?;
        Ok(window)
    }

    /// Build the mapping for a validated range.
    pub fn for_range(range: FrameRange, reference: u32) -> MediaResult<Self> {
        Self::new(range.min, range.max, reference)
    }

    pub fn range(&self) -> FrameRange {
        self.range
    }

    pub fn reference(&self) -> u32 {
        self.reference
    }

    /// Number of frames in the window.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Real frame number at propagation index `index`.
    pub fn index_to_frame(&self, index: usize) -> Option<u32> {
        self.frames.get(index).copied()
    }

    /// Propagation index of real frame `frame`.
    pub fn frame_to_index(&self, frame: u32) -> Option<usize> {
        if !self.range.contains(frame) {
            return None;
        }
        let offset = if frame >= self.reference {
            frame - self.reference
        } else {
            (self.range.max - self.reference + 1) + (frame - self.range.min)
        };
        Some(offset as usize)
    }

    /// Iterate `(index, frame)` pairs in propagation order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.frames.iter().copied().enumerate()
    }

    fn verify(&self) -> MediaResult<()> {
        if self.frames.len() != self.range.count() {
            return Err(MediaError::internal(format!(
                "frame window has {} entries for {} frames",
                self.frames.len(),
                self.range.count()
            )));
        }
        if self.frames.first() != Some(&self.reference) {
            return Err(MediaError::internal("frame window does not start at the reference frame"));
        }

        let mut seen = vec![false; self.frames.len()];
        for (index, frame) in self.iter() {
            let slot = (frame - self.range.min) as usize;
            if seen[slot] || self.frame_to_index(frame) != Some(index) {
                return Err(MediaError::internal(format!(
                    "frame window is not a bijection at index {} (frame {})",
                    index, frame
                )));
            }
            seen[slot] = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_around_reference() {
        let window = FrameWindow::new(1001, 1200, 1112).unwrap();
        assert_eq!(window.len(), 200);
        assert_eq!(window.index_to_frame(0), Some(1112));
        assert_eq!(window.index_to_frame(1), Some(1113));
        assert_eq!(window.index_to_frame(88), Some(1200));
        assert_eq!(window.index_to_frame(89), Some(1001));
        assert_eq!(window.index_to_frame(199), Some(1111));
        assert_eq!(window.index_to_frame(200), None);
    }

    #[test]
    fn test_single_frame_range() {
        let window = FrameWindow::new(5, 5, 5).unwrap();
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![(0, 5)]);
        assert_eq!(window.frame_to_index(5), Some(0));
    }

    #[test]
    fn test_reference_at_bounds() {
        let first = FrameWindow::new(10, 14, 10).unwrap();
        assert_eq!(first.iter().map(|(_, f)| f).collect::<Vec<_>>(), vec![10, 11, 12, 13, 14]);

        let last = FrameWindow::new(10, 14, 14).unwrap();
        assert_eq!(last.iter().map(|(_, f)| f).collect::<Vec<_>>(), vec![14, 10, 11, 12, 13]);
    }

    #[test]
    fn test_reference_outside_range() {
        assert!(matches!(
            FrameWindow::new(10, 20, 21),
            Err(MediaError::InvalidReferenceFrame {
                reference: 21,
                min: 10,
                max: 20
            })
        ));
        assert!(FrameWindow::new(10, 20, 9).is_err());
        assert!(FrameWindow::new(20, 10, 15).is_err());
    }

    #[test]
    fn test_round_trip_over_many_windows() {
        for (min, max) in [(0u32, 0u32), (0, 9), (1, 2), (97, 131), (1001, 1200)] {
            for reference in min..=max {
                let window = FrameWindow::new(min, max, reference).unwrap();
                assert_eq!(window.index_to_frame(0), Some(reference));
                for index in 0..window.len() {
                    let frame = window.index_to_frame(index).unwrap();
                    assert!((min..=max).contains(&frame));
                    assert_eq!(window.frame_to_index(frame), Some(index));
                }
            }
        }
    }

    #[test]
    fn test_frame_outside_window() {
        let window = FrameWindow::new(1001, 1200, 1112).unwrap();
        assert_eq!(window.frame_to_index(1000), None);
        assert_eq!(window.frame_to_index(1201), None);
    }
}
