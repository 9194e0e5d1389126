//! Propagation progress.

use serde::{Deserialize, Serialize};

/// Progress after a mask has been produced for one propagation index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationProgress {
    /// Propagation index of the frame just processed
    pub index: usize,
    /// Real frame number of that index
    pub frame: u32,
    /// Last frame of the range
    pub max_frame: u32,
    /// Frames in the window
    pub total: usize,
}

impl PropagationProgress {
    /// Share of the window processed before this frame, in whole percent.
    ///
    /// Indices advance monotonically, so the percentage never regresses even
    /// though real frame numbers wrap around.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.index as f64 / self.total as f64) * 100.0).min(100.0) as u8
    }

    /// Stage text for this frame, e.g. `Frame 1112/1200 (0%)`.
    pub fn stage_text(&self) -> String {
        format!("Frame {}/{} ({}%)", self.frame, self.max_frame, self.percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        let p = |index| PropagationProgress {
            index,
            frame: 0,
            max_frame: 0,
            total: 200,
        };
        assert_eq!(p(0).percent(), 0);
        assert_eq!(p(1).percent(), 0);
        assert_eq!(p(100).percent(), 50);
        assert_eq!(p(199).percent(), 99);
    }

    #[test]
    fn test_stage_text() {
        let progress = PropagationProgress {
            index: 89,
            frame: 1001,
            max_frame: 1200,
            total: 200,
        };
        assert_eq!(progress.stage_text(), "Frame 1001/1200 (44%)");
    }

    #[test]
    fn test_empty_window() {
        assert_eq!(PropagationProgress::default().percent(), 0);
    }
}
