use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Seed bounding box in source-pixel coordinates, drawn on the reference frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct SeedRegion {
    /// X coordinate of the top-left corner
    pub x: u32,
    /// Y coordinate of the top-left corner
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl SeedRegion {
    /// Create a new seed region.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Check that the region covers at least one pixel.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Corner form `(x0, y0, x1, y1)` with exclusive right/bottom edges.
    pub fn corners(&self) -> (u32, u32, u32, u32) {
        (
            self.x,
            self.y,
            self.x.saturating_add(self.width),
            self.y.saturating_add(self.height),
        )
    }

    /// Intersect with a `frame_width` x `frame_height` frame.
    ///
    /// Returns `None` when nothing of the region lies inside the frame.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<SeedRegion> {
        let (x0, y0, x1, y1) = self.corners();
        let x1 = x1.min(frame_width);
        let y1 = y1.min(frame_height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some(SeedRegion::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Whether pixel `(px, py)` lies inside the region.
    pub fn contains(&self, px: u32, py: u32) -> bool {
        let (x0, y0, x1, y1) = self.corners();
        px >= x0 && px < x1 && py >= y0 && py < y1
    }
}
