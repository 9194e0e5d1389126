//! Per-frame object masks and their rendering.

use image::{GrayImage, Luma, Rgb, RgbImage};

use mprop_models::SeedRegion;

/// Colours assigned to objects, indexed by `(object_id + 1) % len`.
pub const MASK_PALETTE: &[[u8; 3]] = &[[255, 255, 255]];

/// Binary mask of one tracked object. Non-zero pixels are inside.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMask {
    pub object_id: u32,
    pub mask: GrayImage,
}

impl ObjectMask {
    /// Mask covering `region` on a `width` x `height` frame.
    pub fn from_region(object_id: u32, width: u32, height: u32, region: SeedRegion) -> Self {
        let mask = GrayImage::from_fn(width, height, |x, y| {
            if region.contains(x, y) {
                Luma([255])
            } else {
                Luma([0])
            }
        });
        Self { object_id, mask }
    }

    /// Number of pixels inside the mask.
    pub fn area(&self) -> usize {
        self.mask.pixels().filter(|p| p.0[0] > 0).count()
    }
}

/// Masks produced for one propagation index.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameMasks {
    /// Propagation index (not the real frame number)
    pub index: usize,
    pub width: u32,
    pub height: u32,
    pub objects: Vec<ObjectMask>,
}

impl FrameMasks {
    /// Render all objects onto a black RGB canvas of the frame size.
    pub fn render(&self) -> RgbImage {
        render_masks(self.width, self.height, &self.objects)
    }
}

/// Paint each object's mask with its palette colour.
///
/// Later objects overwrite earlier ones where they overlap. Masks larger than
/// the canvas are cropped.
pub fn render_masks(width: u32, height: u32, objects: &[ObjectMask]) -> RgbImage {
    let mut canvas = RgbImage::new(width, height);

    for object in objects {
        let color = Rgb(MASK_PALETTE[(object.object_id as usize + 1) % MASK_PALETTE.len()]);
        let w = width.min(object.mask.width());
        let h = height.min(object.mask.height());
        for y in 0..h {
            for x in 0..w {
                if object.mask.get_pixel(x, y).0[0] > 0 {
                    canvas.put_pixel(x, y, color);
                }
            }
        }
    }

    canvas
}
