//! Raster views of traced geometry.
//!
//! `rasterize` turns a pixel-space `Mpoly` back into a mask (for
//! `--mask-out`, and to check tracing losslessly). `DebugReport` paints
//! the source mask with the traced rings and pinched excursions on top.

use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use kurbo::Point;

use crate::bitgrid::BitGrid;
use crate::cleanup::ExcursionSink;
use crate::error::OutlineError;
use crate::mpoly::Mpoly;

/// Even-odd fill of every ring, sampled at pixel centres.
pub fn rasterize(mp: &Mpoly, width: usize, height: usize) -> BitGrid {
    let mut grid = BitGrid::new(width, height);
    let mut crossings: Vec<f64> = Vec::new();
    for row in 0..height {
        let yc = row as f64 + 0.5;
        crossings.clear();
        for ring in &mp.rings {
            let n = ring.pts.len();
            for i in 0..n {
                let a = ring.pts[i];
                let b = ring.pts[(i + 1) % n];
                if (a.y <= yc) != (b.y <= yc) {
                    crossings.push(a.x + (yc - a.y) / (b.y - a.y) * (b.x - a.x));
                }
            }
        }
        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            // Pixel `col` is inside when span[0] <= col + 0.5 < span[1].
            let first = (span[0] - 0.5).ceil().max(0.0) as usize;
            let end = ((span[1] - 0.5).ceil().max(0.0) as usize).min(width);
            for col in first..end {
                grid.set(col, row, true);
            }
        }
    }
    grid
}

/// Save a mask as a grayscale image; the format follows the extension.
pub fn save_mask(mask: &BitGrid, path: &Path) -> Result<(), OutlineError> {
    let img = GrayImage::from_fn(mask.width() as u32, mask.height() as u32, |x, y| {
        if mask.get(x as i64, y as i64) {
            Luma([255])
        } else {
            Luma([0])
        }
    });
    img.save(path)
        .map_err(|e| OutlineError::ImageLoad(format!("{}: {}", path.display(), e)))
}

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const MEMBER: Rgb<u8> = Rgb([200, 200, 200]);
const OUTER: Rgb<u8> = Rgb([220, 30, 30]);
const HOLE: Rgb<u8> = Rgb([30, 60, 220]);
const EXCURSION: Rgb<u8> = Rgb([20, 170, 40]);

/// Scaled-up picture of the tracing stages, for eyeballing problems.
pub struct DebugReport {
    image: RgbImage,
    scale: f32,
}

impl DebugReport {
    pub fn new(width: usize, height: usize, scale: u32) -> Self {
        let scale = scale.max(1);
        DebugReport {
            image: RgbImage::from_pixel(width as u32 * scale, height as u32 * scale, BACKGROUND),
            scale: scale as f32,
        }
    }

    /// Shade the member pixels of `mask`.
    pub fn add_mask(&mut self, mask: &BitGrid) {
        let s = self.scale as u32;
        for (x, y, px) in self.image.enumerate_pixels_mut() {
            if mask.get((x / s) as i64, (y / s) as i64) {
                *px = MEMBER;
            }
        }
    }

    /// Outline rings in pixel coordinates: outer rings red, holes blue.
    pub fn add_rings(&mut self, mp: &Mpoly) {
        for ring in &mp.rings {
            let color = if ring.is_hole { HOLE } else { OUTER };
            self.polyline(&ring.pts, true, color);
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn save(&self, path: &Path) -> Result<(), OutlineError> {
        self.image
            .save(path)
            .map_err(|e| OutlineError::ImageLoad(format!("{}: {}", path.display(), e)))
    }

    fn polyline(&mut self, pts: &[Point], closed: bool, color: Rgb<u8>) {
        let n = pts.len();
        let segments = if closed { n } else { n.saturating_sub(1) };
        for i in 0..segments {
            let a = self.to_canvas(pts[i]);
            let b = self.to_canvas(pts[(i + 1) % n]);
            draw_line_segment_mut(&mut self.image, a, b, color);
        }
    }

    fn to_canvas(&self, p: Point) -> (f32, f32) {
        (p.x as f32 * self.scale, p.y as f32 * self.scale)
    }
}

impl ExcursionSink for DebugReport {
    fn excursion(&mut self, loop_pts: &[Point]) {
        self.polyline(loop_pts, false, EXCURSION);
    }
}
