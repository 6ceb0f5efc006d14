//! Image comparison and difference maps.
//!
//! The pipeline only needs two answers from a comparer: do two images match,
//! and what does their difference look like. [`ThresholdComparer`] answers both
//! with a per-pixel colour tolerance and a ratio of pixels allowed to differ.

use crate::resource::{FormatHint, ImageResource};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison capability consumed by the case executor
pub trait ImageComparer: Send + Sync + fmt::Debug {
    /// Whether `candidate` matches `reference`
    fn matches(&self, reference: &DynamicImage, candidate: &DynamicImage) -> bool;

    /// Image highlighting where `candidate` departs from `reference`
    fn difference_map(&self, reference: &DynamicImage, candidate: &DynamicImage) -> ImageResource;
}

/// Tolerances for [`ThresholdComparer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Fraction of pixels (0.0-1.0) allowed to differ
    pub threshold: f64,
    /// Per-pixel colour difference (sum of RGB channel deltas) still treated as equal
    pub color_threshold: u32,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            threshold: 0.01,     // 1% of pixels can differ
            color_threshold: 10, // Allow minor color variations
        }
    }
}

impl ComparisonConfig {
    /// Set the threshold
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the color threshold
    #[must_use]
    pub const fn with_color_threshold(mut self, threshold: u32) -> Self {
        self.color_threshold = threshold;
        self
    }
}

/// Statistics from comparing two images
#[derive(Debug, Clone, PartialEq)]
pub struct DiffStats {
    /// Number of pixels that differ
    pub diff_pixel_count: usize,
    /// Total number of pixels compared
    pub total_pixels: usize,
    /// Maximum color difference found
    pub max_color_diff: u32,
    /// Whether the two images had the same dimensions
    pub same_dimensions: bool,
}

impl DiffStats {
    /// Percentage of pixels that differ (0.0-100.0)
    #[must_use]
    pub fn diff_percentage(&self) -> f64 {
        if self.total_pixels == 0 {
            return 0.0;
        }
        (self.diff_pixel_count as f64 / self.total_pixels as f64) * 100.0
    }

    /// Check if images are identical (no differences)
    #[must_use]
    pub const fn is_identical(&self) -> bool {
        self.same_dimensions && self.diff_pixel_count == 0
    }
}

/// Pixel comparer with colour and ratio tolerances
#[derive(Debug, Clone, Default)]
pub struct ThresholdComparer {
    config: ComparisonConfig,
}

impl ThresholdComparer {
    /// Create a comparer with configuration
    #[must_use]
    pub const fn new(config: ComparisonConfig) -> Self {
        Self { config }
    }

    /// Get configuration
    #[must_use]
    pub const fn config(&self) -> &ComparisonConfig {
        &self.config
    }

    /// Count differing pixels without building a difference map
    #[must_use]
    pub fn stats(&self, reference: &DynamicImage, candidate: &DynamicImage) -> DiffStats {
        self.walk(reference, candidate, |_, _, _| {})
    }

    /// Visit every pixel of the union of both canvases. Pixels outside one of
    /// the images always count as different.
    fn walk<F>(&self, reference: &DynamicImage, candidate: &DynamicImage, mut visit: F) -> DiffStats
    where
        F: FnMut(u32, u32, Option<Rgba<u8>>),
    {
        let (rw, rh) = reference.dimensions();
        let (cw, ch) = candidate.dimensions();
        let (width, height) = (rw.max(cw), rh.max(ch));
        let reference = reference.to_rgba8();
        let candidate = candidate.to_rgba8();

        let mut diff_pixel_count = 0usize;
        let mut max_color_diff = 0u32;

        for y in 0..height {
            for x in 0..width {
                let expected = reference.get_pixel_checked(x, y);
                let actual = candidate.get_pixel_checked(x, y);
                match (expected, actual) {
                    (Some(e), Some(a)) => {
                        let color_diff = pixel_diff(*e, *a);
                        if color_diff > self.config.color_threshold {
                            diff_pixel_count += 1;
                            max_color_diff = max_color_diff.max(color_diff);
                            visit(x, y, None);
                        } else {
                            visit(x, y, Some(*a));
                        }
                    }
                    _ => {
                        diff_pixel_count += 1;
                        visit(x, y, None);
                    }
                }
            }
        }

        DiffStats {
            diff_pixel_count,
            total_pixels: (width as usize) * (height as usize),
            max_color_diff,
            same_dimensions: rw == cw && rh == ch,
        }
    }
}

impl ImageComparer for ThresholdComparer {
    fn matches(&self, reference: &DynamicImage, candidate: &DynamicImage) -> bool {
        let stats = self.stats(reference, candidate);
        stats.same_dimensions && stats.diff_percentage() <= self.config.threshold * 100.0
    }

    fn difference_map(&self, reference: &DynamicImage, candidate: &DynamicImage) -> ImageResource {
        let (rw, rh) = reference.dimensions();
        let (cw, ch) = candidate.dimensions();
        let mut diff_img = RgbaImage::new(rw.max(cw), rh.max(ch));

        self.walk(reference, candidate, |x, y, same| match same {
            // Copy original pixel with reduced opacity
            Some(Rgba([r, g, b, _])) => diff_img.put_pixel(x, y, Rgba([r / 2, g / 2, b / 2, 128])),
            // Highlight difference in red
            None => diff_img.put_pixel(x, y, Rgba([255, 0, 0, 255])),
        });

        ImageResource::new(DynamicImage::ImageRgba8(diff_img), FormatHint::Png)
    }
}

/// Calculate pixel difference (sum of RGB channel differences)
fn pixel_diff(a: Rgba<u8>, b: Rgba<u8>) -> u32 {
    let Rgba([r1, g1, b1, _]) = a;
    let Rgba([r2, g2, b2, _]) = b;

    let dr = i32::from(r1) - i32::from(r2);
    let dg = i32::from(g1) - i32::from(g2);
    let db = i32::from(b1) - i32::from(b2);

    dr.unsigned_abs() + dg.unsigned_abs() + db.unsigned_abs()
}
