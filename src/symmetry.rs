//! Mirror-symmetry scoring.
//!
//! The cropped subject is resized to a canonical square, converted to luma,
//! split down the middle, and the right half is flipped and compared against
//! the left. The mean absolute difference is mapped linearly onto `[0, 100]`.

use std::fmt;

use image::{
    imageops::{self, FilterType},
    DynamicImage, GenericImageView, GrayImage, Luma, Rgb, RgbImage,
};
use serde::Serialize;

use crate::error::SymmetryError;

pub const CANONICAL_SIZE: u32 = 400;
pub const MASK_THRESHOLD: u8 = 30;

/// Axis-aligned rectangle in pixel coordinates, `min` inclusive and `max` exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x_min: u32,
    pub y_min: u32,
    pub x_max: u32,
    pub y_max: u32,
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.x_min, self.y_min, self.x_max, self.y_max
        )
    }
}

impl BoundingBox {
    pub fn new(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Self {
        Self {
            x_min,
            y_min,
            x_max,
            y_max,
        }
    }

    pub fn width(&self) -> u32 {
        self.x_max.saturating_sub(self.x_min)
    }

    pub fn height(&self) -> u32 {
        self.y_max.saturating_sub(self.y_min)
    }

    /// Clamps the box to a `width` x `height` image.
    ///
    /// Edges hanging off the image are pulled back in. A box with inverted
    /// edges, or one lying entirely outside the image, is rejected.
    pub fn clamp_to(&self, width: u32, height: u32) -> Result<BoundingBox, SymmetryError> {
        let invalid = || SymmetryError::InvalidBoundingBox {
            bbox: *self,
            width,
            height,
        };

        if self.x_min >= self.x_max || self.y_min >= self.y_max {
            return Err(invalid());
        }
        if self.x_min >= width || self.y_min >= height {
            return Err(invalid());
        }

        Ok(BoundingBox {
            x_min: self.x_min,
            y_min: self.y_min,
            x_max: self.x_max.min(width),
            y_max: self.y_max.min(height),
        })
    }
}

/// Output of one symmetry evaluation.
#[derive(Debug, Clone)]
pub struct SymmetryResult {
    /// `0.00` (maximally different halves) to `100.00` (perfect mirror).
    pub score: f64,
    pub difference_map: GrayImage,
    pub heatmap: RgbImage,
    /// `255` where the mirrored difference exceeds the threshold, `0` elsewhere.
    pub binary_mask: GrayImage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScorerConfig {
    pub canonical_width: u32,
    pub canonical_height: u32,
    pub mask_threshold: u8,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            canonical_width: CANONICAL_SIZE,
            canonical_height: CANONICAL_SIZE,
            mask_threshold: MASK_THRESHOLD,
        }
    }
}

/// Why the scorer ended up looking at the whole image instead of a crop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CropAdvisory {
    /// The localization step did not find a subject.
    NoBoundingBox,
    /// A box was supplied but could not be used.
    RejectedBoundingBox(SymmetryError),
}

impl CropAdvisory {
    pub fn message(&self) -> String {
        match self {
            CropAdvisory::NoBoundingBox => {
                "Could not automatically crop to sandwich. Analyzing full image.".to_string()
            }
            CropAdvisory::RejectedBoundingBox(err) => format!(
                "Could not automatically crop to sandwich ({}). Analyzing full image.",
                err
            ),
        }
    }
}

/// A score plus any note about how the crop was chosen.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub result: SymmetryResult,
    pub advisory: Option<CropAdvisory>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SymmetryScorer {
    config: ScorerConfig,
}

impl SymmetryScorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self { config }
    }

    pub fn evaluate(
        &self,
        image: &DynamicImage,
        bounding_box: Option<BoundingBox>,
    ) -> Result<SymmetryResult, SymmetryError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(SymmetryError::InvalidImage(format!(
                "image has zero size ({}x{})",
                width, height
            )));
        }

        let region = match bounding_box {
            Some(bbox) => {
                let bbox = bbox.clamp_to(width, height)?;
                image.crop_imm(bbox.x_min, bbox.y_min, bbox.width(), bbox.height())
            }
            None => image.clone(),
        };
        if region.width() == 0 || region.height() == 0 {
            return Err(SymmetryError::InvalidImage(
                "cropped region is empty".to_string(),
            ));
        }

        let gray = luminance(&self.normalize(&region));
        let difference_map = mirror_difference(&gray);
        if difference_map.width() == 0 || difference_map.height() == 0 {
            return Err(SymmetryError::InvalidImage(format!(
                "canonical size {}x{} is too small to split",
                self.config.canonical_width, self.config.canonical_height
            )));
        }

        let score = score_from_difference(&difference_map);
        let heatmap = jet_heatmap(&difference_map);
        let binary_mask = threshold_mask(&difference_map, self.config.mask_threshold);

        Ok(SymmetryResult {
            score,
            difference_map,
            heatmap,
            binary_mask,
        })
    }

    /// Like [`evaluate`](Self::evaluate), but an absent or unusable box falls
    /// back to the full image and is reported as an advisory instead of an error.
    pub fn evaluate_or_full_image(
        &self,
        image: &DynamicImage,
        bounding_box: Option<BoundingBox>,
    ) -> Result<Evaluation, SymmetryError> {
        let Some(bbox) = bounding_box else {
            let result = self.evaluate(image, None)?;
            return Ok(Evaluation {
                result,
                advisory: Some(CropAdvisory::NoBoundingBox),
            });
        };

        match self.evaluate(image, Some(bbox)) {
            Ok(result) => Ok(Evaluation {
                result,
                advisory: None,
            }),
            Err(err @ SymmetryError::InvalidBoundingBox { .. }) => {
                tracing::warn!("⚠️ Ignoring bounding box: {}", err);
                let result = self.evaluate(image, None)?;
                Ok(Evaluation {
                    result,
                    advisory: Some(CropAdvisory::RejectedBoundingBox(err)),
                })
            }
            Err(err) => Err(err),
        }
    }

    fn normalize(&self, region: &DynamicImage) -> DynamicImage {
        let (w, h) = (self.config.canonical_width, self.config.canonical_height);
        if region.dimensions() == (w, h) {
            return region.clone();
        }
        region.resize_exact(w, h, FilterType::CatmullRom)
    }
}

/// Scores with the default 400x400 canonical size and a threshold of 30.
pub fn evaluate(
    image: &DynamicImage,
    bounding_box: Option<BoundingBox>,
) -> Result<SymmetryResult, SymmetryError> {
    SymmetryScorer::default().evaluate(image, bounding_box)
}

/// ITU-R 601-2 luma, `(19595 R + 38470 G + 7471 B + 0x8000) >> 16`.
///
/// Matches the fixed-point weights (0.299, 0.587, 0.114) common photo tools
/// use, rather than the Rec. 709 weights behind `DynamicImage::to_luma8`.
fn luminance(image: &DynamicImage) -> GrayImage {
    let rgb = image.to_rgb8();
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let l = 19595 * r as u32 + 38470 * g as u32 + 7471 * b as u32 + 0x8000;
        Luma([(l >> 16) as u8])
    })
}

/// Absolute difference between the left half and the flipped right half.
///
/// For odd widths the right half is one column wider; both halves are cut to
/// the common width from their leading edge.
fn mirror_difference(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    let mid = width / 2;

    let left = imageops::crop_imm(gray, 0, 0, mid, height).to_image();
    let right = imageops::crop_imm(gray, mid, 0, width - mid, height).to_image();
    let right_flipped = imageops::flip_horizontal(&right);

    let common = left.width().min(right_flipped.width());
    GrayImage::from_fn(common, height, |x, y| {
        let a = left.get_pixel(x, y)[0];
        let b = right_flipped.get_pixel(x, y)[0];
        Luma([a.abs_diff(b)])
    })
}

fn score_from_difference(diff: &GrayImage) -> f64 {
    let count = diff.width() as u64 * diff.height() as u64;
    let total: u64 = diff.pixels().map(|p| p[0] as u64).sum();
    let mean = total as f64 / count as f64;

    let score = 100.0 - (mean / 255.0 * 100.0);
    ((score * 100.0).round() / 100.0).clamp(0.0, 100.0)
}

fn threshold_mask(diff: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(diff.width(), diff.height(), |x, y| {
        if diff.get_pixel(x, y)[0] > threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

fn jet_heatmap(diff: &GrayImage) -> RgbImage {
    RgbImage::from_fn(diff.width(), diff.height(), |x, y| jet(diff.get_pixel(x, y)[0]))
}

/// JET colormap: dark blue at 0 through cyan, yellow, to dark red at 255.
pub fn jet(value: u8) -> Rgb<u8> {
    let v = value as f64 / 255.0;
    let channel = |offset: f64| {
        let c = (1.5 - (4.0 * v - offset).abs()).clamp(0.0, 1.0);
        (c * 255.0).round() as u8
    };
    Rgb([channel(3.0), channel(2.0), channel(1.0)])
}
