//! Parsing of the localization model's free-text reply.
//!
//! The model is asked for `x_min, y_min, x_max, y_max` as percentages of the
//! image size. The first run of four comma-separated numbers wins; anything
//! else (including a literal `None`) means no subject was found.

use std::sync::LazyLock;

use regex::Regex;

use crate::symmetry::BoundingBox;

/// Fraction of the image size added around the reported box on every side.
pub const PADDING_RATIO: f64 = 0.02;

static BOX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+\.?\d*),\s*(\d+\.?\d*),\s*(\d+\.?\d*),\s*(\d+\.?\d*)")
        .expect("bounding box pattern is valid")
});

/// Bounding box in percent of image width/height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PercentBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl PercentBox {
    /// Converts to pixel coordinates and pads by [`PADDING_RATIO`] on each side.
    ///
    /// The min edges saturate at zero and the max edges are capped at the
    /// image size. An inverted box stays inverted; the scorer rejects it.
    pub fn to_pixels(&self, width: u32, height: u32) -> BoundingBox {
        let to_px = |percent: f64, dim: u32| (percent / 100.0 * dim as f64) as u32;
        let pad_x = (width as f64 * PADDING_RATIO) as u32;
        let pad_y = (height as f64 * PADDING_RATIO) as u32;

        BoundingBox {
            x_min: to_px(self.x_min, width).saturating_sub(pad_x),
            y_min: to_px(self.y_min, height).saturating_sub(pad_y),
            x_max: to_px(self.x_max, width).saturating_add(pad_x).min(width),
            y_max: to_px(self.y_max, height).saturating_add(pad_y).min(height),
        }
    }
}

pub fn parse_percent_box(reply: &str) -> Option<PercentBox> {
    let caps = BOX_PATTERN.captures(reply.trim())?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());

    Some(PercentBox {
        x_min: num(1)?,
        y_min: num(2)?,
        x_max: num(3)?,
        y_max: num(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_reply() {
        let parsed = parse_percent_box("10, 20, 80, 90").unwrap();
        assert_eq!(
            parsed,
            PercentBox {
                x_min: 10.0,
                y_min: 20.0,
                x_max: 80.0,
                y_max: 90.0
            }
        );
    }

    #[test]
    fn parses_numbers_inside_prose() {
        let parsed =
            parse_percent_box("Sure! The sandwich spans 12.5,30.,87.5,  70.25 of the frame.")
                .unwrap();
        assert_eq!(parsed.x_min, 12.5);
        assert_eq!(parsed.y_min, 30.0);
        assert_eq!(parsed.x_max, 87.5);
        assert_eq!(parsed.y_max, 70.25);
    }

    #[test]
    fn none_and_garbage_yield_no_box() {
        assert_eq!(parse_percent_box("None"), None);
        assert_eq!(parse_percent_box(""), None);
        assert_eq!(parse_percent_box("10, 20, 30"), None);
        assert_eq!(parse_percent_box("left: 10 top: 20"), None);
    }

    #[test]
    fn converts_with_padding() {
        let pct = PercentBox {
            x_min: 10.0,
            y_min: 20.0,
            x_max: 80.0,
            y_max: 90.0,
        };
        // 2% of 1000 = 20px, 2% of 500 = 10px.
        assert_eq!(pct.to_pixels(1000, 500), BoundingBox::new(80, 90, 820, 460));
    }

    #[test]
    fn padding_is_clamped_to_image() {
        let pct = PercentBox {
            x_min: 0.0,
            y_min: 1.0,
            x_max: 100.0,
            y_max: 99.5,
        };
        assert_eq!(pct.to_pixels(200, 200), BoundingBox::new(0, 0, 200, 200));
    }
}
