use serde::Serialize;

use crate::constants::ARTWORK_NATURAL_WIDTH;
use crate::types::Rect;

/// Rendered vs natural width of the map artwork.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Viewport {
    #[serde(rename = "renderedWidth")]
    pub rendered_width: f64,
    #[serde(rename = "naturalWidth")]
    pub natural_width: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            rendered_width: ARTWORK_NATURAL_WIDTH,
            natural_width: ARTWORK_NATURAL_WIDTH,
        }
    }
}

impl Viewport {
    pub fn new(rendered_width: f64, natural_width: f64) -> Self {
        Self {
            rendered_width,
            natural_width,
        }
    }

    pub fn current_scale(&self) -> f64 {
        if !self.natural_width.is_finite() || self.natural_width <= 0.0 {
            return 1.0;
        }
        let scale = self.rendered_width / self.natural_width;
        if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        }
    }
}

fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

fn positive_or(value: Option<f64>, fallback: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => fallback,
    }
}

/// Maps calibration-space coordinates into the current viewport.
///
/// `touch_inflation` grows width and height only; the origin is left where it
/// is, so callers that want the inflated box centered must recenter it.
pub fn scale(
    base: Rect,
    current_viewport_scale: f64,
    reference_scale: Option<f64>,
    touch_inflation: f64,
) -> Rect {
    let reference = positive_or(reference_scale, 1.0);
    let current = positive_or(Some(current_viewport_scale), reference);
    let inflation = positive_or(Some(touch_inflation), 1.0);
    let factor = current / reference;

    Rect {
        x: round_half_up(base.x as f64 * factor),
        y: round_half_up(base.y as f64 * factor),
        width: round_half_up(base.width as f64 * factor * inflation),
        height: round_half_up(base.height as f64 * factor * inflation),
    }
}

/// Shifts an inflated rectangle so it shares its center with `original`.
pub fn recenter(original: Rect, inflated: Rect) -> Rect {
    Rect {
        x: original.x - round_half_up((inflated.width - original.width) as f64 / 2.0),
        y: original.y - round_half_up((inflated.height - original.height) as f64 / 2.0),
        width: inflated.width,
        height: inflated.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn scales_position_and_size_by_ratio() {
        let scaled = scale(Rect::new(1000, 500, 737, 737), 0.5, Some(1.0), 1.0);
        assert_eq!(scaled, Rect::new(500, 250, 369, 369));
    }

    #[test]
    fn touch_inflation_only_grows_size() {
        let scaled = scale(Rect::new(100, 100, 100, 50), 1.0, Some(1.0), 1.2);
        assert_eq!(scaled, Rect::new(100, 100, 120, 60));
    }

    #[test]
    fn missing_reference_defaults_to_one() {
        let base = Rect::new(300, 200, 40, 40);
        assert_eq!(scale(base, 0.25, None, 1.0), scale(base, 0.25, Some(1.0), 1.0));
        assert_eq!(scale(base, 0.25, Some(0.0), 1.0), scale(base, 0.25, Some(1.0), 1.0));
    }

    #[test]
    fn rounds_half_up() {
        let scaled = scale(Rect::new(1, 3, 5, 7), 0.5, Some(1.0), 1.0);
        assert_eq!(scaled, Rect::new(1, 2, 3, 4));
    }

    #[test]
    fn recenter_keeps_center() {
        let original = Rect::new(100, 100, 100, 100);
        let inflated = Rect::new(100, 100, 120, 130);
        let centered = recenter(original, inflated);
        assert_eq!(centered, Rect::new(90, 85, 120, 130));
    }

    #[test]
    fn viewport_scale_falls_back_on_bad_metrics() {
        assert_eq!(Viewport::new(1500.0, 3000.0).current_scale(), 0.5);
        assert_eq!(Viewport::new(1500.0, 0.0).current_scale(), 1.0);
        assert_eq!(Viewport::new(0.0, 3000.0).current_scale(), 1.0);
    }

    proptest! {
        #[test]
        fn scaling_there_and_back_stays_within_one_pixel(
            x in -5_000i32..5_000,
            y in -5_000i32..5_000,
            w in 0i32..3_000,
            h in 0i32..3_000,
            s in 0.75f64..1.5,
            r in 0.75f64..1.5,
        ) {
            let base = Rect::new(x, y, w, h);
            let back = scale(scale(base, s, Some(r), 1.0), r, Some(s), 1.0);
            prop_assert!((back.x - base.x).abs() <= 1);
            prop_assert!((back.y - base.y).abs() <= 1);
            prop_assert!((back.width - base.width).abs() <= 1);
            prop_assert!((back.height - base.height).abs() <= 1);
        }
    }
}
