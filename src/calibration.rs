use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::DEFAULT_CALIBRATION_JSON;
use crate::types::Rect;

#[derive(Error, Debug)]
pub enum CalibrationError {
    #[error("failed to read calibration file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("calibration data is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("animation {animation} has no frame {frame}")]
    UnknownFrame { animation: String, frame: usize },

    #[error("animation {0} has a non-positive calibration scale")]
    BadScale(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationCalibration {
    #[serde(rename = "handCoordinates")]
    pub hand_coordinates: Vec<Rect>,
    /// Display scale the frames were authored at. Coordinates themselves are
    /// in natural artwork pixels.
    #[serde(rename = "calibrationScale", default = "default_calibration_scale")]
    pub calibration_scale: f64,
}

fn default_calibration_scale() -> f64 {
    0.23
}

/// Per-animation, per-frame hand geometry in natural artwork resolution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CalibrationSet {
    animations: BTreeMap<String, AnimationCalibration>,
}

impl CalibrationSet {
    pub fn builtin() -> Self {
        // The compiled-in table is covered by tests; an empty set only hides hitboxes.
        Self::from_json_str(DEFAULT_CALIBRATION_JSON).unwrap_or_default()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CalibrationError> {
        let set: CalibrationSet = serde_json::from_str(raw)?;
        if let Some((name, _)) = set
            .animations
            .iter()
            .find(|(_, data)| !(data.calibration_scale.is_finite() && data.calibration_scale > 0.0))
        {
            return Err(CalibrationError::BadScale(name.clone()));
        }
        Ok(set)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, CalibrationError> {
        let raw = fs::read_to_string(path).map_err(|source| CalibrationError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn to_json(&self) -> Result<String, CalibrationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn frame(&self, animation_id: &str, frame_index: usize) -> Option<Rect> {
        self.animations
            .get(animation_id)
            .and_then(|data| data.hand_coordinates.get(frame_index))
            .copied()
    }

    pub fn frame_count(&self, animation_id: &str) -> usize {
        self.animations
            .get(animation_id)
            .map(|data| data.hand_coordinates.len())
            .unwrap_or(0)
    }

    pub fn animation(&self, animation_id: &str) -> Option<&AnimationCalibration> {
        self.animations.get(animation_id)
    }

    pub fn animation_ids(&self) -> impl Iterator<Item = &str> {
        self.animations.keys().map(String::as_str)
    }

    /// Calibration tooling: overwrite one frame, or append the next frame.
    pub fn set_frame_geometry(
        &mut self,
        animation_id: &str,
        frame_index: usize,
        rect: Rect,
    ) -> Result<(), CalibrationError> {
        let data = self
            .animations
            .entry(animation_id.to_string())
            .or_insert_with(|| AnimationCalibration {
                hand_coordinates: Vec::new(),
                calibration_scale: default_calibration_scale(),
            });
        match frame_index.cmp(&data.hand_coordinates.len()) {
            std::cmp::Ordering::Less => data.hand_coordinates[frame_index] = rect,
            std::cmp::Ordering::Equal => data.hand_coordinates.push(rect),
            std::cmp::Ordering::Greater => {
                return Err(CalibrationError::UnknownFrame {
                    animation: animation_id.to_string(),
                    frame: frame_index,
                })
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_parses_with_two_frames_per_grab() {
        let set = CalibrationSet::from_json_str(DEFAULT_CALIBRATION_JSON)
            .expect("builtin calibration should parse");
        assert_eq!(set.animation_ids().count(), 4);
        for id in ["grabNorthEast", "grabNorthWest", "grabSouth", "grabIsland"] {
            assert_eq!(set.frame_count(id), 2, "{id}");
        }
        assert_eq!(
            set.frame("grabSouth", 1),
            Some(Rect::new(906, 2445, 737, 737))
        );
        assert_eq!(set, CalibrationSet::builtin());
    }

    #[test]
    fn missing_frames_are_none() {
        let set = CalibrationSet::builtin();
        assert_eq!(set.frame("grabSouth", 2), None);
        assert_eq!(set.frame("idle", 0), None);
        assert_eq!(set.frame_count("idle"), 0);
    }

    #[test]
    fn export_round_trips_exporter_format() {
        let set = CalibrationSet::builtin();
        let exported = set.to_json().expect("export should serialize");
        assert!(exported.contains("handCoordinates"));
        assert!(exported.contains("calibrationScale"));
        let reloaded = CalibrationSet::from_json_str(&exported).expect("export should reload");
        assert_eq!(reloaded, set);
    }

    #[test]
    fn set_frame_geometry_overwrites_appends_and_rejects_gaps() {
        let mut set = CalibrationSet::builtin();
        set.set_frame_geometry("grabSouth", 0, Rect::new(1, 2, 3, 4))
            .expect("overwrite existing frame");
        assert_eq!(set.frame("grabSouth", 0), Some(Rect::new(1, 2, 3, 4)));

        set.set_frame_geometry("grabSouth", 2, Rect::new(5, 6, 7, 8))
            .expect("append next frame");
        assert_eq!(set.frame_count("grabSouth"), 3);

        let gap = set.set_frame_geometry("grabSouth", 9, Rect::default());
        assert!(matches!(gap, Err(CalibrationError::UnknownFrame { frame: 9, .. })));
    }

    #[test]
    fn non_positive_scale_is_rejected() {
        let raw = r#"{ "grabX": { "handCoordinates": [], "calibrationScale": 0 } }"#;
        assert!(matches!(
            CalibrationSet::from_json_str(raw),
            Err(CalibrationError::BadScale(name)) if name == "grabX"
        ));
    }

    #[test]
    fn scale_defaults_when_absent() {
        let raw = r#"{ "grabX": { "handCoordinates": [{ "x": 1, "y": 2, "width": 3, "height": 4 }] } }"#;
        let set = CalibrationSet::from_json_str(raw).expect("scale is optional");
        assert_eq!(
            set.animation("grabX").map(|a| a.calibration_scale),
            Some(0.23)
        );
    }
}
