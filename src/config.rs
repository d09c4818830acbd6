use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    default_regions, BASE_FRAME_DURATION_MS, BLOCK_SCORE, FAILSAFE_GRACE_MS,
    FIRST_ENGAGEMENT_SCALE, FULL_ANNEXATION_TIME_MS, GAME_DURATION_S, INITIAL_GRAB_DELAY_MS,
    LIBERATING_ENGAGEMENTS, MAX_CLAIMS, MIN_FRAME_DURATION_MS, NO_TARGET_RETRY_MS,
    PROTESTOR_DISMISS_MS, PROTESTOR_SHOW_DELAY_FRACTION, REFERENCE_SCALE,
    RESISTANCE_CHANCE_PER_SECOND, SECOND_ENGAGEMENT_SCALE, SPEED_STEP_INTERVAL_MS,
    TOUCH_INFLATION, TOUCH_MIN_FRAME_DURATION_MS, VISUAL_SCALE_RATIO,
};
use crate::types::Rect;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("config rejected: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionDef {
    pub name: String,
    #[serde(rename = "grabAnimations")]
    pub grab_animations: Vec<String>,
    /// Candidate crowd rectangles in natural artwork pixels.
    #[serde(rename = "protestorSpawns", default)]
    pub protestor_spawns: Vec<Rect>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    pub max_claims: u8,
    pub game_duration_s: u32,
    pub initial_grab_delay_ms: u64,
    pub no_target_retry_ms: u64,
    pub failsafe_grace_ms: u64,
    pub block_score: u32,

    pub full_annexation_time_ms: u64,
    pub protestor_show_delay_fraction: f64,
    pub resistance_chance_per_second: f64,
    pub protestor_dismiss_ms: u64,
    pub liberating_engagements: u8,
    pub first_engagement_scale: f64,
    pub second_engagement_scale: f64,

    pub speed_step_interval_ms: u64,
    pub base_frame_duration_ms: u64,
    pub min_frame_duration_ms: u64,
    pub touch_min_frame_duration_ms: u64,

    pub reference_scale: f64,
    pub touch_inflation: f64,
    pub visual_scale_ratio: f64,
    pub predict_next_frame: bool,

    pub regions: Vec<RegionDef>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_claims: MAX_CLAIMS,
            game_duration_s: GAME_DURATION_S,
            initial_grab_delay_ms: INITIAL_GRAB_DELAY_MS,
            no_target_retry_ms: NO_TARGET_RETRY_MS,
            failsafe_grace_ms: FAILSAFE_GRACE_MS,
            block_score: BLOCK_SCORE,
            full_annexation_time_ms: FULL_ANNEXATION_TIME_MS,
            protestor_show_delay_fraction: PROTESTOR_SHOW_DELAY_FRACTION,
            resistance_chance_per_second: RESISTANCE_CHANCE_PER_SECOND,
            protestor_dismiss_ms: PROTESTOR_DISMISS_MS,
            liberating_engagements: LIBERATING_ENGAGEMENTS,
            first_engagement_scale: FIRST_ENGAGEMENT_SCALE,
            second_engagement_scale: SECOND_ENGAGEMENT_SCALE,
            speed_step_interval_ms: SPEED_STEP_INTERVAL_MS,
            base_frame_duration_ms: BASE_FRAME_DURATION_MS,
            min_frame_duration_ms: MIN_FRAME_DURATION_MS,
            touch_min_frame_duration_ms: TOUCH_MIN_FRAME_DURATION_MS,
            reference_scale: REFERENCE_SCALE,
            touch_inflation: TOUCH_INFLATION,
            visual_scale_ratio: VISUAL_SCALE_RATIO,
            predict_next_frame: false,
            regions: default_regions(),
        }
    }
}

impl GameConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_claims == 0 {
            return Err(ConfigError::Invalid("maxClaims must be at least 1".to_string()));
        }
        if self.regions.is_empty() {
            return Err(ConfigError::Invalid("at least one region is required".to_string()));
        }
        if let Some(region) = self.regions.iter().find(|r| r.grab_animations.is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "region {} has no grab animations",
                region.name
            )));
        }
        if !(0.0..=1.0).contains(&self.protestor_show_delay_fraction) {
            return Err(ConfigError::Invalid(
                "protestorShowDelayFraction must be within [0, 1]".to_string(),
            ));
        }
        if self.base_frame_duration_ms == 0
            || self.min_frame_duration_ms == 0
            || self.touch_min_frame_duration_ms == 0
        {
            return Err(ConfigError::Invalid(
                "frame durations must be at least 1 ms".to_string(),
            ));
        }
        if self.liberating_engagements == 0 {
            return Err(ConfigError::Invalid(
                "liberatingEngagements must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn protestor_show_delay_ms(&self) -> u64 {
        (self.full_annexation_time_ms as f64 * self.protestor_show_delay_fraction).round() as u64
    }
}
