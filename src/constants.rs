use crate::animation::AnimationSpec;
use crate::config::RegionDef;
use crate::types::{AnimationRole, Rect};

pub const TICK_MS: u64 = 50;

pub const MAX_CLAIMS: u8 = 3;
pub const GAME_DURATION_S: u32 = 168;
pub const INITIAL_GRAB_DELAY_MS: u64 = 8_000;
pub const NO_TARGET_RETRY_MS: u64 = 500;
pub const FAILSAFE_GRACE_MS: u64 = 2_000;
pub const COUNTDOWN_INTERVAL_MS: u64 = 1_000;
pub const BLOCK_SCORE: u32 = 10;

pub const FULL_ANNEXATION_TIME_MS: u64 = 10_000;
pub const PROTESTOR_SHOW_DELAY_FRACTION: f64 = 0.75;
pub const RESISTANCE_CHANCE_PER_SECOND: f64 = 0.05;
pub const PROTESTOR_DISMISS_MS: u64 = 7_000;
pub const LIBERATING_ENGAGEMENTS: u8 = 3;
pub const FIRST_ENGAGEMENT_SCALE: f64 = 1.15;
pub const SECOND_ENGAGEMENT_SCALE: f64 = 1.3;

pub const SPEED_STEP_INTERVAL_MS: u64 = 16_000;
pub const BASE_FRAME_DURATION_MS: u64 = 300;
pub const MIN_FRAME_DURATION_MS: u64 = 50;
pub const TOUCH_MIN_FRAME_DURATION_MS: u64 = 80;

pub const REFERENCE_SCALE: f64 = 1.0;
pub const TOUCH_INFLATION: f64 = 1.2;
pub const VISUAL_SCALE_RATIO: f64 = 0.55;

/// Natural width of the map artwork the calibration data is authored against.
pub const ARTWORK_NATURAL_WIDTH: f64 = 3_000.0;

pub const IDLE_ANIMATION: &str = "idle";
pub const RECOVERY_ANIMATION: &str = "slapped";
pub const CELEBRATION_ANIMATION: &str = "victory";

pub const SPEED_LEVELS: [(f64, &str); 5] = [
    (1.0, "Normal"),
    (1.5, "Faster?"),
    (2.0, "oopsie trade war"),
    (2.5, "all mine!"),
    (3.0, "gimme gimme"),
];

fn grab(id: &str, smack: &str) -> AnimationSpec {
    AnimationSpec {
        id: id.to_string(),
        frame_count: 2,
        loop_count: Some(4),
        frame_duration_ms: None,
        role: AnimationRole::Grab,
        smack_animation: Some(smack.to_string()),
    }
}

fn smack(id: &str) -> AnimationSpec {
    AnimationSpec {
        id: id.to_string(),
        frame_count: 5,
        loop_count: Some(1),
        frame_duration_ms: Some(120),
        role: AnimationRole::Reaction,
        smack_animation: None,
    }
}

pub fn default_animation_catalog() -> Vec<AnimationSpec> {
    vec![
        AnimationSpec {
            id: IDLE_ANIMATION.to_string(),
            frame_count: 2,
            loop_count: None,
            frame_duration_ms: None,
            role: AnimationRole::Neutral,
            smack_animation: None,
        },
        grab("grabNorthEast", "smackNorthEast"),
        grab("grabNorthWest", "smackNorthWest"),
        grab("grabSouth", "smackSouth"),
        grab("grabIsland", "smackIsland"),
        AnimationSpec {
            id: RECOVERY_ANIMATION.to_string(),
            frame_count: 2,
            loop_count: Some(3),
            frame_duration_ms: None,
            role: AnimationRole::Neutral,
            smack_animation: None,
        },
        AnimationSpec {
            id: CELEBRATION_ANIMATION.to_string(),
            frame_count: 2,
            loop_count: Some(3),
            frame_duration_ms: None,
            role: AnimationRole::Reaction,
            smack_animation: None,
        },
        smack("smackNorthEast"),
        smack("smackNorthWest"),
        smack("smackSouth"),
        smack("smackIsland"),
    ]
}

pub fn default_regions() -> Vec<RegionDef> {
    vec![
        RegionDef {
            name: "north".to_string(),
            grab_animations: vec!["grabNorthEast".to_string(), "grabNorthWest".to_string()],
            protestor_spawns: vec![
                Rect::new(1120, 1624, 295, 295),
                Rect::new(980, 1520, 295, 295),
                Rect::new(1250, 1480, 295, 295),
            ],
        },
        RegionDef {
            name: "south".to_string(),
            grab_animations: vec!["grabSouth".to_string()],
            protestor_spawns: vec![
                Rect::new(1102, 2536, 300, 300),
                Rect::new(1050, 2450, 300, 300),
                Rect::new(1180, 2510, 300, 300),
            ],
        },
        RegionDef {
            name: "island".to_string(),
            grab_animations: vec!["grabIsland".to_string()],
            protestor_spawns: vec![
                Rect::new(2192, 577, 300, 300),
                Rect::new(2080, 520, 300, 300),
                Rect::new(2300, 620, 300, 300),
            ],
        },
    ]
}

pub const DEFAULT_CALIBRATION_JSON: &str = r#"{
  "grabNorthEast": {
    "handCoordinates": [
      { "x": 1608, "y": 1439, "width": 737, "height": 737 },
      { "x": 1469, "y": 1344, "width": 737, "height": 737 }
    ],
    "calibrationScale": 0.23
  },
  "grabNorthWest": {
    "handCoordinates": [
      { "x": 286, "y": 1248, "width": 737, "height": 737 },
      { "x": 282, "y": 1140, "width": 737, "height": 737 }
    ],
    "calibrationScale": 0.23
  },
  "grabIsland": {
    "handCoordinates": [
      { "x": 2163, "y": 754, "width": 737, "height": 737 },
      { "x": 2072, "y": 789, "width": 737, "height": 737 }
    ],
    "calibrationScale": 0.23
  },
  "grabSouth": {
    "handCoordinates": [
      { "x": 1118, "y": 2319, "width": 737, "height": 737 },
      { "x": 906, "y": 2445, "width": 737, "height": 737 }
    ],
    "calibrationScale": 0.23
  }
}"#;

pub fn speed_level(index: usize) -> (f64, &'static str) {
    SPEED_LEVELS[index.min(SPEED_LEVELS.len() - 1)]
}
