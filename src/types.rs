use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains(&self, px: f64, py: f64) -> bool {
        px >= self.x as f64
            && py >= self.y as f64
            && px <= (self.x + self.width) as f64
            && py <= (self.y + self.height) as f64
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationRole {
    /// Idle and recovery poses: no hitbox.
    Neutral,
    /// Grab attempts carrying per-frame hand geometry.
    Grab,
    /// Smack overlays and celebrations played after a resolution.
    Reaction,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundOutcome {
    Blocked,
    Succeeded,
    TimedOut,
}

impl RoundOutcome {
    pub fn claims_region(self) -> bool {
        matches!(self, Self::Succeeded | Self::TimedOut)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    #[default]
    Idle,
    TargetSelected,
    Armed,
    Resolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LiberationCause {
    Resistance,
    Protest,
    Forced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    Survived,
    Annexed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtestorVariant {
    Standard,
    Agitated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundKind {
    Ui,
    GrabWarning,
    GrabAttempt,
    Block,
    GrabSuccess,
    Annexed,
    Resistance,
    Protest,
    Particles,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RuntimeHitbox {
    pub interactive: Rect,
    /// Decorative companion, recentered inside `interactive`.
    pub visual: Rect,
}

#[derive(Clone, Debug, Serialize)]
pub struct RegionView {
    pub id: usize,
    pub name: String,
    pub claims: u8,
    #[serde(rename = "maxClaims")]
    pub max_claims: u8,
    #[serde(rename = "annexedElapsedMs")]
    pub annexed_elapsed_ms: u64,
    #[serde(rename = "resistanceEligible")]
    pub resistance_eligible: bool,
    #[serde(rename = "protestorsVisible")]
    pub protestors_visible: bool,
    #[serde(rename = "engagementCount")]
    pub engagement_count: u8,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProtestorView {
    #[serde(rename = "regionId")]
    pub region_id: usize,
    pub placement: Rect,
    pub scale: f64,
    pub variant: ProtestorVariant,
    #[serde(rename = "extraFigures")]
    pub extra_figures: u8,
}

#[derive(Clone, Debug, Serialize)]
pub struct RoundView {
    pub id: u64,
    #[serde(rename = "regionId")]
    pub region_id: usize,
    #[serde(rename = "animationId")]
    pub animation_id: String,
    pub phase: RoundPhase,
    #[serde(rename = "isHittable")]
    pub is_hittable: bool,
    #[serde(rename = "startedAtMs")]
    pub started_at_ms: u64,
    pub outcome: Option<RoundOutcome>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SessionStats {
    pub score: u32,
    #[serde(rename = "successfulBlocks")]
    pub successful_blocks: u32,
    #[serde(rename = "consecutiveBlocks")]
    pub consecutive_blocks: u32,
    #[serde(rename = "grabsConceded")]
    pub grabs_conceded: u32,
    #[serde(rename = "regionsLiberated")]
    pub regions_liberated: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct TimelineEvent {
    #[serde(rename = "atMs")]
    pub at_ms: u64,
    pub label: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    RoundStarted {
        #[serde(rename = "regionId")]
        region_id: usize,
        #[serde(rename = "animationId")]
        animation_id: String,
    },
    HitWindowOpened {
        #[serde(rename = "regionId")]
        region_id: usize,
    },
    HitWindowClosed {
        #[serde(rename = "regionId")]
        region_id: usize,
    },
    RoundResolved {
        #[serde(rename = "regionId")]
        region_id: usize,
        outcome: RoundOutcome,
    },
    RegionClaimChanged {
        #[serde(rename = "regionId")]
        region_id: usize,
        claims: u8,
    },
    RegionAnnexed {
        #[serde(rename = "regionId")]
        region_id: usize,
    },
    ResistancePossible {
        #[serde(rename = "regionId")]
        region_id: usize,
    },
    RegionLiberated {
        #[serde(rename = "regionId")]
        region_id: usize,
        cause: LiberationCause,
    },
    ProtestorsShown {
        #[serde(rename = "regionId")]
        region_id: usize,
    },
    ProtestorsEscalated {
        #[serde(rename = "regionId")]
        region_id: usize,
        engagement: u8,
        variant: ProtestorVariant,
    },
    ProtestorsHidden {
        #[serde(rename = "regionId")]
        region_id: usize,
    },
    HitboxGeometryApplied {
        hitbox: RuntimeHitbox,
    },
    HitboxHidden,
    ScoreChanged {
        score: u32,
    },
    SpeedChanged {
        multiplier: f64,
        label: String,
    },
    Paused,
    Resumed,
    GameOver {
        reason: GameOverReason,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    #[serde(rename = "elapsedMs")]
    pub elapsed_ms: u64,
    #[serde(rename = "timeRemainingS")]
    pub time_remaining_s: u32,
    pub playing: bool,
    pub paused: bool,
    #[serde(rename = "speedMultiplier")]
    pub speed_multiplier: f64,
    pub stats: SessionStats,
    pub regions: Vec<RegionView>,
    pub round: Option<RoundView>,
    pub hitbox: Option<RuntimeHitbox>,
    pub protestors: Vec<ProtestorView>,
    #[serde(rename = "pendingTimers")]
    pub pending_timers: usize,
    pub events: Vec<GameEvent>,
    pub timeline: Vec<TimelineEvent>,
    #[serde(rename = "endReason")]
    pub end_reason: Option<GameOverReason>,
}

#[derive(Clone, Debug, Serialize)]
pub struct GameSummary {
    pub reason: Option<GameOverReason>,
    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
    pub stats: SessionStats,
    pub regions: Vec<RegionView>,
    pub timeline: Vec<TimelineEvent>,
}
