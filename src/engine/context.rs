use crate::animation::SpriteAnimator;
use crate::collaborators::AudioSink;
use crate::config::{GameConfig, RegionDef};
use crate::rng::Rng;
use crate::scaler::Viewport;
use crate::timers::{TimerId, TimerLedger};
use crate::types::{
    GameEvent, GameOverReason, LiberationCause, ProtestorVariant, Rect, RegionView, SessionStats,
    SoundKind, TimelineEvent,
};

#[derive(Clone, Debug)]
pub struct ProtestorCrowd {
    pub visible: bool,
    pub engagement_count: u8,
    pub dismiss_timer: Option<TimerId>,
    /// Chosen spawn rectangle in artwork pixels.
    pub spawn: Option<Rect>,
    pub scale: f64,
    pub variant: ProtestorVariant,
    pub extra_figures: u8,
}

impl Default for ProtestorCrowd {
    fn default() -> Self {
        Self {
            visible: false,
            engagement_count: 0,
            dismiss_timer: None,
            spawn: None,
            scale: 1.0,
            variant: ProtestorVariant::Standard,
            extra_figures: 0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Region {
    pub id: usize,
    pub name: String,
    pub claims: u8,
    pub max_claims: u8,
    pub annexed_elapsed_ms: u64,
    pub resistance_eligible: bool,
    /// Protestors appear at most once per occupation episode.
    pub protestors_spawned: bool,
    pub crowd: ProtestorCrowd,
}

impl Region {
    pub fn new(id: usize, def: &RegionDef, max_claims: u8) -> Self {
        Self {
            id,
            name: def.name.clone(),
            claims: 0,
            max_claims,
            annexed_elapsed_ms: 0,
            resistance_eligible: false,
            protestors_spawned: false,
            crowd: ProtestorCrowd::default(),
        }
    }

    pub fn is_fully_claimed(&self) -> bool {
        self.claims >= self.max_claims
    }

    /// Clamps into `[0, max_claims]`; dropping below the cap ends the
    /// annexation episode immediately.
    pub fn set_claims(&mut self, claims: u8) -> u8 {
        self.claims = claims.min(self.max_claims);
        if !self.is_fully_claimed() {
            self.annexed_elapsed_ms = 0;
            self.resistance_eligible = false;
            self.protestors_spawned = false;
        }
        self.claims
    }

    pub fn view(&self) -> RegionView {
        RegionView {
            id: self.id,
            name: self.name.clone(),
            claims: self.claims,
            max_claims: self.max_claims,
            annexed_elapsed_ms: self.annexed_elapsed_ms,
            resistance_eligible: self.resistance_eligible,
            protestors_visible: self.crowd.visible,
            engagement_count: self.crowd.engagement_count,
        }
    }
}

/// State shared by every component of one session. Components receive it by
/// `&mut` instead of reaching for globals.
pub struct SessionContext {
    pub config: GameConfig,
    pub regions: Vec<Region>,
    pub timers: TimerLedger,
    pub events: Vec<GameEvent>,
    pub timeline: Vec<TimelineEvent>,
    pub rng: Rng,
    pub animator: SpriteAnimator,
    pub audio: Box<dyn AudioSink>,
    pub stats: SessionStats,
    pub viewport: Viewport,
    pub touch_device: bool,
    pub playing: bool,
    pub paused: bool,
    pub elapsed_ms: u64,
    pub time_remaining_s: u32,
    pub speed_index: usize,
    pub end_reason: Option<GameOverReason>,
}

impl SessionContext {
    pub fn build_regions(config: &GameConfig) -> Vec<Region> {
        config
            .regions
            .iter()
            .enumerate()
            .map(|(id, def)| Region::new(id, def, config.max_claims))
            .collect()
    }

    pub fn is_active(&self) -> bool {
        self.playing && !self.paused
    }

    pub fn emit(&mut self, event: GameEvent) {
        self.events.push(event);
    }

    pub fn play_sound(&mut self, kind: SoundKind, name: &str) {
        self.audio.play_sound(kind, name);
    }

    pub fn mark(&mut self, label: String) {
        self.timeline.push(TimelineEvent {
            at_ms: self.elapsed_ms,
            label,
        });
    }

    pub fn all_regions_claimed(&self) -> bool {
        !self.regions.is_empty() && self.regions.iter().all(Region::is_fully_claimed)
    }

    pub fn region_name(&self, region_id: usize) -> String {
        self.regions
            .get(region_id)
            .map(|region| region.name.clone())
            .unwrap_or_default()
    }

    /// Returns the clamped value, or `None` for an unknown region.
    pub fn set_claims(&mut self, region_id: usize, claims: u8) -> Option<u8> {
        let region = self.regions.get_mut(region_id)?;
        let before = region.claims;
        let after = region.set_claims(claims);
        if before != after {
            self.emit(GameEvent::RegionClaimChanged {
                region_id,
                claims: after,
            });
        }
        Some(after)
    }

    /// Ends the occupation episode of a region. The first caller wins; a
    /// region that is already free is left untouched.
    pub fn liberate(&mut self, region_id: usize, cause: LiberationCause) -> bool {
        let Some(region) = self.regions.get_mut(region_id) else {
            log::debug!("liberation ignored: unknown region {region_id}");
            return false;
        };
        if region.claims == 0 {
            log::debug!("liberation ignored: {} is already free", region.name);
            return false;
        }

        let dismiss_timer = region.crowd.dismiss_timer.take();
        let protestors_were_visible = region.crowd.visible;
        region.set_claims(0);
        region.crowd = ProtestorCrowd::default();
        let name = region.name.clone();

        if let Some(timer) = dismiss_timer {
            self.timers.untrack(timer);
        }
        if protestors_were_visible {
            self.emit(GameEvent::ProtestorsHidden { region_id });
        }
        self.emit(GameEvent::RegionClaimChanged {
            region_id,
            claims: 0,
        });
        self.emit(GameEvent::RegionLiberated { region_id, cause });
        self.stats.regions_liberated += 1;
        self.play_sound(SoundKind::Resistance, &name);
        self.play_sound(SoundKind::Protest, &name);
        self.mark(format!("{name} liberated"));
        log::info!("{name} liberated ({cause:?})");
        true
    }

    /// Halts the session: no further rounds, ticks or timers until restart.
    pub fn end_game(&mut self, reason: GameOverReason) {
        if self.end_reason.is_some() {
            return;
        }
        self.playing = false;
        self.end_reason = Some(reason);
        let flushed = self.timers.flush_all();
        self.animator.stop();
        self.animator.set_speed(1.0);
        self.emit(GameEvent::GameOver { reason });
        self.mark(format!("game over: {reason:?}"));
        log::info!("game over ({reason:?}), flushed {flushed} timers");
    }
}

#[cfg(test)]
impl SessionContext {
    pub(crate) fn for_tests() -> Self {
        use crate::animation::AnimatorTiming;
        use crate::collaborators::SilentAudio;
        use crate::constants::default_animation_catalog;

        let config = GameConfig::default();
        SessionContext {
            regions: SessionContext::build_regions(&config),
            timers: TimerLedger::new(),
            events: Vec::new(),
            timeline: Vec::new(),
            rng: Rng::new(1),
            animator: SpriteAnimator::new(
                default_animation_catalog(),
                AnimatorTiming {
                    base_frame_duration_ms: config.base_frame_duration_ms,
                    min_frame_duration_ms: config.min_frame_duration_ms,
                },
            ),
            audio: Box::new(SilentAudio),
            stats: SessionStats::default(),
            viewport: Viewport::default(),
            touch_device: false,
            playing: true,
            paused: false,
            elapsed_ms: 0,
            time_remaining_s: config.game_duration_s,
            speed_index: 0,
            end_reason: None,
            config,
        }
    }
}
