use crate::animation::{AnimationSpec, AnimatorEvent, AnimatorTiming, SpriteAnimator};
use crate::calibration::CalibrationSet;
use crate::collaborators::{AudioSink, NullRenderer, SilentAudio, SpriteRenderer};
use crate::config::GameConfig;
use crate::constants::{
    default_animation_catalog, speed_level, COUNTDOWN_INTERVAL_MS, IDLE_ANIMATION, SPEED_LEVELS,
};
use crate::rng::Rng;
use crate::scaler::Viewport;
use crate::timers::{FiredTimer, TimerAction, TimerId, TimerLedger};
use crate::types::{
    GameEvent, GameOverReason, GameSummary, RoundPhase, SessionStats, Snapshot, SoundKind,
};

mod context;
mod debug_hooks;
mod grab_round;
mod hitbox;
mod occupation;
mod protestors;

pub use self::context::{ProtestorCrowd, Region, SessionContext};
pub use self::grab_round::GrabRoundController;
pub use self::hitbox::HitboxGeometryTracker;
pub use self::occupation::RegionOccupationTracker;
pub use self::protestors::ProtestorEngagementTracker;

const SNAPSHOT_TIMELINE_LEN: usize = 24;

pub struct SessionOptions {
    pub audio: Box<dyn AudioSink>,
    pub renderer: Box<dyn SpriteRenderer>,
    pub calibration: CalibrationSet,
    pub animations: Vec<AnimationSpec>,
    pub touch_device: bool,
    pub viewport: Viewport,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            audio: Box::new(SilentAudio),
            renderer: Box::new(NullRenderer),
            calibration: CalibrationSet::builtin(),
            animations: default_animation_catalog(),
            touch_device: false,
            viewport: Viewport::default(),
        }
    }
}

/// One play session. Owns every component and the shared context, and is the
/// only entry point for clock ticks and player input.
pub struct GameSession {
    pub seed: u32,
    ctx: SessionContext,
    renderer: Box<dyn SpriteRenderer>,
    hitbox: HitboxGeometryTracker,
    rounds: GrabRoundController,
    occupation: RegionOccupationTracker,
    protestors: ProtestorEngagementTracker,
    tick_counter: u64,
    speed_timer: Option<TimerId>,
}

impl GameSession {
    pub fn new(config: GameConfig, seed: u32, options: SessionOptions) -> Self {
        let min_frame_duration_ms = if options.touch_device {
            config.touch_min_frame_duration_ms
        } else {
            config.min_frame_duration_ms
        };
        let animator = SpriteAnimator::new(
            options.animations,
            AnimatorTiming {
                base_frame_duration_ms: config.base_frame_duration_ms,
                min_frame_duration_ms,
            },
        );
        let ctx = SessionContext {
            regions: SessionContext::build_regions(&config),
            timers: TimerLedger::new(),
            events: Vec::new(),
            timeline: Vec::new(),
            rng: Rng::new(seed),
            animator,
            audio: options.audio,
            stats: SessionStats::default(),
            viewport: options.viewport,
            touch_device: options.touch_device,
            playing: false,
            paused: false,
            elapsed_ms: 0,
            time_remaining_s: config.game_duration_s,
            speed_index: 0,
            end_reason: None,
            config,
        };

        Self {
            seed,
            ctx,
            renderer: options.renderer,
            hitbox: HitboxGeometryTracker::new(options.calibration),
            rounds: GrabRoundController::new(),
            occupation: RegionOccupationTracker::new(),
            protestors: ProtestorEngagementTracker::new(),
            tick_counter: 0,
            speed_timer: None,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.ctx.config
    }

    pub fn regions(&self) -> &[Region] {
        &self.ctx.regions
    }

    pub fn stats(&self) -> &SessionStats {
        &self.ctx.stats
    }

    pub fn round_phase(&self) -> RoundPhase {
        self.rounds.phase()
    }

    pub fn is_playing(&self) -> bool {
        self.ctx.playing
    }

    pub fn is_paused(&self) -> bool {
        self.ctx.paused
    }

    pub fn is_ended(&self) -> bool {
        self.ctx.end_reason.is_some()
    }

    pub fn end_reason(&self) -> Option<GameOverReason> {
        self.ctx.end_reason
    }

    pub fn pending_timers(&self) -> usize {
        self.ctx.timers.len()
    }

    pub fn start(&mut self) {
        if self.ctx.playing || self.is_ended() {
            return;
        }
        self.ctx.playing = true;
        self.ctx.paused = false;
        self.ctx.time_remaining_s = self.ctx.config.game_duration_s;
        self.ctx.speed_index = 0;
        self.ctx.animator.set_speed(speed_level(0).0);

        self.ctx
            .timers
            .interval(TimerAction::CountdownTick, COUNTDOWN_INTERVAL_MS);
        if SPEED_LEVELS.len() > 1 {
            let period_ms = self.ctx.config.speed_step_interval_ms;
            self.speed_timer = Some(self.ctx.timers.interval(TimerAction::SpeedStep, period_ms));
        }
        let delay_ms = self.ctx.config.initial_grab_delay_ms;
        self.rounds.schedule_next(&mut self.ctx, delay_ms);
        self.ctx.animator.play(IDLE_ANIMATION);
        self.pump_animator();

        self.ctx.mark("session started".to_string());
        log::info!(
            "session started (seed {}, {} regions)",
            self.seed,
            self.ctx.regions.len()
        );
    }

    /// Flushes every outstanding timer before rebuilding region state, then
    /// starts over.
    pub fn restart(&mut self) {
        let flushed = self.ctx.timers.flush_all();
        self.rounds.reset();
        self.hitbox.reset();
        self.ctx.animator.reset();
        self.ctx.regions = SessionContext::build_regions(&self.ctx.config);
        self.ctx.stats = SessionStats::default();
        self.ctx.events.clear();
        self.ctx.timeline.clear();
        self.ctx.playing = false;
        self.ctx.paused = false;
        self.ctx.end_reason = None;
        self.ctx.elapsed_ms = 0;
        self.tick_counter = 0;
        self.speed_timer = None;
        log::info!("session restarted, flushed {flushed} timers");
        self.start();
    }

    pub fn pause(&mut self) {
        if !self.ctx.is_active() {
            return;
        }
        self.ctx.paused = true;
        self.hitbox.hide(&mut self.ctx);
        self.ctx.emit(GameEvent::Paused);
        self.ctx.mark("paused".to_string());
        log::info!("paused with {} timers outstanding", self.ctx.timers.len());
    }

    /// Outstanding timers start their full duration over.
    pub fn resume(&mut self) {
        if !self.ctx.playing || !self.ctx.paused {
            return;
        }
        self.ctx.paused = false;
        self.ctx.timers.restart_all();
        self.ctx.emit(GameEvent::Resumed);
        if self.rounds.phase() == RoundPhase::Armed {
            self.hitbox.refresh(&mut self.ctx);
        }
        self.ctx.mark("resumed".to_string());
        log::info!("resumed");
    }

    pub fn toggle_pause(&mut self) {
        if self.ctx.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    pub fn resize(&mut self, rendered_width: f64) {
        self.ctx.viewport.rendered_width = rendered_width;
        if self.rounds.phase() == RoundPhase::Armed {
            self.hitbox.refresh(&mut self.ctx);
        }
        log::debug!("viewport scale now {:.3}", self.ctx.viewport.current_scale());
    }

    pub fn step(&mut self, dt_ms: u64) {
        if !self.ctx.is_active() {
            return;
        }
        self.tick_counter += 1;
        self.ctx.elapsed_ms = self.ctx.elapsed_ms.saturating_add(dt_ms);

        for fired in self.ctx.timers.advance(dt_ms) {
            if !self.ctx.playing {
                break;
            }
            self.dispatch_timer(fired);
        }

        if self.ctx.playing {
            self.ctx.animator.advance(dt_ms);
            self.pump_animator();
        }

        self.occupation.update(&mut self.ctx, &mut self.protestors, dt_ms);
        self.settle_hitbox();
    }

    /// Player clicked the hitbox. Returns whether a round was blocked.
    pub fn activate_hitbox(&mut self) -> bool {
        if !self.hitbox.is_interactive() {
            return false;
        }
        let blocked = self.rounds.on_block(&mut self.ctx);
        self.pump_animator();
        self.settle_hitbox();
        blocked
    }

    pub fn activate_at(&mut self, x: f64, y: f64) -> bool {
        if !self.hitbox.hit_test(x, y) {
            return false;
        }
        self.activate_hitbox()
    }

    pub fn engage_protestors(&mut self, region_id: usize) -> bool {
        self.protestors.on_engage(&mut self.ctx, region_id)
    }

    pub fn engage_at(&mut self, x: f64, y: f64) -> bool {
        match self.protestors.region_at(&self.ctx, x, y) {
            Some(region_id) => self.engage_protestors(region_id),
            None => false,
        }
    }

    pub fn build_snapshot(&mut self, include_events: bool) -> Snapshot {
        let snapshot = Snapshot {
            tick: self.tick_counter,
            elapsed_ms: self.ctx.elapsed_ms,
            time_remaining_s: self.ctx.time_remaining_s,
            playing: self.ctx.playing,
            paused: self.ctx.paused,
            speed_multiplier: self.ctx.animator.speed(),
            stats: self.ctx.stats.clone(),
            regions: self.ctx.regions.iter().map(Region::view).collect(),
            round: self.rounds.view(),
            hitbox: self.hitbox.current(),
            protestors: self.protestors.views(&self.ctx),
            pending_timers: self.ctx.timers.len(),
            events: if include_events {
                self.ctx.events.clone()
            } else {
                Vec::new()
            },
            timeline: self
                .ctx
                .timeline
                .iter()
                .rev()
                .take(SNAPSHOT_TIMELINE_LEN)
                .cloned()
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect(),
            end_reason: self.ctx.end_reason,
        };
        if include_events {
            self.ctx.events.clear();
        }
        snapshot
    }

    pub fn build_summary(&self) -> GameSummary {
        GameSummary {
            reason: self.ctx.end_reason,
            duration_ms: self.ctx.elapsed_ms,
            stats: self.ctx.stats.clone(),
            regions: self.ctx.regions.iter().map(Region::view).collect(),
            timeline: self.ctx.timeline.clone(),
        }
    }

    fn dispatch_timer(&mut self, fired: FiredTimer) {
        match fired.action {
            TimerAction::StartRound => {
                self.rounds.on_start_timer(&mut self.ctx, fired.id);
                self.pump_animator();
            }
            TimerAction::RoundFailsafe { round_id } => {
                self.rounds.on_failsafe(&mut self.ctx, round_id);
                self.pump_animator();
            }
            TimerAction::DismissProtestors { region_id } => {
                self.protestors.on_dismiss(&mut self.ctx, region_id, fired.id);
            }
            TimerAction::CountdownTick => self.countdown_tick(),
            TimerAction::SpeedStep => self.speed_step(fired.id),
        }
    }

    fn countdown_tick(&mut self) {
        self.ctx.time_remaining_s = self.ctx.time_remaining_s.saturating_sub(1);
        if self.ctx.time_remaining_s == 0 {
            self.ctx.end_game(GameOverReason::Survived);
            self.settle_hitbox();
        }
    }

    fn speed_step(&mut self, timer: TimerId) {
        if self.speed_timer != Some(timer) {
            return;
        }
        let next = self.ctx.speed_index + 1;
        if next >= SPEED_LEVELS.len() {
            self.ctx.timers.untrack(timer);
            self.speed_timer = None;
            return;
        }
        self.ctx.speed_index = next;
        let (multiplier, label) = speed_level(next);
        self.ctx.animator.set_speed(multiplier);
        self.ctx.emit(GameEvent::SpeedChanged {
            multiplier,
            label: label.to_string(),
        });
        self.ctx.play_sound(SoundKind::Ui, label);
        self.ctx.mark(format!("speed {multiplier}x"));
        log::info!("speed level {next}: {label} ({multiplier}x)");
    }

    /// Routes queued animator output until it runs dry: frame changes feed
    /// the renderer and the hitbox, completions feed the round controller.
    fn pump_animator(&mut self) {
        loop {
            let events = self.ctx.animator.take_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                match event {
                    AnimatorEvent::FrameChanged {
                        token,
                        animation_id,
                        frame,
                    } => {
                        let current = self.ctx.animator.current().map(|(t, _, _)| t);
                        if current != Some(token) {
                            continue;
                        }
                        self.renderer.render(&animation_id, frame);
                        let predict = self.ctx.config.predict_next_frame;
                        self.hitbox.update(&mut self.ctx, &animation_id, frame, predict);
                    }
                    AnimatorEvent::Completed { token, .. } => {
                        self.rounds.on_animation_completed(&mut self.ctx, token);
                    }
                }
            }
        }
    }

    fn settle_hitbox(&mut self) {
        if self.rounds.phase() != RoundPhase::Armed || !self.ctx.playing {
            self.hitbox.hide(&mut self.ctx);
        }
    }
}
