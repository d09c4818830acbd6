use std::collections::VecDeque;

use crate::animation::AnimationToken;
use crate::constants::{CELEBRATION_ANIMATION, IDLE_ANIMATION, RECOVERY_ANIMATION};
use crate::timers::{TimerAction, TimerId};
use crate::types::{GameEvent, GameOverReason, RoundOutcome, RoundPhase, RoundView, SoundKind};

use super::context::SessionContext;

#[derive(Clone, Debug)]
struct GrabRound {
    id: u64,
    region_id: usize,
    animation_id: String,
    token: AnimationToken,
    is_hittable: bool,
    started_at_ms: u64,
    outcome: Option<RoundOutcome>,
    failsafe: Option<TimerId>,
}

/// One grab attempt at a time: target, arm, resolve, react, repeat.
#[derive(Clone, Debug, Default)]
pub struct GrabRoundController {
    phase: RoundPhase,
    round: Option<GrabRound>,
    next_round_id: u64,
    pending_start: Option<TimerId>,
    reactions: VecDeque<String>,
    reaction_token: Option<AnimationToken>,
}

impl GrabRoundController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_armed(&self) -> bool {
        self.phase == RoundPhase::Armed && self.round.as_ref().is_some_and(|r| r.is_hittable)
    }

    pub fn view(&self) -> Option<RoundView> {
        self.round.as_ref().map(|round| RoundView {
            id: round.id,
            region_id: round.region_id,
            animation_id: round.animation_id.clone(),
            phase: self.phase,
            is_hittable: round.is_hittable,
            started_at_ms: round.started_at_ms,
            outcome: round.outcome,
        })
    }

    /// Forgets the open round and any queued reactions. Timers are expected to
    /// have been flushed by the caller.
    pub fn reset(&mut self) {
        self.phase = RoundPhase::Idle;
        self.round = None;
        self.pending_start = None;
        self.reactions.clear();
        self.reaction_token = None;
    }

    pub fn schedule_next(&mut self, ctx: &mut SessionContext, delay_ms: u64) {
        if let Some(previous) = self.pending_start.take() {
            ctx.timers.untrack(previous);
        }
        self.pending_start = Some(ctx.timers.timeout(TimerAction::StartRound, delay_ms));
    }

    pub fn on_start_timer(&mut self, ctx: &mut SessionContext, timer: TimerId) {
        if self.pending_start != Some(timer) {
            log::debug!("stale round start {timer:?} ignored");
            return;
        }
        self.pending_start = None;
        self.begin_round(ctx);
    }

    fn begin_round(&mut self, ctx: &mut SessionContext) {
        if !ctx.is_active() || self.round.is_some() {
            return;
        }

        let candidates: Vec<usize> = ctx
            .regions
            .iter()
            .filter(|region| !region.is_fully_claimed())
            .map(|region| region.id)
            .collect();
        if candidates.is_empty() {
            if ctx.all_regions_claimed() {
                ctx.end_game(GameOverReason::Annexed);
            } else {
                self.retry_later(ctx);
            }
            return;
        }

        let region_id = candidates[ctx.rng.pick_index(candidates.len())];
        self.phase = RoundPhase::TargetSelected;

        let allowed = ctx
            .config
            .regions
            .get(region_id)
            .map(|def| def.grab_animations.clone())
            .unwrap_or_default();
        let pick = ctx.rng.pick_index(allowed.len());
        let Some(animation_id) = allowed.get(pick).cloned() else {
            self.retry_later(ctx);
            return;
        };
        let Some(token) = ctx.animator.play(&animation_id) else {
            self.retry_later(ctx);
            return;
        };

        self.next_round_id += 1;
        let round_id = self.next_round_id;
        let failsafe_ms = ctx.animator.nominal_duration_ms(&animation_id).unwrap_or(0)
            + ctx.config.failsafe_grace_ms;
        let failsafe = ctx
            .timers
            .timeout(TimerAction::RoundFailsafe { round_id }, failsafe_ms);

        self.round = Some(GrabRound {
            id: round_id,
            region_id,
            animation_id: animation_id.clone(),
            token,
            is_hittable: true,
            started_at_ms: ctx.elapsed_ms,
            outcome: None,
            failsafe: Some(failsafe),
        });
        self.phase = RoundPhase::Armed;

        let region_name = ctx.region_name(region_id);
        ctx.emit(GameEvent::RoundStarted {
            region_id,
            animation_id: animation_id.clone(),
        });
        ctx.emit(GameEvent::HitWindowOpened { region_id });
        ctx.play_sound(SoundKind::GrabWarning, &region_name);
        ctx.play_sound(SoundKind::GrabAttempt, &animation_id);
        log::info!("round {round_id}: {animation_id} targets {region_name}");
    }

    fn retry_later(&mut self, ctx: &mut SessionContext) {
        self.phase = RoundPhase::Idle;
        let retry_ms = ctx.config.no_target_retry_ms;
        self.schedule_next(ctx, retry_ms);
    }

    /// Player hit the hitbox. Returns whether this resolved the round.
    pub fn on_block(&mut self, ctx: &mut SessionContext) -> bool {
        if !ctx.is_active() || !self.is_armed() {
            log::debug!("block ignored in phase {:?}", self.phase);
            return false;
        }
        self.resolve(ctx, RoundOutcome::Blocked);
        true
    }

    pub fn on_animation_completed(&mut self, ctx: &mut SessionContext, token: AnimationToken) {
        if self.reaction_token == Some(token) {
            self.reaction_token = None;
            self.play_next_reaction(ctx);
            return;
        }
        let current = self.round.as_ref().map(|round| round.token);
        if self.is_armed() && current == Some(token) {
            self.resolve(ctx, RoundOutcome::Succeeded);
        } else {
            log::debug!("stale completion {token:?} ignored");
        }
    }

    pub fn on_failsafe(&mut self, ctx: &mut SessionContext, round_id: u64) {
        let current = self.round.as_ref().map(|round| round.id);
        if !self.is_armed() || current != Some(round_id) {
            log::debug!("stale failsafe for round {round_id} ignored");
            return;
        }
        log::warn!("round {round_id} hung, forcing resolution");
        self.resolve(ctx, RoundOutcome::TimedOut);
    }

    fn resolve(&mut self, ctx: &mut SessionContext, outcome: RoundOutcome) {
        let Some(round) = self.round.as_mut() else {
            return;
        };
        if round.outcome.is_some() {
            return;
        }
        round.outcome = Some(outcome);
        round.is_hittable = false;
        let failsafe = round.failsafe.take();
        let region_id = round.region_id;
        let round_id = round.id;
        let animation_id = round.animation_id.clone();
        self.phase = RoundPhase::Resolved;

        if let Some(timer) = failsafe {
            ctx.timers.untrack(timer);
        }
        if outcome == RoundOutcome::Blocked {
            ctx.animator.stop();
        }
        ctx.emit(GameEvent::HitWindowClosed { region_id });
        ctx.emit(GameEvent::RoundResolved { region_id, outcome });
        let region_name = ctx.region_name(region_id);
        ctx.mark(format!("round {round_id} {outcome:?} on {region_name}"));
        log::info!("round {round_id} resolved {outcome:?}");

        if !outcome.claims_region() {
            ctx.stats.score += ctx.config.block_score;
            ctx.stats.successful_blocks += 1;
            ctx.stats.consecutive_blocks += 1;
            let score = ctx.stats.score;
            ctx.emit(GameEvent::ScoreChanged { score });
            ctx.play_sound(SoundKind::Block, &region_name);

            let smack = ctx
                .animator
                .spec(&animation_id)
                .and_then(|spec| spec.smack_animation.clone());
            self.reactions.extend(smack);
            self.reactions.push_back(RECOVERY_ANIMATION.to_string());
        } else {
            ctx.stats.grabs_conceded += 1;
            ctx.stats.consecutive_blocks = 0;
            ctx.play_sound(SoundKind::GrabSuccess, &region_name);

            let before = ctx.regions.get(region_id).map_or(0, |region| region.claims);
            let after = ctx.set_claims(region_id, before.saturating_add(1));
            let annexed_now = ctx
                .regions
                .get(region_id)
                .is_some_and(|region| region.is_fully_claimed())
                && after != Some(before);
            if annexed_now {
                ctx.emit(GameEvent::RegionAnnexed { region_id });
                ctx.play_sound(SoundKind::Annexed, &region_name);
                ctx.mark(format!("{region_name} annexed"));
            }
            if ctx.all_regions_claimed() {
                ctx.end_game(GameOverReason::Annexed);
                return;
            }
            self.reactions.push_back(CELEBRATION_ANIMATION.to_string());
        }

        self.play_next_reaction(ctx);
    }

    fn play_next_reaction(&mut self, ctx: &mut SessionContext) {
        while let Some(animation_id) = self.reactions.pop_front() {
            if let Some(token) = ctx.animator.play(&animation_id) {
                self.reaction_token = Some(token);
                return;
            }
        }
        self.finish_round(ctx);
    }

    fn finish_round(&mut self, ctx: &mut SessionContext) {
        self.round = None;
        self.phase = RoundPhase::Idle;
        if !ctx.playing {
            return;
        }
        ctx.animator.play(IDLE_ANIMATION);
        self.begin_round(ctx);
    }
}
