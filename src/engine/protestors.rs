use crate::scaler::{recenter, scale};
use crate::timers::{TimerAction, TimerId};
use crate::types::{GameEvent, LiberationCause, ProtestorVariant, ProtestorView, SoundKind};

use super::context::{ProtestorCrowd, SessionContext};

/// Crowd lifecycle on fully occupied regions. All per-region state lives in
/// `Region::crowd` so liberation from any path clears it in one place.
#[derive(Clone, Debug, Default)]
pub struct ProtestorEngagementTracker;

impl ProtestorEngagementTracker {
    pub fn new() -> Self {
        Self
    }

    pub fn show(&mut self, ctx: &mut SessionContext, region_id: usize) -> bool {
        let spawns = match ctx.config.regions.get(region_id) {
            Some(def) => def.protestor_spawns.clone(),
            None => return false,
        };
        let pick = ctx.rng.pick_index(spawns.len());
        let Some(region) = ctx.regions.get_mut(region_id) else {
            return false;
        };
        if region.crowd.visible {
            return false;
        }
        region.crowd = ProtestorCrowd {
            visible: true,
            spawn: spawns.get(pick).copied(),
            ..ProtestorCrowd::default()
        };
        let name = region.name.clone();

        ctx.emit(GameEvent::ProtestorsShown { region_id });
        ctx.play_sound(SoundKind::Protest, &name);
        ctx.mark(format!("protestors in {name}"));
        log::info!("protestors shown in {name}");
        true
    }

    pub fn hide(&mut self, ctx: &mut SessionContext, region_id: usize) -> bool {
        let Some(region) = ctx.regions.get_mut(region_id) else {
            return false;
        };
        if !region.crowd.visible {
            return false;
        }
        let dismiss_timer = region.crowd.dismiss_timer.take();
        region.crowd = ProtestorCrowd::default();
        if let Some(timer) = dismiss_timer {
            ctx.timers.untrack(timer);
        }
        ctx.emit(GameEvent::ProtestorsHidden { region_id });
        true
    }

    /// One player interaction with a visible crowd. Returns whether it counted.
    pub fn on_engage(&mut self, ctx: &mut SessionContext, region_id: usize) -> bool {
        if !ctx.is_active() {
            return false;
        }
        let liberating = ctx.config.liberating_engagements;
        let first_scale = ctx.config.first_engagement_scale;
        let second_scale = ctx.config.second_engagement_scale;
        let dismiss_ms = ctx.config.protestor_dismiss_ms;

        let Some(region) = ctx.regions.get_mut(region_id) else {
            return false;
        };
        if !region.crowd.visible {
            log::debug!("engagement ignored: no protestors in {}", region.name);
            return false;
        }

        let crowd = &mut region.crowd;
        crowd.engagement_count = crowd.engagement_count.saturating_add(1);
        let engagement = crowd.engagement_count;
        let previous_timer = crowd.dismiss_timer.take();
        if let Some(timer) = previous_timer {
            ctx.timers.untrack(timer);
        }

        if engagement >= liberating {
            if !ctx.liberate(region_id, LiberationCause::Protest) {
                self.hide(ctx, region_id);
            }
            return true;
        }

        let Some(region) = ctx.regions.get_mut(region_id) else {
            return false;
        };
        let crowd = &mut region.crowd;
        if engagement == 1 {
            crowd.scale *= first_scale;
            crowd.extra_figures = 1;
        } else {
            crowd.scale *= second_scale;
            crowd.variant = ProtestorVariant::Agitated;
            crowd.extra_figures = 2;
        }
        let variant = crowd.variant;
        let name = region.name.clone();

        let timer = ctx
            .timers
            .timeout(TimerAction::DismissProtestors { region_id }, dismiss_ms);
        if let Some(region) = ctx.regions.get_mut(region_id) {
            region.crowd.dismiss_timer = Some(timer);
        }

        ctx.emit(GameEvent::ProtestorsEscalated {
            region_id,
            engagement,
            variant,
        });
        ctx.play_sound(SoundKind::Particles, &name);
        log::debug!("{name} protestors engaged {engagement}x");
        true
    }

    pub fn on_dismiss(&mut self, ctx: &mut SessionContext, region_id: usize, timer: TimerId) {
        let current = ctx
            .regions
            .get(region_id)
            .and_then(|region| region.crowd.dismiss_timer);
        if current != Some(timer) {
            log::debug!("stale dismiss {timer:?} for region {region_id} ignored");
            return;
        }
        if let Some(region) = ctx.regions.get_mut(region_id) {
            region.crowd.dismiss_timer = None;
        }
        self.hide(ctx, region_id);
    }

    /// Crowd rectangle in viewport pixels, grown around its own center by the
    /// escalation scale.
    pub fn view(&self, ctx: &SessionContext, region_id: usize) -> Option<ProtestorView> {
        let region = ctx.regions.get(region_id)?;
        let crowd = &region.crowd;
        if !crowd.visible {
            return None;
        }
        let spawn = crowd.spawn?;
        let current = ctx.viewport.current_scale();
        let reference = Some(ctx.config.reference_scale);
        let placement = recenter(
            scale(spawn, current, reference, 1.0),
            scale(spawn, current, reference, crowd.scale),
        );
        Some(ProtestorView {
            region_id,
            placement,
            scale: crowd.scale,
            variant: crowd.variant,
            extra_figures: crowd.extra_figures,
        })
    }

    pub fn views(&self, ctx: &SessionContext) -> Vec<ProtestorView> {
        (0..ctx.regions.len())
            .filter_map(|region_id| self.view(ctx, region_id))
            .collect()
    }

    pub fn region_at(&self, ctx: &SessionContext, x: f64, y: f64) -> Option<usize> {
        self.views(ctx)
            .into_iter()
            .find(|view| view.placement.contains(x, y))
            .map(|view| view.region_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shown(region_id: usize) -> (SessionContext, ProtestorEngagementTracker) {
        let mut ctx = SessionContext::for_tests();
        ctx.set_claims(region_id, 3);
        let mut tracker = ProtestorEngagementTracker::new();
        assert!(tracker.show(&mut ctx, region_id));
        (ctx, tracker)
    }

    #[test]
    fn escalation_scales_then_swaps_variant() {
        let (mut ctx, mut tracker) = shown(0);
        tracker.on_engage(&mut ctx, 0);
        let crowd = ctx.regions[0].crowd.clone();
        assert!((crowd.scale - 1.15).abs() < 1e-9);
        assert_eq!(crowd.extra_figures, 1);
        assert_eq!(crowd.variant, ProtestorVariant::Standard);

        tracker.on_engage(&mut ctx, 0);
        let crowd = ctx.regions[0].crowd.clone();
        assert!((crowd.scale - 1.15 * 1.3).abs() < 1e-9);
        assert_eq!(crowd.extra_figures, 2);
        assert_eq!(crowd.variant, ProtestorVariant::Agitated);
    }

    #[test]
    fn third_engagement_liberates_without_resistance() {
        let (mut ctx, mut tracker) = shown(1);
        assert!(!ctx.regions[1].resistance_eligible);
        for _ in 0..3 {
            tracker.on_engage(&mut ctx, 1);
        }
        let region = &ctx.regions[1];
        assert_eq!(region.claims, 0);
        assert_eq!(region.crowd.engagement_count, 0);
        assert!(!region.crowd.visible);
        assert!(ctx.timers.is_empty());
        assert!(ctx.events.iter().any(|event| matches!(
            event,
            GameEvent::RegionLiberated {
                region_id: 1,
                cause: LiberationCause::Protest
            }
        )));
    }

    #[test]
    fn each_engagement_rearms_a_single_dismiss_timer() {
        let (mut ctx, mut tracker) = shown(2);
        tracker.on_engage(&mut ctx, 2);
        let first = ctx.regions[2].crowd.dismiss_timer.expect("armed");
        ctx.timers.advance(5_000);
        tracker.on_engage(&mut ctx, 2);
        let second = ctx.regions[2].crowd.dismiss_timer.expect("re-armed");
        assert_ne!(first, second);
        assert_eq!(ctx.timers.len(), 1);
        assert_eq!(ctx.timers.remaining_ms(second), Some(7_000));
    }

    #[test]
    fn dismiss_hides_and_resets_counter() {
        let (mut ctx, mut tracker) = shown(0);
        tracker.on_engage(&mut ctx, 0);
        let fired = ctx.timers.advance(7_000);
        assert_eq!(fired.len(), 1);
        tracker.on_dismiss(&mut ctx, 0, fired[0].id);
        let region = &ctx.regions[0];
        assert!(!region.crowd.visible);
        assert_eq!(region.crowd.engagement_count, 0);
        assert_eq!(region.claims, 3);
    }

    #[test]
    fn stale_dismiss_is_ignored() {
        let (mut ctx, mut tracker) = shown(0);
        tracker.on_engage(&mut ctx, 0);
        tracker.on_dismiss(&mut ctx, 0, TimerId(12_345));
        assert!(ctx.regions[0].crowd.visible);
        assert_eq!(ctx.regions[0].crowd.engagement_count, 1);
    }

    #[test]
    fn engagement_without_crowd_is_ignored() {
        let mut ctx = SessionContext::for_tests();
        let mut tracker = ProtestorEngagementTracker::new();
        assert!(!tracker.on_engage(&mut ctx, 0));
        assert!(!tracker.on_engage(&mut ctx, 99));
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn placement_grows_around_spawn_center() {
        let (mut ctx, mut tracker) = shown(1);
        let before = tracker.view(&ctx, 1).expect("visible");
        tracker.on_engage(&mut ctx, 1);
        let after = tracker.view(&ctx, 1).expect("visible");
        assert!(after.placement.width > before.placement.width);
        let center = |r: crate::types::Rect| (r.x * 2 + r.width, r.y * 2 + r.height);
        let (bx, by) = center(before.placement);
        let (ax, ay) = center(after.placement);
        assert!((bx - ax).abs() <= 1 && (by - ay).abs() <= 1);

        let hit_x = (after.placement.x + after.placement.width / 2) as f64;
        let hit_y = (after.placement.y + after.placement.height / 2) as f64;
        assert_eq!(tracker.region_at(&ctx, hit_x, hit_y), Some(1));
    }
}
