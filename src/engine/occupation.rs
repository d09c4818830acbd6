use crate::types::{GameEvent, LiberationCause};

use super::context::SessionContext;
use super::protestors::ProtestorEngagementTracker;

/// Per-tick annexation clock for every fully claimed region.
#[derive(Clone, Debug, Default)]
pub struct RegionOccupationTracker {
    /// Debug override for the resistance roll.
    forced_roll: Option<bool>,
}

impl RegionOccupationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn force_roll(&mut self, outcome: Option<bool>) {
        self.forced_roll = outcome;
    }

    pub fn update(
        &mut self,
        ctx: &mut SessionContext,
        protestors: &mut ProtestorEngagementTracker,
        dt_ms: u64,
    ) {
        if !ctx.is_active() {
            return;
        }
        let show_delay_ms = ctx.config.protestor_show_delay_ms();
        let full_ms = ctx.config.full_annexation_time_ms;
        let probability = ctx.config.resistance_chance_per_second * (dt_ms as f64 / 1000.0);

        for region_id in 0..ctx.regions.len() {
            let region = &mut ctx.regions[region_id];
            if !region.is_fully_claimed() {
                region.annexed_elapsed_ms = 0;
                region.resistance_eligible = false;
                region.protestors_spawned = false;
                if region.crowd.visible {
                    protestors.hide(ctx, region_id);
                }
                continue;
            }

            region.annexed_elapsed_ms += dt_ms;
            let elapsed = region.annexed_elapsed_ms;

            if !region.protestors_spawned && elapsed >= show_delay_ms {
                region.protestors_spawned = true;
                protestors.show(ctx, region_id);
            }

            let region = &mut ctx.regions[region_id];
            if !region.resistance_eligible && elapsed >= full_ms {
                region.resistance_eligible = true;
                let name = region.name.clone();
                ctx.emit(GameEvent::ResistancePossible { region_id });
                ctx.mark(format!("resistance possible in {name}"));
                log::info!("{name} can now resist");
            }

            if ctx.regions[region_id].resistance_eligible && self.roll(ctx, probability) {
                ctx.liberate(region_id, LiberationCause::Resistance);
            }
        }
    }

    fn roll(&self, ctx: &mut SessionContext, probability: f64) -> bool {
        match self.forced_roll {
            Some(outcome) => outcome,
            None => ctx.rng.chance(probability),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> (RegionOccupationTracker, ProtestorEngagementTracker) {
        let mut occupation = RegionOccupationTracker::new();
        occupation.force_roll(Some(false));
        (occupation, ProtestorEngagementTracker::new())
    }

    #[test]
    fn eligibility_flips_once_at_full_annexation_time() {
        let mut ctx = SessionContext::for_tests();
        let (mut occupation, mut protestors) = tracker();
        ctx.set_claims(0, 3);

        let mut flips = Vec::new();
        let mut elapsed = 0;
        for dt in [3_000, 3_000, 3_900, 99, 1, 50, 2_000] {
            elapsed += dt;
            let before = ctx.regions[0].resistance_eligible;
            occupation.update(&mut ctx, &mut protestors, dt);
            if !before && ctx.regions[0].resistance_eligible {
                flips.push(elapsed);
            }
        }
        assert_eq!(flips, vec![10_000]);
        let notices = ctx
            .events
            .iter()
            .filter(|event| matches!(event, GameEvent::ResistancePossible { region_id: 0 }))
            .count();
        assert_eq!(notices, 1);
    }

    #[test]
    fn protestors_spawn_once_at_three_quarters() {
        let mut ctx = SessionContext::for_tests();
        let (mut occupation, mut protestors) = tracker();
        ctx.set_claims(1, 3);

        occupation.update(&mut ctx, &mut protestors, 7_450);
        assert!(!ctx.regions[1].crowd.visible);
        occupation.update(&mut ctx, &mut protestors, 50);
        assert!(ctx.regions[1].crowd.visible);

        protestors.hide(&mut ctx, 1);
        occupation.update(&mut ctx, &mut protestors, 1_000);
        assert!(!ctx.regions[1].crowd.visible);
    }

    #[test]
    fn partial_claims_do_not_accumulate() {
        let mut ctx = SessionContext::for_tests();
        let (mut occupation, mut protestors) = tracker();
        ctx.set_claims(2, 2);
        occupation.update(&mut ctx, &mut protestors, 60_000);
        assert_eq!(ctx.regions[2].annexed_elapsed_ms, 0);
        assert!(!ctx.regions[2].resistance_eligible);
    }

    #[test]
    fn losing_full_claim_hides_protestors() {
        let mut ctx = SessionContext::for_tests();
        let (mut occupation, mut protestors) = tracker();
        ctx.set_claims(0, 3);
        occupation.update(&mut ctx, &mut protestors, 8_000);
        assert!(ctx.regions[0].crowd.visible);

        ctx.regions[0].claims = 2;
        occupation.update(&mut ctx, &mut protestors, 50);
        let region = &ctx.regions[0];
        assert!(!region.crowd.visible);
        assert_eq!(region.annexed_elapsed_ms, 0);
    }

    #[test]
    fn forced_success_liberates_eligible_region() {
        let mut ctx = SessionContext::for_tests();
        let (mut occupation, mut protestors) = tracker();
        ctx.set_claims(0, 3);
        occupation.update(&mut ctx, &mut protestors, 10_000);
        assert_eq!(ctx.regions[0].claims, 3);

        occupation.force_roll(Some(true));
        occupation.update(&mut ctx, &mut protestors, 50);
        let region = &ctx.regions[0];
        assert_eq!(region.claims, 0);
        assert!(!region.resistance_eligible);
        assert!(!region.crowd.visible);
    }

    #[test]
    fn certain_probability_liberates_without_override() {
        let mut ctx = SessionContext::for_tests();
        ctx.config.resistance_chance_per_second = 1_000.0;
        let mut occupation = RegionOccupationTracker::new();
        let mut protestors = ProtestorEngagementTracker::new();
        ctx.set_claims(2, 3);
        occupation.update(&mut ctx, &mut protestors, 10_000);
        assert_eq!(ctx.regions[2].claims, 0);
    }

    #[test]
    fn paused_session_does_not_advance() {
        let mut ctx = SessionContext::for_tests();
        let (mut occupation, mut protestors) = tracker();
        ctx.set_claims(0, 3);
        ctx.paused = true;
        occupation.update(&mut ctx, &mut protestors, 20_000);
        assert_eq!(ctx.regions[0].annexed_elapsed_ms, 0);
    }
}
