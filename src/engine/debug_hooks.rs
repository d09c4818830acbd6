use crate::calibration::CalibrationError;
use crate::types::{GameEvent, LiberationCause, Rect};

use super::*;

/// Test and tooling entry points that bypass the probabilistic and
/// input-driven paths. They still go through the same state transitions.
impl GameSession {
    pub fn debug_set_claims(&mut self, region_id: usize, claims: u8) -> Option<u8> {
        let applied = self.ctx.set_claims(region_id, claims);
        log::debug!("debug: region {region_id} claims set to {applied:?}");
        applied
    }

    pub fn debug_annex_region(&mut self, region_id: usize) -> Option<u8> {
        let max_claims = self.ctx.config.max_claims;
        self.debug_set_claims(region_id, max_claims)
    }

    /// Fully claims a region and fast-forwards its clock to the point where
    /// resistance rolls begin.
    pub fn debug_make_resistance_ready(&mut self, region_id: usize) -> bool {
        if self.debug_annex_region(region_id).is_none() {
            return false;
        }
        let full_ms = self.ctx.config.full_annexation_time_ms;
        let Some(region) = self.ctx.regions.get_mut(region_id) else {
            return false;
        };
        region.annexed_elapsed_ms = region.annexed_elapsed_ms.max(full_ms);
        region.protestors_spawned = true;
        if !region.resistance_eligible {
            region.resistance_eligible = true;
            self.ctx.emit(GameEvent::ResistancePossible { region_id });
        }
        true
    }

    pub fn debug_force_liberate(&mut self, region_id: usize) -> bool {
        self.ctx.liberate(region_id, LiberationCause::Forced)
    }

    pub fn debug_show_protestors(&mut self, region_id: usize) -> bool {
        self.protestors.show(&mut self.ctx, region_id)
    }

    pub fn debug_hide_protestors(&mut self, region_id: usize) -> bool {
        self.protestors.hide(&mut self.ctx, region_id)
    }

    /// `Some(outcome)` pins every resistance roll; `None` restores the RNG.
    pub fn debug_force_resistance_roll(&mut self, outcome: Option<bool>) {
        self.occupation.force_roll(outcome);
    }

    /// Calibration tooling: overrides one frame and re-places the live hitbox.
    pub fn set_frame_geometry(
        &mut self,
        animation_id: &str,
        frame_index: usize,
        rect: Rect,
    ) -> Result<(), CalibrationError> {
        self.hitbox.set_frame_geometry(animation_id, frame_index, rect)?;
        if self.rounds.phase() == RoundPhase::Armed {
            self.hitbox.refresh(&mut self.ctx);
        }
        Ok(())
    }

    pub fn export_calibration(&self) -> Result<String, CalibrationError> {
        self.hitbox.calibration().to_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationSet;
    use crate::constants::TICK_MS;

    fn session() -> GameSession {
        let mut session = GameSession::new(GameConfig::default(), 31, SessionOptions::default());
        session.start();
        session
    }

    #[test]
    fn set_claims_is_clamped() {
        let mut session = session();
        assert_eq!(session.debug_set_claims(1, 200), Some(3));
        assert_eq!(session.debug_set_claims(7, 1), None);
    }

    #[test]
    fn resistance_ready_region_liberates_on_forced_roll() {
        let mut session = session();
        assert!(session.debug_make_resistance_ready(2));
        assert!(session.regions()[2].resistance_eligible);
        session.debug_force_resistance_roll(Some(true));
        session.step(TICK_MS);
        assert_eq!(session.regions()[2].claims, 0);
    }

    #[test]
    fn forced_liberation_is_idempotent() {
        let mut session = session();
        session.debug_annex_region(0);
        assert!(session.debug_force_liberate(0));
        assert!(!session.debug_force_liberate(0));
        assert_eq!(session.stats().regions_liberated, 1);
    }

    #[test]
    fn show_and_hide_protestors() {
        let mut session = session();
        assert!(session.debug_show_protestors(1));
        assert!(!session.debug_show_protestors(1));
        assert!(session.debug_hide_protestors(1));
        assert!(!session.debug_hide_protestors(1));
    }

    #[test]
    fn frame_override_moves_live_hitbox_and_exports() {
        let mut session = session();
        while session.round_phase() != RoundPhase::Armed {
            session.step(TICK_MS);
        }
        let animation = session
            .build_snapshot(false)
            .round
            .map(|round| round.animation_id)
            .expect("armed round");
        session
            .set_frame_geometry(&animation, 0, Rect::new(10, 20, 100, 100))
            .expect("frame 0 exists");
        let hitbox = session.build_snapshot(false).hitbox.expect("still armed");
        assert_eq!(hitbox.interactive, Rect::new(10, 20, 100, 100));

        let exported = session.export_calibration().expect("export");
        let reloaded = CalibrationSet::from_json_str(&exported).expect("reload");
        assert_eq!(reloaded.frame(&animation, 0), Some(Rect::new(10, 20, 100, 100)));
    }
}
