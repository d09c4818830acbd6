use crate::calibration::{CalibrationError, CalibrationSet};
use crate::scaler::{recenter, scale};
use crate::types::{AnimationRole, GameEvent, Rect, RuntimeHitbox};

use super::context::SessionContext;

/// Keeps the reactive hitbox glued to the antagonist's hand for whatever
/// animation frame is on screen.
#[derive(Clone, Debug)]
pub struct HitboxGeometryTracker {
    calibration: CalibrationSet,
    current_frame: Option<(String, usize)>,
    placed: Option<RuntimeHitbox>,
}

impl HitboxGeometryTracker {
    pub fn new(calibration: CalibrationSet) -> Self {
        Self {
            calibration,
            current_frame: None,
            placed: None,
        }
    }

    pub fn calibration(&self) -> &CalibrationSet {
        &self.calibration
    }

    pub fn is_interactive(&self) -> bool {
        self.placed.is_some()
    }

    pub fn current(&self) -> Option<RuntimeHitbox> {
        self.placed
    }

    pub fn hit_test(&self, x: f64, y: f64) -> bool {
        self.placed.is_some_and(|hitbox| hitbox.interactive.contains(x, y))
    }

    pub fn update(
        &mut self,
        ctx: &mut SessionContext,
        animation_id: &str,
        frame_index: usize,
        predict_next: bool,
    ) -> Option<RuntimeHitbox> {
        self.current_frame = Some((animation_id.to_string(), frame_index));

        let role = ctx.animator.spec(animation_id).map(|spec| spec.role);
        if role != Some(AnimationRole::Grab) {
            self.hide(ctx);
            return None;
        }

        let frame_count = self.calibration.frame_count(animation_id);
        let lookup = if predict_next && frame_index + 1 < frame_count {
            frame_index + 1
        } else {
            frame_index
        };
        let Some(base) = self.calibration.frame(animation_id, lookup) else {
            log::warn!("no calibration for {animation_id} frame {lookup}, hiding hitbox");
            self.hide(ctx);
            return None;
        };

        let hitbox = place(ctx, base);
        self.placed = Some(hitbox);
        ctx.emit(GameEvent::HitboxGeometryApplied { hitbox });
        Some(hitbox)
    }

    /// Re-runs placement for the frame already on screen, e.g. after a resize.
    pub fn refresh(&mut self, ctx: &mut SessionContext) -> Option<RuntimeHitbox> {
        let (animation_id, frame_index) = self.current_frame.clone()?;
        let predict = ctx.config.predict_next_frame;
        self.update(ctx, &animation_id, frame_index, predict)
    }

    pub fn hide(&mut self, ctx: &mut SessionContext) {
        if self.placed.take().is_some() {
            ctx.emit(GameEvent::HitboxHidden);
        }
    }

    pub fn reset(&mut self) {
        self.current_frame = None;
        self.placed = None;
    }

    pub fn set_frame_geometry(
        &mut self,
        animation_id: &str,
        frame_index: usize,
        rect: Rect,
    ) -> Result<(), CalibrationError> {
        self.calibration.set_frame_geometry(animation_id, frame_index, rect)
    }
}

fn place(ctx: &SessionContext, base: Rect) -> RuntimeHitbox {
    let config = &ctx.config;
    let current_scale = ctx.viewport.current_scale();
    let inflation = if ctx.touch_device {
        config.touch_inflation
    } else {
        1.0
    };

    let plain = scale(base, current_scale, Some(config.reference_scale), 1.0);
    let interactive = recenter(
        plain,
        scale(base, current_scale, Some(config.reference_scale), inflation),
    );
    let visual = recenter(
        interactive,
        scale(interactive, 1.0, None, config.visual_scale_ratio),
    );
    RuntimeHitbox {
        interactive,
        visual,
    }
}
