use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::AnimationRole;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationSpec {
    pub id: String,
    #[serde(rename = "frameCount")]
    pub frame_count: u32,
    /// `None` loops forever and never completes.
    #[serde(rename = "loopCount")]
    pub loop_count: Option<u32>,
    #[serde(rename = "frameDurationMs")]
    pub frame_duration_ms: Option<u64>,
    pub role: AnimationRole,
    #[serde(rename = "smackAnimation")]
    pub smack_animation: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct AnimationToken(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnimatorEvent {
    FrameChanged {
        token: AnimationToken,
        animation_id: String,
        frame: usize,
    },
    Completed {
        token: AnimationToken,
        animation_id: String,
    },
}

#[derive(Clone, Debug)]
struct ActiveAnimation {
    token: AnimationToken,
    animation_id: String,
    frame: usize,
    loops_done: u32,
    accumulated_ms: u64,
}

#[derive(Clone, Copy, Debug)]
pub struct AnimatorTiming {
    pub base_frame_duration_ms: u64,
    pub min_frame_duration_ms: u64,
}

/// Clock-driven sprite player. Frame changes and completions are queued and
/// drained by the session, which routes them to the hitbox tracker and the
/// round controller.
#[derive(Clone, Debug)]
pub struct SpriteAnimator {
    catalog: BTreeMap<String, AnimationSpec>,
    timing: AnimatorTiming,
    speed: f64,
    active: Option<ActiveAnimation>,
    next_token: u64,
    events: Vec<AnimatorEvent>,
}

impl SpriteAnimator {
    pub fn new(catalog: Vec<AnimationSpec>, timing: AnimatorTiming) -> Self {
        Self {
            catalog: catalog
                .into_iter()
                .map(|spec| (spec.id.clone(), spec))
                .collect(),
            timing,
            speed: 1.0,
            active: None,
            next_token: 0,
            events: Vec::new(),
        }
    }

    pub fn spec(&self, animation_id: &str) -> Option<&AnimationSpec> {
        self.catalog.get(animation_id)
    }

    pub fn set_speed(&mut self, multiplier: f64) {
        if multiplier.is_finite() && multiplier > 0.0 {
            self.speed = multiplier;
        }
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn frame_duration_ms(&self, spec: &AnimationSpec) -> u64 {
        let base = spec
            .frame_duration_ms
            .unwrap_or(self.timing.base_frame_duration_ms) as f64;
        ((base / self.speed).round() as u64)
            .max(self.timing.min_frame_duration_ms)
            .max(1)
    }

    /// Time from `play` to completion at the current speed, if it completes.
    pub fn nominal_duration_ms(&self, animation_id: &str) -> Option<u64> {
        let spec = self.catalog.get(animation_id)?;
        let loops = spec.loop_count? as u64;
        Some(self.frame_duration_ms(spec) * spec.frame_count.max(1) as u64 * loops.max(1))
    }

    pub fn play(&mut self, animation_id: &str) -> Option<AnimationToken> {
        if !self.catalog.contains_key(animation_id) {
            log::warn!("animation {animation_id} is not in the catalog");
            return None;
        }
        self.next_token += 1;
        let token = AnimationToken(self.next_token);
        self.active = Some(ActiveAnimation {
            token,
            animation_id: animation_id.to_string(),
            frame: 0,
            loops_done: 0,
            accumulated_ms: 0,
        });
        self.events.push(AnimatorEvent::FrameChanged {
            token,
            animation_id: animation_id.to_string(),
            frame: 0,
        });
        Some(token)
    }

    /// Stops without firing completion.
    pub fn stop(&mut self) {
        self.active = None;
    }

    pub fn current(&self) -> Option<(AnimationToken, &str, usize)> {
        self.active
            .as_ref()
            .map(|active| (active.token, active.animation_id.as_str(), active.frame))
    }

    pub fn advance(&mut self, dt_ms: u64) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        let Some(spec) = self.catalog.get(&active.animation_id) else {
            return;
        };
        let frame_duration = self.frame_duration_ms(spec);
        let frame_count = spec.frame_count.max(1) as usize;
        let loop_limit = spec.loop_count;

        active.accumulated_ms += dt_ms;
        while active.accumulated_ms >= frame_duration {
            active.accumulated_ms -= frame_duration;
            active.frame += 1;
            if active.frame >= frame_count {
                active.frame = 0;
                active.loops_done += 1;
                if loop_limit.is_some_and(|limit| active.loops_done >= limit) {
                    self.events.push(AnimatorEvent::Completed {
                        token: active.token,
                        animation_id: active.animation_id,
                    });
                    return;
                }
            }
            self.events.push(AnimatorEvent::FrameChanged {
                token: active.token,
                animation_id: active.animation_id.clone(),
                frame: active.frame,
            });
        }
        self.active = Some(active);
    }

    pub fn take_events(&mut self) -> Vec<AnimatorEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn reset(&mut self) {
        self.active = None;
        self.events.clear();
        self.speed = 1.0;
    }
}
