use crate::types::SoundKind;

/// Fire-and-forget audio. Implementations swallow their own failures.
pub trait AudioSink {
    fn play_sound(&mut self, kind: SoundKind, name: &str);
}

/// Draws the antagonist sprite at a given frame.
pub trait SpriteRenderer {
    fn render(&mut self, animation_id: &str, frame: usize);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {
    fn play_sound(&mut self, _kind: SoundKind, _name: &str) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullRenderer;

impl SpriteRenderer for NullRenderer {
    fn render(&mut self, _animation_id: &str, _frame: usize) {}
}
