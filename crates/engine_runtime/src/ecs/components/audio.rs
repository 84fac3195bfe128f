//! Sound emitter component

use crate::assets::{AssetId, AssetReference};
use crate::audio::SoundClip;
use crate::ecs::Component;

/// Plays a sound clip from the entity
///
/// The clip is referenced by identity; the audio subsystem resolves it when
/// playback actually starts.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundComponent {
    /// Clip to play
    pub sound: AssetReference<SoundClip>,
    /// Whether the emitter is currently playing
    pub is_playing: bool,
    /// Volume multiplier (0.0 to 1.0)
    pub volume: f32,
    /// Restart the clip when it ends
    pub looping: bool,
}

impl SoundComponent {
    /// Create a stopped emitter at full volume
    pub fn new(sound: impl Into<AssetId>) -> Self {
        Self {
            sound: AssetReference::new(sound),
            is_playing: false,
            volume: 1.0,
            looping: false,
        }
    }

    /// Start in the playing state
    pub fn playing(mut self) -> Self {
        self.is_playing = true;
        self
    }

    /// Set volume multiplier
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    /// Loop the clip
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }
}

impl Component for SoundComponent {}

crate::impl_serializable_component!(SoundComponent, "audio.sound", {
    sound,
    is_playing,
    volume,
    looping,
});
