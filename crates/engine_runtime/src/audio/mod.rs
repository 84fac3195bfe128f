//! Audio subsystem
//!
//! Registers the [`SoundClip`] loader and keeps an [`AudioScene`] per world.
//! Clips are resolved when a scene syncs with its world, never while a world
//! is being loaded.

pub mod asset;

pub use asset::{AudioFormat, SoundClip};

use crate::assets::{AssetError, AssetServer, TypedLoader};
use crate::ecs::components::SoundComponent;
use crate::ecs::{Entity, ModuleState, World, WorldId};
use crate::events::{Subscription, WorldWasCreated, WorldWasDestroyed};
use crate::subsystem::{PerWorldState, Subsystem, SubsystemContext, SubsystemError};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::Arc;

/// Module-state key of the audio blob
pub const AUDIO_STATE_KEY: &str = "audio";

/// Extensions handled by the clip loader
pub const SOUND_EXTENSIONS: &[&str] = &["wav", "ogg", "flac", "mp3"];

/// A clip ready to play on an entity
#[derive(Debug, Clone)]
pub struct Voice {
    /// Emitting entity
    pub entity: Entity,
    /// Loaded clip
    pub clip: Arc<SoundClip>,
    /// Effective volume after the scene's master volume
    pub volume: f32,
    /// Whether the voice loops
    pub looping: bool,
}

/// Audio state parallel to one ECS world
#[derive(Debug, Clone)]
pub struct AudioScene {
    world: WorldId,
    master_volume: f32,
    voices: Vec<Voice>,
}

impl AudioScene {
    /// Create an empty scene
    pub fn new(world: WorldId, master_volume: f32) -> Self {
        Self {
            world,
            master_volume: master_volume.clamp(0.0, 1.0),
            voices: Vec::new(),
        }
    }

    /// World this scene belongs to
    pub fn world(&self) -> WorldId {
        self.world
    }

    /// Master volume (0.0 to 1.0)
    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Set the master volume, clamped to 0.0..=1.0
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    /// Voices from the last sync
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    /// Rebuild voices from the playing sound components of `ecs`
    ///
    /// Clip references are resolved through `assets`. Emitters whose clip
    /// cannot be resolved are left out and returned with their error.
    pub fn sync(&mut self, ecs: &World, assets: &AssetServer) -> Vec<(Entity, AssetError)> {
        let mut failures = Vec::new();
        self.voices.clear();

        for (entity, sound) in ecs.query::<SoundComponent>() {
            if !sound.is_playing {
                continue;
            }
            match sound.sound.resolve(assets) {
                Ok(clip) => self.voices.push(Voice {
                    entity,
                    clip,
                    volume: sound.volume * self.master_volume,
                    looping: sound.looping,
                }),
                Err(err) => {
                    log::warn!("Sound on {} cannot play {}: {}", entity, sound.sound.id(), err);
                    failures.push((entity, err));
                }
            }
        }
        failures
    }

    fn decode_master_volume(bytes: &[u8]) -> Option<f32> {
        let raw: [u8; 4] = bytes.try_into().ok()?;
        let volume = f32::from_le_bytes(raw);
        volume.is_finite().then_some(volume)
    }
}

/// Loads sound clips and tracks per-world audio scenes
#[derive(Debug, Default)]
pub struct AudioSubsystem {
    scenes: PerWorldState<AudioScene>,
    subscriptions: Vec<Subscription>,
}

impl AudioSubsystem {
    /// Create the subsystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Scene of `world`
    pub fn scene(&self, world: WorldId) -> Option<Arc<Mutex<AudioScene>>> {
        self.scenes.get(world)
    }

    fn create_scene(scenes: &PerWorldState<AudioScene>, world: WorldId, state: &ModuleState) {
        let master_volume = state
            .get(AUDIO_STATE_KEY)
            .and_then(AudioScene::decode_master_volume)
            .unwrap_or(1.0);
        scenes.insert(world, AudioScene::new(world, master_volume));
    }
}

impl Subsystem for AudioSubsystem {
    fn name(&self) -> &str {
        AUDIO_STATE_KEY
    }

    fn initialize(&mut self, context: &SubsystemContext) -> Result<(), SubsystemError> {
        context
            .assets
            .register_loader(TypedLoader::<SoundClip>::new(SOUND_EXTENSIONS));

        for (world, state) in &context.live_worlds {
            Self::create_scene(&self.scenes, *world, state);
        }

        let scenes = self.scenes.clone();
        self.subscriptions.push(context.events.subscribe(move |event: &WorldWasCreated| {
            Self::create_scene(&scenes, event.world, &event.module_state);
            Ok(())
        }));
        let scenes = self.scenes.clone();
        self.subscriptions.push(context.events.subscribe(move |event: &WorldWasDestroyed| {
            scenes.remove(event.world);
            Ok(())
        }));
        Ok(())
    }

    fn shutdown(&mut self) {
        self.subscriptions.clear();
        self.scenes.clear();
    }

    fn export_world_state(&self, world: WorldId) -> Option<Vec<u8>> {
        let scene = self.scenes.get(world)?;
        let volume = scene.lock().master_volume;
        Some(volume.to_le_bytes().to_vec())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
