//! The audio backend contract consumed by emitters.
//!
//! The backend owns the real mixing graph. Emitters only ever talk to it through
//! opaque [`InstanceHandle`]s and check [`AudioBackend::is_valid`] before every
//! call that touches an instance.

use crate::description::{EventDescription, EventId, ParameterId};
use crate::error::Result;
use crate::math::{Attributes3D, Pose};
use crate::playback::{InstanceProperty, PlayState, StopMode};
use std::sync::Arc;

/// Lightweight, opaque handle to a backend playback instance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceHandle(u64);

impl InstanceHandle {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InstanceHandle({})", self.0)
    }
}

/// Something the backend can read a world pose from while an instance is attached.
pub trait PositionSource: Send + Sync {
    fn pose(&self) -> Pose;
}

/// Operations the emitter needs from the audio backend.
///
/// All instance calls take the handle by value. Implementations report a stale
/// handle as [`PetalSonicError::InvalidHandle`](crate::PetalSonicError::InvalidHandle).
pub trait AudioBackend: Send + Sync {
    /// Maps an authored path to its event id.
    fn event_id_from_path(&self, path: &str) -> Result<EventId>;

    fn resolve_description(&self, id: EventId) -> Result<EventDescription>;

    fn create_instance(&self, id: EventId) -> Result<InstanceHandle>;

    fn is_valid(&self, instance: InstanceHandle) -> bool;

    fn start(&self, instance: InstanceHandle) -> Result<()>;

    fn stop(&self, instance: InstanceHandle, mode: StopMode) -> Result<()>;

    /// Drops the caller's reference. The backend frees the instance once it stops.
    fn release(&self, instance: InstanceHandle) -> Result<()>;

    fn set_paused(&self, instance: InstanceHandle, paused: bool) -> Result<()>;

    fn set_volume(&self, instance: InstanceHandle, volume: f32) -> Result<()>;

    fn set_pitch(&self, instance: InstanceHandle, pitch: f32) -> Result<()>;

    fn set_parameter_by_name(
        &self,
        instance: InstanceHandle,
        name: &str,
        value: f32,
        ignore_seek_speed: bool,
    ) -> Result<()>;

    fn set_parameter_by_id(
        &self,
        instance: InstanceHandle,
        id: ParameterId,
        value: f32,
        ignore_seek_speed: bool,
    ) -> Result<()>;

    fn set_property(
        &self,
        instance: InstanceHandle,
        property: InstanceProperty,
        value: f32,
    ) -> Result<()>;

    fn set_3d_attributes(&self, instance: InstanceHandle, attributes: Attributes3D) -> Result<()>;

    fn playback_state(&self, instance: InstanceHandle) -> Result<PlayState>;

    /// Current timeline position in milliseconds.
    fn timeline_position(&self, instance: InstanceHandle) -> Result<u32>;

    fn key_off(&self, instance: InstanceHandle) -> Result<()>;

    /// Keeps the instance's 3D attributes in sync with `source` until detached.
    fn attach_instance(&self, instance: InstanceHandle, source: Arc<dyn PositionSource>);

    fn detach_instance(&self, instance: InstanceHandle);

    fn load_sample_data(&self, id: EventId) -> Result<()>;

    fn unload_sample_data(&self, id: EventId) -> Result<()>;
}
