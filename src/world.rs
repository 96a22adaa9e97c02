//! Shared collaborators and fire-and-forget one-shots.
//!
//! A [`PetalSonicWorld`] is handed to every emitter it creates. One-shots played
//! through it never touch an emitter's own instance.

use crate::backend::{AudioBackend, InstanceHandle};
use crate::config::{CullPolicy, EmitterConfig};
use crate::description::{EventId, EventReference};
use crate::emitter::AudioEmitter;
use crate::error::{PetalSonicError, Result};
use crate::handle::log_failure;
use crate::listener::ListenerRegistry;
use crate::math::{Attributes3D, Vec3};
use std::sync::Arc;

/// Shared collaborators every emitter needs.
///
/// `PetalSonicWorld` bundles the audio backend, the listener registry and the
/// global culling policy. It is cheap to clone; hosts usually create one at
/// startup and hand it to each emitter.
///
/// # Threading
///
/// Emitters are driven from the host's main/update thread. The world performs
/// no locking of its own; backend calls are expected to be non-blocking.
#[derive(Clone)]
pub struct PetalSonicWorld {
    backend: Arc<dyn AudioBackend>,
    listeners: Arc<dyn ListenerRegistry>,
    cull_policy: Arc<dyn CullPolicy>,
}

impl PetalSonicWorld {
    pub fn new(
        backend: Arc<dyn AudioBackend>,
        listeners: Arc<dyn ListenerRegistry>,
        cull_policy: Arc<dyn CullPolicy>,
    ) -> Self {
        Self {
            backend,
            listeners,
            cull_policy,
        }
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    pub fn listeners(&self) -> &Arc<dyn ListenerRegistry> {
        &self.listeners
    }

    pub fn cull_policy(&self) -> &Arc<dyn CullPolicy> {
        &self.cull_policy
    }

    /// Creates an emitter bound to this world.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` fails validation.
    pub fn create_emitter(&self, config: EmitterConfig) -> Result<AudioEmitter> {
        AudioEmitter::new(self.clone(), config)
    }

    /// Maps a one-shot target to its event id.
    ///
    /// # Errors
    ///
    /// Returns [`PetalSonicError::EventNotFound`] for unknown paths and null references.
    pub fn resolve_target(&self, target: &EventTarget) -> Result<EventId> {
        match target {
            EventTarget::Path(path) => self.backend.event_id_from_path(path),
            EventTarget::Reference(reference) if reference.is_null() => {
                Err(PetalSonicError::EventNotFound(reference.to_string()))
            }
            EventTarget::Reference(reference) => Ok(reference.id),
        }
    }

    /// Plays a fire-and-forget instance at a world position.
    ///
    /// The instance is released right after it starts; the backend keeps it
    /// alive until it finishes on its own. Returns the (already released) handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be resolved, or if the instance
    /// cannot be created or started.
    pub fn try_play_one_shot(
        &self,
        target: &EventTarget,
        options: &OneShotOptions,
    ) -> Result<InstanceHandle> {
        let id = self.resolve_target(target)?;
        let instance = self.backend.create_instance(id)?;

        let started = self.start_one_shot(instance, options);
        let released = self.backend.release(instance);
        started?;
        released?;

        log::debug!("Fired one-shot {} for {}", instance, target);
        Ok(instance)
    }

    fn start_one_shot(&self, instance: InstanceHandle, options: &OneShotOptions) -> Result<()> {
        self.backend
            .set_3d_attributes(instance, Attributes3D::at_position(options.position))?;
        if let Some((name, value)) = &options.parameter {
            log_failure(
                "set_parameter_by_name",
                instance,
                self.backend
                    .set_parameter_by_name(instance, name, *value, false),
            );
        }
        self.backend.set_volume(instance, options.volume_scale)?;
        self.backend.start(instance)
    }
}

/// What a one-shot should play: an authored path or a resolved reference.
#[derive(Clone, Debug, PartialEq)]
pub enum EventTarget {
    Path(String),
    Reference(EventReference),
}

impl std::fmt::Display for EventTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventTarget::Path(path) => write!(f, "{}", path),
            EventTarget::Reference(reference) => write!(f, "{}", reference),
        }
    }
}

impl From<&str> for EventTarget {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for EventTarget {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl From<EventReference> for EventTarget {
    fn from(reference: EventReference) -> Self {
        Self::Reference(reference)
    }
}

impl From<&EventReference> for EventTarget {
    fn from(reference: &EventReference) -> Self {
        Self::Reference(reference.clone())
    }
}

/// Options for a fire-and-forget one-shot.
#[derive(Clone, Debug, PartialEq)]
pub struct OneShotOptions {
    /// Single parameter set by name before starting
    pub parameter: Option<(String, f32)>,
    pub volume_scale: f32,
    pub position: Vec3,
}

impl Default for OneShotOptions {
    fn default() -> Self {
        Self {
            parameter: None,
            volume_scale: 1.0,
            position: Vec3::ZERO,
        }
    }
}

impl OneShotOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parameter(mut self, name: impl Into<String>, value: f32) -> Self {
        self.parameter = Some((name.into(), value));
        self
    }

    pub fn volume_scale(mut self, volume_scale: f32) -> Self {
        self.volume_scale = volume_scale;
        self
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }
}
