//! Ownership of the single backend instance behind an emitter.
//!
//! [`EventHandle`] pairs the event reference with its cached
//! [`EventDescription`] and tracks at most one backend instance. The slot is an
//! explicit state machine:
//!
//! - `Absent`: nothing to release
//! - `Live`: created by us, not yet released
//! - `FadingOut`: stopped with fadeout and already released; the backend frees it
//!   when the fade ends, so it must never be released again
//!
//! Every accessor re-checks [`AudioBackend::is_valid`] and an invalid handle is
//! treated as absent.

use crate::backend::{AudioBackend, InstanceHandle, PositionSource};
use crate::description::{EventDescription, EventReference};
use crate::error::{PetalSonicError, Result};
use crate::math::Attributes3D;
use crate::param::ParamRef;
use crate::playback::{PlayState, StopMode};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceSlot {
    Absent,
    Live(InstanceHandle),
    FadingOut(InstanceHandle),
}

/// Outcome of [`EventHandle::materialize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialized {
    Created(InstanceHandle),
    Existing(InstanceHandle),
}

impl Materialized {
    pub fn instance(&self) -> InstanceHandle {
        match self {
            Self::Created(instance) | Self::Existing(instance) => *instance,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

pub(crate) fn log_failure(op: &str, instance: InstanceHandle, result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::warn!("{} failed on {}: {}", op, instance, e);
            false
        }
    }
}

pub struct EventHandle {
    backend: Arc<dyn AudioBackend>,
    reference: Option<EventReference>,
    description: Option<EventDescription>,
    slot: InstanceSlot,
}

impl EventHandle {
    pub fn new(backend: Arc<dyn AudioBackend>, reference: Option<EventReference>) -> Self {
        Self {
            backend,
            reference,
            description: None,
            slot: InstanceSlot::Absent,
        }
    }

    pub fn backend(&self) -> &Arc<dyn AudioBackend> {
        &self.backend
    }

    pub fn reference(&self) -> Option<&EventReference> {
        self.reference.as_ref()
    }

    pub fn has_reference(&self) -> bool {
        self.reference.as_ref().is_some_and(|r| !r.is_null())
    }

    /// Swaps the event. Any instance is hard-released and the cached description dropped.
    pub fn set_reference(&mut self, reference: Option<EventReference>) -> Option<InstanceHandle> {
        let released = self.hard_release();
        self.description = None;
        self.reference = reference;
        released
    }

    pub fn description(&self) -> Option<&EventDescription> {
        self.description.as_ref()
    }

    /// Resolves the description for the current reference and re-resolves every
    /// declared parameter id. Returns the names that did not resolve.
    pub fn lookup(&mut self, params: &mut [ParamRef]) -> Result<Vec<String>> {
        let reference = match &self.reference {
            Some(reference) if !reference.is_null() => reference,
            _ => {
                self.description = None;
                return Err(PetalSonicError::UnresolvedReference);
            }
        };

        let description = match self.backend.resolve_description(reference.id) {
            Ok(description) => description,
            Err(e) => {
                self.description = None;
                return Err(e);
            }
        };

        log::debug!(
            "Resolved event {} (3d: {}, oneshot: {}, snapshot: {}, max distance: {})",
            reference,
            description.is_3d,
            description.is_oneshot,
            description.is_snapshot,
            description.max_distance
        );

        let unresolved = params
            .iter_mut()
            .filter_map(|param| (!param.resolve(&description)).then(|| param.name.clone()))
            .collect();
        self.description = Some(description);
        Ok(unresolved)
    }

    /// Like [`lookup`](Self::lookup), but only when no description is cached.
    pub fn ensure_description(&mut self, params: &mut [ParamRef]) -> Result<Vec<String>> {
        if self.description.is_some() {
            return Ok(Vec::new());
        }
        self.lookup(params)
    }

    fn purge_invalid(&mut self) {
        let instance = match self.slot {
            InstanceSlot::Live(instance) | InstanceSlot::FadingOut(instance) => instance,
            InstanceSlot::Absent => return,
        };
        if !self.backend.is_valid(instance) {
            log::debug!("{} is no longer valid, clearing handle", instance);
            self.slot = InstanceSlot::Absent;
        }
    }

    /// The instance we own and have not released yet.
    pub fn live_instance(&self) -> Option<InstanceHandle> {
        match self.slot {
            InstanceSlot::Live(instance) if self.backend.is_valid(instance) => Some(instance),
            _ => None,
        }
    }

    /// Live or fading instance still known to the backend.
    pub fn tracked_instance(&self) -> Option<InstanceHandle> {
        match self.slot {
            InstanceSlot::Live(instance) | InstanceSlot::FadingOut(instance)
                if self.backend.is_valid(instance) =>
            {
                Some(instance)
            }
            _ => None,
        }
    }

    pub fn is_fading_out(&self) -> bool {
        matches!(self.slot, InstanceSlot::FadingOut(instance) if self.backend.is_valid(instance))
    }

    pub fn playback_state(&self) -> Option<PlayState> {
        let instance = self.live_instance()?;
        self.backend.playback_state(instance).ok()
    }

    /// A live instance whose state is anything but stopped. Paused counts as playing.
    pub fn is_playing(&self) -> bool {
        self.playback_state().is_some_and(|state| !state.is_stopped())
    }

    /// Runs `op` against the live instance, logging backend failures.
    pub fn with_live<F>(&self, name: &str, op: F) -> bool
    where
        F: FnOnce(&dyn AudioBackend, InstanceHandle) -> Result<()>,
    {
        match self.live_instance() {
            Some(instance) => log_failure(name, instance, op(self.backend.as_ref(), instance)),
            None => false,
        }
    }

    /// Makes sure a live instance exists, creating one if needed.
    ///
    /// 3D events get their attributes set from `transform` and stay attached to it.
    pub fn materialize(
        &mut self,
        params: &mut [ParamRef],
        transform: Arc<dyn PositionSource>,
    ) -> Result<Materialized> {
        self.purge_invalid();
        match self.slot {
            InstanceSlot::Live(instance) => return Ok(Materialized::Existing(instance)),
            InstanceSlot::FadingOut(instance) => {
                // Already released; the backend finishes the fade on its own.
                log::debug!("Leaving {} to finish its fadeout", instance);
                self.slot = InstanceSlot::Absent;
            }
            InstanceSlot::Absent => {}
        }

        self.ensure_description(params)?;
        let description = self
            .description
            .as_ref()
            .ok_or(PetalSonicError::UnresolvedReference)?;
        for param in params.iter_mut() {
            param.resolve(description);
        }

        let instance = self.backend.create_instance(description.id)?;
        log::debug!("Created {} for event {}", instance, description.id);

        if description.is_3d {
            let attributes = Attributes3D::from_pose(&transform.pose());
            log_failure(
                "set_3d_attributes",
                instance,
                self.backend.set_3d_attributes(instance, attributes),
            );
            self.backend.attach_instance(instance, transform);
        }

        self.slot = InstanceSlot::Live(instance);
        Ok(Materialized::Created(instance))
    }

    /// Stops and releases the live instance.
    ///
    /// With fadeout the handle is kept as fading so it is never released twice;
    /// without it the handle is cleared and a new instance can be created at once.
    /// An immediate teardown also cuts an instance that is still fading out.
    pub fn teardown(&mut self, allow_fadeout: bool) -> Option<InstanceHandle> {
        self.purge_invalid();
        let instance = match self.slot {
            InstanceSlot::Live(instance) => instance,
            InstanceSlot::FadingOut(instance) if !allow_fadeout => {
                // Already released when the fade began.
                log_failure("stop", instance, self.backend.stop(instance, StopMode::Immediate));
                self.slot = InstanceSlot::Absent;
                log::debug!("Cut fadeout of {}", instance);
                return Some(instance);
            }
            _ => return None,
        };

        log_failure(
            "stop",
            instance,
            self.backend.stop(instance, StopMode::from_fadeout(allow_fadeout)),
        );
        log_failure("release", instance, self.backend.release(instance));

        self.slot = if allow_fadeout {
            InstanceSlot::FadingOut(instance)
        } else {
            InstanceSlot::Absent
        };
        log::debug!("Tore down {} (fadeout: {})", instance, allow_fadeout);
        Some(instance)
    }

    /// Immediate stop, release and clear, whatever state the slot is in.
    pub fn hard_release(&mut self) -> Option<InstanceHandle> {
        self.purge_invalid();
        let released = match self.slot {
            InstanceSlot::Live(instance) => {
                log_failure("stop", instance, self.backend.stop(instance, StopMode::Immediate));
                log_failure("release", instance, self.backend.release(instance));
                Some(instance)
            }
            InstanceSlot::FadingOut(instance) => {
                log_failure("stop", instance, self.backend.stop(instance, StopMode::Immediate));
                Some(instance)
            }
            InstanceSlot::Absent => None,
        };
        self.slot = InstanceSlot::Absent;
        if let Some(instance) = released {
            log::debug!("Hard-released {}", instance);
        }
        released
    }

    /// Releases the live instance without stopping it and clears the handle.
    ///
    /// Used for one-shots: the previous instance plays out inside the backend
    /// while the handle is free for the next one.
    pub fn release_for_replacement(&mut self) -> Option<InstanceHandle> {
        self.purge_invalid();
        let InstanceSlot::Live(instance) = self.slot else {
            return None;
        };
        log_failure("release", instance, self.backend.release(instance));
        self.slot = InstanceSlot::Absent;
        log::debug!("Released one-shot {} for replacement", instance);
        Some(instance)
    }

    /// Detaches the tracked instance from its transform and forgets it.
    ///
    /// When `release` is set a live instance is also released.
    pub fn detach(&mut self, release: bool) -> Option<InstanceHandle> {
        let instance = self.tracked_instance();
        if let Some(instance) = instance {
            self.backend.detach_instance(instance);
            if release && matches!(self.slot, InstanceSlot::Live(_)) {
                log_failure("release", instance, self.backend.release(instance));
            }
        }
        self.slot = InstanceSlot::Absent;
        instance
    }
}
