//! Recording backend for tests.
//!
//! `MockBackend` keeps every instance it ever created, including released ones,
//! so tests can assert on starts, releases and parameter values after the fact.
//! Instance lifetimes follow the usual studio-backend rules: a released instance
//! stays valid until it stops, and a fading instance only stops once
//! [`MockBackend::finish_fadeouts`] is called.

use crate::backend::{AudioBackend, InstanceHandle, PositionSource};
use crate::description::{EventDescription, EventId, EventReference, ParameterId};
use crate::error::{PetalSonicError, Result};
use crate::math::Attributes3D;
use crate::playback::{InstanceProperty, PlayState, StopMode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Snapshot of one backend instance.
#[derive(Clone, Debug)]
pub struct MockInstance {
    pub event: EventId,
    pub state: PlayState,
    pub paused: bool,
    pub volume: f32,
    pub pitch: f32,
    pub parameters: HashMap<String, f32>,
    pub properties: HashMap<InstanceProperty, f32>,
    pub attributes: Option<Attributes3D>,
    pub attached: bool,
    pub released: bool,
    pub release_calls: u32,
    pub start_calls: u32,
    pub key_offs: u32,
    pub timeline_ms: u32,
    /// Still owned by the backend
    pub valid: bool,
}

impl MockInstance {
    fn new(event: EventId) -> Self {
        Self {
            event,
            state: PlayState::Stopped,
            paused: false,
            volume: 1.0,
            pitch: 1.0,
            parameters: HashMap::new(),
            properties: HashMap::new(),
            attributes: None,
            attached: false,
            released: false,
            release_calls: 0,
            start_calls: 0,
            key_offs: 0,
            timeline_ms: 0,
            valid: true,
        }
    }
}

#[derive(Default)]
struct MockState {
    events: HashMap<EventId, EventDescription>,
    paths: HashMap<String, EventId>,
    instances: HashMap<InstanceHandle, MockInstance>,
    creation_order: Vec<InstanceHandle>,
    attachments: HashMap<InstanceHandle, Arc<dyn PositionSource>>,
    sample_data: HashMap<EventId, i32>,
    next_handle: u64,
    invalid_calls: u32,
}

impl MockState {
    fn live(&mut self, instance: InstanceHandle) -> Result<&mut MockInstance> {
        match self.instances.get_mut(&instance) {
            Some(inst) if inst.valid => Ok(inst),
            _ => {
                self.invalid_calls += 1;
                Err(PetalSonicError::InvalidHandle(instance))
            }
        }
    }

    fn retire_if_done(&mut self, instance: InstanceHandle) {
        if let Some(inst) = self.instances.get_mut(&instance) {
            if inst.released && inst.state.is_stopped() {
                inst.valid = false;
                inst.attached = false;
                self.attachments.remove(&instance);
            }
        }
    }

    fn parameter_name(&self, instance: InstanceHandle, id: ParameterId) -> Option<String> {
        let event = self.instances.get(&instance)?.event;
        self.events
            .get(&event)?
            .parameter_by_id(id)
            .map(|p| p.name.clone())
    }
}

#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers an event under `path` and returns a reference to it.
    pub fn register_event(&self, path: &str, description: EventDescription) -> EventReference {
        let id = description.id;
        let mut state = self.state();
        state.paths.insert(path.to_string(), id);
        state.events.insert(id, description);
        EventReference::with_path(id, path)
    }

    pub fn instance(&self, instance: InstanceHandle) -> Option<MockInstance> {
        self.state().instances.get(&instance).cloned()
    }

    pub fn parameter(&self, instance: InstanceHandle, name: &str) -> Option<f32> {
        self.state()
            .instances
            .get(&instance)
            .and_then(|inst| inst.parameters.get(name).copied())
    }

    /// Every instance ever created, oldest first.
    pub fn created_instances(&self) -> Vec<InstanceHandle> {
        self.state().creation_order.clone()
    }

    pub fn valid_instances(&self) -> Vec<InstanceHandle> {
        let state = self.state();
        state
            .creation_order
            .iter()
            .copied()
            .filter(|h| state.instances.get(h).is_some_and(|inst| inst.valid))
            .collect()
    }

    pub fn total_starts(&self) -> u32 {
        self.state().instances.values().map(|i| i.start_calls).sum()
    }

    /// Number of release calls beyond the first, across all instances.
    pub fn double_releases(&self) -> u32 {
        self.state()
            .instances
            .values()
            .map(|i| i.release_calls.saturating_sub(1))
            .sum()
    }

    /// Number of calls made against handles the backend no longer owns.
    pub fn invalid_calls(&self) -> u32 {
        self.state().invalid_calls
    }

    pub fn sample_data_loads(&self, id: EventId) -> i32 {
        self.state().sample_data.get(&id).copied().unwrap_or(0)
    }

    /// Ends every fadeout; released instances become invalid.
    pub fn finish_fadeouts(&self) {
        let mut state = self.state();
        let fading: Vec<InstanceHandle> = state
            .instances
            .iter()
            .filter(|(_, inst)| inst.valid && inst.state == PlayState::Stopping)
            .map(|(h, _)| *h)
            .collect();
        for handle in fading {
            if let Some(inst) = state.instances.get_mut(&handle) {
                inst.state = PlayState::Stopped;
            }
            state.retire_if_done(handle);
        }
    }

    /// Simulates the instance reaching the end of its timeline.
    pub fn complete(&self, instance: InstanceHandle) {
        let mut state = self.state();
        if let Some(inst) = state.instances.get_mut(&instance) {
            inst.state = PlayState::Stopped;
        }
        state.retire_if_done(instance);
    }

    pub fn set_timeline_position(&self, instance: InstanceHandle, position_ms: u32) {
        if let Some(inst) = self.state().instances.get_mut(&instance) {
            inst.timeline_ms = position_ms;
        }
    }

    /// Copies attached poses into instance attributes, as a backend update would.
    pub fn sync_attachments(&self) {
        let mut state = self.state();
        let poses: Vec<(InstanceHandle, Attributes3D)> = state
            .attachments
            .iter()
            .map(|(h, source)| (*h, Attributes3D::from_pose(&source.pose())))
            .collect();
        for (handle, attributes) in poses {
            if let Some(inst) = state.instances.get_mut(&handle) {
                inst.attributes = Some(attributes);
            }
        }
    }
}

impl AudioBackend for MockBackend {
    fn event_id_from_path(&self, path: &str) -> Result<EventId> {
        self.state()
            .paths
            .get(path)
            .copied()
            .ok_or_else(|| PetalSonicError::EventNotFound(path.to_string()))
    }

    fn resolve_description(&self, id: EventId) -> Result<EventDescription> {
        self.state()
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| PetalSonicError::EventNotFound(id.to_string()))
    }

    fn create_instance(&self, id: EventId) -> Result<InstanceHandle> {
        let mut state = self.state();
        if !state.events.contains_key(&id) {
            return Err(PetalSonicError::EventNotFound(id.to_string()));
        }
        state.next_handle += 1;
        let handle = InstanceHandle::from_raw(state.next_handle);
        state.instances.insert(handle, MockInstance::new(id));
        state.creation_order.push(handle);
        Ok(handle)
    }

    fn is_valid(&self, instance: InstanceHandle) -> bool {
        self.state()
            .instances
            .get(&instance)
            .is_some_and(|inst| inst.valid)
    }

    fn start(&self, instance: InstanceHandle) -> Result<()> {
        let mut state = self.state();
        let inst = state.live(instance)?;
        inst.state = PlayState::Playing;
        inst.start_calls += 1;
        inst.timeline_ms = 0;
        Ok(())
    }

    fn stop(&self, instance: InstanceHandle, mode: StopMode) -> Result<()> {
        let mut state = self.state();
        let inst = state.live(instance)?;
        inst.state = match (mode, inst.state) {
            (_, PlayState::Stopped) => PlayState::Stopped,
            (StopMode::AllowFadeout, _) => PlayState::Stopping,
            (StopMode::Immediate, _) => PlayState::Stopped,
        };
        state.retire_if_done(instance);
        Ok(())
    }

    fn release(&self, instance: InstanceHandle) -> Result<()> {
        let mut state = self.state();
        let inst = state.live(instance)?;
        inst.release_calls += 1;
        inst.released = true;
        state.retire_if_done(instance);
        Ok(())
    }

    fn set_paused(&self, instance: InstanceHandle, paused: bool) -> Result<()> {
        self.state().live(instance)?.paused = paused;
        Ok(())
    }

    fn set_volume(&self, instance: InstanceHandle, volume: f32) -> Result<()> {
        self.state().live(instance)?.volume = volume;
        Ok(())
    }

    fn set_pitch(&self, instance: InstanceHandle, pitch: f32) -> Result<()> {
        self.state().live(instance)?.pitch = pitch;
        Ok(())
    }

    fn set_parameter_by_name(
        &self,
        instance: InstanceHandle,
        name: &str,
        value: f32,
        _ignore_seek_speed: bool,
    ) -> Result<()> {
        let mut state = self.state();
        let event = state.live(instance)?.event;
        let known = state
            .events
            .get(&event)
            .is_some_and(|desc| desc.parameter_by_name(name).is_some());
        if !known {
            return Err(PetalSonicError::ParameterNotFound(name.to_string()));
        }
        state.live(instance)?.parameters.insert(name.to_string(), value);
        Ok(())
    }

    fn set_parameter_by_id(
        &self,
        instance: InstanceHandle,
        id: ParameterId,
        value: f32,
        _ignore_seek_speed: bool,
    ) -> Result<()> {
        let mut state = self.state();
        state.live(instance)?;
        let name = state
            .parameter_name(instance, id)
            .ok_or_else(|| PetalSonicError::ParameterNotFound(id.to_string()))?;
        state.live(instance)?.parameters.insert(name, value);
        Ok(())
    }

    fn set_property(
        &self,
        instance: InstanceHandle,
        property: InstanceProperty,
        value: f32,
    ) -> Result<()> {
        self.state().live(instance)?.properties.insert(property, value);
        Ok(())
    }

    fn set_3d_attributes(&self, instance: InstanceHandle, attributes: Attributes3D) -> Result<()> {
        self.state().live(instance)?.attributes = Some(attributes);
        Ok(())
    }

    fn playback_state(&self, instance: InstanceHandle) -> Result<PlayState> {
        Ok(self.state().live(instance)?.state)
    }

    fn timeline_position(&self, instance: InstanceHandle) -> Result<u32> {
        Ok(self.state().live(instance)?.timeline_ms)
    }

    fn key_off(&self, instance: InstanceHandle) -> Result<()> {
        self.state().live(instance)?.key_offs += 1;
        Ok(())
    }

    fn attach_instance(&self, instance: InstanceHandle, source: Arc<dyn PositionSource>) {
        let mut state = self.state();
        if let Ok(inst) = state.live(instance) {
            inst.attached = true;
            state.attachments.insert(instance, source);
        }
    }

    fn detach_instance(&self, instance: InstanceHandle) {
        let mut state = self.state();
        if let Some(inst) = state.instances.get_mut(&instance) {
            inst.attached = false;
        }
        state.attachments.remove(&instance);
    }

    fn load_sample_data(&self, id: EventId) -> Result<()> {
        let mut state = self.state();
        if !state.events.contains_key(&id) {
            return Err(PetalSonicError::EventNotFound(id.to_string()));
        }
        *state.sample_data.entry(id).or_insert(0) += 1;
        Ok(())
    }

    fn unload_sample_data(&self, id: EventId) -> Result<()> {
        let mut state = self.state();
        match state.sample_data.get_mut(&id) {
            Some(loads) if *loads > 0 => {
                *loads -= 1;
                Ok(())
            }
            _ => Err(PetalSonicError::Backend(format!(
                "Sample data for {} is not loaded",
                id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn backend_with_event() -> (MockBackend, EventReference) {
        let backend = MockBackend::new();
        let desc = EventDescription::new(EventId::new(Uuid::new_v4()));
        let reference = backend.register_event("event:/loop", desc);
        (backend, reference)
    }

    #[test]
    fn released_instance_lives_until_fadeout_ends() {
        let (backend, reference) = backend_with_event();
        let instance = backend.create_instance(reference.id).unwrap();
        backend.start(instance).unwrap();

        backend.stop(instance, StopMode::AllowFadeout).unwrap();
        backend.release(instance).unwrap();
        assert!(backend.is_valid(instance));
        assert_eq!(backend.playback_state(instance), Ok(PlayState::Stopping));

        backend.finish_fadeouts();
        assert!(!backend.is_valid(instance));
        assert_eq!(
            backend.release(instance),
            Err(PetalSonicError::InvalidHandle(instance))
        );
        assert_eq!(backend.invalid_calls(), 1);
    }

    #[test]
    fn immediate_stop_then_release_invalidates() {
        let (backend, reference) = backend_with_event();
        let instance = backend.create_instance(reference.id).unwrap();
        backend.start(instance).unwrap();
        backend.stop(instance, StopMode::Immediate).unwrap();
        backend.release(instance).unwrap();

        assert!(!backend.is_valid(instance));
        assert_eq!(backend.double_releases(), 0);
        assert!(backend.valid_instances().is_empty());
    }

    #[test]
    fn unloading_unloaded_sample_data_fails() {
        let (backend, reference) = backend_with_event();
        backend.load_sample_data(reference.id).unwrap();
        backend.unload_sample_data(reference.id).unwrap();

        assert!(matches!(
            backend.unload_sample_data(reference.id),
            Err(PetalSonicError::Backend(_))
        ));
        assert_eq!(backend.sample_data_loads(reference.id), 0);
    }

    #[test]
    fn unknown_path_is_not_found() {
        let (backend, _) = backend_with_event();
        assert!(matches!(
            backend.event_id_from_path("event:/missing"),
            Err(PetalSonicError::EventNotFound(_))
        ));
    }
}
