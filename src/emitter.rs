//! The public-facing sound emitter.
//!
//! An [`AudioEmitter`] owns one [`EventHandle`] and one [`ParameterCache`] and
//! decides, on every call and every host tick, whether its event should have a
//! live backend instance.
//!
//! # Lifecycle
//!
//! 1. Create through [`PetalSonicWorld::create_emitter`](crate::PetalSonicWorld::create_emitter)
//! 2. Call [`start`](AudioEmitter::start) once the host object is ready (preload, play-on-awake)
//! 3. Drive with [`play`](AudioEmitter::play), [`stop`](AudioEmitter::stop),
//!    [`set_parameter`](AudioEmitter::set_parameter), [`pause`](AudioEmitter::pause)
//! 4. Call [`evaluate`](AudioEmitter::evaluate) once per host tick so distance culling
//!    follows listener movement
//! 5. Drop the emitter; call [`on_application_quit`](AudioEmitter::on_application_quit)
//!    first when the whole backend is shutting down

use crate::activation::{ActivationController, Transition};
use crate::backend::{AudioBackend, InstanceHandle, PositionSource};
use crate::config::{Attenuation, EmitterConfig};
use crate::description::{EventId, EventReference};
use crate::error::{PetalSonicError, Result};
use crate::events::PetalSonicEvent;
use crate::handle::{EventHandle, log_failure};
use crate::math::Pose;
use crate::param::{ParamRef, ParameterCache, ParameterKey};
use crate::playback::InstanceProperty;
use crate::world::{EventTarget, OneShotOptions, PetalSonicWorld};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::{Arc, Mutex, PoisonError};

/// World pose of an emitter, shared with the backend while an instance is attached.
#[derive(Debug, Default)]
pub struct EmitterTransform {
    pose: Mutex<Pose>,
}

impl EmitterTransform {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose: Mutex::new(pose),
        }
    }

    pub fn set_pose(&self, pose: Pose) {
        *self.pose.lock().unwrap_or_else(PoisonError::into_inner) = pose;
    }
}

impl PositionSource for EmitterTransform {
    fn pose(&self) -> Pose {
        *self.pose.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// User mute and code pause, combined with OR.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PauseLatch {
    pub mute: bool,
    pub code_pause: bool,
}

impl PauseLatch {
    pub fn effective(&self) -> bool {
        self.mute || self.code_pause
    }
}

pub struct AudioEmitter {
    world: PetalSonicWorld,
    activation: ActivationController,
    handle: EventHandle,
    params: Vec<ParamRef>,
    cache: ParameterCache,
    transform: Arc<EmitterTransform>,
    pause: PauseLatch,
    volume: f32,
    pitch: f32,
    allow_fadeout: bool,
    trigger_once: bool,
    preload: bool,
    play_on_awake: bool,
    attenuation_override: Option<Attenuation>,
    is_active: bool,
    has_triggered: bool,
    is_oneshot: bool,
    is_quitting: bool,
    preloaded: Option<EventId>,
    event_sender: Sender<PetalSonicEvent>,
    event_receiver: Receiver<PetalSonicEvent>,
}

impl AudioEmitter {
    pub fn new(world: PetalSonicWorld, config: EmitterConfig) -> Result<Self> {
        config.validate()?;
        let (event_sender, event_receiver) = unbounded();
        let activation =
            ActivationController::new(world.listeners().clone(), world.cull_policy().clone());
        let handle = EventHandle::new(world.backend().clone(), config.event);

        Ok(Self {
            world,
            activation,
            handle,
            params: config.params,
            cache: ParameterCache::new(),
            transform: Arc::new(EmitterTransform::default()),
            pause: PauseLatch {
                mute: config.mute,
                code_pause: false,
            },
            volume: config.volume,
            pitch: config.pitch,
            allow_fadeout: config.allow_fadeout,
            trigger_once: config.trigger_once,
            preload: config.preload,
            play_on_awake: config.play_on_awake,
            attenuation_override: config.attenuation_override,
            is_active: false,
            has_triggered: false,
            is_oneshot: false,
            is_quitting: false,
            preloaded: None,
            event_sender,
            event_receiver,
        })
    }

    fn backend(&self) -> Arc<dyn AudioBackend> {
        Arc::clone(self.world.backend())
    }

    fn emit(&self, event: PetalSonicEvent) {
        // The receiver lives as long as the sender, so this cannot fail.
        let _ = self.event_sender.send(event);
    }

    /// Drains lifecycle notifications emitted since the last poll.
    pub fn poll_events(&self) -> Vec<PetalSonicEvent> {
        self.event_receiver.try_iter().collect()
    }

    /// Host start hook: preloads sample data and plays when configured to.
    pub fn start(&mut self) {
        if self.preload {
            self.load_sample_data();
        }
        if self.play_on_awake {
            self.play();
        }
    }

    fn load_sample_data(&mut self) {
        if !self.ensure_description() {
            return;
        }
        let Some(id) = self.handle.description().map(|d| d.id) else {
            return;
        };
        match self.backend().load_sample_data(id) {
            Ok(()) => {
                log::debug!("Preloaded sample data for {}", id);
                self.preloaded = Some(id);
            }
            Err(e) => log::warn!("Failed to preload sample data for {}: {}", id, e),
        }
    }

    fn unload_sample_data(&mut self) {
        if let Some(id) = self.preloaded.take() {
            if let Err(e) = self.backend().unload_sample_data(id) {
                log::warn!("Failed to unload sample data for {}: {}", id, e);
            }
        }
    }

    /// Resolves metadata if missing. Returns `false` when the event cannot be resolved.
    fn ensure_description(&mut self) -> bool {
        match self.handle.ensure_description(&mut self.params) {
            Ok(unresolved) => {
                for name in unresolved {
                    log::warn!("Parameter '{}' not found on the event", name);
                    self.emit(PetalSonicEvent::ParameterUnresolved { name });
                }
                true
            }
            Err(e) => {
                log::warn!("Event lookup failed: {}", e);
                false
            }
        }
    }

    pub fn event_reference(&self) -> Option<&EventReference> {
        self.handle.reference()
    }

    /// Assigns a new event. Any instance is released immediately and cached metadata dropped.
    pub fn set_event_reference(&mut self, reference: Option<EventReference>) {
        self.unpause();
        self.is_active = false;
        self.cache.clear();
        self.unload_sample_data();
        if let Some(instance) = self.handle.set_reference(reference) {
            self.emit(PetalSonicEvent::InstanceStopped {
                instance,
                fadeout: false,
            });
            self.emit(PetalSonicEvent::InstanceReleased { instance });
        }
        self.is_oneshot = false;
    }

    pub fn play(&mut self) {
        if self.trigger_once && self.has_triggered {
            log::debug!("Ignoring play: already triggered once");
            return;
        }
        if !self.handle.has_reference() {
            log::warn!("Ignoring play: no event reference set");
            return;
        }

        self.cache.clear();

        if !self.ensure_description() {
            return;
        }
        let Some(description) = self.handle.description() else {
            return;
        };
        self.is_oneshot = description.effective_oneshot();
        let is_3d = description.is_3d;

        self.is_active = true;

        if self.activation.gating_applies(is_3d, self.is_oneshot) {
            self.evaluate_with(true);
        } else {
            self.play_instance();
        }
    }

    fn play_instance(&mut self) -> Option<InstanceHandle> {
        if self.is_oneshot {
            if let Some(previous) = self.handle.release_for_replacement() {
                self.emit(PetalSonicEvent::InstanceReleased { instance: previous });
            }
        }

        let transform: Arc<dyn PositionSource> = self.transform.clone();
        let materialized = match self.handle.materialize(&mut self.params, transform) {
            Ok(materialized) => materialized,
            Err(e) => {
                log::warn!("Failed to create instance: {}", e);
                return None;
            }
        };
        let instance = materialized.instance();
        if materialized.is_created() {
            self.emit(PetalSonicEvent::InstanceCreated { instance });
        }

        let backend = self.backend();
        // Declared defaults first so cached values win.
        for param in &self.params {
            param.apply(backend.as_ref(), instance);
        }
        self.cache.replay_into(backend.as_ref(), instance);

        let is_3d = self.handle.description().is_some_and(|d| d.is_3d);
        if let (true, Some(attenuation)) = (is_3d, self.attenuation_override) {
            log_failure(
                "set_property",
                instance,
                backend.set_property(
                    instance,
                    InstanceProperty::MinimumDistance,
                    attenuation.min_distance,
                ),
            );
            log_failure(
                "set_property",
                instance,
                backend.set_property(
                    instance,
                    InstanceProperty::MaximumDistance,
                    attenuation.max_distance,
                ),
            );
        }
        log_failure("set_volume", instance, backend.set_volume(instance, self.volume));
        log_failure("set_pitch", instance, backend.set_pitch(instance, self.pitch));

        if !log_failure("start", instance, backend.start(instance)) {
            return None;
        }
        if self.pause.effective() {
            log_failure("set_paused", instance, backend.set_paused(instance, true));
        }

        self.has_triggered = true;
        log::debug!("Started {}", instance);
        self.emit(PetalSonicEvent::InstanceStarted { instance });
        Some(instance)
    }

    /// Stops using the configured fadeout behaviour.
    pub fn stop(&mut self) {
        self.stop_with_fadeout(self.allow_fadeout);
    }

    pub fn stop_with_fadeout(&mut self, allow_fadeout: bool) {
        self.is_active = false;
        self.has_triggered = false;
        self.cache.clear();
        self.stop_instance(allow_fadeout);
    }

    fn stop_instance(&mut self, allow_fadeout: bool) -> Option<InstanceHandle> {
        let was_fading = self.handle.is_fading_out();
        let instance = self.handle.teardown(allow_fadeout)?;
        self.emit(PetalSonicEvent::InstanceStopped {
            instance,
            fadeout: allow_fadeout,
        });
        if !was_fading {
            self.emit(PetalSonicEvent::InstanceReleased { instance });
        }
        Some(instance)
    }

    /// Host tick. Reaps finished one-shots and re-checks distance culling.
    ///
    /// `force` re-applies the current decision even if nothing changed.
    pub fn evaluate(&mut self, force: bool) {
        self.reap_completed_oneshot();
        self.evaluate_with(force);
    }

    fn evaluate_with(&mut self, force: bool) {
        if !self.is_active {
            return;
        }
        let Some(is_3d) = self.handle.description().map(|d| d.is_3d) else {
            return;
        };
        if !self.activation.gating_applies(is_3d, self.is_oneshot) {
            // Culling was switched off while this emitter was culled.
            if !self.is_oneshot && !self.handle.is_playing() {
                if let Some(instance) = self.play_instance() {
                    self.emit(PetalSonicEvent::InstanceActivated { instance });
                }
            }
            return;
        }

        let max_distance = self.max_distance();
        let position = self.transform.pose().position;
        let currently_live = self.handle.is_playing();

        match self
            .activation
            .evaluate(force, currently_live, position, max_distance)
        {
            Transition::Activate => {
                if let Some(instance) = self.play_instance() {
                    self.emit(PetalSonicEvent::InstanceActivated { instance });
                }
            }
            Transition::Deactivate => {
                if let Some(instance) = self.stop_instance(self.allow_fadeout) {
                    log::debug!("Culled {} beyond {} units", instance, max_distance);
                    self.emit(PetalSonicEvent::InstanceCulled { instance });
                }
            }
            Transition::Hold => {}
        }
    }

    fn reap_completed_oneshot(&mut self) {
        if !self.is_oneshot {
            return;
        }
        let finished = self
            .handle
            .playback_state()
            .is_some_and(|state| state.is_stopped());
        if !finished {
            return;
        }
        if let Some(instance) = self.handle.release_for_replacement() {
            self.has_triggered = false;
            self.emit(PetalSonicEvent::OneShotCompleted { instance });
            self.emit(PetalSonicEvent::InstanceReleased { instance });
        }
    }

    /// Override distance if set, otherwise the event's authored max distance.
    pub fn max_distance(&mut self) -> f32 {
        if let Some(attenuation) = self.attenuation_override {
            return attenuation.max_distance;
        }
        if !self.ensure_description() {
            return 0.0;
        }
        self.handle
            .description()
            .map(|d| d.max_distance)
            .unwrap_or(0.0)
    }

    pub fn set_parameter(&mut self, key: impl Into<ParameterKey>, value: f32, ignore_seek_speed: bool) {
        let key = key.into();

        if self.activation.culling_enabled() && self.is_active {
            if !self.cache.contains(&key) {
                self.ensure_description();
            }
            let description = self.handle.description();
            self.cache
                .record(&key, value, || key.to_param(description, value));
            if let Some(entry) = self.cache.get(&key) {
                if entry.id.is_none() {
                    log::debug!("Cached parameter {} has no resolved id", key);
                }
            }
        }

        self.handle.with_live("set_parameter", |backend, instance| match &key {
            ParameterKey::Name(name) => {
                backend.set_parameter_by_name(instance, name, value, ignore_seek_speed)
            }
            ParameterKey::Id(id) => backend.set_parameter_by_id(instance, *id, value, ignore_seek_speed),
        });
    }

    /// Updates matching declared defaults, then sets every incoming parameter.
    pub fn apply_parameter_batch(&mut self, params: &[ParamRef]) {
        for declared in self.params.iter_mut() {
            if let Some(incoming) = params.iter().find(|p| p.name == declared.name) {
                declared.value = incoming.value;
            }
        }
        for param in params {
            self.set_parameter(param.name.as_str(), param.value, false);
        }
    }

    pub fn params(&self) -> &[ParamRef] {
        &self.params
    }

    pub fn parameter_cache(&self) -> &ParameterCache {
        &self.cache
    }

    fn apply_pause(&self) {
        let paused = self.pause.effective();
        self.handle
            .with_live("set_paused", |backend, instance| backend.set_paused(instance, paused));
    }

    pub fn pause(&mut self) {
        self.pause.code_pause = true;
        self.apply_pause();
    }

    pub fn unpause(&mut self) {
        self.pause.code_pause = false;
        self.apply_pause();
    }

    pub fn mute(&self) -> bool {
        self.pause.mute
    }

    pub fn set_mute(&mut self, mute: bool) {
        self.pause.mute = mute;
        self.apply_pause();
    }

    /// Whether mute or code pause currently holds the instance.
    pub fn is_paused(&self) -> bool {
        self.pause.effective()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.handle
            .with_live("set_volume", |backend, instance| backend.set_volume(instance, volume));
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
        self.handle
            .with_live("set_pitch", |backend, instance| backend.set_pitch(instance, pitch));
    }

    /// Releases a sustain point on the live instance.
    pub fn key_off(&self) {
        self.handle
            .with_live("key_off", |backend, instance| backend.key_off(instance));
    }

    pub fn trigger_cue(&self) {
        self.key_off();
    }

    /// Authored length of the event in seconds, 0 when unset or unresolved.
    pub fn length(&self) -> f32 {
        if !self.handle.has_reference() {
            return 0.0;
        }
        if let Some(description) = self.handle.description() {
            return description.length_seconds();
        }
        let Some(reference) = self.handle.reference() else {
            return 0.0;
        };
        match self.world.backend().resolve_description(reference.id) {
            Ok(description) => description.length_seconds(),
            Err(e) => {
                log::debug!("Length unavailable for {}: {}", reference, e);
                0.0
            }
        }
    }

    /// Timeline position in seconds, 0 when not playing.
    pub fn time(&self) -> f32 {
        if !self.is_playing() {
            return 0.0;
        }
        let Some(instance) = self.handle.live_instance() else {
            return 0.0;
        };
        match self.world.backend().timeline_position(instance) {
            Ok(position_ms) => position_ms as f32 / 1000.0,
            Err(e) => {
                log::debug!("Timeline position unavailable for {}: {}", instance, e);
                0.0
            }
        }
    }

    pub fn is_playing(&self) -> bool {
        self.handle.is_playing()
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn has_triggered(&self) -> bool {
        self.has_triggered
    }

    pub fn is_oneshot(&self) -> bool {
        self.is_oneshot
    }

    /// The live instance, if any.
    pub fn instance(&self) -> Option<InstanceHandle> {
        self.handle.live_instance()
    }

    pub fn pose(&self) -> Pose {
        self.transform.pose()
    }

    pub fn set_pose(&self, pose: Pose) {
        self.transform.set_pose(pose);
    }

    pub fn transform(&self) -> &Arc<EmitterTransform> {
        &self.transform
    }

    /// Fire-and-forget one-shot, independent of this emitter's own instance.
    ///
    /// # Errors
    ///
    /// Returns [`PetalSonicError::EventNotFound`] if the target does not resolve.
    pub fn try_play_one_shot(
        &self,
        target: impl Into<EventTarget>,
        options: OneShotOptions,
    ) -> Result<InstanceHandle> {
        self.world.try_play_one_shot(&target.into(), &options)
    }

    /// Like [`try_play_one_shot`](Self::try_play_one_shot), but failures are only logged.
    pub fn play_one_shot(&self, target: impl Into<EventTarget>, options: OneShotOptions) {
        let target = target.into();
        match self.world.try_play_one_shot(&target, &options) {
            Ok(instance) => self.emit(PetalSonicEvent::OneShotFired { instance }),
            Err(PetalSonicError::EventNotFound(_)) => {
                log::warn!("Event not found: {}", target);
                self.emit(PetalSonicEvent::EventNotFound {
                    target: target.to_string(),
                });
            }
            Err(e) => log::warn!("One-shot {} failed: {}", target, e),
        }
    }

    /// Marks the backend as shutting down; drop then skips per-instance teardown.
    pub fn on_application_quit(&mut self) {
        self.is_quitting = true;
    }
}

impl Drop for AudioEmitter {
    fn drop(&mut self) {
        if self.is_quitting {
            return;
        }
        let release = self.is_oneshot && self.handle.description().is_some();
        if let Some(instance) = self.handle.detach(release) {
            log::debug!("Emitter dropped, detached {} (released: {})", instance, release);
        }
        self.unload_sample_data();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeSettings;
    use crate::description::{EventDescription, ParameterId};
    use crate::listener::{ListenerId, ListenerSet};
    use crate::math::Vec3;
    use crate::mock::MockBackend;
    use crate::playback::PlayState;

    struct Fixture {
        backend: Arc<MockBackend>,
        listeners: Arc<ListenerSet>,
        listener: ListenerId,
        settings: Arc<RuntimeSettings>,
        world: PetalSonicWorld,
    }

    impl Fixture {
        fn new(culling: bool) -> Self {
            let _ = env_logger::builder().is_test(true).try_init();
            let backend = Arc::new(MockBackend::new());
            let listeners = Arc::new(ListenerSet::new());
            let listener = listeners.add_listener(Pose::identity());
            let settings = Arc::new(RuntimeSettings::new(culling));
            let world = PetalSonicWorld::new(backend.clone(), listeners.clone(), settings.clone());
            Self {
                backend,
                listeners,
                listener,
                settings,
                world,
            }
        }

        fn listener_at(&self, x: f32) {
            self.listeners
                .set_listener_pose(self.listener, Pose::from_position(Vec3::new(x, 0.0, 0.0)));
        }

        fn emitter(&self, description: EventDescription, config: EmitterConfig) -> AudioEmitter {
            let reference = self.backend.register_event("event:/test", description);
            self.world
                .create_emitter(config.event(reference).play_on_awake(false))
                .unwrap()
        }
    }

    fn looping_3d() -> EventDescription {
        EventDescription::new(EventId::new(uuid::Uuid::new_v4()))
            .spatial(1.0, 10.0)
            .parameter("rpm", ParameterId(1))
            .parameter("load", ParameterId(2))
    }

    fn oneshot() -> EventDescription {
        EventDescription::new(EventId::new(uuid::Uuid::new_v4())).oneshot(true)
    }

    #[test]
    fn trigger_once_starts_exactly_once() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new().trigger_once(true));

        emitter.play();
        emitter.play();

        assert_eq!(fx.backend.total_starts(), 1);
        assert!(emitter.has_triggered());

        emitter.stop();
        emitter.play();
        assert_eq!(fx.backend.total_starts(), 2);
    }

    #[test]
    fn stop_clears_playing_and_cache() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        fx.listener_at(5.0);

        emitter.play();
        emitter.set_parameter("rpm", 1200.0, false);
        assert!(emitter.is_playing());
        assert_eq!(emitter.parameter_cache().len(), 1);

        emitter.stop();

        assert!(!emitter.is_playing());
        assert!(emitter.parameter_cache().is_empty());
        assert!(!emitter.is_active());
        assert!(!emitter.has_triggered());
    }

    #[test]
    fn play_without_reference_is_a_no_op() {
        let fx = Fixture::new(true);
        let mut emitter = fx.world.create_emitter(EmitterConfig::new()).unwrap();

        emitter.start();
        emitter.play();

        assert!(!emitter.is_active());
        assert!(!emitter.is_playing());
        assert_eq!(emitter.length(), 0.0);
        assert!(fx.backend.created_instances().is_empty());
    }

    #[test]
    fn distance_gating_scenario() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        fx.listener_at(15.0);

        emitter.play();
        assert!(emitter.is_active());
        assert!(!emitter.is_playing());
        assert!(emitter.instance().is_none());
        assert!(fx.backend.created_instances().is_empty());

        fx.listener_at(5.0);
        emitter.evaluate(false);
        assert!(emitter.is_playing());

        let events = emitter.poll_events();
        assert!(events.iter().any(|e| matches!(e, PetalSonicEvent::InstanceActivated { .. })));
    }

    #[test]
    fn evaluate_is_idempotent_for_stable_input() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        fx.listener_at(5.0);
        emitter.play();
        fx.listener_at(20.0);

        for _ in 0..5 {
            emitter.evaluate(false);
        }
        assert_eq!(fx.backend.created_instances().len(), 1);
        assert_eq!(fx.backend.double_releases(), 0);
        assert!(!emitter.is_playing());

        fx.listener_at(2.0);
        for _ in 0..5 {
            emitter.evaluate(false);
        }
        assert_eq!(fx.backend.created_instances().len(), 2);
        assert_eq!(fx.backend.total_starts(), 2);
        assert!(emitter.is_playing());
    }

    #[test]
    fn parameters_recorded_while_culled_replay_on_activation() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        fx.listener_at(50.0);

        emitter.play();
        emitter.set_parameter("rpm", 4200.0, false);
        assert!(emitter.instance().is_none());

        fx.listener_at(1.0);
        emitter.evaluate(false);

        let instance = emitter.instance().unwrap();
        assert_eq!(fx.backend.parameter(instance, "rpm"), Some(4200.0));
    }

    #[test]
    fn cached_value_beats_declared_default() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new().param("load", 0.1));
        fx.listener_at(1.0);

        emitter.play();
        let first = emitter.instance().unwrap();
        assert_eq!(fx.backend.parameter(first, "load"), Some(0.1));

        emitter.set_parameter("load", 0.9, false);
        assert_eq!(fx.backend.parameter(first, "load"), Some(0.9));

        // Cull without fadeout, then come back.
        emitter.stop_instance(false);
        fx.listener_at(30.0);
        emitter.evaluate(false);
        fx.listener_at(1.0);
        emitter.evaluate(false);

        let second = emitter.instance().unwrap();
        assert_ne!(first, second);
        assert_eq!(fx.backend.parameter(second, "load"), Some(0.9));
        assert_eq!(emitter.params()[0].value, 0.1);
    }

    #[test]
    fn cache_is_not_written_without_culling() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());

        emitter.play();
        emitter.set_parameter(ParameterId(1), 10.0, true);

        assert!(emitter.parameter_cache().is_empty());
        let instance = emitter.instance().unwrap();
        assert_eq!(fx.backend.parameter(instance, "rpm"), Some(10.0));
    }

    #[test]
    fn non_spatial_event_ignores_distance() {
        let fx = Fixture::new(true);
        let description = EventDescription::new(EventId::new(uuid::Uuid::new_v4()));
        let mut emitter = fx.emitter(description, EmitterConfig::new());
        fx.listener_at(1000.0);

        emitter.play();
        emitter.evaluate(false);

        assert!(emitter.is_playing());
    }

    #[test]
    fn oneshots_never_overlap() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(oneshot(), EmitterConfig::new());

        emitter.play();
        let first = emitter.instance().unwrap();
        emitter.play();
        let second = emitter.instance().unwrap();

        assert_ne!(first, second);
        let previous = fx.backend.instance(first).unwrap();
        assert!(previous.released, "prior one-shot released before the next starts");
        assert_eq!(previous.state, PlayState::Playing, "prior one-shot plays out");
        assert_eq!(fx.backend.instance(second).unwrap().start_calls, 1);
        assert!(emitter.is_oneshot());
    }

    #[test]
    fn completed_oneshot_resets_trigger() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(oneshot(), EmitterConfig::new().trigger_once(true));

        emitter.play();
        let instance = emitter.instance().unwrap();
        emitter.play();
        assert_eq!(fx.backend.total_starts(), 1);

        fx.backend.complete(instance);
        emitter.evaluate(false);
        assert!(!emitter.has_triggered());
        assert!(!fx.backend.is_valid(instance));

        emitter.play();
        assert_eq!(fx.backend.total_starts(), 2);
    }

    #[test]
    fn pause_is_an_or_of_mute_and_code_pause() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        emitter.play();
        let instance = emitter.instance().unwrap();

        emitter.set_mute(true);
        emitter.pause();
        emitter.unpause();
        assert!(fx.backend.instance(instance).unwrap().paused);
        assert!(emitter.is_playing(), "paused still counts as playing");

        emitter.set_mute(false);
        assert!(!fx.backend.instance(instance).unwrap().paused);

        emitter.pause();
        emitter.set_mute(true);
        emitter.set_mute(false);
        assert!(fx.backend.instance(instance).unwrap().paused);
        emitter.unpause();
        assert!(!fx.backend.instance(instance).unwrap().paused);
    }

    #[test]
    fn new_instance_starts_paused_when_latched() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new().mute(true));

        emitter.play();

        let inst = fx.backend.instance(emitter.instance().unwrap()).unwrap();
        assert_eq!(inst.start_calls, 1);
        assert!(inst.paused);
    }

    #[test]
    fn missing_oneshot_is_logged_not_propagated() {
        let fx = Fixture::new(true);
        let emitter = fx.emitter(looping_3d(), EmitterConfig::new());

        emitter.play_one_shot("explosion", OneShotOptions::new().volume_scale(0.5));

        assert!(fx.backend.created_instances().is_empty());
        let events = emitter.poll_events();
        assert_eq!(
            events,
            vec![PetalSonicEvent::EventNotFound {
                target: "explosion".to_string()
            }]
        );
        assert!(events[0].is_error());
    }

    #[test]
    fn oneshot_fires_outside_the_emitter_handle() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        fx.listener_at(1.0);
        emitter.play();
        let own = emitter.instance().unwrap();

        let reference = fx.backend.register_event("event:/blip", oneshot());
        let fired = emitter
            .try_play_one_shot(&reference, OneShotOptions::new().position(Vec3::X))
            .unwrap();

        assert_ne!(fired, own);
        assert_eq!(emitter.instance(), Some(own));
        assert!(fx.backend.instance(fired).unwrap().released);
    }

    #[test]
    fn reassigning_reference_hard_releases() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        emitter.play();
        emitter.pause();
        let instance = emitter.instance().unwrap();

        let next = fx.backend.register_event("event:/other", oneshot());
        emitter.set_event_reference(Some(next.clone()));

        assert!(!fx.backend.is_valid(instance));
        assert!(!emitter.is_active());
        assert!(!emitter.is_paused());
        assert_eq!(emitter.event_reference(), Some(&next));

        emitter.play();
        assert!(emitter.is_oneshot());
        assert!(emitter.is_playing());
    }

    #[test]
    fn fadeout_stop_is_not_playing_and_not_released_twice() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        fx.listener_at(1.0);
        emitter.play();
        let instance = emitter.instance().unwrap();

        emitter.stop();
        emitter.stop();
        emitter.evaluate(false);

        assert!(!emitter.is_playing());
        assert_eq!(
            fx.backend.instance(instance).unwrap().state,
            PlayState::Stopping
        );
        assert_eq!(fx.backend.double_releases(), 0);

        fx.backend.finish_fadeouts();
        assert!(!fx.backend.is_valid(instance));
    }

    #[test]
    fn immediate_stop_cuts_audio() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        emitter.play();
        let instance = emitter.instance().unwrap();

        emitter.stop_with_fadeout(false);

        assert!(!fx.backend.is_valid(instance));
        emitter.play();
        assert_eq!(fx.backend.valid_instances().len(), 1);
    }

    #[test]
    fn culling_policy_is_read_live() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        fx.listener_at(100.0);

        emitter.play();
        assert!(emitter.is_playing());

        fx.settings.set_stop_events_outside_max_distance(true);
        emitter.evaluate(false);
        assert!(!emitter.is_playing());
    }

    #[test]
    fn attenuation_override_wins() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(
            looping_3d(),
            EmitterConfig::new().attenuation_override(2.0, 50.0),
        );
        fx.listener_at(30.0);

        assert_eq!(emitter.max_distance(), 50.0);
        emitter.play();

        let inst = fx.backend.instance(emitter.instance().unwrap()).unwrap();
        assert_eq!(
            inst.properties.get(&InstanceProperty::MaximumDistance),
            Some(&50.0)
        );
        assert_eq!(
            inst.properties.get(&InstanceProperty::MinimumDistance),
            Some(&2.0)
        );
    }

    #[test]
    fn batch_updates_declared_and_sets_undeclared() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new().param("rpm", 0.0));
        emitter.play();
        let instance = emitter.instance().unwrap();

        emitter.apply_parameter_batch(&[ParamRef::new("rpm", 800.0), ParamRef::new("load", 0.5)]);

        assert_eq!(emitter.params().len(), 1);
        assert_eq!(emitter.params()[0].value, 800.0);
        assert_eq!(fx.backend.parameter(instance, "rpm"), Some(800.0));
        assert_eq!(fx.backend.parameter(instance, "load"), Some(0.5));
    }

    #[test]
    fn unresolved_declared_parameter_is_reported() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new().param("gear", 3.0));

        emitter.play();

        assert!(emitter.is_playing());
        assert!(emitter.poll_events().contains(&PetalSonicEvent::ParameterUnresolved {
            name: "gear".to_string()
        }));
    }

    #[test]
    fn volume_pitch_length_and_time() {
        let fx = Fixture::new(false);
        let description = looping_3d().length_ms(2500);
        let mut emitter = fx.emitter(description, EmitterConfig::new().volume(0.8));

        assert_eq!(emitter.length(), 2.5);
        assert_eq!(emitter.time(), 0.0);

        emitter.play();
        let instance = emitter.instance().unwrap();
        assert_eq!(fx.backend.instance(instance).unwrap().volume, 0.8);

        emitter.set_volume(0.3);
        emitter.set_pitch(1.5);
        let inst = fx.backend.instance(instance).unwrap();
        assert_eq!(inst.volume, 0.3);
        assert_eq!(inst.pitch, 1.5);

        fx.backend.set_timeline_position(instance, 1250);
        assert_eq!(emitter.time(), 1.25);

        emitter.trigger_cue();
        assert_eq!(fx.backend.instance(instance).unwrap().key_offs, 1);
    }

    #[test]
    fn attached_instance_follows_emitter_pose() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        emitter.set_pose(Pose::from_position(Vec3::new(2.0, 0.0, 0.0)));
        emitter.play();
        let instance = emitter.instance().unwrap();

        emitter.set_pose(Pose::from_position(Vec3::new(4.0, 1.0, 0.0)));
        fx.backend.sync_attachments();

        let attributes = fx.backend.instance(instance).unwrap().attributes.unwrap();
        assert_eq!(attributes.position, Vec3::new(4.0, 1.0, 0.0));
    }

    #[test]
    fn start_preloads_and_plays_on_awake() {
        let fx = Fixture::new(false);
        let description = looping_3d();
        let id = description.id;
        let reference = fx.backend.register_event("event:/ambience", description);
        let mut emitter = fx
            .world
            .create_emitter(EmitterConfig::new().event(reference).preload(true))
            .unwrap();

        emitter.start();
        assert_eq!(fx.backend.sample_data_loads(id), 1);
        assert!(emitter.is_playing());

        drop(emitter);
        assert_eq!(fx.backend.sample_data_loads(id), 0);
    }

    #[test]
    fn drop_detaches_and_releases_only_oneshots() {
        let fx = Fixture::new(false);

        let mut looping = fx.emitter(looping_3d(), EmitterConfig::new());
        looping.play();
        let looping_instance = looping.instance().unwrap();
        drop(looping);
        let inst = fx.backend.instance(looping_instance).unwrap();
        assert!(!inst.attached);
        assert!(!inst.released, "looping instances are left to the backend");

        let mut single = fx.emitter(oneshot().spatial(1.0, 5.0), EmitterConfig::new());
        single.play();
        let single_instance = single.instance().unwrap();
        drop(single);
        assert!(fx.backend.instance(single_instance).unwrap().released);
    }

    #[test]
    fn application_quit_skips_teardown() {
        let fx = Fixture::new(false);
        let description = oneshot();
        let id = description.id;
        let reference = fx.backend.register_event("event:/quit", description);
        let mut emitter = fx
            .world
            .create_emitter(EmitterConfig::new().event(reference).preload(true))
            .unwrap();
        emitter.start();
        let instance = emitter.instance().unwrap();

        emitter.on_application_quit();
        drop(emitter);

        let inst = fx.backend.instance(instance).unwrap();
        assert!(!inst.released);
        assert_eq!(fx.backend.sample_data_loads(id), 1);
    }

    #[test]
    fn immediate_stop_cuts_a_fading_instance() {
        let fx = Fixture::new(false);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        emitter.play();
        let instance = emitter.instance().unwrap();

        emitter.stop_with_fadeout(true);
        assert_eq!(
            fx.backend.instance(instance).unwrap().state,
            PlayState::Stopping
        );
        emitter.poll_events();

        emitter.stop_with_fadeout(false);

        let inst = fx.backend.instance(instance).unwrap();
        assert_eq!(inst.state, PlayState::Stopped);
        assert!(!inst.valid);
        assert_eq!(fx.backend.double_releases(), 0);
        assert_eq!(
            emitter.poll_events(),
            vec![PetalSonicEvent::InstanceStopped {
                instance,
                fadeout: false
            }]
        );
    }

    #[test]
    fn disabling_culling_revives_a_culled_emitter() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        fx.listener_at(50.0);

        emitter.play();
        assert!(!emitter.is_playing());

        fx.settings.set_stop_events_outside_max_distance(false);
        for _ in 0..3 {
            emitter.evaluate(false);
        }

        assert!(emitter.is_active());
        assert!(emitter.is_playing());
        assert_eq!(fx.backend.created_instances().len(), 1);
    }

    #[test]
    fn disabling_culling_during_fadeout_starts_a_fresh_instance() {
        let fx = Fixture::new(true);
        let mut emitter = fx.emitter(looping_3d(), EmitterConfig::new());
        fx.listener_at(1.0);
        emitter.play();
        let first = emitter.instance().unwrap();

        fx.listener_at(50.0);
        emitter.evaluate(false);
        assert!(!emitter.is_playing());

        fx.settings.set_stop_events_outside_max_distance(false);
        emitter.evaluate(false);

        let second = emitter.instance().unwrap();
        assert_ne!(first, second);
        assert!(emitter.is_playing());
        assert_eq!(fx.backend.double_releases(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let fx = Fixture::new(false);
        let result = fx
            .world
            .create_emitter(EmitterConfig::new().attenuation_override(-1.0, 5.0));
        assert!(matches!(result, Err(PetalSonicError::Configuration(_))));
    }
}
