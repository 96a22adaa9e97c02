//! Configuration for PetalSonic emitters

use crate::description::EventReference;
use crate::error::{PetalSonicError, Result};
use crate::param::ParamRef;
use std::sync::atomic::{AtomicBool, Ordering};

/// Authored attenuation range that replaces the event's own min/max distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Attenuation {
    pub fn new(min_distance: f32, max_distance: f32) -> Self {
        Self {
            min_distance,
            max_distance,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmitterConfig {
    pub event: Option<EventReference>,
    /// Declared parameters applied to every new instance
    pub params: Vec<ParamRef>,
    pub volume: f32,
    pub pitch: f32,
    pub mute: bool,
    pub play_on_awake: bool,
    pub allow_fadeout: bool,
    pub trigger_once: bool,
    pub preload: bool,
    pub attenuation_override: Option<Attenuation>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            event: None,
            params: Vec::new(),
            volume: 1.0,
            pitch: 1.0,
            mute: false,
            play_on_awake: true,
            allow_fadeout: true,
            trigger_once: false,
            preload: false,
            attenuation_override: None,
        }
    }
}

impl EmitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(mut self, event: EventReference) -> Self {
        self.event = Some(event);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: f32) -> Self {
        self.params.push(ParamRef::new(name, value));
        self
    }

    pub fn volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    pub fn mute(mut self, mute: bool) -> Self {
        self.mute = mute;
        self
    }

    pub fn play_on_awake(mut self, enable: bool) -> Self {
        self.play_on_awake = enable;
        self
    }

    pub fn allow_fadeout(mut self, enable: bool) -> Self {
        self.allow_fadeout = enable;
        self
    }

    pub fn trigger_once(mut self, enable: bool) -> Self {
        self.trigger_once = enable;
        self
    }

    pub fn preload(mut self, enable: bool) -> Self {
        self.preload = enable;
        self
    }

    pub fn attenuation_override(mut self, min_distance: f32, max_distance: f32) -> Self {
        self.attenuation_override = Some(Attenuation::new(min_distance, max_distance));
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.volume.is_finite() || !self.pitch.is_finite() {
            return Err(PetalSonicError::Configuration(format!(
                "Volume and pitch must be finite (volume: {}, pitch: {})",
                self.volume, self.pitch
            )));
        }

        if let Some(attenuation) = self.attenuation_override {
            if attenuation.min_distance < 0.0 || attenuation.max_distance < attenuation.min_distance
            {
                return Err(PetalSonicError::Configuration(format!(
                    "Invalid attenuation override {}..{}",
                    attenuation.min_distance, attenuation.max_distance
                )));
            }
        }

        Ok(())
    }
}

/// Read-only view of the global culling policy.
pub trait CullPolicy: Send + Sync {
    /// Whether 3D looping events outside max attenuation distance should be stopped.
    fn stop_events_outside_max_distance(&self) -> bool;
}

/// Process-wide runtime settings shared by every emitter.
#[derive(Debug, Default)]
pub struct RuntimeSettings {
    stop_events_outside_max_distance: AtomicBool,
}

impl RuntimeSettings {
    pub fn new(stop_events_outside_max_distance: bool) -> Self {
        Self {
            stop_events_outside_max_distance: AtomicBool::new(stop_events_outside_max_distance),
        }
    }

    pub fn set_stop_events_outside_max_distance(&self, enable: bool) {
        self.stop_events_outside_max_distance
            .store(enable, Ordering::Relaxed);
    }
}

impl CullPolicy for RuntimeSettings {
    fn stop_events_outside_max_distance(&self) -> bool {
        self.stop_events_outside_max_distance.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_component_defaults() {
        let config = EmitterConfig::default();
        assert!(config.play_on_awake);
        assert!(config.allow_fadeout);
        assert!(!config.trigger_once);
        assert_eq!(config.volume, 1.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_attenuation() {
        let config = EmitterConfig::new().attenuation_override(10.0, 5.0);
        assert!(matches!(
            config.validate(),
            Err(PetalSonicError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_non_finite_volume() {
        let config = EmitterConfig::new().volume(f32::NAN);
        assert!(config.validate().is_err());
    }

    #[test]
    fn settings_flag_can_be_flipped() {
        let settings = RuntimeSettings::new(false);
        assert!(!settings.stop_events_outside_max_distance());
        settings.set_stop_events_outside_max_distance(true);
        assert!(settings.stop_events_outside_max_distance());
    }
}
