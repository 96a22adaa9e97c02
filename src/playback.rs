//! Playback state reported by backend instances.
//!
//! This module provides the small value types exchanged with the backend when
//! controlling a live instance:
//! - [`PlayState`]: Current playback state of an instance
//! - [`StopMode`]: How an instance should stop (fade out or cut)
//! - [`InstanceProperty`]: Per-instance properties the emitter overrides

/// Represents the current playback state of a backend instance.
///
/// Pausing does not change the play state: a paused instance still reports
/// [`PlayState::Playing`] and counts as playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayState {
    /// Created or started, not yet producing audio
    Starting,
    /// Audio is currently playing
    Playing,
    /// Held at a sustain point until key-off
    Sustaining,
    /// Fading out after a stop request
    Stopping,
    /// Not playing
    #[default]
    Stopped,
}

impl PlayState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// How an instance should stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Let the event ring out through its authored fadeout
    AllowFadeout,
    /// Cut the audio immediately
    Immediate,
}

impl StopMode {
    pub fn from_fadeout(allow_fadeout: bool) -> Self {
        if allow_fadeout {
            Self::AllowFadeout
        } else {
            Self::Immediate
        }
    }
}

/// Instance properties that override authored event values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceProperty {
    MinimumDistance,
    MaximumDistance,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stopped_is_stopped() {
        assert!(PlayState::Stopped.is_stopped());
        for state in [
            PlayState::Starting,
            PlayState::Playing,
            PlayState::Sustaining,
            PlayState::Stopping,
        ] {
            assert!(!state.is_stopped(), "{:?}", state);
        }
    }

    #[test]
    fn stop_mode_follows_fadeout_flag() {
        assert_eq!(StopMode::from_fadeout(true), StopMode::AllowFadeout);
        assert_eq!(StopMode::from_fadeout(false), StopMode::Immediate);
    }
}
