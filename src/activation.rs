//! Distance-gated activation.
//!
//! Decides whether an emitter's event should have a live instance, comparing the
//! squared distance to the nearest listener against the squared max attenuation
//! distance. The controller only decides; the emitter carries out the transition.

use crate::config::CullPolicy;
use crate::listener::ListenerRegistry;
use crate::math::Vec3;
use std::sync::Arc;

/// What the emitter should do after an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Create (or restart) the instance and replay cached parameters
    Activate,
    /// Tear the instance down
    Deactivate,
    /// Nothing changed
    Hold,
}

#[derive(Clone)]
pub struct ActivationController {
    listeners: Arc<dyn ListenerRegistry>,
    policy: Arc<dyn CullPolicy>,
}

impl ActivationController {
    pub fn new(listeners: Arc<dyn ListenerRegistry>, policy: Arc<dyn CullPolicy>) -> Self {
        Self { listeners, policy }
    }

    pub fn culling_enabled(&self) -> bool {
        self.policy.stop_events_outside_max_distance()
    }

    /// Distance gating only applies to looping 3D events while culling is enabled.
    pub fn gating_applies(&self, is_3d: bool, is_oneshot: bool) -> bool {
        is_3d && !is_oneshot && self.culling_enabled()
    }

    pub fn should_be_live(&self, position: Vec3, max_distance: f32) -> bool {
        self.listeners.nearest_listener_distance_squared(position) <= max_distance * max_distance
    }

    pub fn evaluate(
        &self,
        force: bool,
        currently_live: bool,
        position: Vec3,
        max_distance: f32,
    ) -> Transition {
        let should_be_live = self.should_be_live(position, max_distance);
        if !force && should_be_live == currently_live {
            return Transition::Hold;
        }

        log::debug!(
            "Activation at {:?}: should be live {} (currently {}, forced {})",
            position,
            should_be_live,
            currently_live,
            force
        );
        if should_be_live {
            Transition::Activate
        } else {
            Transition::Deactivate
        }
    }
}
