//! Listener registry used for distance culling.

use crate::math::{Pose, Vec3};
use std::sync::{Mutex, PoisonError};

/// Answers distance queries against the set of active listeners.
pub trait ListenerRegistry: Send + Sync {
    /// Squared distance from `position` to the nearest listener.
    ///
    /// Returns `f32::MAX` when there are no listeners, so nothing is in range.
    fn nearest_listener_distance_squared(&self, position: Vec3) -> f32;
}

/// Represents a listener (the "ears") in the 3D audio world.
///
/// In a typical game this follows the player's camera or character.
#[derive(Clone, Debug, Default)]
pub struct PetalSonicAudioListener {
    pub(crate) pose: Pose,
}

impl PetalSonicAudioListener {
    pub fn new(pose: Pose) -> Self {
        Self { pose }
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }
}

/// Index of a listener inside a [`ListenerSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

/// Simple listener registry owned by the host.
///
/// The host moves listeners with [`ListenerSet::set_listener_pose`] as cameras
/// move; emitters only read from it.
#[derive(Debug, Default)]
pub struct ListenerSet {
    listeners: Mutex<Vec<PetalSonicAudioListener>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a single listener at `pose`.
    pub fn with_listener(pose: Pose) -> Self {
        let set = Self::new();
        set.add_listener(pose);
        set
    }

    pub fn add_listener(&self, pose: Pose) -> ListenerId {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        listeners.push(PetalSonicAudioListener::new(pose));
        ListenerId(listeners.len() - 1)
    }

    /// Sets the pose of a listener. Unknown ids are ignored.
    pub fn set_listener_pose(&self, id: ListenerId, pose: Pose) {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        match listeners.get_mut(id.0) {
            Some(listener) => listener.set_pose(pose),
            None => log::warn!("Listener {:?} not found", id),
        }
    }

    pub fn listener(&self, id: ListenerId) -> Option<PetalSonicAudioListener> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id.0)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ListenerRegistry for ListenerSet {
    fn nearest_listener_distance_squared(&self, position: Vec3) -> f32 {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|listener| listener.pose.distance_squared(position))
            .fold(f32::MAX, f32::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_listeners_means_out_of_range() {
        let set = ListenerSet::new();
        assert!(set.is_empty());
        assert_eq!(set.nearest_listener_distance_squared(Vec3::ZERO), f32::MAX);
    }

    #[test]
    fn picks_the_nearest_listener() {
        let set = ListenerSet::with_listener(Pose::from_position(Vec3::new(10.0, 0.0, 0.0)));
        let near = set.add_listener(Pose::from_position(Vec3::new(0.0, 3.0, 0.0)));

        assert_eq!(set.nearest_listener_distance_squared(Vec3::ZERO), 9.0);

        set.set_listener_pose(near, Pose::from_position(Vec3::new(0.0, 0.0, 20.0)));
        assert_eq!(set.nearest_listener_distance_squared(Vec3::ZERO), 100.0);
        assert_eq!(
            set.listener(near).map(|l| l.pose().position),
            Some(Vec3::new(0.0, 0.0, 20.0))
        );
    }
}
