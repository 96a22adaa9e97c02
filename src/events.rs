//! Event types for PetalSonic emitters

use crate::backend::InstanceHandle;

/// Lifecycle notifications emitted by an [`AudioEmitter`](crate::AudioEmitter).
///
/// Drained by the host with [`AudioEmitter::poll_events`](crate::AudioEmitter::poll_events).
#[derive(Debug, Clone, PartialEq)]
pub enum PetalSonicEvent {
    InstanceCreated {
        instance: InstanceHandle,
    },
    InstanceStarted {
        instance: InstanceHandle,
    },
    InstanceStopped {
        instance: InstanceHandle,
        fadeout: bool,
    },
    InstanceReleased {
        instance: InstanceHandle,
    },
    /// Distance culling tore the instance down
    InstanceCulled {
        instance: InstanceHandle,
    },
    /// Distance culling brought the instance back
    InstanceActivated {
        instance: InstanceHandle,
    },
    OneShotFired {
        instance: InstanceHandle,
    },
    OneShotCompleted {
        instance: InstanceHandle,
    },
    EventNotFound {
        target: String,
    },
    ParameterUnresolved {
        name: String,
    },
}

impl PetalSonicEvent {
    pub fn instance(&self) -> Option<InstanceHandle> {
        match self {
            Self::InstanceCreated { instance }
            | Self::InstanceStarted { instance }
            | Self::InstanceStopped { instance, .. }
            | Self::InstanceReleased { instance }
            | Self::InstanceCulled { instance }
            | Self::InstanceActivated { instance }
            | Self::OneShotFired { instance }
            | Self::OneShotCompleted { instance } => Some(*instance),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::EventNotFound { .. } | Self::ParameterUnresolved { .. }
        )
    }
}
