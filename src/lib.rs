pub mod activation;
pub mod backend;
pub mod config;
pub mod description;
pub mod emitter;
pub mod error;
pub mod events;
pub mod handle;
pub mod listener;
pub mod math;
pub mod param;
pub mod playback;
pub mod world;

#[cfg(any(test, feature = "mock-backend"))]
pub mod mock;

pub use activation::{ActivationController, Transition};
pub use backend::{AudioBackend, InstanceHandle, PositionSource};
pub use config::{Attenuation, CullPolicy, EmitterConfig, RuntimeSettings};
pub use description::{EventDescription, EventId, EventReference, ParameterDescription, ParameterId};
pub use emitter::{AudioEmitter, EmitterTransform, PauseLatch};
pub use error::PetalSonicError;
pub use events::PetalSonicEvent;
pub use handle::{EventHandle, Materialized};
pub use listener::{ListenerId, ListenerRegistry, ListenerSet, PetalSonicAudioListener};
pub use math::{Attributes3D, Pose};
pub use param::{ParamRef, ParameterCache, ParameterKey};
pub use playback::{InstanceProperty, PlayState, StopMode};
pub use world::{EventTarget, OneShotOptions, PetalSonicWorld};
