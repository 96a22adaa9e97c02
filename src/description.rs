//! Event identifiers and the metadata the backend resolves for them.

use uuid::Uuid;

/// Stable identifier of an authored event.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventId(Uuid);

impl EventId {
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The nil id marks an unset reference.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.0)
    }
}

/// Reference to an authored event, as stored on an emitter.
///
/// The path is informational only; resolution always goes through the id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct EventReference {
    pub id: EventId,
    pub path: Option<String>,
}

impl EventReference {
    pub fn new(id: EventId) -> Self {
        Self { id, path: None }
    }

    pub fn with_path(id: EventId, path: impl Into<String>) -> Self {
        Self {
            id,
            path: Some(path.into()),
        }
    }

    pub fn is_null(&self) -> bool {
        self.id.is_nil()
    }
}

impl std::fmt::Display for EventReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{} {}", self.id, path),
            None => write!(f, "{}", self.id),
        }
    }
}

/// Runtime identifier of an event parameter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ParameterId(pub u64);

impl std::fmt::Display for ParameterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ParameterId({:#x})", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParameterDescription {
    pub name: String,
    pub id: ParameterId,
}

impl ParameterDescription {
    pub fn new(name: impl Into<String>, id: ParameterId) -> Self {
        Self {
            name: name.into(),
            id,
        }
    }
}

/// Backend metadata for one event.
#[derive(Clone, Debug, PartialEq)]
pub struct EventDescription {
    pub id: EventId,
    pub is_3d: bool,
    pub is_oneshot: bool,
    pub is_snapshot: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Authored timeline length in milliseconds
    pub length_ms: u32,
    pub parameters: Vec<ParameterDescription>,
}

impl EventDescription {
    /// A 2D, looping, non-snapshot event with no parameters.
    pub fn new(id: EventId) -> Self {
        Self {
            id,
            is_3d: false,
            is_oneshot: false,
            is_snapshot: false,
            min_distance: 1.0,
            max_distance: 20.0,
            length_ms: 0,
            parameters: Vec::new(),
        }
    }

    pub fn spatial(mut self, min_distance: f32, max_distance: f32) -> Self {
        self.is_3d = true;
        self.min_distance = min_distance;
        self.max_distance = max_distance;
        self
    }

    pub fn oneshot(mut self, oneshot: bool) -> Self {
        self.is_oneshot = oneshot;
        self
    }

    pub fn snapshot(mut self, snapshot: bool) -> Self {
        self.is_snapshot = snapshot;
        self
    }

    pub fn length_ms(mut self, length_ms: u32) -> Self {
        self.length_ms = length_ms;
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, id: ParameterId) -> Self {
        self.parameters.push(ParameterDescription::new(name, id));
        self
    }

    /// One-shot flag as seen by the emitter. Snapshots never count as one-shots.
    pub fn effective_oneshot(&self) -> bool {
        !self.is_snapshot && self.is_oneshot
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<&ParameterDescription> {
        self.parameters.iter().find(|p| p.name == name)
    }

    pub fn parameter_by_id(&self, id: ParameterId) -> Option<&ParameterDescription> {
        self.parameters.iter().find(|p| p.id == id)
    }

    pub fn length_seconds(&self) -> f32 {
        self.length_ms as f32 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_never_oneshot() {
        let desc = EventDescription::new(EventId::new(Uuid::new_v4()))
            .oneshot(true)
            .snapshot(true);
        assert!(!desc.effective_oneshot());
        assert!(desc.clone().snapshot(false).effective_oneshot());
    }

    #[test]
    fn parameter_lookup_by_name_and_id() {
        let desc = EventDescription::new(EventId::new(Uuid::new_v4()))
            .parameter("rpm", ParameterId(7))
            .parameter("load", ParameterId(9));

        assert_eq!(desc.parameter_by_name("load").map(|p| p.id), Some(ParameterId(9)));
        assert_eq!(
            desc.parameter_by_id(ParameterId(7)).map(|p| p.name.as_str()),
            Some("rpm")
        );
        assert!(desc.parameter_by_name("missing").is_none());
    }

    #[test]
    fn null_reference() {
        assert!(EventReference::default().is_null());
        assert!(!EventReference::new(EventId::new(Uuid::new_v4())).is_null());
    }
}
