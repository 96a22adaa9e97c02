//! Parameter slots and the write-behind cache used while an emitter is culled.

use crate::backend::{AudioBackend, InstanceHandle};
use crate::description::{EventDescription, ParameterId};

/// A named float parameter with its resolved runtime id.
///
/// `id` is `None` until the event description resolves the name. Unresolved
/// parameters are applied by name instead.
#[derive(Clone, Debug, PartialEq)]
pub struct ParamRef {
    pub name: String,
    pub id: Option<ParameterId>,
    pub value: f32,
}

impl ParamRef {
    pub fn new(name: impl Into<String>, value: f32) -> Self {
        Self {
            name: name.into(),
            id: None,
            value,
        }
    }

    pub fn matches(&self, key: &ParameterKey) -> bool {
        match key {
            ParameterKey::Name(name) => self.name == *name,
            ParameterKey::Id(id) => self.id == Some(*id),
        }
    }

    /// Re-resolves the runtime id from `description`. Returns `false` if the name is unknown.
    pub fn resolve(&mut self, description: &EventDescription) -> bool {
        self.id = description.parameter_by_name(&self.name).map(|p| p.id);
        self.id.is_some()
    }

    /// Pushes the value to `instance`, by id when resolved and by name otherwise.
    pub fn apply(&self, backend: &dyn AudioBackend, instance: InstanceHandle) {
        let result = match self.id {
            Some(id) => backend.set_parameter_by_id(instance, id, self.value, false),
            None => backend.set_parameter_by_name(instance, &self.name, self.value, false),
        };
        if let Err(e) = result {
            log::warn!(
                "Failed to apply parameter '{}' = {} to {}: {}",
                self.name,
                self.value,
                instance,
                e
            );
        }
    }
}

/// How a caller addresses a parameter.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ParameterKey {
    Name(String),
    Id(ParameterId),
}

impl ParameterKey {
    /// Builds the cache entry for this key, filling in whatever `description` knows.
    pub(crate) fn to_param(&self, description: Option<&EventDescription>, value: f32) -> ParamRef {
        match self {
            ParameterKey::Name(name) => ParamRef {
                id: description
                    .and_then(|d| d.parameter_by_name(name))
                    .map(|p| p.id),
                name: name.clone(),
                value,
            },
            ParameterKey::Id(id) => ParamRef {
                name: description
                    .and_then(|d| d.parameter_by_id(*id))
                    .map(|p| p.name.clone())
                    .unwrap_or_default(),
                id: Some(*id),
                value,
            },
        }
    }
}

impl std::fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterKey::Name(name) => write!(f, "'{}'", name),
            ParameterKey::Id(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for ParameterKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ParameterKey {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<ParameterId> for ParameterKey {
    fn from(id: ParameterId) -> Self {
        Self::Id(id)
    }
}

/// Last-written parameter values, replayed into every new instance.
///
/// Entries are keyed by name or id with a linear scan; events carry a handful
/// of parameters at most.
#[derive(Clone, Debug, Default)]
pub struct ParameterCache {
    entries: Vec<ParamRef>,
}

impl ParameterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &ParameterKey) -> Option<&ParamRef> {
        self.entries.iter().find(|p| p.matches(key))
    }

    pub fn contains(&self, key: &ParameterKey) -> bool {
        self.get(key).is_some()
    }

    /// Updates the entry for `key`, or inserts the one built by `make_entry`.
    pub fn record(&mut self, key: &ParameterKey, value: f32, make_entry: impl FnOnce() -> ParamRef) {
        match self.entries.iter_mut().find(|p| p.matches(key)) {
            Some(entry) => entry.value = value,
            None => {
                let mut entry = make_entry();
                entry.value = value;
                self.entries.push(entry);
            }
        }
    }

    /// Applies every cached value to `instance`. Entries are left in place.
    pub fn replay_into(&self, backend: &dyn AudioBackend, instance: InstanceHandle) {
        if !self.entries.is_empty() {
            log::debug!(
                "Replaying {} cached parameter(s) into {}",
                self.entries.len(),
                instance
            );
        }
        for entry in &self.entries {
            entry.apply(backend, instance);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamRef> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::description::{EventDescription, EventId};
    use crate::mock::MockBackend;

    fn description() -> EventDescription {
        EventDescription::new(EventId::new(uuid::Uuid::new_v4()))
            .parameter("rpm", ParameterId(1))
            .parameter("load", ParameterId(2))
    }

    #[test]
    fn record_keeps_last_value_per_key() {
        let desc = description();
        let mut cache = ParameterCache::new();
        let key = ParameterKey::from("rpm");

        cache.record(&key, 100.0, || key.to_param(Some(&desc), 0.0));
        cache.record(&key, 250.0, || panic!("entry already exists"));

        assert_eq!(cache.len(), 1);
        let entry = cache.get(&key).unwrap();
        assert_eq!(entry.value, 250.0);
        assert_eq!(entry.id, Some(ParameterId(1)));
    }

    #[test]
    fn id_and_name_address_the_same_entry() {
        let desc = description();
        let mut cache = ParameterCache::new();
        let by_id = ParameterKey::Id(ParameterId(2));

        cache.record(&by_id, 0.5, || by_id.to_param(Some(&desc), 0.0));
        cache.record(&ParameterKey::from("load"), 0.75, || {
            panic!("name lookup should find the id entry")
        });

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&by_id).unwrap().value, 0.75);
        assert_eq!(cache.get(&by_id).unwrap().name, "load");
    }

    #[test]
    fn unknown_name_is_cached_without_an_id() {
        let desc = description();
        let key = ParameterKey::from("missing");
        let entry = key.to_param(Some(&desc), 3.0);

        assert_eq!(entry.name, "missing");
        assert_eq!(entry.id, None);
        assert_eq!(entry.value, 3.0);
    }

    #[test]
    fn replay_applies_every_entry_and_keeps_them() {
        let backend = MockBackend::new();
        let desc = description();
        let reference = backend.register_event("event:/engine", desc.clone());
        let instance = backend.create_instance(reference.id).unwrap();

        let mut cache = ParameterCache::new();
        for (name, value) in [("rpm", 3000.0), ("load", 0.25)] {
            let key = ParameterKey::from(name);
            cache.record(&key, value, || key.to_param(Some(&desc), 0.0));
        }

        cache.replay_into(&backend, instance);

        assert_eq!(backend.parameter(instance, "rpm"), Some(3000.0));
        assert_eq!(backend.parameter(instance, "load"), Some(0.25));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn resolve_reports_unknown_names() {
        let desc = description();
        let mut known = ParamRef::new("rpm", 1.0);
        let mut unknown = ParamRef::new("gear", 2.0);

        assert!(known.resolve(&desc));
        assert_eq!(known.id, Some(ParameterId(1)));
        assert!(!unknown.resolve(&desc));
        assert_eq!(unknown.id, None);
    }
}
