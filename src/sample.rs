//! raw samples of kernel counters.

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    time::Instant,
};

/// identifies one entity within a reader's sample: a cpu core, a device, a process, ...
///
/// indices order before names, so every panel has a deterministic row order.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum EntityId {
    Index(u32),
    Name(String),
}

/// the fields observed for one entity.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Entity {
    fields: BTreeMap<&'static str, u64>,
    /// display text, such as a command name. never part of a delta.
    label: Option<String>,
}

/// every entity a reader observed at one moment in time.
#[derive(Clone, Debug)]
pub struct RawSample {
    time: Instant,
    entities: BTreeMap<EntityId, Entity>,
}

// === impl EntityId ===

impl Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

impl From<u32> for EntityId {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for EntityId {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for EntityId {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

// === impl Entity ===

impl Entity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &'static str, value: u64) -> Self {
        self.set(field, value);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn set(&mut self, field: &'static str, value: u64) {
        self.fields.insert(field, value);
    }

    pub fn get(&self, field: &str) -> Option<u64> {
        self.fields.get(field).copied()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// === impl RawSample ===

impl RawSample {
    /// returns an empty sample taken at `time`.
    pub fn new(time: Instant) -> Self {
        Self {
            time,
            entities: BTreeMap::new(),
        }
    }

    pub fn with(mut self, id: impl Into<EntityId>, entity: Entity) -> Self {
        self.insert(id, entity);
        self
    }

    /// adds an entity. a later entity with the same id replaces the earlier one.
    pub fn insert(&mut self, id: impl Into<EntityId>, entity: Entity) {
        self.entities.insert(id.into(), entity);
    }

    pub fn time(&self) -> Instant {
        self.time
    }

    pub fn get(&self, id: &EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (&EntityId, &Entity)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
