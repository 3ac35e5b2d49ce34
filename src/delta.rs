//! turns pairs of raw samples into rates and instantaneous values.

use {
    crate::sample::{EntityId, RawSample},
    std::{collections::BTreeMap, time::Duration},
};

/// how a field's values relate over time.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// a monotonically increasing count, reported as a per-second rate.
    Counter,
    /// a point-in-time value, reported as-is.
    Gauge,
}

/// the fields a reader produces, and their kinds.
#[derive(Debug)]
pub struct FieldSpec(&'static [(&'static str, FieldKind)]);

/// a computed value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DeltaValue {
    /// per-second rate of a counter.
    Rate(f64),
    /// the current value of a gauge.
    Instant(u64),
}

/// one computed value, flattened out of a [`DeltaSet`].
#[derive(Clone, Debug, PartialEq)]
pub struct DeltaRecord {
    pub entity: EntityId,
    pub field: &'static str,
    pub value: DeltaValue,
}

/// the computed values of one entity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EntityDelta {
    label: Option<String>,
    values: BTreeMap<&'static str, DeltaValue>,
}

/// the computed values of one reader for one tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DeltaSet {
    /// the measured time between the two samples, if there were two.
    elapsed: Option<Duration>,
    entities: BTreeMap<EntityId, EntityDelta>,
}

/// computes the delta set of `current` against `previous`.
///
/// counters become rates over the time measured between the two samples' own timestamps, and only
/// where both samples carry the field. a counter that went backwards was reset, so its current
/// value is the amount counted since. gauges pass through regardless of history. undeclared
/// fields are ignored, and entities left without any value are omitted.
pub fn compute_deltas(
    previous: Option<&RawSample>,
    current: &RawSample,
    fields: &FieldSpec,
) -> DeltaSet {
    let elapsed = previous
        .and_then(|previous| current.time().checked_duration_since(previous.time()))
        .filter(|elapsed| !elapsed.is_zero());
    let seconds = elapsed.as_ref().map(Duration::as_secs_f64);

    let mut entities = BTreeMap::new();
    for (id, entity) in current.entities() {
        let before = previous.and_then(|previous| previous.get(id));

        let mut values = BTreeMap::new();
        for &(field, kind) in fields.iter() {
            let Some(now) = entity.get(field) else {
                continue;
            };
            match kind {
                FieldKind::Gauge => {
                    values.insert(field, DeltaValue::Instant(now));
                }
                FieldKind::Counter => {
                    let then = before.and_then(|before| before.get(field));
                    if let (Some(then), Some(seconds)) = (then, seconds) {
                        values.insert(field, DeltaValue::Rate(rate(then, now, seconds)));
                    }
                }
            }
        }

        if !values.is_empty() {
            let label = entity.label().map(str::to_owned);
            entities.insert(id.clone(), EntityDelta { label, values });
        }
    }

    DeltaSet { elapsed, entities }
}

fn rate(then: u64, now: u64, seconds: f64) -> f64 {
    let counted = now.checked_sub(then).unwrap_or(now);
    counted as f64 / seconds
}

// === impl FieldSpec ===

impl FieldSpec {
    pub const fn new(fields: &'static [(&'static str, FieldKind)]) -> Self {
        Self(fields)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, FieldKind)> {
        self.0.iter()
    }

    #[cfg(test)]
    pub fn kind(&self, field: &str) -> Option<FieldKind> {
        self.0.iter().find(|(name, _)| *name == field).map(|&(_, kind)| kind)
    }
}

// === impl EntityDelta ===

impl EntityDelta {
    /// returns the rate of a counter.
    pub fn rate(&self, field: &str) -> Option<f64> {
        match self.values.get(field) {
            Some(DeltaValue::Rate(rate)) => Some(*rate),
            _ => None,
        }
    }

    /// returns the value of a gauge.
    pub fn value(&self, field: &str) -> Option<u64> {
        match self.values.get(field) {
            Some(DeltaValue::Instant(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// === impl DeltaSet ===

impl DeltaSet {
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn get(&self, id: &EntityId) -> Option<&EntityDelta> {
        self.entities.get(id)
    }

    pub fn entities(&self) -> impl Iterator<Item = (&EntityId, &EntityDelta)> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// flattens the set into individual records.
    pub fn records(&self) -> impl Iterator<Item = DeltaRecord> + '_ {
        self.entities.iter().flat_map(|(entity, delta)| {
            delta.values.iter().map(|(&field, &value)| DeltaRecord {
                entity: entity.clone(),
                field,
                value,
            })
        })
    }
}
