//! `/proc/meminfo`.

use {
    super::{Context, Reader, ReaderKind, number, read, tokens},
    crate::{
        delta::{FieldKind::Gauge, FieldSpec},
        error::{ParseError, ReaderError},
        sample::{Entity, RawSample},
    },
    tracing::debug,
};

/// reads system memory usage.
#[derive(Debug, Default)]
pub struct MemoryReader;

static FIELDS: FieldSpec = FieldSpec::new(&[
    ("total", Gauge),
    ("free", Gauge),
    ("available", Gauge),
    ("buffers", Gauge),
    ("cached", Gauge),
    ("active", Gauge),
    ("inactive", Gauge),
    ("dirty", Gauge),
    ("writeback", Gauge),
    ("shmem", Gauge),
    ("slab_reclaimable", Gauge),
]);

/// meminfo keys, and the fields they populate.
const KEYS: &[(&str, &str)] = &[
    ("MemTotal", "total"),
    ("MemFree", "free"),
    ("MemAvailable", "available"),
    ("Buffers", "buffers"),
    ("Cached", "cached"),
    ("Active", "active"),
    ("Inactive", "inactive"),
    ("Dirty", "dirty"),
    ("Writeback", "writeback"),
    ("Shmem", "shmem"),
    ("SReclaimable", "slab_reclaimable"),
];

impl MemoryReader {
    const PATH: &str = "/proc/meminfo";
}

impl Reader for MemoryReader {
    fn kind(&self) -> ReaderKind {
        ReaderKind::Memory
    }

    fn fields(&self) -> &'static FieldSpec {
        &FIELDS
    }

    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError> {
        let time = ctx.clock.now();
        let text = read(ctx, Self::PATH)?;

        let mut sample = RawSample::new(time);
        match parse(&text) {
            Ok(ram) => sample.insert("ram", ram),
            Err(error) => debug!(%error, "skipping malformed meminfo"),
        }
        Ok(sample)
    }
}

/// parses meminfo into one entity, in bytes.
fn parse(text: &str) -> Result<Entity, ParseError> {
    let mut ram = Entity::new();
    for line in text.lines() {
        let tokens = tokens(line);
        let [key, value, ..] = tokens[..] else {
            continue;
        };
        let Some(&(_, field)) = KEYS.iter().find(|(k, _)| key.strip_suffix(':') == Some(*k))
        else {
            continue;
        };
        ram.set(field, number(field, value)?.saturating_mul(1024));
    }

    for required in ["total", "free"] {
        if ram.get(required).is_none() {
            return Err(ParseError::MissingField(required));
        }
    }
    Ok(ram)
}
