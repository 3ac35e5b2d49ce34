//! block device i/o, from `/proc/diskstats`.

use {
    super::{Context, Reader, ReaderKind, number, read, tokens},
    crate::{
        delta::{
            FieldKind::{Counter, Gauge},
            FieldSpec,
        },
        error::{ParseError, ReaderError},
        sample::{Entity, RawSample},
    },
    std::{collections::BTreeSet, path::Path},
    tracing::debug,
};

/// reads whole-disk i/o counters.
#[derive(Debug, Default)]
pub struct BlockReader;

static FIELDS: FieldSpec = FieldSpec::new(&[
    ("reads", Counter),
    ("writes", Counter),
    ("read_bytes", Counter),
    ("written_bytes", Counter),
    ("busy_ms", Counter),
    ("weighted_ms", Counter),
    ("in_flight", Gauge),
]);

/// diskstats always counts 512-byte sectors, whatever the device's own sector size.
const SECTOR_SIZE: u64 = 512;

/// devices that are never worth a row.
const SKIPPED: [&str; 2] = ["loop", "ram"];

impl BlockReader {
    const PATH: &str = "/proc/diskstats";
    const DISKS: &str = "/sys/block";
}

impl Reader for BlockReader {
    fn kind(&self) -> ReaderKind {
        ReaderKind::Block
    }

    fn fields(&self) -> &'static FieldSpec {
        &FIELDS
    }

    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError> {
        let time = ctx.clock.now();
        let text = read(ctx, Self::PATH)?;
        let disks = ctx
            .fs
            .read_dir(Path::new(Self::DISKS))
            .ok()
            .map(BTreeSet::from_iter);

        let mut sample = RawSample::new(time);
        let mut kept = Vec::<String>::new();
        for line in text.lines() {
            let (name, stats) = match parse_line(line) {
                Ok(device) => device,
                Err(error) => {
                    debug!(%line, %error, "skipping malformed diskstats line");
                    continue;
                }
            };

            if SKIPPED.iter().any(|prefix| name.starts_with(prefix)) {
                continue;
            }
            let whole = match &disks {
                Some(disks) => disks.contains(name),
                None => !is_partition_of_any(name, &kept),
            };
            if !whole {
                continue;
            }

            kept.push(name.to_owned());
            sample.insert(name, stats);
        }

        Ok(sample)
    }
}

/// parses one line of diskstats.
///
/// see `Documentation/admin-guide/iostats.rst`. the first fourteen fields have been stable since
/// linux 2.6; discard and flush counters that follow are ignored.
fn parse_line(line: &str) -> Result<(&str, Entity), ParseError> {
    let tokens = tokens(line);
    let expected = 14;
    if tokens.len() < expected {
        return Err(ParseError::Truncated {
            expected,
            found: tokens.len(),
        });
    }

    let field = |field: &'static str, index: usize| number(field, tokens[index]);
    let stats = Entity::new()
        .with("reads", field("reads", 3)?)
        .with("read_bytes", field("read_bytes", 5)?.saturating_mul(SECTOR_SIZE))
        .with("writes", field("writes", 7)?)
        .with("written_bytes", field("written_bytes", 9)?.saturating_mul(SECTOR_SIZE))
        .with("in_flight", field("in_flight", 11)?)
        .with("busy_ms", field("busy_ms", 12)?)
        .with("weighted_ms", field("weighted_ms", 13)?);

    Ok((tokens[2], stats))
}

/// guesses whether `name` is a partition (`sda1`, `nvme0n1p2`) of an already kept disk.
fn is_partition_of_any(name: &str, disks: &[String]) -> bool {
    disks.iter().any(|disk| {
        name.strip_prefix(disk.as_str()).is_some_and(|rest| {
            let digits = rest.strip_prefix('p').unwrap_or(rest);
            !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
        })
    })
}
