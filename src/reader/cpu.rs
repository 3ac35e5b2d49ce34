//! per-core cpu time and system activity, from `/proc/stat`.

use {
    super::{Context, Reader, ReaderKind, read},
    crate::{
        delta::{
            FieldKind::{Counter, Gauge},
            FieldSpec,
        },
        error::ReaderError,
        sample::{Entity, EntityId, RawSample},
    },
    std::{num::ParseIntError, ops::Not, str::FromStr},
    thiserror::Error,
    tracing::debug,
};

pub use self::{cpu_time::CpuTime, user_hz::UserHz};

mod cpu_time;
mod user_hz;


/// reads `/proc/stat`.
#[derive(Debug, Default)]
pub struct CpuReader;

static FIELDS: FieldSpec = FieldSpec::new(&[
    ("user", Counter),
    ("nice", Counter),
    ("system", Counter),
    ("idle", Counter),
    ("iowait", Counter),
    ("irq", Counter),
    ("softirq", Counter),
    ("steal", Counter),
    ("context_switches", Counter),
    ("forks", Counter),
    ("running", Gauge),
    ("blocked", Gauge),
]);

/// an entry in the `/proc/stat` kernel statistics table.
///
/// see `proc_stat(5)` for more information.
#[derive(Debug, Eq, PartialEq)]
pub enum Entry {
    /// the amount of time that the system ("cpu" line) spent in various states.
    AllCpu { time: CpuTime },
    /// the amount of time that a specific cpu ("cpuN" line) spent in various states.
    Cpu { id: CpuId, time: CpuTime },
    /// the number of pages the system paged in and the number that were paged out (from disk).
    Page,
    /// the number of swap pages that have been brought in and out.
    Swap,
    /// this line shows counts of interrupts serviced since boot time.
    Intr,
    DiskIo,
    /// the number of context switches that the system underwent.
    Ctxt(u64),
    Btime,
    /// the number of forks since boot.
    Processes(u64),
    /// the number of processes in runnable state.
    ProcsRunning(u64),
    /// the number of processes blocked waiting for i/o to complete.
    ProcsBlocked(u64),
    /// this line shows the number of softirq for all cpus.
    SoftIrq,
}

#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
pub struct CpuId(u32);

#[derive(Debug, Eq, PartialEq, Error)]
pub enum EntryParseError {
    #[error("empty entry")]
    Empty,
    #[error("unrecognized entry kind: {kind}")]
    UnrecognizedEntry { kind: String },
    #[error("invalid cpu id: {0}")]
    CpuIdParse(#[source] ParseIntError),
    #[error("invalid time value: {0}")]
    UserHzParse(#[source] ParseIntError),
    #[error("invalid counter value: {0}")]
    CounterParse(#[source] ParseIntError),
    #[error("expected at least {len} cpu times, found {0}", len = CpuTime::LEN)]
    CpuTime(usize),
}

enum Either<'a> {
    Cpu(&'a str),
    Entry(Entry),
}

impl CpuReader {
    /// the entity aggregating every cpu.
    pub const ALL: &str = "all";
    /// the entity carrying system-wide scheduler activity.
    pub const SYSTEM: &str = "system";

    const PATH: &str = "/proc/stat";
}

impl Reader for CpuReader {
    fn kind(&self) -> ReaderKind {
        ReaderKind::Cpu
    }

    fn fields(&self) -> &'static FieldSpec {
        &FIELDS
    }

    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError> {
        let time = ctx.clock.now();
        let stats = read(ctx, Self::PATH)?;

        let mut sample = RawSample::new(time);
        let mut system = Entity::new();
        for line in stats.lines() {
            match line.parse::<Entry>() {
                Ok(Entry::AllCpu { time }) => sample.insert(Self::ALL, time.into()),
                Ok(Entry::Cpu { id, time }) => sample.insert(id, time.into()),
                Ok(Entry::Ctxt(count)) => system.set("context_switches", count),
                Ok(Entry::Processes(count)) => system.set("forks", count),
                Ok(Entry::ProcsRunning(count)) => system.set("running", count),
                Ok(Entry::ProcsBlocked(count)) => system.set("blocked", count),
                Ok(_) | Err(EntryParseError::Empty) => {}
                // newer kernels may add entries.
                Err(EntryParseError::UnrecognizedEntry { .. }) => {}
                Err(error) => debug!(%error, "skipping malformed /proc/stat entry"),
            }
        }
        if system.is_empty().not() {
            sample.insert(Self::SYSTEM, system);
        }

        Ok(sample)
    }
}

// === impl Entry ===

impl FromStr for Entry {
    type Err = EntryParseError;
    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let tokens = entry.split_whitespace().collect::<Vec<_>>();
        let [kind, tokens @ ..] = tokens.as_slice() else {
            return Err(EntryParseError::Empty);
        };

        let id = match Self::parse_entry_kind(kind, tokens)? {
            Either::Cpu(cpu) => Self::parse_cpu_id(cpu)?,
            Either::Entry(entry) => return Ok(entry),
        };

        let time = tokens
            .iter()
            .map(|token| token.parse::<UserHz>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(EntryParseError::UserHzParse)
            .and_then(CpuTime::try_from)?;

        Ok(if let Some(id) = id {
            Self::Cpu { id, time }
        } else {
            Self::AllCpu { time }
        })
    }
}

impl Entry {
    fn parse_entry_kind<'a>(kind: &'a str, values: &[&str]) -> Result<Either<'a>, EntryParseError> {
        use Entry::*;

        let count = || -> Result<u64, EntryParseError> {
            let first = values.first().copied().unwrap_or_default();
            first.parse().map_err(EntryParseError::CounterParse)
        };

        Ok(match kind {
            "page" => Either::Entry(Page),
            "swap" => Either::Entry(Swap),
            "intr" => Either::Entry(Intr),
            "disk_io" => Either::Entry(DiskIo),
            "ctxt" => Either::Entry(Ctxt(count()?)),
            "btime" => Either::Entry(Btime),
            "processes" => Either::Entry(Processes(count()?)),
            "procs_running" => Either::Entry(ProcsRunning(count()?)),
            "procs_blocked" => Either::Entry(ProcsBlocked(count()?)),
            "softirq" => Either::Entry(SoftIrq),
            cpu => Either::Cpu(cpu),
        })
    }

    fn parse_cpu_id(token: &str) -> Result<Option<CpuId>, EntryParseError> {
        use EntryParseError::{CpuIdParse, UnrecognizedEntry};

        // strip the token of its "cpu" prefix.
        let suffix = token.strip_prefix("cpu").ok_or_else(|| UnrecognizedEntry {
            kind: token.to_owned(),
        })?;

        // if there is no suffix, this is the aggregate of every cpu.
        if suffix.is_empty() {
            return Ok(None);
        }

        suffix
            .parse::<u32>()
            .map(CpuId)
            .map(Some)
            .map_err(CpuIdParse)
    }
}

// === impl CpuId ===

impl From<CpuId> for EntityId {
    fn from(CpuId(id): CpuId) -> Self {
        Self::Index(id)
    }
}
