//! counter readers.
//!
//! each reader turns one kernel source into a [`RawSample`]: a mapping of entities to named
//! integer fields. the delta engine and the panels need no knowledge of where a sample came from.

use {
    crate::{
        config::Settings,
        delta::FieldSpec,
        error::{ParseError, ReaderError},
        sample::RawSample,
        source::{Clock, Filesystem, Helper},
    },
    std::{
        fmt::{self, Display},
        path::Path,
    },
};

pub use self::{
    block::BlockReader,
    cache::CacheReader,
    cpu::{CpuReader, UserHz},
    filesystem::FilesystemReader,
    memory::MemoryReader,
    network::NetworkReader,
    pressure::PressureReader,
    process::ProcessReader,
    sensors::SensorsReader,
    swap::SwapReader,
};

mod block;
mod cache;
mod cpu;
mod filesystem;
mod memory;
mod network;
mod pressure;
mod process;
mod sensors;
mod swap;

/// produces one sample of a kernel source per call.
pub trait Reader {
    fn kind(&self) -> ReaderKind;

    /// the fields this reader's entities carry.
    fn fields(&self) -> &'static FieldSpec;

    /// reads the source.
    ///
    /// the sample's timestamp is taken from the context's clock just before the source is read.
    /// entities that cannot be parsed are left out of the sample.
    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError>;
}

/// the outside world, as seen by a reader.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub fs: &'a dyn Filesystem,
    pub clock: &'a dyn Clock,
    pub helper: &'a dyn Helper,
}

/// the kinds of readers.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ReaderKind {
    Memory,
    Swap,
    Pressure,
    Cpu,
    Network,
    Block,
    Filesystem,
    Sensors,
    Cache,
    Process,
}

/// returns the readers the monitor runs with.
pub fn defaults(settings: &Settings) -> Vec<Box<dyn Reader>> {
    let page_size = page_size();

    let mut readers: Vec<Box<dyn Reader>> = vec![
        Box::new(MemoryReader),
        Box::new(SwapReader::new(page_size)),
        Box::new(PressureReader),
        Box::new(CpuReader),
        Box::new(NetworkReader::new(settings.ignored_interfaces.clone())),
        Box::new(BlockReader),
        Box::new(FilesystemReader),
        Box::new(SensorsReader),
    ];
    if let Some(command) = &settings.cache_helper {
        readers.push(Box::new(CacheReader::new(command, settings.helper_budget)));
    }
    readers.push(Box::new(ProcessReader::new(UserHz::frequency(), page_size)));

    readers
}

/// returns the size of a memory page in bytes.
pub fn page_size() -> u64 {
    const FALLBACK: u64 = 4096;
    // SAFETY: `sysconf` has no memory safety preconditions.
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    u64::try_from(size)
        .ok()
        .filter(|size| *size > 0)
        .unwrap_or(FALLBACK)
}

// === impl ReaderKind ===

impl ReaderKind {
    /// returns true if the monitor cannot start without this reader.
    pub fn is_mandatory(self) -> bool {
        matches!(self, Self::Memory | Self::Cpu)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Swap => "swap",
            Self::Pressure => "pressure",
            Self::Cpu => "cpu",
            Self::Network => "network",
            Self::Block => "block",
            Self::Filesystem => "filesystem",
            Self::Sensors => "sensors",
            Self::Cache => "cache",
            Self::Process => "process",
        }
    }
}

impl Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// === shared parsing helpers ===

/// reads a kernel file, mapping failure to an unreadable source.
fn read(ctx: &Context<'_>, path: impl AsRef<Path>) -> Result<String, ReaderError> {
    let path = path.as_ref();
    ctx.fs
        .read_to_string(path)
        .map_err(|error| ReaderError::unreadable(path, error))
}

/// splits a line on runs of whitespace.
fn tokens(line: &str) -> Vec<&str> {
    line.split_whitespace().collect()
}

/// parses one decimal field.
fn number(field: &'static str, token: &str) -> Result<u64, ParseError> {
    token.parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: token.to_owned(),
    })
}

/// decodes the octal escapes (`\040` for a space) the kernel uses in mount tables and swap lists.
fn unescape(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escape = bytes.get(i + 1..i + 4).filter(|_| bytes[i] == b'\\');
        match escape.and_then(|digits| std::str::from_utf8(digits).ok()) {
            Some(digits) if digits.bytes().all(|b| (b'0'..=b'7').contains(&b)) => {
                match u8::from_str_radix(digits, 8) {
                    Ok(byte) => out.push(byte),
                    Err(_) => out.extend_from_slice(&bytes[i..i + 4]),
                }
                i += 4;
            }
            _ => {
                out.push(bytes[i]);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// samples a reader against in-memory sources.
#[cfg(test)]
fn sample_mock(
    reader: &mut dyn Reader,
    fs: &crate::source::MockFs,
    helper: &crate::source::MockHelper,
) -> Result<RawSample, ReaderError> {
    let clock = crate::source::MockClock::default();
    reader.sample(&Context {
        fs,
        clock: &clock,
        helper,
    })
}
