//! swap devices, paging activity, and zram compression.

use {
    super::{Context, Reader, ReaderKind, number, read, tokens, unescape},
    crate::{
        delta::{
            FieldKind::{Counter, Gauge},
            FieldSpec,
        },
        error::{ParseError, ReaderError},
        sample::{Entity, RawSample},
    },
    std::path::Path,
    tracing::debug,
};

/// reads `/proc/swaps`, the paging counters of `/proc/vmstat`, and zram's `mm_stat`.
#[derive(Debug)]
pub struct SwapReader {
    page_size: u64,
}

static FIELDS: FieldSpec = FieldSpec::new(&[
    ("size", Gauge),
    ("used", Gauge),
    ("compressed", Gauge),
    ("original", Gauge),
    ("swapped_in", Counter),
    ("swapped_out", Counter),
]);

impl SwapReader {
    /// the entity carrying system-wide paging counters.
    pub const PAGING: &str = "paging";

    const SWAPS: &str = "/proc/swaps";
    const VMSTAT: &str = "/proc/vmstat";

    pub fn new(page_size: u64) -> Self {
        Self { page_size }
    }
}

impl Reader for SwapReader {
    fn kind(&self) -> ReaderKind {
        ReaderKind::Swap
    }

    fn fields(&self) -> &'static FieldSpec {
        &FIELDS
    }

    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError> {
        let Self { page_size } = *self;
        let time = ctx.clock.now();
        let swaps = read(ctx, Self::SWAPS);
        let vmstat = read(ctx, Self::VMSTAT);

        let mut sample = RawSample::new(time);
        let (swaps, vmstat) = match (swaps, vmstat) {
            (Err(error), Err(_)) => return Err(error),
            (swaps, vmstat) => (swaps.ok(), vmstat.ok()),
        };

        for line in swaps.iter().flat_map(|swaps| swaps.lines().skip(1)) {
            match parse_device(line) {
                Ok((name, mut device)) => {
                    if name.starts_with("zram") {
                        add_compression(ctx, &name, &mut device);
                    }
                    sample.insert(name, device);
                }
                Err(error) => debug!(%error, "skipping malformed swap device"),
            }
        }

        if let Some(vmstat) = vmstat {
            match parse_paging(&vmstat, page_size) {
                Ok(paging) => sample.insert(Self::PAGING, paging),
                Err(error) => debug!(%error, "skipping malformed paging counters"),
            }
        }

        Ok(sample)
    }
}

/// parses one line of `/proc/swaps`: `Filename Type Size Used Priority`, sizes in kibibytes.
fn parse_device(line: &str) -> Result<(String, Entity), ParseError> {
    let tokens = tokens(line);
    let [filename, _kind, size, used, ..] = tokens[..] else {
        return Err(ParseError::Truncated {
            expected: 4,
            found: tokens.len(),
        });
    };

    let path = unescape(filename);
    let name = Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or(path);

    let device = Entity::new()
        .with("size", number("size", size)?.saturating_mul(1024))
        .with("used", number("used", used)?.saturating_mul(1024));
    Ok((name, device))
}

/// adds the figures of a zram device, if it exposes them.
fn add_compression(ctx: &Context<'_>, name: &str, device: &mut Entity) {
    let path = format!("/sys/block/{name}/mm_stat");
    let Ok(text) = ctx.fs.read_to_string(Path::new(&path)) else {
        return;
    };
    // orig_data_size compr_data_size mem_used_total ...
    let tokens = tokens(&text);
    if let [original, _compressed, used, ..] = tokens[..] {
        if let (Ok(original), Ok(used)) = (original.parse(), used.parse()) {
            device.set("original", original);
            device.set("compressed", used);
        }
    }
}

/// parses the swap-in and swap-out page counters.
fn parse_paging(vmstat: &str, page_size: u64) -> Result<Entity, ParseError> {
    let mut paging = Entity::new();
    for line in vmstat.lines() {
        let tokens = tokens(line);
        let [key, value, ..] = tokens[..] else {
            continue;
        };
        let field = match key {
            "pswpin" => "swapped_in",
            "pswpout" => "swapped_out",
            _ => continue,
        };
        paging.set(field, number(field, value)?.saturating_mul(page_size));
    }

    if paging.is_empty() {
        return Err(ParseError::MissingField("pswpin"));
    }
    Ok(paging)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            reader::sample_mock,
            sample::EntityId,
            source::{MockFs, MockHelper},
        },
    };

    const SWAPS: &str = "\
Filename                                Type            Size            Used            Priority
/dev/zram0                              partition       8388604         1048576         100
/swap\\040file                          file            2097148         0               -2
";

    const VMSTAT: &str = "\
nr_free_pages 123
pswpin 10
pswpout 20
";

    fn fs() -> MockFs {
        MockFs::default()
            .with("/proc/swaps", SWAPS)
            .with("/proc/vmstat", VMSTAT)
            .with(
                "/sys/block/zram0/mm_stat",
                "1073741824 268435456 300000000 0 300000000 12 0 0 0\n",
            )
    }

    #[test]
    fn reads_devices_and_paging() {
        let sample = sample_mock(&mut SwapReader::new(4096), &fs(), &MockHelper::default()).unwrap();

        let zram = sample.get(&EntityId::from("zram0")).unwrap();
        assert_eq!(zram.get("size"), Some(8388604 * 1024));
        assert_eq!(zram.get("used"), Some(1048576 * 1024));
        assert_eq!(zram.get("original"), Some(1073741824));
        assert_eq!(zram.get("compressed"), Some(300000000));

        let file = sample.get(&EntityId::from("swap file")).unwrap();
        assert_eq!(file.get("used"), Some(0));
        assert_eq!(file.get("compressed"), None);

        let paging = sample.get(&EntityId::from(SwapReader::PAGING)).unwrap();
        assert_eq!(paging.get("swapped_in"), Some(10 * 4096));
        assert_eq!(paging.get("swapped_out"), Some(20 * 4096));
    }

    #[test]
    fn no_swap_configured() {
        let fs = MockFs::default()
            .with("/proc/swaps", "Filename Type Size Used Priority\n")
            .with("/proc/vmstat", VMSTAT);
        let sample = sample_mock(&mut SwapReader::new(4096), &fs, &MockHelper::default()).unwrap();
        assert_eq!(sample.len(), 1);
    }

    #[test]
    fn truncated_device_line_is_dropped() {
        let fs = fs().with("/proc/swaps", "header\n/dev/sda2 partition 100\n");
        let sample = sample_mock(&mut SwapReader::new(4096), &fs, &MockHelper::default()).unwrap();
        assert!(sample.get(&EntityId::from("sda2")).is_none());
        assert!(sample.get(&EntityId::from(SwapReader::PAGING)).is_some());
    }

    #[test]
    fn unreadable_when_both_sources_are_missing() {
        let err = sample_mock(
            &mut SwapReader::new(4096),
            &MockFs::default(),
            &MockHelper::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ReaderError::Unreadable { .. }));
    }
}
