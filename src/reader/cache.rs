//! lvmcache devices, reported by an external helper.

use {
    super::{Context, Reader, ReaderKind, number},
    crate::{
        delta::{
            FieldKind::{Counter, Gauge},
            FieldSpec,
        },
        error::{HelperError, ParseError, ReaderError},
        sample::{Entity, RawSample},
    },
    std::time::Duration,
    tracing::debug,
};

/// runs a helper that lists cache devices, one comma-separated line each.
///
/// listing lvm volumes needs privileges, hence the default command goes through `sudo -n`, which
/// fails rather than prompts.
#[derive(Debug)]
pub struct CacheReader {
    program: String,
    args: Vec<String>,
    budget: Duration,
}

static FIELDS: FieldSpec = FieldSpec::new(&[
    ("total_blocks", Gauge),
    ("used_blocks", Gauge),
    ("dirty_blocks", Gauge),
    ("read_hits", Counter),
    ("read_misses", Counter),
    ("write_hits", Counter),
    ("write_misses", Counter),
]);

/// the numeric columns of the helper's output, after the volume group and logical volume names.
const COLUMNS: [&str; 7] = [
    "total_blocks",
    "used_blocks",
    "dirty_blocks",
    "read_hits",
    "read_misses",
    "write_hits",
    "write_misses",
];

impl CacheReader {
    pub fn new(command: &[String], budget: Duration) -> Self {
        let (program, args) = match command {
            [program, args @ ..] => (program.clone(), args.to_vec()),
            [] => (String::new(), Vec::new()),
        };
        Self {
            program,
            args,
            budget,
        }
    }

    /// the command run unless another is configured.
    pub fn default_command() -> Vec<String> {
        let columns = [
            "vg_name",
            "lv_name",
            "cache_total_blocks",
            "cache_used_blocks",
            "cache_dirty_blocks",
            "cache_read_hits",
            "cache_read_misses",
            "cache_write_hits",
            "cache_write_misses",
        ]
        .join(",");
        [
            "sudo",
            "-n",
            "lvs",
            "--noheadings",
            "--nosuffix",
            "--units",
            "b",
            "--separator",
            ",",
            "-o",
            columns.as_str(),
        ]
        .into_iter()
        .map(str::to_owned)
        .collect()
    }
}

impl Reader for CacheReader {
    fn kind(&self) -> ReaderKind {
        ReaderKind::Cache
    }

    fn fields(&self) -> &'static FieldSpec {
        &FIELDS
    }

    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError> {
        let Self {
            program,
            args,
            budget,
        } = &*self;

        let time = ctx.clock.now();
        let output = ctx
            .helper
            .run(program, args, *budget)
            .map_err(|error| match error {
                HelperError::TimedOut(budget) => ReaderError::TimedOut {
                    program: program.clone(),
                    budget,
                },
                source => ReaderError::HelperUnavailable {
                    program: program.clone(),
                    source,
                },
            })?;

        let mut sample = RawSample::new(time);
        for line in output.lines().map(str::trim).filter(|line| !line.is_empty()) {
            match parse_line(line) {
                Ok(Some((name, device))) => sample.insert(name, device),
                Ok(None) => {}
                Err(error) => debug!(%line, %error, "skipping malformed cache device"),
            }
        }

        Ok(sample)
    }
}

/// parses one line of output. volumes without a cache have empty cache columns, and yield `None`.
fn parse_line(line: &str) -> Result<Option<(String, Entity)>, ParseError> {
    let values = line.split(',').map(str::trim).collect::<Vec<_>>();
    let expected = 2 + COLUMNS.len();
    let [vg, lv, numbers @ ..] = values.as_slice() else {
        return Err(ParseError::Truncated {
            expected,
            found: values.len(),
        });
    };
    if numbers.len() < COLUMNS.len() {
        return Err(ParseError::Truncated {
            expected,
            found: values.len(),
        });
    }
    if numbers.iter().take(COLUMNS.len()).all(|value| value.is_empty()) {
        return Ok(None);
    }

    let device = COLUMNS
        .iter()
        .zip(numbers)
        .try_fold(Entity::new(), |device, (&field, value)| {
            Ok::<_, ParseError>(device.with(field, number(field, value)?))
        })?;
    Ok(Some((format!("{vg}/{lv}"), device)))
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            reader::sample_mock,
            sample::EntityId,
            source::{MockFs, MockHelper, MockResponse},
        },
    };

    const LVS: &str = "\
  vg0,root,,,,,,,
  vg0,data,65536,60000,120,1000,250,800,40
  vg1,home,32768,garbage,0,0,0,0,0
";

    fn reader() -> CacheReader {
        CacheReader::new(&CacheReader::default_command(), Duration::from_secs(1))
    }

    fn sample_with(response: MockResponse) -> Result<RawSample, ReaderError> {
        let helper = MockHelper::default();
        helper.respond(response);
        sample_mock(&mut reader(), &MockFs::default(), &helper)
    }

    #[test]
    fn parses_cached_volumes() {
        let sample = sample_with(MockResponse::Output(LVS.to_owned())).unwrap();
        assert_eq!(sample.len(), 1);
        let data = sample.get(&EntityId::from("vg0/data")).unwrap();
        assert_eq!(data.get("total_blocks"), Some(65536));
        assert_eq!(data.get("dirty_blocks"), Some(120));
        assert_eq!(data.get("write_misses"), Some(40));
    }

    #[test]
    fn missing_helper_is_unavailable() {
        let err = sample_with(MockResponse::Missing).unwrap_err();
        assert!(matches!(err, ReaderError::HelperUnavailable { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn denied_helper_is_unavailable() {
        let err = sample_with(MockResponse::Denied).unwrap_err();
        assert!(matches!(err, ReaderError::HelperUnavailable { .. }));
    }

    #[test]
    fn slow_helper_is_retryable() {
        let err = sample_with(MockResponse::Slow).unwrap_err();
        assert!(matches!(err, ReaderError::TimedOut { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn no_devices_is_an_empty_sample() {
        let sample = sample_with(MockResponse::Output(String::new())).unwrap();
        assert!(sample.is_empty());
    }

    #[test]
    fn default_command_uses_sudo_non_interactively() {
        let command = CacheReader::default_command();
        assert_eq!(command[..3], ["sudo", "-n", "lvs"]);
        assert!(command.last().unwrap().starts_with("vg_name,lv_name,"));
    }

    #[test]
    fn truncated_line() {
        let err = parse_line("vg0,data,1,2").unwrap_err();
        assert_eq!(
            err,
            ParseError::Truncated {
                expected: 9,
                found: 4
            }
        );
    }
}
