//! per-process cpu time, from `/proc/<pid>/stat`.

use {
    super::{Context, Reader, ReaderKind, UserHz, number, tokens},
    crate::{
        delta::{
            FieldKind::{Counter, Gauge},
            FieldSpec,
        },
        error::{ParseError, ReaderError},
        sample::{Entity, RawSample},
    },
    std::{io, path::Path},
    tracing::debug,
};

/// reads every process in `/proc`.
#[derive(Debug)]
pub struct ProcessReader {
    /// clock ticks per second.
    hz: u64,
    /// bytes per page.
    page_size: u64,
}

static FIELDS: FieldSpec = FieldSpec::new(&[
    ("cpu_ms", Counter),
    ("state", Gauge),
    ("rss", Gauge),
    ("threads", Gauge),
]);

/// positions of the fields after the command name, see `proc_pid_stat(5)`.
mod index {
    pub const STATE: usize = 0;
    pub const UTIME: usize = 11;
    pub const STIME: usize = 12;
    pub const THREADS: usize = 17;
    pub const RSS: usize = 21;
}

impl ProcessReader {
    const PATH: &str = "/proc";

    pub fn new(hz: u64, page_size: u64) -> Self {
        Self { hz, page_size }
    }

    fn parse(&self, stat: &str) -> Result<(String, Entity), ParseError> {
        let Self { hz, page_size } = *self;

        // the command name may itself hold spaces and parentheses.
        let (Some(open), Some(close)) = (stat.find('('), stat.rfind(')')) else {
            return Err(ParseError::MissingField("comm"));
        };
        if close < open {
            return Err(ParseError::Malformed(stat.to_owned()));
        }
        let comm = &stat[open + 1..close];
        let rest = tokens(&stat[close + 1..]);

        let expected = index::RSS + 1;
        if rest.len() < expected {
            return Err(ParseError::Truncated {
                expected,
                found: rest.len(),
            });
        }

        let state = rest[index::STATE]
            .chars()
            .next()
            .ok_or(ParseError::MissingField("state"))?;
        let time = |field: &'static str, index: usize| -> Result<UserHz, ParseError> {
            rest[index].parse().map_err(|_| ParseError::InvalidNumber {
                field,
                value: rest[index].to_owned(),
            })
        };
        let cpu = time("utime", index::UTIME)? + time("stime", index::STIME)?;
        let threads = number("threads", rest[index::THREADS])?;
        // a negative rss only appears for kernel threads in transition.
        let rss = number("rss", rest[index::RSS]).unwrap_or(0);

        let process = Entity::new()
            .with("cpu_ms", cpu.as_millis(hz))
            .with("state", u64::from(state))
            .with("rss", rss.saturating_mul(page_size))
            .with("threads", threads)
            .with_label(comm.to_owned());
        Ok((comm.to_owned(), process))
    }
}

impl Reader for ProcessReader {
    fn kind(&self) -> ReaderKind {
        ReaderKind::Process
    }

    fn fields(&self) -> &'static FieldSpec {
        &FIELDS
    }

    fn sample(&mut self, ctx: &Context<'_>) -> Result<RawSample, ReaderError> {
        let time = ctx.clock.now();
        let root = Path::new(Self::PATH);
        let entries = ctx
            .fs
            .read_dir(root)
            .map_err(|error| ReaderError::unreadable(root, error))?;

        let mut sample = RawSample::new(time);
        for pid in entries.iter().filter_map(|entry| entry.parse::<u32>().ok()) {
            let stat = match ctx.fs.read_to_string(&root.join(pid.to_string()).join("stat")) {
                Ok(stat) => stat,
                Err(error) if vanished(&error) => continue,
                Err(error) => {
                    debug!(%pid, %error, "skipping unreadable process");
                    continue;
                }
            };
            match self.parse(&stat) {
                Ok((_, process)) => sample.insert(pid, process),
                Err(error) => debug!(%pid, %error, "skipping malformed process"),
            }
        }

        Ok(sample)
    }
}

/// returns true if the error means the process exited after `/proc` was listed.
fn vanished(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::NotFound || error.raw_os_error() == Some(libc::ESRCH)
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

    const INIT: &str = "1 (systemd) S 0 1 1 0 -1 4194560 52000 900000 90 600 250 150 2000 800 20 0 1 0 30 172000000 3000 18446744073709551615 1 1 0 0 0 0 671173123 4096 1260 0 0 0 17 3 0 0 0 0 0\n";
    const WEIRD: &str = "4242 (tmux: (server) 1) R 1 4242 4242 0 -1 4194368 900 0 0 0 40 10 0 0 20 0 4 0 100 9000000 512 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0\n";

    fn reader() -> ProcessReader {
        ProcessReader::new(100, 4096)
    }

    #[test]
    fn parses_stat() {
        let (comm, init) = reader().parse(INIT).unwrap();
        assert_eq!(comm, "systemd");
        assert_eq!(init.get("cpu_ms"), Some(4000));
        assert_eq!(init.get("state"), Some(u64::from('S')));
        assert_eq!(init.get("threads"), Some(1));
        assert_eq!(init.get("rss"), Some(3000 * 4096));
        assert_eq!(init.label(), Some("systemd"));
    }

    #[test]
    fn command_names_may_hold_parentheses() {
        let (comm, process) = reader().parse(WEIRD).unwrap();
        assert_eq!(comm, "tmux: (server) 1");
        assert_eq!(process.get("state"), Some(u64::from('R')));
        assert_eq!(process.get("cpu_ms"), Some(500));
        assert_eq!(process.get("threads"), Some(4));
    }

    #[test]
    fn truncated_stat_is_rejected() {
        let err = reader().parse("7 (kworker) I 2 0 0").unwrap_err();
        assert!(matches!(err, ParseError::Truncated { expected: 22, .. }));
        assert!(reader().parse("7 kworker I").is_err());
    }

    #[test]
    fn vanished_and_malformed_processes_are_skipped() {
        let fs = MockFs::default()
            .with("/proc/1/stat", INIT)
            .with("/proc/4242/stat", WEIRD)
            .with("/proc/77/stat", "77 (broken) R 1\n")
            .with("/proc/self/stat", INIT)
            .with("/proc/meminfo", "MemTotal: 1 kB\n");
        // listed, then gone before its stat is read.
        fs.insert("/proc/99/status", "Name: gone\n");

        let sample = sample_mock(&mut reader(), &fs, &MockHelper::default()).unwrap();
        let ids = sample.entities().map(|(id, _)| id.clone()).collect::<Vec<_>>();
        assert_eq!(ids, [EntityId::Index(1), EntityId::Index(4242)]);
    }

    #[test]
    fn no_proc_is_unreadable() {
        let err = sample_mock(&mut reader(), &MockFs::default(), &MockHelper::default())
            .unwrap_err();
        assert!(matches!(err, ReaderError::Unreadable { .. }));
    }

    #[test]
    fn vanished_errors() {
        assert!(vanished(&io::Error::from(io::ErrorKind::NotFound)));
        assert!(vanished(&io::Error::from_raw_os_error(libc::ESRCH)));
        assert!(!vanished(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
