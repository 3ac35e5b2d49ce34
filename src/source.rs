//! abstractions over the outside world: time, the kernel's pseudo-filesystems, and helper
//! programs.
//!
//! each has a real implementation and an in-memory mock, so that readers and the scheduler can be
//! exercised without a live kernel.

use {
    crate::error::HelperError,
    std::{
        cell::{Cell, RefCell},
        collections::BTreeMap,
        io,
        path::{Path, PathBuf},
        rc::Rc,
        time::{Duration, Instant},
    },
};

pub use self::{clock::*, fs::*, helper::*};

mod clock {
    use super::*;

    pub trait Clock {
        fn now(&self) -> Instant;
    }

    #[derive(Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> Instant {
            Instant::now()
        }
    }

    /// a mock clock, advanced by hand.
    ///
    /// clones share the same time, so a test can keep a handle after moving the clock elsewhere.
    #[derive(Clone)]
    pub struct MockClock {
        now: Rc<Cell<Instant>>,
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self {
                now: Rc::new(Cell::new(Instant::now())),
            }
        }
    }

    impl MockClock {
        pub fn advance(&self, by: Duration) {
            let Self { now } = self;
            now.set(now.get() + by);
        }
    }

    impl Clock for MockClock {
        fn now(&self) -> Instant {
            self.now.get()
        }
    }
}

/// abstracts over the kernel's pseudo-filesystems.
mod fs {
    use {
        super::*,
        std::{ffi::CString, mem::MaybeUninit, os::unix::ffi::OsStrExt},
    };

    /// space figures of a mounted filesystem, in bytes.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct Usage {
        pub size: u64,
        pub free: u64,
        /// free space available to unprivileged users.
        pub available: u64,
    }

    /// a source of kernel statistics.
    pub trait Filesystem {
        /// reads a whole file. invalid utf-8 is replaced rather than rejected.
        fn read_to_string(&self, path: &Path) -> io::Result<String>;

        /// lists the names of the entries of a directory.
        fn read_dir(&self, path: &Path) -> io::Result<Vec<String>>;

        /// queries the space figures of the filesystem mounted at `path`.
        fn statvfs(&self, path: &Path) -> io::Result<Usage>;
    }

    /// the live `/proc` and `/sys` trees.
    #[derive(Default)]
    pub struct ProcFs;

    /// an in-memory filesystem.
    ///
    /// directories exist implicitly, wherever a file lies beneath them. clones share contents.
    #[derive(Clone, Default)]
    pub struct MockFs {
        inner: Rc<RefCell<MockTree>>,
    }

    #[derive(Default)]
    struct MockTree {
        files: BTreeMap<PathBuf, String>,
        usage: BTreeMap<PathBuf, Usage>,
    }

    // === impl ProcFs ===

    impl Filesystem for ProcFs {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            std::fs::read(path).map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        }

        fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
            let mut names = std::fs::read_dir(path)?
                .filter_map(Result::ok)
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect::<Vec<_>>();
            names.sort();
            Ok(names)
        }

        fn statvfs(&self, path: &Path) -> io::Result<Usage> {
            let path = CString::new(path.as_os_str().as_bytes())
                .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error))?;

            let mut stats = MaybeUninit::<libc::statvfs>::uninit();
            // SAFETY: `path` is nul-terminated and `stats` is valid for writes.
            let rc = unsafe { libc::statvfs(path.as_ptr(), stats.as_mut_ptr()) };
            if rc != 0 {
                return Err(io::Error::last_os_error());
            }
            // SAFETY: a successful call initialized the buffer.
            let stats = unsafe { stats.assume_init() };

            let fragment = stats.f_frsize as u64;
            Ok(Usage {
                size: stats.f_blocks as u64 * fragment,
                free: stats.f_bfree as u64 * fragment,
                available: stats.f_bavail as u64 * fragment,
            })
        }
    }

    // === impl MockFs ===

    impl MockFs {
        /// adds a file, returning the filesystem.
        pub fn with(self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
            self.insert(path, contents);
            self
        }

        /// adds or replaces a file.
        pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
            self.inner
                .borrow_mut()
                .files
                .insert(path.into(), contents.into());
        }

        /// removes a file, or a directory and everything beneath it.
        pub fn remove(&self, path: impl AsRef<Path>) {
            let path = path.as_ref();
            self.inner
                .borrow_mut()
                .files
                .retain(|file, _| !file.starts_with(path));
        }

        /// sets the figures `statvfs` reports for a mount point.
        pub fn set_usage(&self, path: impl Into<PathBuf>, usage: Usage) {
            self.inner.borrow_mut().usage.insert(path.into(), usage);
        }
    }

    impl Filesystem for MockFs {
        fn read_to_string(&self, path: &Path) -> io::Result<String> {
            self.inner
                .borrow()
                .files
                .get(path)
                .cloned()
                .ok_or_else(|| io::ErrorKind::NotFound.into())
        }

        fn read_dir(&self, path: &Path) -> io::Result<Vec<String>> {
            let tree = self.inner.borrow();
            let mut names = tree
                .files
                .keys()
                .filter_map(|file| file.strip_prefix(path).ok())
                .filter_map(|rest| rest.components().next())
                .map(|name| name.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>();
            names.dedup();

            if names.is_empty() {
                return Err(io::ErrorKind::NotFound.into());
            }
            Ok(names)
        }

        fn statvfs(&self, path: &Path) -> io::Result<Usage> {
            self.inner
                .borrow()
                .usage
                .get(path)
                .copied()
                .ok_or_else(|| io::ErrorKind::NotFound.into())
        }
    }
}

/// abstracts over external helper programs.
mod helper {
    use {
        super::*,
        std::{
            process::{Command, Stdio},
            sync::mpsc,
            thread,
        },
        tracing::debug,
    };

    /// runs external programs.
    pub trait Helper {
        /// runs `program` with `args`, returning its standard output.
        ///
        /// the program is abandoned if it has not finished within `budget`.
        fn run(&self, program: &str, args: &[String], budget: Duration)
        -> Result<String, HelperError>;
    }

    /// runs real child processes.
    #[derive(Default)]
    pub struct SystemHelper;

    /// a scripted helper.
    #[derive(Clone, Default)]
    pub struct MockHelper {
        response: Rc<RefCell<MockResponse>>,
    }

    /// what a [`MockHelper`] does when it is run.
    #[derive(Clone, Debug, Default)]
    pub enum MockResponse {
        /// the program does not exist.
        #[default]
        Missing,
        /// the program exits unsuccessfully.
        Denied,
        /// the program does not finish in time.
        Slow,
        /// the program prints this and exits successfully.
        Output(String),
    }

    // === impl SystemHelper ===

    impl Helper for SystemHelper {
        fn run(
            &self,
            program: &str,
            args: &[String],
            budget: Duration,
        ) -> Result<String, HelperError> {
            let child = Command::new(program)
                .args(args)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .map_err(HelperError::Spawn)?;
            let pid = child.id();

            // both pipes are drained together, so a chatty stderr cannot stall the child.
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                if tx.send(child.wait_with_output()).is_err() {
                    debug!(pid, "helper finished after its budget");
                }
            });

            match rx.recv_timeout(budget) {
                Ok(Ok(output)) if output.status.success() => {
                    String::from_utf8(output.stdout).map_err(HelperError::Encoding)
                }
                Ok(Ok(output)) => Err(HelperError::Failed {
                    code: output.status.code(),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
                }),
                Ok(Err(error)) => Err(HelperError::Wait(error)),
                Err(_) => {
                    // the reaper thread collects the child once it dies.
                    // SAFETY: `kill` has no memory safety preconditions.
                    unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
                    Err(HelperError::TimedOut(budget))
                }
            }
        }
    }

    // === impl MockHelper ===

    impl MockHelper {
        pub fn respond(&self, response: MockResponse) {
            self.response.replace(response);
        }
    }

    impl Helper for MockHelper {
        fn run(&self, _: &str, _: &[String], budget: Duration) -> Result<String, HelperError> {
            match self.response.borrow().clone() {
                MockResponse::Missing => Err(HelperError::Spawn(io::ErrorKind::NotFound.into())),
                MockResponse::Denied => Err(HelperError::Failed {
                    code: Some(1),
                    stderr: "sudo: a password is required".to_owned(),
                }),
                MockResponse::Slow => Err(HelperError::TimedOut(budget)),
                MockResponse::Output(stdout) => Ok(stdout),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_clock_advances_every_clone() {
        let clock = MockClock::default();
        let other = clock.clone();
        let start = other.now();
        clock.advance(Duration::from_millis(1500));
        assert_eq!(other.now() - start, Duration::from_millis(1500));
    }

    #[test]
    fn mock_fs_lists_implicit_directories() {
        let fs = MockFs::default()
            .with("/proc/1/stat", "")
            .with("/proc/1/status", "")
            .with("/proc/22/stat", "")
            .with("/proc/meminfo", "");
        let names = fs.read_dir(Path::new("/proc")).unwrap();
        assert_eq!(names, ["1", "22", "meminfo"]);
    }

    #[test]
    fn mock_fs_remove_drops_subtree() {
        let fs = MockFs::default()
            .with("/proc/1/stat", "x")
            .with("/proc/2/stat", "y");
        fs.remove("/proc/1");
        assert!(fs.read_to_string(Path::new("/proc/1/stat")).is_err());
        assert_eq!(fs.read_to_string(Path::new("/proc/2/stat")).unwrap(), "y");
    }

    #[test]
    fn mock_fs_missing_directory_is_not_found() {
        let fs = MockFs::default();
        let err = fs.read_dir(Path::new("/sys/block")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn system_helper_reports_missing_program() {
        let err = SystemHelper
            .run(
                "/nonexistent/glimpse-helper",
                &[],
                Duration::from_secs(1),
            )
            .unwrap_err();
        assert!(matches!(err, HelperError::Spawn(_)));
    }

    #[test]
    fn system_helper_times_out() {
        let err = SystemHelper
            .run("sleep", &["5".to_owned()], Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, HelperError::TimedOut(_)));
    }

    #[test]
    fn system_helper_captures_output() {
        let out = SystemHelper
            .run("echo", &["hello".to_owned()], Duration::from_secs(5))
            .unwrap();
        assert_eq!(out, "hello\n");
    }

    #[test]
    fn system_helper_rejects_invalid_utf8() {
        let script = r"printf '\377\376'".to_owned();
        let err = SystemHelper
            .run("sh", &["-c".to_owned(), script], Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, HelperError::Encoding(_)));
    }

    #[test]
    fn system_helper_drains_a_chatty_stderr() {
        // far more than a pipe buffer on stderr, before anything on stdout.
        let script = "head -c 262144 /dev/zero >&2; echo done".to_owned();
        let out = SystemHelper
            .run("sh", &["-c".to_owned(), script], Duration::from_secs(5))
            .unwrap();
        assert_eq!(out, "done\n");
    }

    #[test]
    fn system_helper_reports_failure_with_stderr() {
        let script = "echo 'no such volume group' >&2; exit 5".to_owned();
        let err = SystemHelper
            .run("sh", &["-c".to_owned(), script], Duration::from_secs(5))
            .unwrap_err();
        match err {
            HelperError::Failed { code, stderr } => {
                assert_eq!(code, Some(5));
                assert_eq!(stderr, "no such volume group");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
