//! a compact, non-interactive system monitor.

use {
    clap::{ArgAction, Parser},
    glimpse::{App, config::Settings, error::StartupError, stop::Stop, window::Window},
    std::{
        env,
        fs::File,
        io::{self, IsTerminal},
        path::{Path, PathBuf},
        process::ExitCode,
        sync::Mutex,
        time::Duration,
    },
    tracing::{info, level_filters::LevelFilter},
    tracing_subscriber::EnvFilter,
};

#[derive(Debug, Parser)]
#[command(name = "glimpse", about, version)]
struct Cli {
    /// redraw in place and colour values. guessed from `TERM` and whether stdout is a terminal.
    #[arg(short = 'c', long, value_name = "BOOL", action = ArgAction::Set)]
    colour: Option<bool>,

    /// the terminal width. detected every refresh when absent.
    #[arg(long, value_name = "N")]
    columns: Option<u16>,

    /// the terminal height. detected every refresh when absent.
    #[arg(long, value_name = "N")]
    rows: Option<u16>,

    /// the width of one grid column.
    #[arg(short = 'w', long, value_name = "N", default_value_t = Settings::DEFAULT_COLUMN_WIDTH)]
    column_width: u16,

    /// the refresh interval, in milliseconds.
    #[arg(short = 'i', long = "refresh-interval", value_name = "MS", default_value_t = 2000)]
    interval: u64,

    /// the command line that lists cache devices.
    #[arg(long, value_name = "CMD", conflicts_with = "no_cache")]
    cache_helper: Option<String>,

    /// do not run the cache helper, and go without the cache panel.
    #[arg(long)]
    no_cache: bool,

    /// how long the cache helper may run, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    helper_timeout: u64,

    /// network interfaces with this prefix are not shown.
    #[arg(long = "ignore-iface", value_name = "PREFIX", default_value = "lo")]
    ignored_interfaces: Vec<String>,

    /// log more. may be repeated.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// log less. may be repeated.
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,

    /// write logs to this file, rather than standard error.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(error) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("glimpse: cannot open log file: {error}");
        return ExitCode::FAILURE;
    }

    match run(cli.settings()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("glimpse: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings: Settings) -> Result<(), StartupError> {
    let settings = settings.validate()?;
    info!(?settings, "starting");

    let stop = Stop::new();
    let handler = stop.clone();
    ctrlc::set_handler(move || handler.trigger())?;

    // the window restores the terminal when it is dropped, before any error is printed.
    let mut window = Window::stdout(settings.smart)?;
    App::new(settings, stop).run(&mut window)
}

/// initializes the tracing subscriber. the level is warn, raised by `-v` and lowered by `-q`,
/// unless `RUST_LOG` says otherwise.
fn init_logging(verbose: u8, quiet: u8, file: Option<&Path>) -> io::Result<()> {
    let level = match i16::from(verbose) - i16::from(quiet) {
        ..=-2 => LevelFilter::OFF,
        -1 => LevelFilter::ERROR,
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match file {
        Some(path) => {
            let file = File::options().create(true).append(true).open(path)?;
            subscriber
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => subscriber.with_writer(io::stderr).init(),
    }
    Ok(())
}

// === impl Cli ===

impl Cli {
    /// the settings the command line describes. they are not validated yet.
    fn settings(&self) -> Settings {
        let Self {
            colour,
            columns,
            rows,
            column_width,
            interval,
            cache_helper,
            no_cache,
            helper_timeout,
            ignored_interfaces,
            ..
        } = self;

        let cache_helper = match (no_cache, cache_helper) {
            (true, _) => None,
            (false, Some(command)) => Some(command.split_whitespace().map(str::to_owned).collect()),
            (false, None) => Settings::default().cache_helper,
        };

        Settings {
            smart: colour.unwrap_or_else(guess_colour),
            columns: *columns,
            rows: *rows,
            column_width: *column_width,
            interval: Duration::from_millis(*interval),
            cache_helper,
            helper_budget: Duration::from_millis(*helper_timeout),
            ignored_interfaces: ignored_interfaces.clone(),
        }
    }
}

/// escape sequences are used when stdout is a terminal that understands them.
fn guess_colour() -> bool {
    let capable = env::var("TERM").is_ok_and(|term| !term.is_empty() && term != "dumb");
    capable && io::stdout().is_terminal()
}

#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory, glimpse::error::ConfigError};

    fn parse(args: &[&str]) -> Settings {
        let args = std::iter::once("glimpse").chain(args.iter().copied());
        Cli::try_parse_from(args).unwrap().settings()
    }

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults() {
        let settings = parse(&["--colour", "false"]);
        assert_eq!(
            settings,
            Settings {
                smart: false,
                ..Settings::default()
            }
        );
    }

    #[test]
    fn flags() {
        let settings = parse(&[
            "-c",
            "true",
            "--columns",
            "132",
            "-w",
            "12",
            "-i",
            "500",
            "--cache-helper",
            "lvs --noheadings",
            "--ignore-iface",
            "veth",
            "--ignore-iface",
            "lo",
        ]);
        assert!(settings.smart);
        assert_eq!(settings.columns, Some(132));
        assert_eq!(settings.rows, None);
        assert_eq!(settings.column_width, 12);
        assert_eq!(settings.interval, Duration::from_millis(500));
        assert_eq!(
            settings.cache_helper,
            Some(vec!["lvs".to_owned(), "--noheadings".to_owned()])
        );
        assert_eq!(settings.ignored_interfaces, ["veth", "lo"]);
    }

    #[test]
    fn no_cache() {
        assert_eq!(parse(&["--no-cache"]).cache_helper, None);
        assert!(Cli::try_parse_from(["glimpse", "--no-cache", "--cache-helper", "lvs"]).is_err());
    }

    #[test]
    fn short_intervals_are_rejected() {
        let error = parse(&["-i", "50"]).validate().unwrap_err();
        assert!(matches!(error, ConfigError::Interval { .. }));
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["glimpse", "-v", "-q"]).is_err());
    }
}
