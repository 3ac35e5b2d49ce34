//! runtime settings.

use {
    crate::{error::ConfigError, reader::CacheReader},
    std::time::Duration,
};

/// how the monitor runs. built from the command line, then [`validate`][Settings::validate]d.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Settings {
    /// emit escape sequences: redraw in place, and colour values.
    pub smart: bool,
    /// a fixed terminal width. detected every tick when absent.
    pub columns: Option<u16>,
    /// a fixed terminal height. detected every tick when absent.
    pub rows: Option<u16>,
    /// the width of one grid column.
    pub column_width: u16,
    pub interval: Duration,
    /// the command listing cache devices, or `None` to go without the cache panel.
    pub cache_helper: Option<Vec<String>>,
    /// how long the cache helper may run.
    pub helper_budget: Duration,
    /// prefixes of network interfaces to skip.
    pub ignored_interfaces: Vec<String>,
}

// === impl Settings ===

impl Settings {
    /// the narrowest column that still fits a label and a value.
    pub const MIN_COLUMN_WIDTH: u16 = 6;
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    pub const DEFAULT_COLUMN_WIDTH: u16 = 10;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);
    pub const DEFAULT_HELPER_BUDGET: Duration = Duration::from_millis(1000);

    /// checks that the settings describe a usable monitor.
    pub fn validate(self) -> Result<Self, ConfigError> {
        let Self {
            column_width,
            interval,
            cache_helper,
            ..
        } = &self;

        if *column_width < Self::MIN_COLUMN_WIDTH {
            return Err(ConfigError::ColumnWidth {
                min: Self::MIN_COLUMN_WIDTH,
                got: *column_width,
            });
        }
        if *interval < Self::MIN_INTERVAL {
            return Err(ConfigError::Interval {
                min: Self::MIN_INTERVAL,
                got: *interval,
            });
        }
        if cache_helper
            .as_ref()
            .is_some_and(|command| command.first().is_none_or(|program| program.is_empty()))
        {
            return Err(ConfigError::EmptyHelper);
        }

        Ok(self)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            smart: false,
            columns: None,
            rows: None,
            column_width: Self::DEFAULT_COLUMN_WIDTH,
            interval: Self::DEFAULT_INTERVAL,
            cache_helper: Some(CacheReader::default_command()),
            helper_budget: Self::DEFAULT_HELPER_BUDGET,
            ignored_interfaces: vec!["lo".to_owned()],
        }
    }
}
