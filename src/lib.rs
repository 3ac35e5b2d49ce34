//! a compact, non-interactive system monitor.
//!
//! every tick, the [`Sentinel`] samples each kernel source and compares the sample to the one
//! before it. the resulting rates are arranged into panels, the panels are laid out on a grid
//! that fits the terminal, and the layout is rendered as one frame of text.

use {
    self::{
        config::Settings,
        error::StartupError,
        layout::LayoutPlan,
        render::Renderer,
        sentinel::Sentinel,
        source::{Clock, Filesystem, Helper, ProcFs, SystemClock, SystemHelper},
        stop::Stop,
        window::{Geometry, Window},
    },
    std::{
        io::Write,
        time::{Duration, Instant},
    },
    tracing::{debug, info},
};

pub mod config;
pub mod delta;
pub mod error;
pub mod format;
pub mod layout;
pub mod meter;
pub mod panel;
pub mod reader;
pub mod render;
pub mod sample;
pub mod sentinel;
pub mod source;
pub mod stop;
pub mod window;

/// the monitor: a refresh loop over a [`Sentinel`].
pub struct App<C = SystemClock, F = ProcFs, H = SystemHelper> {
    settings: Settings,
    sentinel: Sentinel<C, F, H>,
    renderer: Renderer,
    stop: Stop,
}

// === impl App ===

impl App {
    /// initializes a new application, reading the live system.
    pub fn new(settings: Settings, stop: Stop) -> Self {
        let readers = reader::defaults(&settings);
        Self::with_sentinel(settings, Sentinel::new(readers), stop)
    }
}

impl<C, F, H> App<C, F, H>
where
    C: Clock,
    F: Filesystem,
    H: Helper,
{
    pub fn with_sentinel(settings: Settings, sentinel: Sentinel<C, F, H>, stop: Stop) -> Self {
        let renderer = Renderer::new(settings.smart);
        Self {
            settings,
            sentinel,
            renderer,
            stop,
        }
    }

    /// runs the application until it is stopped.
    ///
    /// the first frame is drawn one interval after startup, once every counter has a previous
    /// value to be compared to.
    pub fn run<W: Write>(mut self, window: &mut Window<W>) -> Result<(), StartupError> {
        self.sentinel.prime()?;
        info!(interval = ?self.settings.interval, "monitor started");

        let Settings {
            columns,
            rows,
            interval,
            ..
        } = self.settings;
        if self.stop.wait(interval) {
            return Ok(());
        }

        while !self.stop.is_triggered() {
            let started = Instant::now();
            let plan = self.tick(Geometry::detect(columns, rows));
            let frame = self.renderer.render(&plan, window.previous_height())?;
            window.present(&frame)?;

            let elapsed = started.elapsed();
            debug!(?elapsed, panels = plan.placements.len(), "tick");
            if self.stop.wait(remaining(interval, elapsed)) {
                break;
            }
        }

        info!("monitor stopped");
        Ok(())
    }

    /// samples every source, and lays the resulting panels out on a terminal of `geometry`.
    pub fn tick(&mut self, geometry: Geometry) -> LayoutPlan {
        let Self {
            settings, sentinel, ..
        } = self;
        let Geometry { width, height } = geometry;

        let observation = sentinel.observe();
        let panels = panel::build(&observation, settings.column_width);
        layout::plan(panels, width, height, settings.column_width)
    }
}

/// how long to sleep after a tick that took `elapsed`.
///
/// a tick that overran its interval is followed immediately by the next one.
pub fn remaining(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}
