//! the terminal the monitor draws to.

use {
    crate::render::Frame,
    crossterm::{QueueableCommand, cursor, terminal},
    std::io::{self, Stdout, Write},
    tracing::debug,
};

/// an output stream that frames are presented on.
///
/// in smart mode the cursor is hidden while the window lives, and restored when it is dropped.
pub struct Window<W: Write = Stdout> {
    out: W,
    smart: bool,
    /// the height of the last frame presented.
    previous: u16,
}

/// the size of the terminal, in characters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Geometry {
    pub width: u16,
    pub height: u16,
}

// === impl Window ===

impl Window {
    /// a window on standard output.
    pub fn stdout(smart: bool) -> io::Result<Self> {
        Self::new(io::stdout(), smart)
    }
}

impl<W: Write> Window<W> {
    pub fn new(mut out: W, smart: bool) -> io::Result<Self> {
        if smart {
            out.queue(cursor::Hide)?
                .queue(terminal::Clear(terminal::ClearType::All))?
                .flush()?;
        }
        Ok(Self {
            out,
            smart,
            previous: 0,
        })
    }

    /// the height of the last frame presented, which the next frame must clear beyond.
    pub fn previous_height(&self) -> u16 {
        self.previous
    }

    /// writes a frame, and flushes it.
    pub fn present(&mut self, frame: &Frame) -> io::Result<()> {
        let Self { out, previous, .. } = self;
        out.write_all(frame.text.as_bytes())?;
        out.flush()?;
        *previous = frame.height;
        Ok(())
    }
}

impl<W: Write> Drop for Window<W> {
    fn drop(&mut self) {
        let Self {
            out,
            smart,
            previous,
        } = self;
        if !*smart {
            return;
        }
        // leave the cursor below the last frame.
        let restored = out
            .queue(cursor::MoveTo(0, *previous))
            .and_then(|out| out.queue(cursor::Show))
            .and_then(|out| out.flush());
        if let Err(error) = restored {
            debug!(%error, "could not restore the cursor");
        }
    }
}

// === impl Geometry ===

impl Geometry {
    /// used when the terminal's size cannot be queried.
    pub const FALLBACK: Self = Self {
        width: 80,
        height: 24,
    };

    /// the terminal's size. fixed dimensions are used as given; the others are queried.
    pub fn detect(columns: Option<u16>, rows: Option<u16>) -> Self {
        if let (Some(width), Some(height)) = (columns, rows) {
            return Self { width, height };
        }
        let detected = terminal::size()
            .map(|(width, height)| Self { width, height })
            .inspect_err(|error| debug!(%error, "cannot query the terminal size"))
            .unwrap_or(Self::FALLBACK);
        Self {
            width: columns.unwrap_or(detected.width),
            height: rows.unwrap_or(detected.height),
        }
    }
}
