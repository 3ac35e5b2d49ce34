//! turns a layout plan into terminal output.

use {
    crate::{
        format,
        layout::LayoutPlan,
        meter::Meter,
        panel::{Align, Cell, Level},
    },
    crossterm::{
        Command, cursor,
        style::{self, Stylize},
        terminal::{self, ClearType},
    },
    std::fmt::{self, Write},
};

/// renders plans as text.
#[derive(Clone, Copy, Debug, Default)]
pub struct Renderer {
    /// redraw in place and colour values, rather than scroll plain text.
    smart: bool,
}

/// one rendered frame.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Frame {
    pub text: String,
    /// the number of lines the frame occupies.
    pub height: u16,
}

/// a line of output, as runs of text at a level.
#[derive(Debug, Default)]
struct Line {
    spans: Vec<(String, Level)>,
    /// the length in characters.
    len: usize,
}

// === impl Renderer ===

impl Renderer {
    /// printed between frames in plain mode.
    const SEPARATOR: &str = "----------";

    pub fn new(smart: bool) -> Self {
        Self { smart }
    }

    /// renders `plan`. the previous frame was `previous_height` lines tall; in smart mode, its
    /// lines below this frame are cleared.
    ///
    /// the same inputs always render the same text.
    pub fn render(&self, plan: &LayoutPlan, previous_height: u16) -> Result<Frame, fmt::Error> {
        let lines = Self::lines(plan);
        let height = u16::try_from(lines.len()).unwrap_or(u16::MAX);

        let mut text = String::new();
        if self.smart {
            self.smart_frame(&mut text, &lines, height, previous_height)?;
        } else {
            Self::plain_frame(&mut text, &lines)?;
        }

        Ok(Frame { text, height })
    }

    fn plain_frame(out: &mut String, lines: &[Line]) -> fmt::Result {
        writeln!(out, "{}", Self::SEPARATOR)?;
        for line in lines {
            for (text, _) in &line.spans {
                out.push_str(text);
            }
            out.push('\n');
        }
        Ok(())
    }

    fn smart_frame(
        &self,
        out: &mut String,
        lines: &[Line],
        height: u16,
        previous_height: u16,
    ) -> fmt::Result {
        cursor::MoveTo(0, 0).write_ansi(out)?;
        for (index, line) in lines.iter().enumerate() {
            if index > 0 {
                // no newline after the last line, lest the terminal scroll.
                out.push_str("\r\n");
            }
            for (text, level) in &line.spans {
                self.styled(out, text, *level)?;
            }
            terminal::Clear(ClearType::UntilNewLine).write_ansi(out)?;
        }
        // rows of a taller previous frame may lie beyond a terminal that has since shrunk, so
        // they are cleared from the cursor rather than addressed.
        if previous_height > height {
            terminal::Clear(ClearType::FromCursorDown).write_ansi(out)?;
        }
        Ok(())
    }

    fn styled(&self, out: &mut String, text: &str, level: Level) -> fmt::Result {
        let styled = match level {
            Level::Normal => return out.write_str(text),
            Level::Heading => text.bold(),
            Level::Medium => text.yellow().bold(),
            Level::High => text.red().bold(),
            Level::Critical => text.magenta().bold(),
        };
        style::PrintStyledContent(styled).write_ansi(out)
    }

    /// lays every placement's cells out into lines.
    fn lines(plan: &LayoutPlan) -> Vec<Line> {
        let LayoutPlan {
            width,
            height,
            column_width,
            placements,
            notice,
        } = plan;

        if let Some(notice) = notice {
            if *height == 0 {
                return Vec::new();
            }
            let mut line = Line::default();
            line.push(format::clip(notice, usize::from(*width)), Level::Normal);
            return vec![line];
        }

        let column_width = usize::from(*column_width);
        let mut lines = (0..plan.lines()).map(|_| Line::default()).collect::<Vec<_>>();
        for placement in placements {
            let left = usize::from(placement.column) * column_width;
            let span = usize::from(placement.columns) * column_width;
            let panel = &placement.panel;
            let rows = std::iter::once(&panel.header).chain(panel.rows.iter().map(|row| &row.cells));

            for (offset, cells) in rows.take(usize::from(placement.rows)).enumerate() {
                let Some(line) = lines.get_mut(usize::from(placement.top) + offset) else {
                    break;
                };
                line.pad_to(left);
                Self::cells(line, cells, span, column_width);
            }
        }

        for line in &mut lines {
            line.trim_end();
        }
        lines
    }

    /// renders one row of cells into `span` characters of a line.
    ///
    /// every cell starts with a blank, which separates it from its neighbour.
    fn cells(line: &mut Line, cells: &[Cell], span: usize, column_width: usize) {
        let mut used = 0;
        for cell in cells {
            let remaining = span.saturating_sub(used);
            let width = if cell.wide { remaining } else { column_width };
            if width < 2 || width > remaining {
                break;
            }
            let inner = width - 1;

            line.push(" ", Level::Normal);
            match cell.meter {
                Some(fraction) => {
                    line.push(&Meter::new(fraction, inner).to_string(), cell.level);
                }
                None => {
                    let text = format::clip(&cell.text, inner);
                    let pad = " ".repeat(inner - text.chars().count());
                    match cell.align {
                        Align::Left => {
                            line.push(text, cell.level);
                            line.push(&pad, Level::Normal);
                        }
                        Align::Right => {
                            line.push(&pad, Level::Normal);
                            line.push(text, cell.level);
                        }
                    }
                }
            }
            used += width;
        }
    }
}

// === impl Line ===

impl Line {
    fn push(&mut self, text: &str, level: Level) {
        if text.is_empty() {
            return;
        }
        self.len += text.chars().count();
        match self.spans.last_mut() {
            Some((last, last_level)) if *last_level == level => last.push_str(text),
            _ => self.spans.push((text.to_owned(), level)),
        }
    }

    fn pad_to(&mut self, column: usize) {
        if let Some(pad) = column.checked_sub(self.len).filter(|pad| *pad > 0) {
            self.push(&" ".repeat(pad), Level::Normal);
        }
    }

    /// drops trailing blanks.
    fn trim_end(&mut self) {
        while let Some((text, _)) = self.spans.last_mut() {
            let trimmed = text.trim_end_matches(' ').len();
            self.len -= text[trimmed..].chars().count();
            text.truncate(trimmed);
            if !text.is_empty() {
                break;
            }
            self.spans.pop();
        }
    }
}
