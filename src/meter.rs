use std::{
    fmt::{self, Write},
    iter::{once, repeat, repeat_n},
};

/// a horizontal bar, filled in proportion to a fraction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Meter {
    /// how full the meter is, from 0 to 1.
    pub fraction: f64,
    /// the width of the meter, borders included.
    pub width: usize,
}

// === impl Meter ===

impl Meter {
    const ACTIVE: char = '|';
    const IDLE: char = ' ';
    const BORDER_L: char = '[';
    const BORDER_R: char = ']';

    pub fn new(fraction: f64, width: usize) -> Self {
        Self { fraction, width }
    }

    pub fn draw(&self, writer: &mut impl Write) -> fmt::Result {
        let Self { fraction, width } = *self;
        let Some(inner) = width.checked_sub(2) else {
            return Ok(());
        };

        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let value = (fraction * inner as f64).round() as usize;

        let meter = {
            let active = repeat_n(Self::ACTIVE, value);
            let idle = repeat(Self::IDLE);
            active.chain(idle).take(inner)
        };
        once(Self::BORDER_L)
            .chain(meter)
            .chain(once(Self::BORDER_R))
            .try_for_each(|c| writer.write_char(c))
    }
}

impl fmt::Display for Meter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.draw(f)
    }
}
