use std::{ops::Add, str::FromStr};

/// a duration, in clock ticks.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct UserHz(u64);

// === impl UserHz ===

impl UserHz {
    /// the usual number of clock ticks in a second.
    const FALLBACK_FREQ: u64 = 100;

    /// returns the number of clock ticks in a second.
    ///
    /// this is `sysconf(_SC_CLK_TCK)`, the value `getconf CLK_TCK` prints.
    pub fn frequency() -> u64 {
        // SAFETY: `sysconf` has no memory safety preconditions.
        let freq = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        u64::try_from(freq)
            .ok()
            .filter(|freq| *freq > 0)
            .unwrap_or(Self::FALLBACK_FREQ)
    }

    pub fn ticks(self) -> u64 {
        self.0
    }

    /// converts to milliseconds, at the given tick frequency.
    pub fn as_millis(self, frequency: u64) -> u64 {
        let Self(ticks) = self;
        let millis = u128::from(ticks) * 1000 / u128::from(frequency.max(1));
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

impl Add for UserHz {
    type Output = Self;
    fn add(self, Self(rhs): Self) -> Self::Output {
        Self(self.0.saturating_add(rhs))
    }
}

impl FromStr for UserHz {
    type Err = <u64 as FromStr>::Err;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millis_at_100hz() {
        let time = "250".parse::<UserHz>().unwrap();
        assert_eq!(time.as_millis(100), 2500);
    }

    #[test]
    fn millis_at_250hz() {
        let time = "5".parse::<UserHz>().unwrap();
        assert_eq!(time.as_millis(250), 20);
    }

    #[test]
    fn frequency_is_positive() {
        assert!(UserHz::frequency() > 0);
    }
}
