use super::*;

/// the time a cpu has spent in each state since boot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CpuTime {
    /// time spent in user mode.
    user: UserHz,
    /// time spent in user mode with low priority (nice).
    nice: UserHz,
    /// time spent in system mode.
    system: UserHz,
    /// time spent in the idle task.
    idle: UserHz,
    /// time waiting for i/o to complete.
    ///
    /// this value is not reliable: a cpu does not wait for i/o, a task does, and the value may
    /// decrease in certain conditions.
    iowait: UserHz,
    /// time servicing interrupts.
    irq: UserHz,
    /// time servicing softirqs.
    softirq: UserHz,
    /// stolen time, which is the time spent in other operating systems when running in a
    /// virtualized environment.
    steal: UserHz,
}

// === impl CpuTime ===

impl CpuTime {
    /// the number of leading times that are read.
    ///
    /// guest time follows, but is already counted within user and nice time.
    pub const LEN: usize = 8;

    /// the fields of an entity built from a [`CpuTime`], in `/proc/stat` order.
    pub const FIELDS: [&str; Self::LEN] = [
        "user", "nice", "system", "idle", "iowait", "irq", "softirq", "steal",
    ];
}

impl TryFrom<Vec<UserHz>> for CpuTime {
    type Error = EntryParseError;
    fn try_from(times: Vec<UserHz>) -> Result<Self, Self::Error> {
        let [user, nice, system, idle, iowait, irq, softirq, steal, ..] = times[..] else {
            return Err(EntryParseError::CpuTime(times.len()));
        };

        Ok(Self {
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
        })
    }
}

impl From<CpuTime> for Entity {
    fn from(time: CpuTime) -> Self {
        let CpuTime {
            user,
            nice,
            system,
            idle,
            iowait,
            irq,
            softirq,
            steal,
        } = time;

        let times = [user, nice, system, idle, iowait, irq, softirq, steal];
        CpuTime::FIELDS
            .into_iter()
            .zip(times)
            .fold(Entity::new(), |entity, (field, time)| {
                entity.with(field, time.ticks())
            })
    }
}
