//! the system-wide panels: memory, swap, pressure and scheduler activity.

use {
    super::{Cell, Level, PanelKind, PanelModel, Row, Threshold, percent_of},
    crate::{
        delta::{DeltaSet, EntityDelta},
        format,
        reader::{CpuReader, SwapReader},
        sample::EntityId,
    },
};

const MEMORY_USED: Threshold = Threshold::new(80.0, 90.0, 95.0);
const SWAP_USED: Threshold = Threshold::new(50.0, 75.0, 90.0);
/// swap traffic, in bytes per second.
const SWAP_TRAFFIC: Threshold = Threshold::new(1_048_576.0, 10_485_760.0, 104_857_600.0);
/// stall averages, in percent.
const PRESSURE: Threshold = Threshold::new(1.0, 5.0, 10.0);
const BUSY: Threshold = Threshold::new(50.0, 75.0, 90.0);
const IOWAIT: Threshold = Threshold::new(10.0, 25.0, 50.0);
const STEAL: Threshold = Threshold::new(5.0, 10.0, 25.0);
const BLOCKED: Threshold = Threshold::new(1.0, 4.0, 16.0);

/// how a cpu spent the last interval, in percent of its time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct CpuShares {
    pub busy: f64,
    pub user: f64,
    pub system: f64,
    pub iowait: f64,
    pub steal: f64,
}

pub(super) fn memory(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    let ram = set.get(&EntityId::from("ram"))?;
    let gauge = |field| ram.value(field);

    let total = gauge("total")?;
    let available = gauge("available").or(gauge("free"))?;
    let used = total.saturating_sub(available);
    let bytes = |value: Option<u64>| value.map_or_else(Cell::blank, |value| {
        Cell::value(format::bytes(value, width), Level::Normal)
    });

    let header = ["TOTAL", "AVAIL", "USED", "CACHED", "ACTIVE", "INACTIVE", "DIRTY", "W_BACK"];
    let used_level = MEMORY_USED.level_of(percent_of(used as f64, total as f64));
    let values = vec![
        bytes(Some(total)),
        bytes(Some(available)),
        Cell::value(format::bytes(used, width), used_level),
        bytes(gauge("cached")),
        bytes(gauge("active")),
        bytes(gauge("inactive")),
        bytes(gauge("dirty")),
        bytes(gauge("writeback")),
    ];

    Some(
        PanelModel::new(PanelKind::Memory, headings(&header), vec![Row::new(values)])
            .min_columns(3),
    )
}

pub(super) fn swap(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    let paging = EntityId::from(SwapReader::PAGING);
    let devices = set
        .entities()
        .filter(|(id, _)| **id != paging)
        .collect::<Vec<_>>();
    if devices.is_empty() {
        return None;
    }

    let bytes = |value: Option<u64>| {
        value.map_or_else(Cell::blank, |value| {
            Cell::value(format::bytes(value, width), Level::Normal)
        })
    };
    let used = |size: u64, used: u64| {
        Cell::value(
            format::bytes(used, width),
            SWAP_USED.level_of(percent_of(used as f64, size as f64)),
        )
    };

    let mut rows = Vec::with_capacity(devices.len() + 1);
    let (mut total_size, mut total_used) = (0_u64, 0_u64);
    for (id, device) in &devices {
        let size = device.value("size").unwrap_or(0);
        let in_use = device.value("used").unwrap_or(0);
        total_size = total_size.saturating_add(size);
        total_used = total_used.saturating_add(in_use);
        rows.push(Row::new(vec![
            Cell::label(id.to_string()),
            bytes(Some(size)),
            used(size, in_use),
            bytes(device.value("compressed")),
            bytes(device.value("original")),
        ]));
    }

    let traffic = |field| {
        let rate = set.get(&paging).and_then(|paging| paging.rate(field));
        rate.map_or_else(Cell::blank, |rate| {
            Cell::value(format::bytes_rate(rate, width), SWAP_TRAFFIC.level(rate))
        })
    };
    rows.push(Row::new(vec![
        Cell::label("total"),
        bytes(Some(total_size)),
        used(total_size, total_used),
        Cell::value("", Level::Normal),
        Cell::value("", Level::Normal),
        traffic("swapped_in"),
        traffic("swapped_out"),
    ]));

    let header = ["SWAP", "SIZE", "USED", "ZRAM", "ORIG", "IN/s", "OUT/s"];
    let mut header = headings(&header);
    header[0] = header[0].clone().left();
    Some(PanelModel::new(PanelKind::Swap, header, rows).min_columns(3))
}

pub(super) fn pressure(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    if set.is_empty() {
        return None;
    }

    let average = |resource: &EntityDelta, field| {
        resource.value(field).map_or_else(Cell::blank, |hundredths| {
            let percent = hundredths as f64 / 100.0;
            Cell::value(format::percent(percent, width), PRESSURE.level(percent))
        })
    };
    let rows = set
        .entities()
        .map(|(id, resource)| {
            Row::new(vec![
                Cell::label(id.to_string()),
                average(resource, "some_avg10"),
                average(resource, "some_avg60"),
                average(resource, "some_avg300"),
                average(resource, "full_avg10"),
                average(resource, "full_avg60"),
                average(resource, "full_avg300"),
            ])
        })
        .collect();

    let header = ["PSI", "SOME10", "SOME60", "SOME300", "FULL10", "FULL60", "FULL300"];
    let mut header = headings(&header);
    header[0] = header[0].clone().left();
    Some(PanelModel::new(PanelKind::Pressure, header, rows).min_columns(3))
}

/// system-wide cpu usage and scheduler activity.
pub(super) fn activity(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    let all = set.get(&EntityId::from(CpuReader::ALL))?;
    let system = set.get(&EntityId::from(CpuReader::SYSTEM));
    let cores = set
        .entities()
        .filter(|(id, _)| matches!(id, EntityId::Index(_)))
        .count()
        .max(1) as f64;

    let share = |value: Option<f64>, threshold: &Threshold| {
        value.map_or_else(Cell::blank, |value| {
            Cell::value(format::percent(value, width), threshold.level(value))
        })
    };
    let shares = CpuShares::of(all);
    let rate = |field| {
        system
            .and_then(|system| system.rate(field))
            .map_or_else(Cell::blank, |rate| Cell::value(format::rate(rate, width), Level::Normal))
    };
    let gauge = |field, threshold: Threshold| {
        system
            .and_then(|system| system.value(field))
            .map_or_else(Cell::blank, |value| {
                Cell::value(value.to_string(), threshold.level(value as f64))
            })
    };
    // more runnable tasks than cores means tasks are waiting for a cpu.
    let running = Threshold::new(cores + 1.0, cores * 2.0, cores * 4.0);

    let values = vec![
        share(shares.map(|s| s.busy), &BUSY),
        share(shares.map(|s| s.user), &BUSY),
        share(shares.map(|s| s.system), &BUSY),
        share(shares.map(|s| s.iowait), &IOWAIT),
        share(shares.map(|s| s.steal), &STEAL),
        rate("context_switches"),
        rate("forks"),
        gauge("running", running),
        gauge("blocked", BLOCKED),
    ];

    let header = [
        "CPU%", "USER", "SYSTEM", "IOWAIT", "STEAL", "CTXSW/s", "FORKS/s", "RUN", "BLOCKED",
    ];
    Some(
        PanelModel::new(PanelKind::Activity, headings(&header), vec![Row::new(values)])
            .min_columns(3),
    )
}

pub(super) fn headings(names: &[&str]) -> Vec<Cell> {
    names.iter().copied().map(Cell::heading).collect()
}

// === impl CpuShares ===

impl CpuShares {
    /// computes the shares from a cpu's time rates. `None` until there are two samples.
    pub fn of(cpu: &EntityDelta) -> Option<Self> {
        let rate = |field| cpu.rate(field);
        let [user, nice, system, idle, iowait, irq, softirq, steal] = [
            "user", "nice", "system", "idle", "iowait", "irq", "softirq", "steal",
        ]
        .map(rate);

        let idle = idle?;
        let times = [user, nice, system, iowait, irq, softirq, steal].map(|t| t.unwrap_or(0.0));
        let [user, nice, system, iowait, irq, softirq, steal] = times;
        let total = idle + times.iter().sum::<f64>();
        let share = |time: f64| percent_of(time, total);

        Some(Self {
            busy: share(total - idle)?,
            user: share(user + nice)?,
            system: share(system + irq + softirq)?,
            iowait: share(iowait)?,
            steal: share(steal)?,
        })
    }
}
