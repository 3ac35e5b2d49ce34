//! the per-device panels: cpu cores, network interfaces, disks, filesystems, sensors and caches.

use {
    super::{
        Cell, Level, PanelKind, PanelModel, Row, Threshold, percent_of,
        system::{CpuShares, headings},
    },
    crate::{
        delta::{DeltaSet, EntityDelta},
        format,
        sample::EntityId,
    },
};

const CORE_BUSY: Threshold = Threshold::new(50.0, 75.0, 90.0);
/// dropped packets per second.
const DROPS: Threshold = Threshold::new(0.05, 10.0, 100.0);
const DISK_BUSY: Threshold = Threshold::new(50.0, 80.0, 95.0);
/// average requests in flight, in percent of one.
const DISK_PRESSURE: Threshold = Threshold::new(50.0, 80.0, 200.0);
const FILESYSTEM_USED: Threshold = Threshold::new(80.0, 90.0, 95.0);
/// temperatures in degrees, for sensors without a critical point.
const TEMPERATURE: Threshold = Threshold::new(70.0, 80.0, 90.0);
/// power draw, in percent of the cap.
const POWER: Threshold = Threshold::new(80.0, 90.0, 98.0);
const VIDEO_MEMORY: Threshold = Threshold::new(80.0, 90.0, 95.0);
const CACHE_DIRTY: Threshold = Threshold::new(50.0, 75.0, 90.0);
/// cache misses, in percent of lookups.
const CACHE_MISSES: Threshold = Threshold::new(50.0, 75.0, 90.0);

/// one row per cpu core, each with a usage meter.
pub(super) fn cpu(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    let rows = set
        .entities()
        .filter_map(|(id, core)| match id {
            EntityId::Index(index) => Some((index, core)),
            EntityId::Name(_) => None,
        })
        .map(|(index, core)| {
            let label = Cell::label(format!("cpu{index}"));
            match CpuShares::of(core) {
                Some(CpuShares { busy, .. }) => {
                    let level = CORE_BUSY.level(busy);
                    Row::new(vec![
                        label,
                        Cell::value(format::percent(busy, width), level),
                        Cell::meter(busy / 100.0, level),
                    ])
                }
                None => Row::new(vec![label, Cell::blank()]),
            }
        })
        .collect::<Vec<_>>();
    if rows.is_empty() {
        return None;
    }

    let mut header = headings(&["CPU", "BUSY", "USAGE"]);
    header[0] = header[0].clone().left();
    header[2] = header[2].clone().left().wide();
    Some(
        PanelModel::new(PanelKind::Cpu, header, rows)
            .widen(2)
            .min_columns(2)
            .variable(),
    )
}

pub(super) fn network(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    let bytes = |interface: &EntityDelta, field| {
        interface.rate(field).map_or_else(Cell::blank, |rate| {
            Cell::value(format::bytes_rate(rate, width), Level::Normal)
        })
    };
    let packets = |interface: &EntityDelta, field| {
        interface.rate(field).map_or_else(Cell::blank, |rate| {
            Cell::value(format::rate(rate, width), Level::Normal)
        })
    };
    let drops = |interface: &EntityDelta| {
        let (rx, tx) = (interface.rate("rx_drops"), interface.rate("tx_drops"));
        if rx.is_none() && tx.is_none() {
            return Cell::blank();
        }
        let rate = rx.unwrap_or(0.0) + tx.unwrap_or(0.0);
        Cell::value(format::rate(rate, width), DROPS.level(rate))
    };

    let rows = set
        .entities()
        .map(|(id, interface)| {
            Row::new(vec![
                Cell::label(id.to_string()),
                bytes(interface, "rx_bytes"),
                bytes(interface, "tx_bytes"),
                packets(interface, "rx_packets"),
                packets(interface, "tx_packets"),
                drops(interface),
            ])
        })
        .collect::<Vec<_>>();

    let mut header = headings(&["IFACE", "RX/s", "TX/s", "RXPKT/s", "TXPKT/s", "DROP/s"]);
    header[0] = header[0].clone().left();
    panel(PanelKind::Network, header, rows)
}

pub(super) fn block(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    let bytes = |disk: &EntityDelta, field| {
        disk.rate(field).map_or_else(Cell::blank, |rate| {
            Cell::value(format::bytes_rate(rate, width), Level::Normal)
        })
    };
    let ops = |disk: &EntityDelta, field| {
        disk.rate(field).map_or_else(Cell::blank, |rate| {
            Cell::value(format::rate(rate, width), Level::Normal)
        })
    };
    // milliseconds per second, as a percentage of the second.
    let share = |disk: &EntityDelta, field, threshold: &Threshold| {
        disk.rate(field).map_or_else(Cell::blank, |rate| {
            let percent = rate / 10.0;
            Cell::value(format::percent(percent, width), threshold.level(percent))
        })
    };

    let rows = set
        .entities()
        .map(|(id, disk)| {
            Row::new(vec![
                Cell::label(id.to_string()),
                bytes(disk, "read_bytes"),
                bytes(disk, "written_bytes"),
                ops(disk, "reads"),
                ops(disk, "writes"),
                share(disk, "busy_ms", &DISK_BUSY),
                share(disk, "weighted_ms", &DISK_PRESSURE),
            ])
        })
        .collect::<Vec<_>>();

    let mut header = headings(&["DEVICE", "READ/s", "WRITE/s", "RIOPS", "WIOPS", "BUSY", "PRESSURE"]);
    header[0] = header[0].clone().left();
    panel(PanelKind::Block, header, rows)
}

pub(super) fn filesystem(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    let rows = set
        .entities()
        .filter_map(|(id, mount)| {
            let size = mount.value("size")?;
            let used = mount.value("used").unwrap_or(0);
            let available = mount.value("available").unwrap_or(0);
            // the reserved blocks are neither used nor available to users.
            let percent = percent_of(used as f64, used.saturating_add(available) as f64);
            let usage = percent.map_or_else(Cell::blank, |percent| {
                Cell::value(format::percent(percent, width), FILESYSTEM_USED.level(percent))
            });
            Some(Row::new(vec![
                Cell::label(id.to_string()),
                Cell::value(format::bytes(size, width), Level::Normal),
                Cell::value(format::bytes(used, width), Level::Normal),
                Cell::value(format::bytes(available, width), Level::Normal),
                usage,
            ]))
        })
        .collect::<Vec<_>>();

    let mut header = headings(&["MOUNT", "SIZE", "USED", "AVAIL", "USE%"]);
    header[0] = header[0].clone().left();
    panel(PanelKind::Filesystem, header, rows)
}

/// one row per reading: temperatures, and the power draw and video memory of gpus.
pub(super) fn sensors(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    let rows = set
        .entities()
        .filter_map(|(id, sensor)| {
            let label = Cell::label(id.to_string());
            let [value, limit] = temperature(sensor, width)
                .or_else(|| power(sensor, width))
                .or_else(|| video_memory(sensor, width))?;
            Some(Row::new(vec![label, value, limit]))
        })
        .collect::<Vec<_>>();

    let mut header = headings(&["SENSOR", "VALUE", "LIMIT"]);
    header[0] = header[0].clone().left();
    panel(PanelKind::Sensors, header, rows)
}

/// a temperature, judged against the sensor's critical point when it has one.
fn temperature(sensor: &EntityDelta, width: usize) -> Option<[Cell; 2]> {
    let millicelsius = sensor.value("millicelsius")?;
    let critical = sensor.value("critical").filter(|critical| *critical > 0);
    let threshold = critical.map_or(TEMPERATURE, |critical| {
        let critical = critical as f64 / 1000.0;
        Threshold::new(critical - 20.0, critical - 10.0, critical)
    });
    let level = threshold.level(millicelsius as f64 / 1000.0);
    Some([
        Cell::value(format::celsius(millicelsius, width), level),
        critical.map_or_else(Cell::blank, |critical| {
            Cell::value(format::celsius(critical, width), Level::Normal)
        }),
    ])
}

/// a power draw, judged against the power cap.
fn power(sensor: &EntityDelta, width: usize) -> Option<[Cell; 2]> {
    let microwatts = sensor.value("microwatts")?;
    let cap = sensor.value("microwatts_cap");
    let level = POWER.level_of(cap.and_then(|cap| percent_of(microwatts as f64, cap as f64)));
    Some([
        Cell::value(format::watts(microwatts, width), level),
        cap.map_or_else(Cell::blank, |cap| {
            Cell::value(format::watts(cap, width), Level::Normal)
        }),
    ])
}

fn video_memory(sensor: &EntityDelta, width: usize) -> Option<[Cell; 2]> {
    let used = sensor.value("vram_used")?;
    let total = sensor.value("vram_total")?;
    let level = VIDEO_MEMORY.level_of(percent_of(used as f64, total as f64));
    Some([
        Cell::value(format::bytes(used, width), level),
        Cell::value(format::bytes(total, width), Level::Normal),
    ])
}

pub(super) fn cache(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    let blocks = |device: &EntityDelta, field, threshold: Option<&Threshold>| {
        let total = device.value("total_blocks").unwrap_or(0) as f64;
        let percent = device
            .value(field)
            .and_then(|blocks| percent_of(blocks as f64, total));
        percent.map_or_else(Cell::blank, |percent| {
            let level = threshold.map_or(Level::Normal, |threshold| threshold.level(percent));
            Cell::value(format::percent(percent, width), level)
        })
    };
    let hits = |device: &EntityDelta, hits, misses| {
        let (hits, misses) = (device.rate(hits), device.rate(misses));
        let percent = hits
            .zip(misses)
            .and_then(|(hits, misses)| percent_of(hits, hits + misses));
        percent.map_or_else(Cell::blank, |percent| {
            Cell::value(
                format::percent(percent, width),
                CACHE_MISSES.level(100.0 - percent),
            )
        })
    };
    let misses = |device: &EntityDelta, field| {
        device.rate(field).map_or_else(Cell::blank, |rate| {
            Cell::value(format::rate(rate, width), Level::Normal)
        })
    };

    let rows = set
        .entities()
        .map(|(id, device)| {
            Row::new(vec![
                Cell::label(id.to_string()),
                blocks(device, "used_blocks", None),
                blocks(device, "dirty_blocks", Some(&CACHE_DIRTY)),
                hits(device, "read_hits", "read_misses"),
                hits(device, "write_hits", "write_misses"),
                misses(device, "read_misses"),
                misses(device, "write_misses"),
            ])
        })
        .collect::<Vec<_>>();

    let mut header = headings(&["CACHE", "USED", "DIRTY", "RHIT", "WHIT", "RMISS/s", "WMISS/s"]);
    header[0] = header[0].clone().left();
    panel(PanelKind::Cache, header, rows)
}

/// a panel of one row per device, or nothing when there are no devices.
fn panel(kind: PanelKind, header: Vec<Cell>, rows: Vec<Row>) -> Option<PanelModel> {
    (!rows.is_empty()).then(|| PanelModel::new(kind, header, rows).min_columns(3).variable())
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            delta::{FieldKind, FieldSpec, compute_deltas},
            sample::{Entity, RawSample},
        },
        std::time::{Duration, Instant},
    };

    const WIDTH: usize = 9;

    /// computes deltas over one second.
    fn over_a_second(
        before: RawSample,
        after: impl FnOnce(Instant) -> RawSample,
        fields: &FieldSpec,
    ) -> DeltaSet {
        let later = before.time() + Duration::from_secs(1);
        compute_deltas(Some(&before), &after(later), fields)
    }

    #[test]
    fn cores_draw_meters() {
        static FIELDS: FieldSpec = FieldSpec::new(&[
            ("user", FieldKind::Counter),
            ("idle", FieldKind::Counter),
        ]);
        let times = |user, idle| Entity::new().with("user", user).with("idle", idle);
        let before = RawSample::new(Instant::now())
            .with(0_u32, times(0, 0))
            .with(1_u32, times(0, 0))
            .with("all", times(0, 0));
        let set = over_a_second(
            before,
            |time| {
                RawSample::new(time)
                    .with(0_u32, times(95, 5))
                    .with(1_u32, times(10, 90))
                    .with("all", times(105, 95))
            },
            &FIELDS,
        );
        let panel = cpu(&set, WIDTH).unwrap();

        assert_eq!(panel.rows.len(), 2);
        let first = &panel.rows[0];
        assert_eq!(first.cells[0].text, "cpu0");
        assert_eq!(first.cells[1].text, "95.0%");
        assert_eq!(first.cells[1].level, Level::Critical);
        let fill = first.cells[2].meter.unwrap();
        assert!((fill - 0.95).abs() < 1e-9);
        assert!(first.cells[2].wide);
        assert_eq!(panel.columns, 5);
        assert_eq!(panel.min_rows, 2);
    }

    #[test]
    fn network_drops_are_flagged() {
        static FIELDS: FieldSpec = FieldSpec::new(&[
            ("rx_bytes", FieldKind::Counter),
            ("tx_bytes", FieldKind::Counter),
            ("rx_drops", FieldKind::Counter),
            ("tx_drops", FieldKind::Counter),
        ]);
        let counters = |bytes, drops| {
            Entity::new()
                .with("rx_bytes", bytes)
                .with("tx_bytes", bytes)
                .with("rx_drops", drops)
                .with("tx_drops", 0)
        };
        let before = RawSample::new(Instant::now())
            .with("eth0", counters(0, 0))
            .with("wlan0", counters(0, 0));
        let set = over_a_second(
            before,
            |time| {
                RawSample::new(time)
                    .with("eth0", counters(2048, 0))
                    .with("wlan0", counters(0, 20))
            },
            &FIELDS,
        );
        let panel = network(&set, WIDTH).unwrap();

        let eth0 = &panel.rows[0];
        assert_eq!(eth0.cells[1].text, "2.0K");
        assert_eq!(eth0.cells[3].text, ".");
        assert_eq!(eth0.cells[5].level, Level::Normal);
        let wlan0 = &panel.rows[1];
        assert_eq!(wlan0.cells[1].text, ".");
        assert_eq!(wlan0.cells[5].text, "20.0");
        assert_eq!(wlan0.cells[5].level, Level::High);
    }

    #[test]
    fn block_busy_and_pressure() {
        static FIELDS: FieldSpec = FieldSpec::new(&[
            ("busy_ms", FieldKind::Counter),
            ("weighted_ms", FieldKind::Counter),
        ]);
        let times = |busy, weighted| {
            Entity::new()
                .with("busy_ms", busy)
                .with("weighted_ms", weighted)
        };
        let before = RawSample::new(Instant::now()).with("sda", times(0, 0));
        let set = over_a_second(
            before,
            |time| RawSample::new(time).with("sda", times(850, 2500)),
            &FIELDS,
        );
        let panel = block(&set, WIDTH).unwrap();

        let sda = &panel.rows[0];
        assert_eq!(sda.cells[5].text, "85.0%");
        assert_eq!(sda.cells[5].level, Level::High);
        assert_eq!(sda.cells[6].text, "250%");
        assert_eq!(sda.cells[6].level, Level::Critical);
    }

    #[test]
    fn filesystem_usage() {
        static FIELDS: FieldSpec = FieldSpec::new(&[
            ("size", FieldKind::Gauge),
            ("used", FieldKind::Gauge),
            ("available", FieldKind::Gauge),
        ]);
        let sample = RawSample::new(Instant::now()).with(
            "/",
            Entity::new()
                .with("size", 100 << 30)
                .with("used", 90 << 30)
                .with("available", 5 << 30),
        );
        let panel = filesystem(&compute_deltas(None, &sample, &FIELDS), WIDTH).unwrap();

        let root = &panel.rows[0];
        assert_eq!(root.cells[0].text, "/");
        assert_eq!(root.cells[4].text, "94.7%");
        assert_eq!(root.cells[4].level, Level::High);
    }

    #[test]
    fn sensors_relative_to_critical_point() {
        static FIELDS: FieldSpec = FieldSpec::new(&[
            ("millicelsius", FieldKind::Gauge),
            ("critical", FieldKind::Gauge),
        ]);
        let sample = RawSample::new(Instant::now())
            .with(
                "k10temp/Tctl",
                Entity::new().with("millicelsius", 86_000).with("critical", 95_000),
            )
            .with("nvme/temp1", Entity::new().with("millicelsius", 45_000));
        let panel = sensors(&compute_deltas(None, &sample, &FIELDS), WIDTH).unwrap();

        let tctl = &panel.rows[0];
        assert_eq!(tctl.cells[1].text, "86.0C");
        assert_eq!(tctl.cells[1].level, Level::High);
        assert_eq!(tctl.cells[2].text, "95.0C");
        let nvme = &panel.rows[1];
        assert_eq!(nvme.cells[1].level, Level::Normal);
        assert_eq!(nvme.cells[2].text, ".");
    }

    #[test]
    fn gpu_power_and_memory() {
        static FIELDS: FieldSpec = FieldSpec::new(&[
            ("microwatts", FieldKind::Gauge),
            ("microwatts_cap", FieldKind::Gauge),
            ("vram_used", FieldKind::Gauge),
            ("vram_total", FieldKind::Gauge),
        ]);
        let sample = RawSample::new(Instant::now())
            .with(
                "amdgpu/power",
                Entity::new()
                    .with("microwatts", 190_000_000)
                    .with("microwatts_cap", 200_000_000),
            )
            .with(
                "amdgpu/vram",
                Entity::new()
                    .with("vram_used", 7680 << 20)
                    .with("vram_total", 8 << 30),
            );
        let panel = sensors(&compute_deltas(None, &sample, &FIELDS), WIDTH).unwrap();

        let power = &panel.rows[0];
        assert_eq!(power.cells[0].text, "amdgpu/power");
        assert_eq!(power.cells[1].text, "190.0W");
        assert_eq!(power.cells[1].level, Level::High);
        assert_eq!(power.cells[2].text, "200.0W");
        let vram = &panel.rows[1];
        assert_eq!(vram.cells[1].text, "7680M");
        assert_eq!(vram.cells[1].level, Level::High);
        assert_eq!(vram.cells[2].text, "8192M");
    }

    #[test]
    fn cache_hit_ratios() {
        static FIELDS: FieldSpec = FieldSpec::new(&[
            ("total_blocks", FieldKind::Gauge),
            ("used_blocks", FieldKind::Gauge),
            ("dirty_blocks", FieldKind::Gauge),
            ("read_hits", FieldKind::Counter),
            ("read_misses", FieldKind::Counter),
        ]);
        let device = |hits, misses| {
            Entity::new()
                .with("total_blocks", 1000)
                .with("used_blocks", 500)
                .with("dirty_blocks", 800)
                .with("read_hits", hits)
                .with("read_misses", misses)
        };
        let before = RawSample::new(Instant::now()).with("vg0/data", device(0, 0));
        let set = over_a_second(
            before,
            |time| RawSample::new(time).with("vg0/data", device(30, 70)),
            &FIELDS,
        );
        let panel = cache(&set, WIDTH).unwrap();

        let data = &panel.rows[0];
        assert_eq!(data.cells[1].text, "50.0%");
        assert_eq!(data.cells[2].level, Level::High);
        assert_eq!(data.cells[3].text, "30.0%");
        assert_eq!(data.cells[3].level, Level::Medium);
        assert_eq!(data.cells[4].text, ".");
    }

    #[test]
    fn no_devices_no_panel() {
        let set = DeltaSet::default();
        assert!(network(&set, WIDTH).is_none());
        assert!(block(&set, WIDTH).is_none());
        assert!(cpu(&set, WIDTH).is_none());
    }
}
