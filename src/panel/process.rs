//! the process table.

use {
    super::{Cell, Level, PanelKind, PanelModel, Row, Threshold, system::headings},
    crate::{
        delta::{DeltaSet, EntityDelta},
        format,
    },
};

const CPU: Threshold = Threshold::new(40.0, 60.0, 80.0);

/// one row per process, keyed by cpu usage.
///
/// the rows are left unsorted; the layout orders them once it knows how many fit.
pub(super) fn table(set: &DeltaSet, width: usize) -> Option<PanelModel> {
    let rows = set
        .entities()
        .map(|(pid, process)| {
            // milliseconds of cpu time per second, as a percentage of one cpu.
            let cpu = process.rate("cpu_ms").map(|rate| rate / 10.0);
            let cells = vec![
                Cell::value(pid.to_string(), Level::Normal),
                state(process),
                cpu.map_or_else(Cell::blank, |cpu| {
                    Cell::value(format::percent(cpu, width), CPU.level(cpu))
                }),
                process.value("rss").map_or_else(Cell::blank, |rss| {
                    Cell::value(format::bytes(rss, width), Level::Normal)
                }),
                process.value("threads").map_or_else(Cell::blank, |threads| {
                    Cell::value(threads.to_string(), Level::Normal)
                }),
                Cell::label(process.label().unwrap_or_default()).wide(),
            ];
            Row::keyed(cells, cpu, pid.clone())
        })
        .collect::<Vec<_>>();
    if rows.is_empty() {
        return None;
    }

    let mut header = headings(&["PID", "S", "CPU%", "RSS", "THR", "COMMAND"]);
    header[5] = header[5].clone().left().wide();
    Some(
        PanelModel::new(PanelKind::Process, header, rows)
            .widen(2)
            .min_columns(3)
            .elastic(),
    )
}

/// the process state letter. running tasks are worth a glance, uninterruptible ones more so.
fn state(process: &EntityDelta) -> Cell {
    let Some(state) = process
        .value("state")
        .and_then(|state| u32::try_from(state).ok())
        .and_then(char::from_u32)
    else {
        return Cell::blank();
    };
    let level = match state {
        'R' => Level::Medium,
        'D' => Level::Critical,
        _ => Level::Normal,
    };
    Cell::value(state.to_string(), level)
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            delta::{FieldKind, FieldSpec, compute_deltas},
            panel::SortKey,
            sample::{Entity, EntityId, RawSample},
        },
        std::time::{Duration, Instant},
    };

    static FIELDS: FieldSpec = FieldSpec::new(&[
        ("cpu_ms", FieldKind::Counter),
        ("state", FieldKind::Gauge),
        ("rss", FieldKind::Gauge),
        ("threads", FieldKind::Gauge),
    ]);

    fn process(cpu_ms: u64, state: char, comm: &str) -> Entity {
        Entity::new()
            .with("cpu_ms", cpu_ms)
            .with("state", u64::from(state))
            .with("rss", 4 << 20)
            .with("threads", 2)
            .with_label(comm)
    }

    #[test]
    fn rows_carry_cpu_keys() {
        let start = Instant::now();
        let before = RawSample::new(start)
            .with(10_u32, process(0, 'S', "sshd"))
            .with(20_u32, process(0, 'R', "rustc"));
        let after = RawSample::new(start + Duration::from_secs(1))
            .with(10_u32, process(5, 'S', "sshd"))
            .with(20_u32, process(900, 'R', "rustc"))
            .with(30_u32, process(70, 'D', "dd"));
        let panel = table(&compute_deltas(Some(&before), &after, &FIELDS), 9).unwrap();

        assert!(panel.elastic);
        assert_eq!(panel.min_rows, 2);
        assert_eq!(panel.rows.len(), 3);

        let rustc = &panel.rows[1];
        let texts = rustc.cells.iter().map(|c| c.text.as_str()).collect::<Vec<_>>();
        assert_eq!(texts, ["20", "R", "90.0%", "4096K", "2", "rustc"]);
        assert_eq!(rustc.cells[1].level, Level::Medium);
        assert_eq!(rustc.cells[2].level, Level::Critical);
        assert_eq!(
            rustc.key,
            Some(SortKey {
                weight: Some(90.0),
                entity: EntityId::Index(20),
            })
        );

        // a process new this tick has no cpu figure yet.
        let dd = &panel.rows[2];
        assert_eq!(dd.cells[1].level, Level::Critical);
        assert_eq!(dd.cells[2].text, ".");
        assert_eq!(dd.key.as_ref().and_then(|key| key.weight), None);
    }

    #[test]
    fn empty_process_list() {
        assert!(table(&DeltaSet::default(), 9).is_none());
    }
}
