//! panel models: the rows and cells each dashboard panel shows, built from one tick's deltas.
//!
//! a panel is a small table. every cell occupies one grid column, except for a trailing wide
//! cell, which fills whatever room its panel is given.

use {
    crate::{
        reader::ReaderKind,
        sample::EntityId,
        sentinel::Observation,
    },
    std::cmp::Ordering,
};

mod devices;
mod process;
mod system;

/// the panels, in priority order.
///
/// when space runs out, panels later in this order are the first to go.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum PanelKind {
    Memory,
    Swap,
    Pressure,
    Activity,
    Cpu,
    Network,
    Block,
    Filesystem,
    Sensors,
    Cache,
    Process,
}

/// how alarming a value is.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Level {
    #[default]
    Normal,
    Heading,
    Medium,
    High,
    Critical,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Align {
    Left,
    #[default]
    Right,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub text: String,
    pub level: Level,
    pub align: Align,
    /// fills the rest of the panel's width. only the last cell of a row may be wide.
    pub wide: bool,
    /// draws a meter filled to this fraction, instead of text.
    pub meter: Option<f64>,
}

/// orders the rows of a panel that shows only its most significant entities.
#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    /// larger weights sort first. unknown weights sort last.
    pub weight: Option<f64>,
    /// breaks ties, in ascending order.
    pub entity: EntityId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub key: Option<SortKey>,
}

/// one panel, ready to be laid out.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelModel {
    pub kind: PanelKind,
    pub header: Vec<Cell>,
    pub rows: Vec<Row>,
    /// the preferred width, in grid columns.
    pub columns: u16,
    /// the narrowest the panel may be clipped to.
    pub min_columns: u16,
    /// the fewest lines the panel may be given, header included.
    pub min_rows: u16,
    /// true if nothing of lower priority is shown when this panel does not fit.
    pub mandatory: bool,
    /// true if the panel spans a whole band, and takes the rows that remain.
    pub elastic: bool,
}

/// warning thresholds of a value, in the value's own unit.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Threshold {
    medium: f64,
    high: f64,
    critical: f64,
}

/// builds the panels for one tick, in priority order.
///
/// panels whose reader produced nothing this tick are left out.
pub fn build(observation: &Observation, column_width: u16) -> Vec<PanelModel> {
    // one character of every cell separates it from its neighbour.
    let width = usize::from(column_width.saturating_sub(1)).max(1);
    let set = |kind| observation.get(kind);

    [
        set(ReaderKind::Memory).and_then(|set| system::memory(set, width)),
        set(ReaderKind::Swap).and_then(|set| system::swap(set, width)),
        set(ReaderKind::Pressure).and_then(|set| system::pressure(set, width)),
        set(ReaderKind::Cpu).and_then(|set| system::activity(set, width)),
        set(ReaderKind::Cpu).and_then(|set| devices::cpu(set, width)),
        set(ReaderKind::Network).and_then(|set| devices::network(set, width)),
        set(ReaderKind::Block).and_then(|set| devices::block(set, width)),
        set(ReaderKind::Filesystem).and_then(|set| devices::filesystem(set, width)),
        set(ReaderKind::Sensors).and_then(|set| devices::sensors(set, width)),
        set(ReaderKind::Cache).and_then(|set| devices::cache(set, width)),
        set(ReaderKind::Process).and_then(|set| process::table(set, width)),
    ]
    .into_iter()
    .flatten()
    .collect()
}

// === impl PanelKind ===

impl PanelKind {
    /// returns true for the system-wide panels that are always shown.
    pub fn is_mandatory(self) -> bool {
        matches!(
            self,
            Self::Memory | Self::Swap | Self::Pressure | Self::Activity
        )
    }
}

// === impl Cell ===

impl Cell {
    pub fn heading(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: Level::Heading,
            align: Align::Right,
            wide: false,
            meter: None,
        }
    }

    /// a left-aligned name, such as a device or a command.
    pub fn label(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level: Level::Normal,
            align: Align::Left,
            wide: false,
            meter: None,
        }
    }

    /// a right-aligned value.
    pub fn value(text: impl Into<String>, level: Level) -> Self {
        Self {
            text: text.into(),
            level,
            align: Align::Right,
            wide: false,
            meter: None,
        }
    }

    /// a bar meter, filling the rest of the panel's width.
    pub fn meter(fraction: f64, level: Level) -> Self {
        Self {
            meter: Some(fraction),
            ..Self::value("", level).wide()
        }
    }

    /// an unknown value.
    pub fn blank() -> Self {
        Self::value(".", Level::Normal)
    }

    pub fn left(mut self) -> Self {
        self.align = Align::Left;
        self
    }

    pub fn wide(mut self) -> Self {
        self.wide = true;
        self
    }
}

// === impl Row ===

impl Row {
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { cells, key: None }
    }

    pub fn keyed(cells: Vec<Cell>, weight: Option<f64>, entity: EntityId) -> Self {
        Self {
            cells,
            key: Some(SortKey { weight, entity }),
        }
    }
}

// === impl SortKey ===

impl SortKey {
    /// orders by descending weight, then ascending entity.
    pub fn order(&self, other: &Self) -> Ordering {
        let weight = match (self.weight, other.weight) {
            (Some(a), Some(b)) => b.total_cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        weight.then_with(|| self.entity.cmp(&other.entity))
    }
}

// === impl PanelModel ===

impl PanelModel {
    /// a panel that is as wide as its header, and shows every row.
    pub fn new(kind: PanelKind, header: Vec<Cell>, rows: Vec<Row>) -> Self {
        let columns = u16::try_from(header.len()).unwrap_or(u16::MAX);
        let lines = u16::try_from(rows.len() + 1).unwrap_or(u16::MAX);
        Self {
            kind,
            header,
            rows,
            columns,
            min_columns: columns,
            min_rows: lines,
            mandatory: kind.is_mandatory(),
            elastic: false,
        }
    }

    /// allows the panel to be clipped down to `columns`.
    pub fn min_columns(mut self, columns: u16) -> Self {
        self.min_columns = columns.min(self.columns);
        self
    }

    /// lets the panel's wide cells take `columns` more grid columns when there is room.
    pub fn widen(mut self, columns: u16) -> Self {
        self.columns = self.columns.saturating_add(columns);
        self
    }

    /// allows rows to be truncated, down to the header and one row.
    pub fn variable(mut self) -> Self {
        self.min_rows = self.min_rows.min(2);
        self
    }

    pub fn elastic(mut self) -> Self {
        self.elastic = true;
        self.variable()
    }

    /// the lines needed to show every row, header included.
    pub fn preferred_rows(&self) -> u16 {
        u16::try_from(self.rows.len() + 1).unwrap_or(u16::MAX)
    }

    /// orders keyed rows by their sort key. unkeyed rows keep their place at the end.
    pub fn sort_rows(&mut self) {
        self.rows.sort_by(|a, b| match (&a.key, &b.key) {
            (Some(a), Some(b)) => a.order(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
    }
}

// === impl Threshold ===

impl Threshold {
    pub(crate) const fn new(medium: f64, high: f64, critical: f64) -> Self {
        Self {
            medium,
            high,
            critical,
        }
    }

    pub(crate) fn level(&self, value: f64) -> Level {
        let Self {
            medium,
            high,
            critical,
        } = *self;
        match value {
            v if v >= critical => Level::Critical,
            v if v >= high => Level::High,
            v if v >= medium => Level::Medium,
            _ => Level::Normal,
        }
    }

    /// the level of an optional value. unknown values are normal.
    pub(crate) fn level_of(&self, value: Option<f64>) -> Level {
        value.map_or(Level::Normal, |value| self.level(value))
    }
}

/// the share `part` is of `whole`, in percent.
pub(crate) fn percent_of(part: f64, whole: f64) -> Option<f64> {
    (whole > 0.0).then(|| part / whole * 100.0)
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

    #[test]
    fn thresholds() {
        let threshold = Threshold::new(40.0, 60.0, 80.0);
        assert_eq!(threshold.level(10.0), Level::Normal);
        assert_eq!(threshold.level(40.0), Level::Medium);
        assert_eq!(threshold.level(79.9), Level::High);
        assert_eq!(threshold.level(100.0), Level::Critical);
        assert_eq!(threshold.level_of(None), Level::Normal);
    }

    #[test]
    fn sort_keys_order_by_weight_then_entity() {
        let key = |weight, pid: u32| SortKey {
            weight,
            entity: EntityId::from(pid),
        };
        let mut keys = vec![
            key(None, 1),
            key(Some(5.0), 9),
            key(Some(50.0), 3),
            key(Some(5.0), 2),
        ];
        keys.sort_by(SortKey::order);
        let pids = keys.iter().map(|key| key.entity.to_string()).collect::<Vec<_>>();
        assert_eq!(pids, ["3", "2", "9", "1"]);
    }

    #[test]
    fn variable_panels_keep_a_header_and_a_row() {
        let rows = (0..5).map(|_| Row::new(vec![Cell::blank()])).collect();
        let panel = PanelModel::new(PanelKind::Network, vec![Cell::heading("IFACE")], rows);
        assert_eq!(panel.min_rows, 6);
        assert_eq!(panel.variable().min_rows, 2);
    }

    #[test]
    fn builds_panels_in_priority_order() {
        static MEMORY: FieldSpec = FieldSpec::new(&[
            ("total", FieldKind::Gauge),
            ("free", FieldKind::Gauge),
            ("available", FieldKind::Gauge),
        ]);
        static PROCESS: FieldSpec = FieldSpec::new(&[
            ("cpu_ms", FieldKind::Counter),
            ("state", FieldKind::Gauge),
        ]);

        let now = Instant::now();
        let ram = Entity::new()
            .with("total", 1000)
            .with("free", 100)
            .with("available", 400);
        let memory = RawSample::new(now).with("ram", ram);
        let process = |ms| {
            Entity::new()
                .with("cpu_ms", ms)
                .with("state", u64::from('S'))
                .with_label("sh")
        };
        let before = RawSample::new(now).with(7_u32, process(0));
        let after = RawSample::new(now + Duration::from_secs(1)).with(7_u32, process(250));

        let mut observation = Observation::default();
        observation.insert(
            ReaderKind::Process,
            compute_deltas(Some(&before), &after, &PROCESS),
        );
        observation.insert(
            ReaderKind::Memory,
            compute_deltas(None, &memory, &MEMORY),
        );

        let panels = build(&observation, 10);
        let kinds = panels.iter().map(|panel| panel.kind).collect::<Vec<_>>();
        assert_eq!(kinds, [PanelKind::Memory, PanelKind::Process]);
        assert!(panels[0].mandatory);
        assert!(panels[1].elastic);
    }

    #[test]
    fn nothing_observed_builds_nothing() {
        assert!(build(&Observation::default(), 10).is_empty());
    }
}
