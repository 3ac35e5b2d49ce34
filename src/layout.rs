//! arranges panels on a grid that fits the terminal.
//!
//! the terminal is divided into grid columns of a fixed width. panels are packed left to right
//! into bands, in priority order, and bands are stacked top to bottom with a blank line between
//! them. every band first gets the rows it cannot do without; rows to spare then go to bands in
//! priority order, so the process table, last of all, takes whatever remains.

use {crate::panel::PanelModel, std::mem};

/// where every panel goes, for one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutPlan {
    pub width: u16,
    pub height: u16,
    pub column_width: u16,
    pub placements: Vec<Placement>,
    /// a one-line message shown instead of panels, when none could be placed.
    pub notice: Option<String>,
}

/// one placed panel. its rows are already sorted and truncated to fit.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub panel: PanelModel,
    /// the first grid column.
    pub column: u16,
    /// the first line.
    pub top: u16,
    /// the width, in grid columns.
    pub columns: u16,
    /// the height in lines, header included.
    pub rows: u16,
}

/// panels placed side by side.
#[derive(Debug, Default)]
struct Band {
    panels: Vec<(PanelModel, u16)>,
    used: u16,
}

/// plans the layout of `panels` on a terminal of `width` by `height` characters.
///
/// panels that do not fit are dropped, lowest priority first. when even a mandatory panel does not
/// fit, every panel after it is dropped as well.
pub fn plan(mut panels: Vec<PanelModel>, width: u16, height: u16, column_width: u16) -> LayoutPlan {
    let column_width = column_width.max(1);
    let grid = width / column_width;
    let offered = panels.len();
    panels.sort_by_key(|panel| panel.kind);

    let bands = pack(panels, grid);
    let bands = allot(bands, height);

    let mut placements = Vec::new();
    let mut top = 0_u16;
    for (index, (band, rows)) in bands.into_iter().enumerate() {
        if index > 0 {
            top += 1;
        }
        let mut column = 0_u16;
        for (mut panel, columns) in band.panels {
            let rows = rows.min(panel.preferred_rows());
            panel.sort_rows();
            panel.rows.truncate(usize::from(rows.saturating_sub(1)));
            placements.push(Placement {
                panel,
                column,
                top,
                columns,
                rows,
            });
            column += columns;
        }
        top += rows;
    }

    let notice = placements.is_empty().then(|| {
        let message = if offered == 0 {
            "no data available"
        } else {
            "terminal too small"
        };
        message.chars().take(usize::from(width)).collect()
    });

    LayoutPlan {
        width,
        height,
        column_width,
        placements,
        notice,
    }
}

/// packs panels into bands no wider than `grid` columns.
fn pack(panels: Vec<PanelModel>, grid: u16) -> Vec<Band> {
    let mut bands = Vec::new();
    let mut current = Band::default();

    for panel in panels {
        let Some(columns) = fit_width(&panel, grid) else {
            if panel.mandatory {
                break;
            }
            continue;
        };

        let full = current.used.saturating_add(columns) > grid;
        if (panel.elastic || full) && !current.panels.is_empty() {
            bands.push(mem::take(&mut current));
        }
        let elastic = panel.elastic;
        current.used += columns;
        current.panels.push((panel, columns));
        if elastic {
            bands.push(mem::take(&mut current));
        }
    }
    if !current.panels.is_empty() {
        bands.push(current);
    }

    bands
}

/// the width a panel gets on a grid of `grid` columns, if it fits at all.
fn fit_width(panel: &PanelModel, grid: u16) -> Option<u16> {
    let preferred = panel.columns.max(1);
    let min = panel.min_columns.clamp(1, preferred);
    match grid {
        _ if min > grid => None,
        _ if panel.elastic => Some(grid),
        _ => Some(preferred.min(grid)),
    }
}

/// decides the height of every band, dropping the bands that do not fit in `height` lines.
fn allot(bands: Vec<Band>, height: u16) -> Vec<(Band, u16)> {
    let mut remaining = height;
    let mut kept = Vec::<(Band, u16)>::new();

    for band in bands {
        let separator = u16::from(!kept.is_empty());
        let min = band.min_rows();
        match min.checked_add(separator) {
            Some(needed) if needed <= remaining => {
                remaining -= needed;
                kept.push((band, min));
            }
            _ if band.is_mandatory() => break,
            _ => continue,
        }
    }

    for (band, rows) in &mut kept {
        let extra = band.preferred_rows().saturating_sub(*rows).min(remaining);
        *rows += extra;
        remaining -= extra;
    }

    kept
}

// === impl Band ===

impl Band {
    fn min_rows(&self) -> u16 {
        self.panels
            .iter()
            .map(|(panel, _)| panel.min_rows.max(1))
            .max()
            .unwrap_or(0)
    }

    fn preferred_rows(&self) -> u16 {
        self.panels
            .iter()
            .map(|(panel, _)| panel.preferred_rows())
            .max()
            .unwrap_or(0)
    }

    fn is_mandatory(&self) -> bool {
        self.panels.iter().any(|(panel, _)| panel.mandatory)
    }
}

// === impl LayoutPlan ===

impl LayoutPlan {
    /// the number of lines the plan occupies.
    pub fn lines(&self) -> u16 {
        if self.notice.is_some() {
            return self.height.min(1);
        }
        self.placements
            .iter()
            .map(|placement| placement.top + placement.rows)
            .max()
            .unwrap_or(0)
    }
}
