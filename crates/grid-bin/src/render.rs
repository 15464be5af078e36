//! Text rendering of the published grid.
//!
//! Rows come from the published layout, cells from the live collection. The
//! two can briefly disagree (a mutation whose recomputation has not landed
//! yet); cells with no item behind them are skipped, rows are never invented.

use std::io::{self, Write};

use core_items::ViewState;
use core_layout::{GridLayout, LayoutEngine};

/// Layout points per rendered character.
const POINTS_PER_CHAR: f64 = 8.0;

fn state_glyph(state: ViewState) -> char {
    match state {
        ViewState::Loading => '~',
        ViewState::NoContent => '-',
        ViewState::ContentShowing => '+',
    }
}

pub fn header(generation: u64, layout: &GridLayout) -> String {
    let partial = match layout.partial_row {
        Some(p) => format!("row {} x{}", p.index, p.item_count),
        None => "none".to_string(),
    };
    format!(
        "gen {} | rows {} | cell {:.2} | partial {}",
        generation, layout.row_count, layout.cell_width, partial
    )
}

pub fn row_lines(engine: &LayoutEngine) -> Vec<String> {
    let layout = engine.layout();
    let columns = engine.config().columns();
    let cell_chars = ((layout.cell_width / POINTS_PER_CHAR).floor() as usize).max(3);
    (0..layout.row_count)
        .map(|row| {
            (0..layout.cells_in_row(row, columns))
                .filter_map(|column| engine.get_item(row, column))
                .map(|item| {
                    let label = format!("{}{}", item.id, state_glyph(item.view_state));
                    format!("[{label:^width$}]", width = cell_chars)
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

pub fn render_grid<W: Write>(out: &mut W, engine: &LayoutEngine) -> io::Result<()> {
    let snapshot = engine.snapshot();
    writeln!(out, "{}", header(snapshot.generation, &snapshot.layout))?;
    for line in row_lines(engine) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
