//! Pure grid geometry.
//!
//! `compute_layout` is the whole algorithm: arithmetic over a captured
//! [`LayoutInputs`] value, no shared state. An empty collection yields `None`
//! so the caller can keep whatever layout it already published.

use crate::LayoutError;

/// Validated layout configuration. Fields are only reachable through
/// setters that reject invalid values and keep the previous one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    container_width: f64,
    spacing: f64,
    columns: usize,
}

impl LayoutConfig {
    pub fn new(container_width: f64, spacing: f64, columns: usize) -> Result<Self, LayoutError> {
        Ok(Self {
            container_width: Self::check_container_width(container_width)?,
            spacing: Self::check_spacing(spacing)?,
            columns: Self::check_columns(columns)?,
        })
    }

    pub fn container_width(&self) -> f64 {
        self.container_width
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cell_width(&self) -> f64 {
        cell_width(self.container_width, self.spacing, self.columns)
    }

    pub(crate) fn set_container_width(&mut self, width: f64) -> Result<(), LayoutError> {
        self.container_width = Self::check_container_width(width)?;
        Ok(())
    }

    pub(crate) fn set_spacing(&mut self, spacing: f64) -> Result<(), LayoutError> {
        self.spacing = Self::check_spacing(spacing)?;
        Ok(())
    }

    pub(crate) fn set_columns(&mut self, columns: usize) -> Result<(), LayoutError> {
        self.columns = Self::check_columns(columns)?;
        Ok(())
    }

    fn check_container_width(width: f64) -> Result<f64, LayoutError> {
        if width.is_finite() && width > 0.0 {
            Ok(width)
        } else {
            Err(LayoutError::InvalidContainerWidth(width))
        }
    }

    fn check_spacing(spacing: f64) -> Result<f64, LayoutError> {
        if spacing.is_finite() && spacing >= 0.0 {
            Ok(spacing)
        } else {
            Err(LayoutError::InvalidSpacing(spacing))
        }
    }

    fn check_columns(columns: usize) -> Result<usize, LayoutError> {
        if columns >= 1 {
            Ok(columns)
        } else {
            Err(LayoutError::InvalidColumns(columns))
        }
    }
}

/// Inputs captured at scheduling time and moved into the background task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutInputs {
    pub item_count: usize,
    pub columns: usize,
    pub container_width: f64,
    pub spacing: f64,
}

impl LayoutInputs {
    pub fn capture(config: &LayoutConfig, item_count: usize) -> Self {
        Self {
            item_count,
            columns: config.columns,
            container_width: config.container_width,
            spacing: config.spacing,
        }
    }
}

/// The row holding the remainder when `item_count % columns != 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartialRow {
    pub index: usize,
    pub item_count: usize,
}

/// Derived geometry. Always replaced as one value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub cell_width: f64,
    pub row_count: usize,
    pub partial_row: Option<PartialRow>,
}

impl GridLayout {
    /// Zero rows; used as the initial layout of an engine seeded with nothing.
    pub fn empty(cell_width: f64) -> Self {
        Self {
            cell_width,
            row_count: 0,
            partial_row: None,
        }
    }

    pub fn partial_row_index(&self) -> Option<usize> {
        self.partial_row.map(|p| p.index)
    }

    /// Items in the partial row, `0` when every row is full.
    pub fn partial_row_item_count(&self) -> usize {
        self.partial_row.map_or(0, |p| p.item_count)
    }

    /// Number of cells to draw in `row`.
    pub fn cells_in_row(&self, row: usize, columns: usize) -> usize {
        match self.partial_row {
            Some(p) if p.index == row => p.item_count,
            _ if row < self.row_count => columns,
            _ => 0,
        }
    }
}

fn cell_width(container_width: f64, spacing: f64, columns: usize) -> f64 {
    (container_width - (columns - 1) as f64 * spacing) / columns as f64
}

/// Compute the grid for `inputs`. `None` for an empty collection.
pub fn compute_layout(inputs: &LayoutInputs) -> Option<GridLayout> {
    if inputs.item_count == 0 {
        return None;
    }
    debug_assert!(inputs.columns >= 1, "columns validated at the config boundary");
    let cell_width = cell_width(inputs.container_width, inputs.spacing, inputs.columns);
    let quotient = inputs.item_count / inputs.columns;
    let remainder = inputs.item_count % inputs.columns;
    let row_count = quotient + usize::from(remainder > 0);
    let partial_row = (remainder > 0).then_some(PartialRow {
        index: quotient,
        item_count: remainder,
    });
    Some(GridLayout {
        cell_width,
        row_count,
        partial_row,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(item_count: usize, columns: usize) -> LayoutInputs {
        LayoutInputs {
            item_count,
            columns,
            container_width: 310.0,
            spacing: 10.0,
        }
    }

    #[test]
    fn eight_items_three_columns() {
        let l = compute_layout(&inputs(8, 3)).unwrap();
        assert!((l.cell_width - 96.667).abs() < 1e-3);
        assert_eq!(l.row_count, 3);
        assert_eq!(
            l.partial_row,
            Some(PartialRow {
                index: 2,
                item_count: 2
            })
        );
    }

    #[test]
    fn exact_multiple_has_no_partial_row() {
        let l = compute_layout(&inputs(6, 3)).unwrap();
        assert_eq!(l.row_count, 2);
        assert_eq!(l.partial_row_index(), None);
        assert_eq!(l.partial_row_item_count(), 0);
    }

    #[test]
    fn empty_collection_yields_none() {
        assert!(compute_layout(&inputs(0, 3)).is_none());
    }

    #[test]
    fn single_column_cell_spans_container() {
        let l = compute_layout(&inputs(2, 1)).unwrap();
        assert_eq!(l.cell_width, 310.0);
        assert_eq!(l.row_count, 2);
    }

    #[test]
    fn cells_in_row_respects_partial_row() {
        let l = compute_layout(&inputs(8, 3)).unwrap();
        assert_eq!(l.cells_in_row(0, 3), 3);
        assert_eq!(l.cells_in_row(2, 3), 2);
        assert_eq!(l.cells_in_row(3, 3), 0);
    }

    #[test]
    fn config_rejects_invalid_values_and_keeps_previous() {
        assert_eq!(
            LayoutConfig::new(310.0, 10.0, 0),
            Err(LayoutError::InvalidColumns(0))
        );
        assert!(matches!(
            LayoutConfig::new(0.0, 10.0, 3),
            Err(LayoutError::InvalidContainerWidth(_))
        ));
        assert!(matches!(
            LayoutConfig::new(100.0, f64::NAN, 3),
            Err(LayoutError::InvalidSpacing(_))
        ));

        let mut cfg = LayoutConfig::new(310.0, 10.0, 3).unwrap();
        assert!(cfg.set_columns(0).is_err());
        assert!(cfg.set_spacing(-1.0).is_err());
        assert_eq!(cfg.columns(), 3);
        assert_eq!(cfg.spacing(), 10.0);
    }
}
