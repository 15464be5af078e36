//! Property-based tests for grid geometry.

use core_layout::{LayoutInputs, compute_layout};
use proptest::prelude::*;

fn inputs(item_count: usize, columns: usize, container_width: f64, spacing: f64) -> LayoutInputs {
    LayoutInputs {
        item_count,
        columns,
        container_width,
        spacing,
    }
}

proptest! {
    // rows == ceil(items / columns), and a non-empty collection always has rows
    #[test]
    fn row_count_is_ceiling(items in 1usize..5000, columns in 1usize..64) {
        let l = compute_layout(&inputs(items, columns, 300.0, 4.0)).unwrap();
        prop_assert_eq!(l.row_count, items.div_ceil(columns));
        prop_assert!(l.row_count > 0);
    }

    #[test]
    fn partial_row_matches_remainder(items in 1usize..5000, columns in 1usize..64) {
        let l = compute_layout(&inputs(items, columns, 300.0, 4.0)).unwrap();
        if items % columns == 0 {
            prop_assert!(l.partial_row.is_none());
        } else {
            let p = l.partial_row.unwrap();
            prop_assert_eq!(p.index, items / columns);
            prop_assert_eq!(p.item_count, items % columns);
            prop_assert_eq!(p.index + 1, l.row_count);
        }
    }

    #[test]
    fn cell_width_formula_is_exact(
        width in 1.0f64..10_000.0,
        spacing in 0.0f64..50.0,
        columns in 1usize..32,
    ) {
        let l = compute_layout(&inputs(1, columns, width, spacing)).unwrap();
        let expected = (width - (columns - 1) as f64 * spacing) / columns as f64;
        prop_assert_eq!(l.cell_width, expected);
    }

    #[test]
    fn same_inputs_same_layout(items in 0usize..500, columns in 1usize..16) {
        let i = inputs(items, columns, 310.0, 10.0);
        prop_assert_eq!(compute_layout(&i), compute_layout(&i));
    }
}

#[test]
fn empty_collection_has_no_layout() {
    assert!(compute_layout(&inputs(0, 3, 310.0, 10.0)).is_none());
}
