use crate::models::{Grid, MergeRegion};

/// Copy each merge origin's value into the empty cells of its region.
///
/// Cells that already hold a value are left alone, so resolving twice yields
/// the same grid. Only rows inside a region grow to reach its last column.
/// Overlapping regions are not expected; if they occur, each region reads its
/// origin from the input grid, so processing order cannot chain values.
pub fn resolve_merges(grid: &Grid, merges: &[MergeRegion]) -> Grid {
    let mut out = grid.clone();
    for region in merges {
        let origin = grid.get(region.start_row, region.start_col);
        if origin.is_empty() {
            continue;
        }
        for r in region.start_row..=region.end_row {
            for c in region.start_col..=region.end_col {
                if out.get(r, c).is_empty() {
                    out.set(r, c, origin.clone());
                }
            }
        }
    }
    out
}
