//! Per-tile merge of priority-ordered cell-range streams.
//!
//! Candidates from every relevant fragment go into a max-heap keyed by
//! starting cell, newest fragment first on ties. Popping yields the newest
//! earliest-starting range; older ranges colliding with it are trimmed or
//! discarded, newer ranges starting inside it split it, and sparse
//! multi-cell ranges are expanded into unary ranges cell by cell. The
//! result is a disjoint sequence, ascending in cell order, where every
//! overlap is resolved to the newest fragment.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use tilestore_fragment::Fragment;
use tilestore_result::Result;
use tilestore_schema::{cell_order_cmp, ArraySchema};
use tilestore_types::{
    CellOrder, CellPosRange, CoordScalar, FragmentCellPosRange, FragmentCellPosRanges,
    FragmentCellRange,
};

/// Heap entry: a candidate range plus the cell order it compares under.
struct QueueEntry<T> {
    range: FragmentCellRange<T>,
    order: CellOrder,
}

impl<T: CoordScalar> QueueEntry<T> {
    fn new(range: FragmentCellRange<T>, order: CellOrder) -> Self {
        Self { range, order }
    }
}

impl<T: CoordScalar> PartialEq for QueueEntry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T: CoordScalar> Eq for QueueEntry<T> {}

impl<T: CoordScalar> PartialOrd for QueueEntry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Max-heap: greatest = earliest starting cell, newest fragment on ties.
impl<T: CoordScalar> Ord for QueueEntry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        cell_order_cmp(self.order, other.range.lo(), self.range.lo())
            .then_with(|| self.range.fragment.cmp(&other.range.fragment))
    }
}

/// Merge the unsorted candidate ranges of one tile into a disjoint,
/// ordered, override-resolved sequence.
pub(crate) fn merge_cell_ranges<T: CoordScalar, F: Fragment>(
    schema: &ArraySchema,
    fragments: &[F],
    tile_coords: &[T],
    unsorted: Vec<FragmentCellRange<T>>,
) -> Result<Vec<FragmentCellRange<T>>> {
    let order = schema.cell_order();
    let dim_num = schema.dim_num();
    let tile_rect = schema.tile_rect::<T>(tile_coords)?;
    let tile_end: Vec<T> = (0..dim_num).map(|i| tile_rect[2 * i + 1]).collect();

    let mut queue: BinaryHeap<QueueEntry<T>> = unsorted
        .into_iter()
        .map(|r| QueueEntry::new(r, order))
        .collect();
    let mut merged: Vec<FragmentCellRange<T>> = Vec::new();

    while let Some(entry) = queue.pop() {
        let mut popped = entry.range;
        let popped_dense = popped
            .fragment
            .map(|f| fragments[f].dense())
            .unwrap_or(true);

        if queue.is_empty() {
            if popped_dense
                || !popped.is_unary()
                || fragments[popped.fragment.expect("sparse range has a fragment")]
                    .coords_exist(schema, popped.lo())?
            {
                merged.push(popped);
            }
            continue;
        }

        if popped_dense || popped.is_unary() {
            // A unary sparse range with no stored cell there is noise.
            if !popped_dense
                && !fragments[popped.fragment.expect("sparse range has a fragment")]
                    .coords_exist(schema, popped.lo())?
            {
                continue;
            }

            // Older ranges starting inside popped's span are overridden:
            // trim the part extending past popped back into the queue,
            // discard the rest.
            while let Some(top) = queue.peek() {
                let collides = top.range.fragment < popped.fragment
                    && cell_order_cmp(order, top.range.lo(), popped.lo()) != Ordering::Less
                    && cell_order_cmp(order, top.range.lo(), popped.hi()) != Ordering::Greater;
                if !collides {
                    break;
                }
                let top = queue.pop().expect("peeked entry").range;
                if cell_order_cmp(order, top.hi(), popped.hi()) == Ordering::Greater {
                    let mut trimmed = top;
                    trimmed.set_lo(popped.hi());
                    schema.get_next_cell_coords(&tile_rect, trimmed.lo_mut());
                    queue.push(QueueEntry::new(trimmed, order));
                }
            }

            // A newer range starting inside popped splits it: emit the
            // prefix now, return the suffix past the newer range to the
            // queue under popped's fragment.
            let split = match queue.peek() {
                Some(top)
                    if top.range.fragment > popped.fragment
                        && cell_order_cmp(order, top.range.lo(), popped.hi())
                            != Ordering::Greater =>
                {
                    Some((top.range.lo().to_vec(), top.range.hi().to_vec()))
                }
                _ => None,
            };
            if let Some((top_lo, top_hi)) = split {
                if cell_order_cmp(order, &top_hi, popped.hi()) == Ordering::Less {
                    let mut suffix =
                        FragmentCellRange::new(popped.fragment, &top_hi, popped.hi());
                    schema.get_next_cell_coords(&tile_rect, suffix.lo_mut());
                    queue.push(QueueEntry::new(suffix, order));
                }
                popped.set_hi(&top_lo);
                schema.get_previous_cell_coords(&tile_rect, popped.hi_mut());
            }

            merged.push(popped);
        } else {
            // Sparse multi-cell range.
            let top_clear = queue
                .peek()
                .map(|top| cell_order_cmp(order, top.range.lo(), popped.hi()) == Ordering::Greater)
                .expect("queue checked non-empty");
            if top_clear {
                merged.push(popped);
                continue;
            }

            // Expand: split off the first stored cell as a unary range and
            // shrink popped to start at the second, so sparse ranges join
            // the override logic one cell at a time.
            let fragment = popped.fragment.expect("sparse range has a fragment");
            if let Some((first, second)) =
                fragments[fragment].get_first_two_coords(schema, popped.lo())?
            {
                if cell_order_cmp(order, &first, &tile_end) != Ordering::Greater {
                    let unary = FragmentCellRange::new(popped.fragment, &first, &first);
                    queue.push(QueueEntry::new(unary, order));
                    if let Some(second) = second {
                        if cell_order_cmp(order, &second, &tile_end) != Ordering::Greater
                            && cell_order_cmp(order, &second, popped.hi()) != Ordering::Greater
                        {
                            popped.set_lo(&second);
                            queue.push(QueueEntry::new(popped, order));
                        }
                    }
                }
            }
        }
    }

    Ok(merged)
}

/// Convert merged coordinate ranges into tile-local cell-position ranges.
/// Dense and empty-fill ranges normalize against the tile corner; sparse
/// ranges resolve through the owning fragment.
pub(crate) fn to_pos_ranges<T: CoordScalar, F: Fragment>(
    schema: &ArraySchema,
    fragments: &[F],
    tile_coords: &[T],
    merged: Vec<FragmentCellRange<T>>,
) -> Result<FragmentCellPosRanges> {
    let dim_num = schema.dim_num();
    let tile_rect = schema.tile_rect::<T>(tile_coords)?;
    let mut out: FragmentCellPosRanges = Vec::new();

    for range in merged {
        let dense_like = range
            .fragment
            .map(|f| fragments[f].dense())
            .unwrap_or(true);
        if dense_like {
            let mut lo = range.lo().to_vec();
            let mut hi = range.hi().to_vec();
            for i in 0..dim_num {
                lo[i] = lo[i] - tile_rect[2 * i];
                hi[i] = hi[i] - tile_rect[2 * i];
            }
            let first = schema.get_cell_pos(&lo)?;
            let last = schema.get_cell_pos(&hi)?;
            debug_assert!(first <= last);
            out.push(FragmentCellPosRange {
                fragment: range.fragment,
                positions: CellPosRange::new(first, last),
            });
        } else {
            let fragment = range.fragment.expect("sparse range has a fragment");
            fragments[fragment].get_cell_pos_ranges_sparse(schema, fragment, &range, &mut out)?;
        }
    }
    Ok(out)
}
