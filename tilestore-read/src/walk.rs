//! Range-tile walker: the sequence of subarray tiles in global tile order,
//! plus the per-tile overlap state the merge engine seeds from.

use std::cmp::Ordering;

use tilestore_fragment::Fragment;
use tilestore_result::{Error, Result};
use tilestore_schema::{rect_contains, rect_slabs, ArraySchema};
use tilestore_types::{CellOrder, CoordScalar, FragmentCellRange, FragmentId};

/// How the subarray overlaps the current tile, in storage cell order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OverlapKind {
    /// The intersection is the whole tile.
    Full,
    /// The intersection is one contiguous run of cells.
    PartialContig,
    /// The intersection decomposes into multiple contiguous slabs.
    PartialNonContig,
}

/// Walk state for one coordinate scalar kind. Created on the first tile
/// preparation and owned by the read state across `read` calls.
pub(crate) struct WalkState<T> {
    /// Tile-index rectangle the subarray touches; dropped once the walk
    /// leaves it.
    tile_domain: Option<Vec<T>>,
    /// Current range tile; `None` when the walk is finished.
    tile_coords: Option<Vec<T>>,
    /// Subarray ∩ current tile, in tile-local coordinates.
    max_overlap: Vec<T>,
    overlap_kind: OverlapKind,
    /// Newest fragment fully covering `max_overlap` with dense data.
    max_overlap_frag: Option<FragmentId>,
    /// Cached cursor tile of every fragment; `None` past its end.
    fragment_tiles: Vec<Option<Vec<T>>>,
}

/// The walk, type-erased for storage on the read state. The dispatch shim
/// selects the variant once per `read` call and stays in it.
pub(crate) enum TileWalk {
    I32(WalkState<i32>),
    I64(WalkState<i64>),
}

/// Scalar kinds the dense read path dispatches. Floats participate only in
/// the sparse extension point and never reach the walker.
pub(crate) trait DenseCoord: CoordScalar {
    fn walk(walk: &TileWalk) -> Option<&WalkState<Self>>;
    fn walk_mut(walk: &mut TileWalk) -> Option<&mut WalkState<Self>>;
    fn wrap_walk(state: WalkState<Self>) -> TileWalk;
}

impl DenseCoord for i32 {
    fn walk(walk: &TileWalk) -> Option<&WalkState<i32>> {
        match walk {
            TileWalk::I32(w) => Some(w),
            _ => None,
        }
    }

    fn walk_mut(walk: &mut TileWalk) -> Option<&mut WalkState<i32>> {
        match walk {
            TileWalk::I32(w) => Some(w),
            _ => None,
        }
    }

    fn wrap_walk(state: WalkState<i32>) -> TileWalk {
        TileWalk::I32(state)
    }
}

impl DenseCoord for i64 {
    fn walk(walk: &TileWalk) -> Option<&WalkState<i64>> {
        match walk {
            TileWalk::I64(w) => Some(w),
            _ => None,
        }
    }

    fn walk_mut(walk: &mut TileWalk) -> Option<&mut WalkState<i64>> {
        match walk {
            TileWalk::I64(w) => Some(w),
            _ => None,
        }
    }

    fn wrap_walk(state: WalkState<i64>) -> TileWalk {
        TileWalk::I64(state)
    }
}

impl<T: CoordScalar> WalkState<T> {
    /// Place the walk at the first subarray tile and bring every fragment
    /// to its first overlapping tile. A subarray touching no tile yields a
    /// finished walk.
    pub(crate) fn init<F: Fragment>(
        schema: &ArraySchema,
        subarray: &[T],
        fragments: &mut [F],
    ) -> Result<Self> {
        let domain = schema.domain().typed::<T>()?;
        let extents = schema.tile_extents().typed::<T>()?;
        let dim_num = schema.dim_num();

        let mut tile_domain = Vec::with_capacity(2 * dim_num);
        let mut empty = false;
        for i in 0..dim_num {
            let tiles = T::tile_count(domain[2 * i], domain[2 * i + 1], extents[i]);
            let last = T::from_pos(tiles - 1);
            let lo = T::max_of((subarray[2 * i] - domain[2 * i]) / extents[i], T::zero());
            let hi = T::min_of((subarray[2 * i + 1] - domain[2 * i]) / extents[i], last);
            if T::total_cmp(lo, hi) == Ordering::Greater {
                empty = true;
                break;
            }
            tile_domain.push(lo);
            tile_domain.push(hi);
        }

        let mut state = Self {
            tile_domain: None,
            tile_coords: None,
            max_overlap: vec![T::zero(); 2 * dim_num],
            overlap_kind: OverlapKind::Full,
            max_overlap_frag: None,
            fragment_tiles: vec![None; fragments.len()],
        };
        if empty {
            return Ok(state);
        }

        let lower: Vec<T> = (0..dim_num).map(|i| tile_domain[2 * i]).collect();
        state.tile_domain = Some(tile_domain);
        state.tile_coords = Some(lower);

        for (i, fragment) in fragments.iter_mut().enumerate() {
            fragment.get_next_overlapping_tile_mult::<T>(schema, subarray)?;
            state.fragment_tiles[i] = fragment.global_tile_coords::<T>()?;
        }
        Ok(state)
    }

    #[inline]
    pub(crate) fn finished(&self) -> bool {
        self.tile_coords.is_none()
    }

    #[inline]
    pub(crate) fn tile_coords(&self) -> Option<&[T]> {
        self.tile_coords.as_deref()
    }

    #[inline]
    pub(crate) fn fragment_tile(&self, fragment: FragmentId) -> Option<&[T]> {
        self.fragment_tiles[fragment].as_deref()
    }

    /// Whether the fragment's cursor tile coincides with the current range
    /// tile.
    pub(crate) fn fragment_coincides(&self, fragment: FragmentId) -> bool {
        match (self.fragment_tile(fragment), self.tile_coords()) {
            (Some(f), Some(t)) => f == t,
            _ => false,
        }
    }

    /// Advance to the next range tile; fragments parked on the consumed
    /// tile advance with it. Leaving the tile domain releases the walk.
    pub(crate) fn advance<F: Fragment>(
        &mut self,
        schema: &ArraySchema,
        subarray: &[T],
        fragments: &mut [F],
    ) -> Result<()> {
        let previous = self
            .tile_coords
            .take()
            .ok_or_else(|| Error::Internal("tile walk advanced past its end".into()))?;
        let tile_domain = self
            .tile_domain
            .as_ref()
            .ok_or_else(|| Error::Internal("tile walk has no domain".into()))?;

        let mut next = previous.clone();
        schema.get_next_tile_coords(tile_domain, &mut next);
        if rect_contains(tile_domain, &next) {
            self.tile_coords = Some(next);
        } else {
            self.tile_domain = None;
        }

        for (i, fragment) in fragments.iter_mut().enumerate() {
            if self.fragment_tiles[i].as_deref() == Some(previous.as_slice()) {
                fragment.get_next_overlapping_tile_mult::<T>(schema, subarray)?;
                self.fragment_tiles[i] = fragment.global_tile_coords::<T>()?;
            }
        }
        Ok(())
    }

    /// Skip sparse fragments forward until their cursor tile is at or past
    /// the current range tile. Dense fragments advance exactly once per
    /// covered tile in [`WalkState::advance`].
    pub(crate) fn align_fragments<F: Fragment>(
        &mut self,
        schema: &ArraySchema,
        subarray: &[T],
        fragments: &mut [F],
    ) -> Result<()> {
        let tile = match self.tile_coords.as_deref() {
            Some(t) => t,
            None => return Ok(()),
        };
        for (i, fragment) in fragments.iter_mut().enumerate() {
            if fragment.dense() {
                continue;
            }
            while matches!(
                self.fragment_tiles[i].as_deref(),
                Some(f) if schema.tile_order_cmp(f, tile) == Ordering::Less
            ) {
                fragment.get_next_overlapping_tile_mult::<T>(schema, subarray)?;
                self.fragment_tiles[i] = fragment.global_tile_coords::<T>()?;
            }
        }
        Ok(())
    }

    /// Recompute the subarray ∩ tile overlap in tile-local coordinates and
    /// classify it against the storage cell order.
    pub(crate) fn compute_overlap(&mut self, schema: &ArraySchema, subarray: &[T]) -> Result<()> {
        let tile = self
            .tile_coords
            .as_deref()
            .ok_or_else(|| Error::Internal("overlap requested past the walk end".into()))?;
        let domain = schema.domain().typed::<T>()?;
        let extents = schema.tile_extents().typed::<T>()?;
        let dim_num = schema.dim_num();

        for i in 0..dim_num {
            let corner = tile[i] * extents[i] + domain[2 * i];
            self.max_overlap[2 * i] = T::max_of(subarray[2 * i] - corner, T::zero());
            self.max_overlap[2 * i + 1] =
                T::min_of(subarray[2 * i + 1] - corner, extents[i] - T::one());
        }

        let full_span: Vec<bool> = (0..dim_num)
            .map(|i| {
                T::total_cmp(self.max_overlap[2 * i], T::zero()) == Ordering::Equal
                    && T::total_cmp(self.max_overlap[2 * i + 1], extents[i] - T::one())
                        == Ordering::Equal
            })
            .collect();

        self.overlap_kind = if full_span.iter().all(|&f| f) {
            OverlapKind::Full
        } else {
            // Contiguous iff every dimension but the slowest-varying one
            // spans the full tile extent.
            let contig = match schema.cell_order() {
                CellOrder::RowMajor => full_span[1..].iter().all(|&f| f),
                CellOrder::ColumnMajor => full_span[..dim_num - 1].iter().all(|&f| f),
            };
            if contig {
                OverlapKind::PartialContig
            } else {
                OverlapKind::PartialNonContig
            }
        };
        Ok(())
    }

    /// Find the newest fragment whose cursor tile coincides with the range
    /// tile and which fully covers the overlap with dense data.
    pub(crate) fn find_max_overlap_fragment<F: Fragment>(
        &mut self,
        schema: &ArraySchema,
        fragments: &[F],
    ) -> Result<()> {
        self.max_overlap_frag = None;
        for i in (0..fragments.len()).rev() {
            if self.fragment_coincides(i) && fragments[i].max_overlap(schema, &self.max_overlap)? {
                self.max_overlap_frag = Some(i);
                break;
            }
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn max_overlap_frag(&self) -> Option<FragmentId> {
        self.max_overlap_frag
    }

    #[inline]
    pub(crate) fn overlap_kind(&self) -> OverlapKind {
        self.overlap_kind
    }

    /// Seed ranges for the newest fully-covering fragment over the whole
    /// overlap, or empty-fill seeds when no fragment qualifies, so every
    /// subarray cell of a dense array is accounted for.
    pub(crate) fn seed_ranges(
        &self,
        schema: &ArraySchema,
        out: &mut Vec<FragmentCellRange<T>>,
    ) -> Result<()> {
        let tile = self
            .tile_coords
            .as_deref()
            .ok_or_else(|| Error::Internal("seed ranges requested past the walk end".into()))?;
        let domain = schema.domain().typed::<T>()?;
        let extents = schema.tile_extents().typed::<T>()?;
        let dim_num = schema.dim_num();

        let mut global = Vec::with_capacity(2 * dim_num);
        for i in 0..dim_num {
            let corner = tile[i] * extents[i] + domain[2 * i];
            global.push(self.max_overlap[2 * i] + corner);
            global.push(self.max_overlap[2 * i + 1] + corner);
        }

        match self.overlap_kind {
            OverlapKind::Full | OverlapKind::PartialContig => {
                let lo: Vec<T> = (0..dim_num).map(|i| global[2 * i]).collect();
                let hi: Vec<T> = (0..dim_num).map(|i| global[2 * i + 1]).collect();
                out.push(FragmentCellRange::new(self.max_overlap_frag, &lo, &hi));
            }
            OverlapKind::PartialNonContig => {
                for bounds in rect_slabs(schema.cell_order(), &global) {
                    out.push(FragmentCellRange::from_bounds(self.max_overlap_frag, bounds));
                }
            }
        }
        Ok(())
    }
}
