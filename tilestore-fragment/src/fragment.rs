use tilestore_result::Result;
use tilestore_schema::ArraySchema;
use tilestore_types::{
    AttributeId, CellPosRange, CoordScalar, FragmentCellPosRanges, FragmentCellRange, FragmentId,
};

/// One append-only batch of cell writes over the array domain.
///
/// The read engine drives fragments through this seam: tile-cursor advance,
/// candidate cell ranges for the merge, sparse expansion queries, and the
/// final byte copy into caller buffers. Schema and subarray are passed as
/// explicit context; a fragment keeps no back-pointer to its array.
///
/// Methods taking `&mut self` mutate per-fragment read state only (tile
/// cursor, per-attribute overflow cursors); the stored cells are immutable.
pub trait Fragment {
    /// Whether this fragment stores a dense batch.
    fn dense(&self) -> bool;

    /// Clear per-attribute overflow flags before a new `read` call. In-tile
    /// resume cursors survive so a suspended copy continues where it
    /// stopped.
    fn reset_overflow(&mut self);

    /// Whether the last `copy_cell_range` for the attribute ran out of
    /// buffer space.
    fn overflow(&self, attribute_id: AttributeId) -> bool;

    /// The attribute has fully consumed the current tile; decoded tile
    /// state for it may be released.
    fn tile_done(&mut self, attribute_id: AttributeId);

    /// Advance the tile cursor to this fragment's next tile (in tile order)
    /// that overlaps the subarray, or past the end.
    fn get_next_overlapping_tile_mult<T: CoordScalar>(
        &mut self,
        schema: &ArraySchema,
        subarray: &[T],
    ) -> Result<()>;

    /// Global tile coordinates of the cursor tile; `None` past the end.
    fn global_tile_coords<T: CoordScalar>(&self) -> Result<Option<Vec<T>>>;

    /// Whether this fragment covers the whole `overlap_range` (tile-local
    /// coordinates of the cursor tile) with dense data.
    fn max_overlap<T: CoordScalar>(&self, schema: &ArraySchema, overlap_range: &[T])
        -> Result<bool>;

    /// Append this fragment's candidate cell ranges for the cursor tile,
    /// restricted to the subarray, tagged with `fragment_id`.
    fn compute_fragment_cell_ranges<T: CoordScalar>(
        &self,
        schema: &ArraySchema,
        subarray: &[T],
        fragment_id: FragmentId,
        out: &mut Vec<FragmentCellRange<T>>,
    ) -> Result<()>;

    /// Whether a cell exists at exactly `coords` in the cursor tile.
    /// Meaningful for sparse fragments; dense fragments answer via their
    /// domain.
    fn coords_exist<T: CoordScalar>(&self, schema: &ArraySchema, coords: &[T]) -> Result<bool>;

    /// First two stored coordinates in the cursor tile at or after `start`
    /// in cell order: `Ok(None)` if there is none, otherwise the first
    /// coordinate and, when present, the second.
    fn get_first_two_coords<T: CoordScalar>(
        &self,
        schema: &ArraySchema,
        start: &[T],
    ) -> Result<Option<(Vec<T>, Option<Vec<T>>)>>;

    /// Cell-position ranges (ordinals within the cursor tile) of the stored
    /// cells falling inside the coordinate `range`. Sparse tiles may
    /// contribute several ranges for one coordinate interval.
    fn get_cell_pos_ranges_sparse<T: CoordScalar>(
        &self,
        schema: &ArraySchema,
        fragment_id: FragmentId,
        range: &FragmentCellRange<T>,
        out: &mut FragmentCellPosRanges,
    ) -> Result<()>;

    /// Copy the attribute's cells at positions `range` of the cursor tile
    /// into `buffer` starting at `*buffer_offset`. On insufficient space,
    /// copies whole cells as far as they fit, raises the attribute's
    /// overflow flag and remembers the stop point; re-issuing the same
    /// range resumes there. The coordinates pseudo-attribute
    /// (`attribute_id == attribute_num`) materializes coordinate tuples.
    fn copy_cell_range<T: CoordScalar>(
        &mut self,
        schema: &ArraySchema,
        attribute_id: AttributeId,
        range: &CellPosRange,
        buffer: &mut [u8],
        buffer_offset: &mut usize,
    ) -> Result<()>;
}
