//! In-memory fragment used by tests, benches and embedders.
//!
//! Dense fragments cover an arbitrary hyper-rectangle of the array domain
//! (not necessarily tile-aligned) with one value per cell in cell order.
//! Sparse fragments hold cells sorted in global cell order (tile order
//! first, cell order within a tile), pre-segmented per tile at
//! construction.

use std::cmp::Ordering;

use tilestore_result::{Error, Result};
use tilestore_schema::{cell_order_cmp, rect_contains, rect_intersect, rect_slabs, ArraySchema};
use tilestore_types::{
    AttributeId, CellOrder, CellPos, CellPosRange, CoordArray, CoordScalar, CoordType,
    FragmentCellPosRange, FragmentCellPosRanges, FragmentCellRange, FragmentId,
};

use crate::fragment::Fragment;

/// One per-tile run of a sparse fragment's cell list.
#[derive(Clone, Debug)]
struct TileSeg {
    tile: CoordArray,
    start: usize,
    len: usize,
}

#[derive(Clone, Debug)]
enum Cursor {
    Unstarted,
    Dense(CoordArray),
    Sparse(usize),
    Done,
}

/// In-memory dense or sparse fragment.
pub struct MemFragment {
    dense: bool,
    /// Fragment's own hyper-rectangle, `[lo, hi]` pairs per dimension.
    /// For sparse fragments this is the bounding rectangle of its cells.
    domain: CoordArray,
    /// Sparse cell coordinates, `cell_num * dim` scalars; empty for dense.
    coords: CoordArray,
    /// Per-attribute value bytes: cell-ordered over `domain` for dense,
    /// parallel to `coords` for sparse.
    values: Vec<Vec<u8>>,
    segs: Vec<TileSeg>,
    cursor: Cursor,
    overflow: Vec<bool>,
    copied: Vec<u64>,
}

impl MemFragment {
    /// Dense fragment over `domain` with one value per cell, in the
    /// schema's cell order over the fragment's own rectangle.
    pub fn new_dense(
        schema: &ArraySchema,
        domain: CoordArray,
        values: Vec<Vec<u8>>,
    ) -> Result<Self> {
        match schema.coords_type() {
            CoordType::I32 => Self::build_dense::<i32>(schema, domain, values),
            CoordType::I64 => Self::build_dense::<i64>(schema, domain, values),
            CoordType::F32 => Self::build_dense::<f32>(schema, domain, values),
            CoordType::F64 => Self::build_dense::<f64>(schema, domain, values),
        }
    }

    /// Sparse fragment from cells sorted in global cell order.
    pub fn new_sparse(
        schema: &ArraySchema,
        coords: CoordArray,
        values: Vec<Vec<u8>>,
    ) -> Result<Self> {
        match schema.coords_type() {
            CoordType::I32 => Self::build_sparse::<i32>(schema, coords, values),
            CoordType::I64 => Self::build_sparse::<i64>(schema, coords, values),
            CoordType::F32 => Self::build_sparse::<f32>(schema, coords, values),
            CoordType::F64 => Self::build_sparse::<f64>(schema, coords, values),
        }
    }

    fn build_dense<T: CoordScalar>(
        schema: &ArraySchema,
        domain: CoordArray,
        values: Vec<Vec<u8>>,
    ) -> Result<Self> {
        let dim_num = schema.dim_num();
        if domain.len() != 2 * dim_num {
            return Err(Error::InvalidArgumentError(format!(
                "fragment domain holds {} scalars, expected {}",
                domain.len(),
                2 * dim_num
            )));
        }
        let rect = domain.typed::<T>()?;
        let array_domain = schema.domain().typed::<T>()?;
        let mut cell_num: u64 = 1;
        for i in 0..dim_num {
            if T::total_cmp(rect[2 * i], rect[2 * i + 1]) == Ordering::Greater {
                return Err(Error::InvalidArgumentError(format!(
                    "fragment domain inverted in dimension {i}"
                )));
            }
            if T::total_cmp(rect[2 * i], array_domain[2 * i]) == Ordering::Less
                || T::total_cmp(rect[2 * i + 1], array_domain[2 * i + 1]) == Ordering::Greater
            {
                return Err(Error::InvalidArgumentError(format!(
                    "fragment domain exceeds array domain in dimension {i}"
                )));
            }
            cell_num *= (rect[2 * i + 1] - rect[2 * i] + T::one()).to_pos();
        }
        validate_values(schema, &values, cell_num)?;
        Ok(Self::assemble(schema, true, domain, T::wrap(Vec::new()), values, Vec::new()))
    }

    fn build_sparse<T: CoordScalar>(
        schema: &ArraySchema,
        coords: CoordArray,
        values: Vec<Vec<u8>>,
    ) -> Result<Self> {
        let dim_num = schema.dim_num();
        if coords.len() % dim_num != 0 {
            return Err(Error::InvalidArgumentError(format!(
                "sparse coordinate buffer holds {} scalars, not a multiple of {}",
                coords.len(),
                dim_num
            )));
        }
        let cells = coords.typed::<T>()?;
        let cell_num = (cells.len() / dim_num) as u64;
        let array_domain = schema.domain().typed::<T>()?;

        let mut segs: Vec<TileSeg> = Vec::new();
        let mut bounds: Vec<T> = Vec::new();
        let mut prev_tile: Option<Vec<T>> = None;
        for c in 0..cell_num as usize {
            let cell = &cells[c * dim_num..(c + 1) * dim_num];
            if !rect_contains(array_domain, cell) {
                return Err(Error::InvalidArgumentError(format!(
                    "sparse cell {c} falls outside the array domain"
                )));
            }
            if bounds.is_empty() {
                for i in 0..dim_num {
                    bounds.push(cell[i]);
                    bounds.push(cell[i]);
                }
            } else {
                for i in 0..dim_num {
                    bounds[2 * i] = T::min_of(bounds[2 * i], cell[i]);
                    bounds[2 * i + 1] = T::max_of(bounds[2 * i + 1], cell[i]);
                }
            }

            let tile = schema.tile_index_of::<T>(cell)?;
            match prev_tile.as_deref() {
                Some(prev) if prev == tile.as_slice() => {
                    // Within one tile, cells must be strictly increasing.
                    let last = &cells[(c - 1) * dim_num..c * dim_num];
                    if cell_order_cmp(schema.cell_order(), last, cell) != Ordering::Less {
                        return Err(Error::InvalidArgumentError(format!(
                            "sparse cells out of cell order at index {c}"
                        )));
                    }
                    segs.last_mut().expect("segment exists").len += 1;
                }
                Some(prev) => {
                    if cell_order_cmp(schema.tile_order(), prev, &tile) != Ordering::Less {
                        return Err(Error::InvalidArgumentError(format!(
                            "sparse cells out of tile order at index {c}"
                        )));
                    }
                    segs.push(TileSeg {
                        tile: T::wrap(tile.clone()),
                        start: c,
                        len: 1,
                    });
                    prev_tile = Some(tile);
                }
                None => {
                    segs.push(TileSeg {
                        tile: T::wrap(tile.clone()),
                        start: c,
                        len: 1,
                    });
                    prev_tile = Some(tile);
                }
            }
        }
        if bounds.is_empty() {
            bounds = vec![T::zero(); 2 * dim_num];
        }

        validate_values(schema, &values, cell_num)?;
        Ok(Self::assemble(schema, false, T::wrap(bounds), coords, values, segs))
    }

    fn assemble(
        schema: &ArraySchema,
        dense: bool,
        domain: CoordArray,
        coords: CoordArray,
        values: Vec<Vec<u8>>,
        segs: Vec<TileSeg>,
    ) -> Self {
        let slots = schema.attribute_num() + 1;
        Self {
            dense,
            domain,
            coords,
            values,
            segs,
            cursor: Cursor::Unstarted,
            overflow: vec![false; slots],
            copied: vec![0; slots],
        }
    }

    /// Tiles (in tile-index space) this dense fragment shares with the
    /// subarray, as an interleaved `[lo, hi]` rectangle; `None` if disjoint.
    fn dense_tile_domain<T: CoordScalar>(
        &self,
        schema: &ArraySchema,
        subarray: &[T],
    ) -> Result<Option<Vec<T>>> {
        let rect = self.domain.typed::<T>()?;
        let array_domain = schema.domain().typed::<T>()?;
        let extents = schema.tile_extents().typed::<T>()?;
        let dim_num = schema.dim_num();
        let mut tile_domain = Vec::with_capacity(2 * dim_num);
        for i in 0..dim_num {
            let lo = T::max_of(rect[2 * i], subarray[2 * i]);
            let hi = T::min_of(rect[2 * i + 1], subarray[2 * i + 1]);
            if T::total_cmp(lo, hi) == Ordering::Greater {
                return Ok(None);
            }
            tile_domain.push((lo - array_domain[2 * i]) / extents[i]);
            tile_domain.push((hi - array_domain[2 * i]) / extents[i]);
        }
        Ok(Some(tile_domain))
    }

    fn seg(&self) -> Result<&TileSeg> {
        match &self.cursor {
            Cursor::Sparse(i) => Ok(&self.segs[*i]),
            _ => Err(Error::Internal(
                "sparse tile query without a cursor tile".into(),
            )),
        }
    }

    fn seg_cells<'a, T: CoordScalar>(&'a self, seg: &TileSeg) -> Result<&'a [T]> {
        let dim_num = self.domain.len() / 2;
        let cells = self.coords.typed::<T>()?;
        Ok(&cells[seg.start * dim_num..(seg.start + seg.len) * dim_num])
    }

    /// Index of the first cell in `cells` not ordered before `target`.
    fn lower_bound<T: CoordScalar>(order: CellOrder, cells: &[T], dim_num: usize, target: &[T]) -> usize {
        let n = cells.len() / dim_num;
        let mut lo = 0;
        let mut hi = n;
        while lo < hi {
            let mid = (lo + hi) / 2;
            let cell = &cells[mid * dim_num..(mid + 1) * dim_num];
            if cell_order_cmp(order, cell, target) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    fn write_cell<T: CoordScalar>(
        &self,
        schema: &ArraySchema,
        attribute_id: AttributeId,
        pos: CellPos,
        out: &mut [u8],
    ) -> Result<()> {
        let dim_num = schema.dim_num();
        if self.dense {
            let tile = match &self.cursor {
                Cursor::Dense(t) => t.typed::<T>()?,
                _ => {
                    return Err(Error::Internal(
                        "dense cell copy without a cursor tile".into(),
                    ))
                }
            };
            let array_domain = schema.domain().typed::<T>()?;
            let extents = schema.tile_extents().typed::<T>()?;
            let mut cell = vec![T::zero(); dim_num];
            schema.get_cell_coords(pos, &mut cell)?;
            for i in 0..dim_num {
                cell[i] = cell[i] + array_domain[2 * i] + tile[i] * extents[i];
            }
            if attribute_id == schema.attribute_num() {
                write_coords(&cell, out);
                return Ok(());
            }
            let rect = self.domain.typed::<T>()?;
            if !rect_contains(rect, &cell) {
                return Err(Error::Internal(format!(
                    "cell position {pos} resolves outside the fragment domain"
                )));
            }
            let idx = rect_pos(schema.cell_order(), rect, &cell);
            let cell_size = schema.cell_size(attribute_id)?;
            let src = &self.values[attribute_id][idx as usize * cell_size..][..cell_size];
            out.copy_from_slice(src);
        } else {
            let seg = self.seg()?;
            let idx = seg.start + pos as usize;
            if pos as usize >= seg.len {
                return Err(Error::Internal(format!(
                    "sparse cell position {pos} exceeds tile segment of {} cells",
                    seg.len
                )));
            }
            if attribute_id == schema.attribute_num() {
                let cells = self.coords.typed::<T>()?;
                write_coords(&cells[idx * dim_num..(idx + 1) * dim_num], out);
                return Ok(());
            }
            let cell_size = schema.cell_size(attribute_id)?;
            let src = &self.values[attribute_id][idx * cell_size..][..cell_size];
            out.copy_from_slice(src);
        }
        Ok(())
    }
}

impl Fragment for MemFragment {
    fn dense(&self) -> bool {
        self.dense
    }

    fn reset_overflow(&mut self) {
        self.overflow.fill(false);
    }

    fn overflow(&self, attribute_id: AttributeId) -> bool {
        self.overflow[attribute_id]
    }

    fn tile_done(&mut self, attribute_id: AttributeId) {
        self.copied[attribute_id] = 0;
    }

    fn get_next_overlapping_tile_mult<T: CoordScalar>(
        &mut self,
        schema: &ArraySchema,
        subarray: &[T],
    ) -> Result<()> {
        if self.dense {
            let Some(tile_domain) = self.dense_tile_domain::<T>(schema, subarray)? else {
                self.cursor = Cursor::Done;
                return Ok(());
            };
            let dim_num = schema.dim_num();
            self.cursor = match &self.cursor {
                Cursor::Unstarted => {
                    let lower: Vec<T> = (0..dim_num).map(|i| tile_domain[2 * i]).collect();
                    Cursor::Dense(T::wrap(lower))
                }
                Cursor::Dense(t) => {
                    let mut tile = t.typed::<T>()?.to_vec();
                    schema.get_next_tile_coords(&tile_domain, &mut tile);
                    if rect_contains(&tile_domain, &tile) {
                        Cursor::Dense(T::wrap(tile))
                    } else {
                        Cursor::Done
                    }
                }
                Cursor::Sparse(_) => {
                    return Err(Error::Internal("sparse cursor on a dense fragment".into()))
                }
                Cursor::Done => Cursor::Done,
            };
        } else {
            let from = match &self.cursor {
                Cursor::Unstarted => 0,
                Cursor::Sparse(i) => i + 1,
                Cursor::Done => return Ok(()),
                Cursor::Dense(_) => {
                    return Err(Error::Internal("dense cursor on a sparse fragment".into()))
                }
            };
            let dim_num = schema.dim_num();
            self.cursor = Cursor::Done;
            for i in from..self.segs.len() {
                let cells = self.seg_cells::<T>(&self.segs[i])?;
                let inside = cells
                    .chunks_exact(dim_num)
                    .any(|cell| rect_contains(subarray, cell));
                if inside {
                    self.cursor = Cursor::Sparse(i);
                    break;
                }
            }
        }
        Ok(())
    }

    fn global_tile_coords<T: CoordScalar>(&self) -> Result<Option<Vec<T>>> {
        match &self.cursor {
            Cursor::Dense(t) => Ok(Some(t.typed::<T>()?.to_vec())),
            Cursor::Sparse(i) => Ok(Some(self.segs[*i].tile.typed::<T>()?.to_vec())),
            Cursor::Unstarted | Cursor::Done => Ok(None),
        }
    }

    fn max_overlap<T: CoordScalar>(
        &self,
        schema: &ArraySchema,
        overlap_range: &[T],
    ) -> Result<bool> {
        if !self.dense {
            return Ok(false);
        }
        let tile = match &self.cursor {
            Cursor::Dense(t) => t.typed::<T>()?,
            _ => return Ok(false),
        };
        let array_domain = schema.domain().typed::<T>()?;
        let extents = schema.tile_extents().typed::<T>()?;
        let rect = self.domain.typed::<T>()?;
        for i in 0..schema.dim_num() {
            let corner = array_domain[2 * i] + tile[i] * extents[i];
            let lo = corner + overlap_range[2 * i];
            let hi = corner + overlap_range[2 * i + 1];
            if T::total_cmp(lo, rect[2 * i]) == Ordering::Less
                || T::total_cmp(hi, rect[2 * i + 1]) == Ordering::Greater
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn compute_fragment_cell_ranges<T: CoordScalar>(
        &self,
        schema: &ArraySchema,
        subarray: &[T],
        fragment_id: FragmentId,
        out: &mut Vec<FragmentCellRange<T>>,
    ) -> Result<()> {
        let dim_num = schema.dim_num();
        if self.dense {
            let tile = match &self.cursor {
                Cursor::Dense(t) => t.typed::<T>()?,
                _ => return Ok(()),
            };
            let trect = schema.tile_rect::<T>(tile)?;
            let rect = self.domain.typed::<T>()?;
            let Some(overlap) = rect_intersect(rect, &trect) else {
                return Ok(());
            };
            let Some(overlap) = rect_intersect(&overlap, subarray) else {
                return Ok(());
            };

            // Full tile cross-section in every dimension but the slowest
            // means the cells form one contiguous run in cell order.
            let contiguous = match schema.cell_order() {
                CellOrder::RowMajor => (1..dim_num).all(|i| {
                    overlap[2 * i] == trect[2 * i] && overlap[2 * i + 1] == trect[2 * i + 1]
                }),
                CellOrder::ColumnMajor => (0..dim_num.saturating_sub(1)).all(|i| {
                    overlap[2 * i] == trect[2 * i] && overlap[2 * i + 1] == trect[2 * i + 1]
                }),
            };
            if contiguous {
                let lo: Vec<T> = (0..dim_num).map(|i| overlap[2 * i]).collect();
                let hi: Vec<T> = (0..dim_num).map(|i| overlap[2 * i + 1]).collect();
                out.push(FragmentCellRange::new(Some(fragment_id), &lo, &hi));
            } else {
                for bounds in rect_slabs(schema.cell_order(), &overlap) {
                    out.push(FragmentCellRange::from_bounds(Some(fragment_id), bounds));
                }
            }
        } else {
            let seg = match &self.cursor {
                Cursor::Sparse(i) => &self.segs[*i],
                _ => return Ok(()),
            };
            let cells = self.seg_cells::<T>(seg)?;
            let mut run_start: Option<usize> = None;
            for j in 0..seg.len {
                let cell = &cells[j * dim_num..(j + 1) * dim_num];
                if rect_contains(subarray, cell) {
                    run_start.get_or_insert(j);
                } else if let Some(s) = run_start.take() {
                    let lo = &cells[s * dim_num..(s + 1) * dim_num];
                    let hi = &cells[(j - 1) * dim_num..j * dim_num];
                    out.push(FragmentCellRange::new(Some(fragment_id), lo, hi));
                }
            }
            if let Some(s) = run_start {
                let lo = &cells[s * dim_num..(s + 1) * dim_num];
                let hi = &cells[(seg.len - 1) * dim_num..seg.len * dim_num];
                out.push(FragmentCellRange::new(Some(fragment_id), lo, hi));
            }
        }
        Ok(())
    }

    fn coords_exist<T: CoordScalar>(&self, schema: &ArraySchema, coords: &[T]) -> Result<bool> {
        if self.dense {
            let rect = self.domain.typed::<T>()?;
            return Ok(rect_contains(rect, coords));
        }
        let seg = self.seg()?;
        let cells = self.seg_cells::<T>(seg)?;
        let dim_num = schema.dim_num();
        let idx = Self::lower_bound(schema.cell_order(), cells, dim_num, coords);
        if idx >= seg.len {
            return Ok(false);
        }
        let cell = &cells[idx * dim_num..(idx + 1) * dim_num];
        Ok(cell_order_cmp(schema.cell_order(), cell, coords) == Ordering::Equal)
    }

    fn get_first_two_coords<T: CoordScalar>(
        &self,
        schema: &ArraySchema,
        start: &[T],
    ) -> Result<Option<(Vec<T>, Option<Vec<T>>)>> {
        let seg = self.seg()?;
        let cells = self.seg_cells::<T>(seg)?;
        let dim_num = schema.dim_num();
        let idx = Self::lower_bound(schema.cell_order(), cells, dim_num, start);
        if idx >= seg.len {
            return Ok(None);
        }
        let first = cells[idx * dim_num..(idx + 1) * dim_num].to_vec();
        let second = if idx + 1 < seg.len {
            Some(cells[(idx + 1) * dim_num..(idx + 2) * dim_num].to_vec())
        } else {
            None
        };
        Ok(Some((first, second)))
    }

    fn get_cell_pos_ranges_sparse<T: CoordScalar>(
        &self,
        schema: &ArraySchema,
        fragment_id: FragmentId,
        range: &FragmentCellRange<T>,
        out: &mut FragmentCellPosRanges,
    ) -> Result<()> {
        let seg = self.seg()?;
        let cells = self.seg_cells::<T>(seg)?;
        let dim_num = schema.dim_num();
        let order = schema.cell_order();

        let first = Self::lower_bound(order, cells, dim_num, range.lo());
        let mut last = Self::lower_bound(order, cells, dim_num, range.hi());
        if last < seg.len {
            let cell = &cells[last * dim_num..(last + 1) * dim_num];
            if cell_order_cmp(order, cell, range.hi()) == Ordering::Equal {
                last += 1;
            }
        }
        if first < last {
            out.push(FragmentCellPosRange {
                fragment: Some(fragment_id),
                positions: CellPosRange::new(first as CellPos, (last - 1) as CellPos),
            });
        }
        Ok(())
    }

    fn copy_cell_range<T: CoordScalar>(
        &mut self,
        schema: &ArraySchema,
        attribute_id: AttributeId,
        range: &CellPosRange,
        buffer: &mut [u8],
        buffer_offset: &mut usize,
    ) -> Result<()> {
        let cell_size = schema.cell_size(attribute_id)?;
        let mut pos = range.first + self.copied[attribute_id];
        self.overflow[attribute_id] = false;
        while pos <= range.last {
            if buffer.len() - *buffer_offset < cell_size {
                self.overflow[attribute_id] = true;
                self.copied[attribute_id] = pos - range.first;
                return Ok(());
            }
            let out = &mut buffer[*buffer_offset..*buffer_offset + cell_size];
            self.write_cell::<T>(schema, attribute_id, pos, out)?;
            *buffer_offset += cell_size;
            pos += 1;
        }
        self.copied[attribute_id] = 0;
        Ok(())
    }
}

fn validate_values(schema: &ArraySchema, values: &[Vec<u8>], cell_num: u64) -> Result<()> {
    if values.len() != schema.attribute_num() {
        return Err(Error::InvalidArgumentError(format!(
            "fragment carries {} attribute buffers, schema declares {}",
            values.len(),
            schema.attribute_num()
        )));
    }
    for (a, v) in values.iter().enumerate() {
        if schema.var_size(a)? {
            continue;
        }
        let want = cell_num as usize * schema.cell_size(a)?;
        if v.len() != want {
            return Err(Error::InvalidArgumentError(format!(
                "attribute {a}: {} value bytes, expected {want}",
                v.len()
            )));
        }
    }
    Ok(())
}

fn write_coords<T: CoordScalar>(coords: &[T], out: &mut [u8]) {
    let size = T::TYPE.size();
    for (i, &c) in coords.iter().enumerate() {
        c.copy_le_bytes(&mut out[i * size..]);
    }
}

/// Position of `coords` within the interleaved rectangle `rect` under the
/// given cell order, with the rectangle's own spans as extents.
fn rect_pos<T: CoordScalar>(order: CellOrder, rect: &[T], coords: &[T]) -> u64 {
    let dim_num = coords.len();
    let mut pos: u64 = 0;
    let mut mult: u64 = 1;
    match order {
        CellOrder::RowMajor => {
            for i in (0..dim_num).rev() {
                pos += (coords[i] - rect[2 * i]).to_pos() * mult;
                mult *= (rect[2 * i + 1] - rect[2 * i] + T::one()).to_pos();
            }
        }
        CellOrder::ColumnMajor => {
            for i in 0..dim_num {
                pos += (coords[i] - rect[2 * i]).to_pos() * mult;
                mult *= (rect[2 * i + 1] - rect[2 * i] + T::one()).to_pos();
            }
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;
    use tilestore_schema::AttributeMeta;

    fn schema() -> ArraySchema {
        ArraySchema::new(
            true,
            CellOrder::RowMajor,
            CoordArray::from(vec![0i64, 3, 0, 3]),
            CoordArray::from(vec![2i64, 2]),
            vec![AttributeMeta::fixed("a", 8, (-1i64).to_le_bytes().to_vec())],
        )
        .unwrap()
    }

    fn le_cells(values: &[i64]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn dense_tile_iteration_covers_intersection() {
        let s = schema();
        let mut f =
            MemFragment::new_dense(&s, CoordArray::from(vec![0i64, 3, 0, 3]), vec![le_cells(&[0; 16])])
                .unwrap();
        let subarray = [0i64, 3, 0, 3];
        let mut tiles = Vec::new();
        loop {
            f.get_next_overlapping_tile_mult::<i64>(&s, &subarray).unwrap();
            match f.global_tile_coords::<i64>().unwrap() {
                Some(t) => tiles.push(t),
                None => break,
            }
        }
        assert_eq!(
            tiles,
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );
    }

    #[test]
    fn dense_partial_fragment_skips_foreign_tiles() {
        let s = schema();
        let mut f = MemFragment::new_dense(
            &s,
            CoordArray::from(vec![1i64, 2, 1, 2]),
            vec![le_cells(&[0; 4])],
        )
        .unwrap();
        let subarray = [0i64, 3, 0, 3];
        let mut tiles = Vec::new();
        loop {
            f.get_next_overlapping_tile_mult::<i64>(&s, &subarray).unwrap();
            match f.global_tile_coords::<i64>().unwrap() {
                Some(t) => tiles.push(t),
                None => break,
            }
        }
        // Covers a corner of each of the four tiles.
        assert_eq!(
            tiles,
            vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]
        );
    }

    #[test]
    fn sparse_segments_and_expansion_queries() {
        let s = schema();
        let mut f = MemFragment::new_sparse(
            &s,
            CoordArray::from(vec![0i64, 0, 2, 3]),
            vec![le_cells(&[7, 9])],
        )
        .unwrap();
        let subarray = [0i64, 3, 0, 3];

        f.get_next_overlapping_tile_mult::<i64>(&s, &subarray).unwrap();
        assert_eq!(f.global_tile_coords::<i64>().unwrap(), Some(vec![0, 0]));
        assert!(f.coords_exist::<i64>(&s, &[0, 0]).unwrap());
        assert!(!f.coords_exist::<i64>(&s, &[0, 1]).unwrap());
        let (first, second) = f
            .get_first_two_coords::<i64>(&s, &[0, 0])
            .unwrap()
            .unwrap();
        assert_eq!(first, vec![0, 0]);
        assert_eq!(second, None);

        f.get_next_overlapping_tile_mult::<i64>(&s, &subarray).unwrap();
        assert_eq!(f.global_tile_coords::<i64>().unwrap(), Some(vec![1, 1]));

        f.get_next_overlapping_tile_mult::<i64>(&s, &subarray).unwrap();
        assert_eq!(f.global_tile_coords::<i64>().unwrap(), None);
    }

    #[test]
    fn sparse_rejects_out_of_order_cells() {
        let s = schema();
        assert!(MemFragment::new_sparse(
            &s,
            CoordArray::from(vec![2i64, 3, 0, 0]),
            vec![le_cells(&[9, 7])],
        )
        .is_err());
    }

    #[test]
    fn copy_resumes_after_overflow() {
        let s = schema();
        let mut f = MemFragment::new_dense(
            &s,
            CoordArray::from(vec![0i64, 3, 0, 3]),
            vec![le_cells(&(0..16).collect::<Vec<i64>>())],
        )
        .unwrap();
        let subarray = [0i64, 3, 0, 3];
        f.get_next_overlapping_tile_mult::<i64>(&s, &subarray).unwrap();

        // Tile (0,0) holds global cells 0,1,4,5 in positions 0..=3.
        let range = CellPosRange::new(0, 3);
        let mut buf = vec![0u8; 16];
        let mut off = 0;
        f.copy_cell_range::<i64>(&s, 0, &range, &mut buf, &mut off)
            .unwrap();
        assert!(f.overflow(0));
        assert_eq!(off, 16);

        let mut buf2 = vec![0u8; 16];
        let mut off2 = 0;
        f.copy_cell_range::<i64>(&s, 0, &range, &mut buf2, &mut off2)
            .unwrap();
        assert!(!f.overflow(0));
        let decode = |b: &[u8], i: usize| {
            i64::from_le_bytes(b[i * 8..(i + 1) * 8].try_into().unwrap())
        };
        assert_eq!(
            vec![decode(&buf, 0), decode(&buf, 1), decode(&buf2, 0), decode(&buf2, 1)],
            vec![0, 1, 4, 5]
        );
    }
}
