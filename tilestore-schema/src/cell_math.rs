//! Coordinate arithmetic over tile and cell lattices.
//!
//! All helpers are generic over the coordinate scalar and pure. Hyper-
//! rectangles (`tile_domain`, `rect`) are `2 * dim` scalars in `[lo, hi]`
//! pairs per dimension; coordinate tuples are `dim` scalars.

use std::cmp::Ordering;

use tilestore_result::Result;
use tilestore_types::{CellOrder, CellPos, CoordScalar};

use crate::schema::ArraySchema;

/// Whether `coords` lies inside the interleaved `[lo, hi]` rectangle.
pub fn rect_contains<T: CoordScalar>(rect: &[T], coords: &[T]) -> bool {
    coords.iter().enumerate().all(|(i, &c)| {
        T::total_cmp(c, rect[2 * i]) != Ordering::Less
            && T::total_cmp(c, rect[2 * i + 1]) != Ordering::Greater
    })
}

/// Intersection of two interleaved `[lo, hi]` rectangles, `None` if disjoint.
pub fn rect_intersect<T: CoordScalar>(a: &[T], b: &[T]) -> Option<Vec<T>> {
    let dim_num = a.len() / 2;
    let mut out = Vec::with_capacity(a.len());
    for i in 0..dim_num {
        let lo = T::max_of(a[2 * i], b[2 * i]);
        let hi = T::min_of(a[2 * i + 1], b[2 * i + 1]);
        if T::total_cmp(lo, hi) == Ordering::Greater {
            return None;
        }
        out.push(lo);
        out.push(hi);
    }
    Some(out)
}

/// Strict total order over coordinate tuples under the given cell order.
pub fn cell_order_cmp<T: CoordScalar>(order: CellOrder, a: &[T], b: &[T]) -> Ordering {
    debug_assert_eq!(a.len(), b.len());
    match order {
        CellOrder::RowMajor => {
            for i in 0..a.len() {
                match T::total_cmp(a[i], b[i]) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
        }
        CellOrder::ColumnMajor => {
            for i in (0..a.len()).rev() {
                match T::total_cmp(a[i], b[i]) {
                    Ordering::Equal => {}
                    other => return other,
                }
            }
        }
    }
    Ordering::Equal
}

/// Decompose a hyper-rectangle into its maximal runs contiguous in cell
/// order: the fastest-varying dimension keeps its full span while every
/// other dimension is walked cell by cell. Each returned buffer is
/// `[lo..., hi...]`.
pub fn rect_slabs<T: CoordScalar>(order: CellOrder, rect: &[T]) -> Vec<Vec<T>> {
    let dim_num = rect.len() / 2;
    debug_assert!(dim_num >= 1);

    if dim_num == 1 {
        return vec![vec![rect[0], rect[1]]];
    }

    let mut slabs = Vec::new();
    let mut coords: Vec<T> = (0..dim_num).map(|i| rect[2 * i]).collect();
    match order {
        CellOrder::RowMajor => {
            let inner = dim_num - 1;
            while T::total_cmp(coords[0], rect[1]) != Ordering::Greater {
                let mut bounds = Vec::with_capacity(2 * dim_num);
                bounds.extend_from_slice(&coords[..inner]);
                bounds.push(rect[2 * inner]);
                bounds.extend_from_slice(&coords[..inner]);
                bounds.push(rect[2 * inner + 1]);
                slabs.push(bounds);

                let mut i = inner - 1;
                coords[i] = coords[i] + T::one();
                while i > 0 && T::total_cmp(coords[i], rect[2 * i + 1]) == Ordering::Greater {
                    coords[i] = rect[2 * i];
                    i -= 1;
                    coords[i] = coords[i] + T::one();
                }
            }
        }
        CellOrder::ColumnMajor => {
            while T::total_cmp(coords[dim_num - 1], rect[2 * (dim_num - 1) + 1])
                != Ordering::Greater
            {
                let mut bounds = Vec::with_capacity(2 * dim_num);
                bounds.push(rect[0]);
                bounds.extend_from_slice(&coords[1..]);
                bounds.push(rect[1]);
                bounds.extend_from_slice(&coords[1..]);
                slabs.push(bounds);

                let mut i = 1;
                coords[i] = coords[i] + T::one();
                while i < dim_num - 1 && T::total_cmp(coords[i], rect[2 * i + 1]) == Ordering::Greater
                {
                    coords[i] = rect[2 * i];
                    i += 1;
                    coords[i] = coords[i] + T::one();
                }
            }
        }
    }
    slabs
}

fn advance_coords<T: CoordScalar>(order: CellOrder, domain: &[T], coords: &mut [T]) {
    let dim_num = coords.len();
    match order {
        CellOrder::RowMajor => {
            let mut i = dim_num - 1;
            coords[i] = coords[i] + T::one();
            while i > 0 && T::total_cmp(coords[i], domain[2 * i + 1]) == Ordering::Greater {
                coords[i] = domain[2 * i];
                i -= 1;
                coords[i] = coords[i] + T::one();
            }
        }
        CellOrder::ColumnMajor => {
            let mut i = 0;
            coords[i] = coords[i] + T::one();
            while i < dim_num - 1 && T::total_cmp(coords[i], domain[2 * i + 1]) == Ordering::Greater
            {
                coords[i] = domain[2 * i];
                i += 1;
                coords[i] = coords[i] + T::one();
            }
        }
    }
}

fn retreat_coords<T: CoordScalar>(order: CellOrder, domain: &[T], coords: &mut [T]) {
    let dim_num = coords.len();
    match order {
        CellOrder::RowMajor => {
            let mut i = dim_num - 1;
            coords[i] = coords[i] - T::one();
            while i > 0 && T::total_cmp(coords[i], domain[2 * i]) == Ordering::Less {
                coords[i] = domain[2 * i + 1];
                i -= 1;
                coords[i] = coords[i] - T::one();
            }
        }
        CellOrder::ColumnMajor => {
            let mut i = 0;
            coords[i] = coords[i] - T::one();
            while i < dim_num - 1 && T::total_cmp(coords[i], domain[2 * i]) == Ordering::Less {
                coords[i] = domain[2 * i + 1];
                i += 1;
                coords[i] = coords[i] - T::one();
            }
        }
    }
}

impl ArraySchema {
    /// Compare coordinate tuples under the schema's cell order.
    #[inline]
    pub fn cell_order_cmp<T: CoordScalar>(&self, a: &[T], b: &[T]) -> Ordering {
        cell_order_cmp(self.cell_order(), a, b)
    }

    /// Compare tile coordinate tuples under the schema's tile order.
    #[inline]
    pub fn tile_order_cmp<T: CoordScalar>(&self, a: &[T], b: &[T]) -> Ordering {
        cell_order_cmp(self.tile_order(), a, b)
    }

    /// Advance `coords` by one cell in cell order inside `tile_domain`.
    /// Leaving the domain is visible as the slowest-varying coordinate
    /// exceeding its bound; callers compare against the domain afterwards.
    #[inline]
    pub fn get_next_cell_coords<T: CoordScalar>(&self, tile_domain: &[T], coords: &mut [T]) {
        advance_coords(self.cell_order(), tile_domain, coords);
    }

    /// Inverse of [`ArraySchema::get_next_cell_coords`].
    #[inline]
    pub fn get_previous_cell_coords<T: CoordScalar>(&self, tile_domain: &[T], coords: &mut [T]) {
        retreat_coords(self.cell_order(), tile_domain, coords);
    }

    /// Advance tile coordinates by one tile in tile order inside
    /// `tile_domain`.
    #[inline]
    pub fn get_next_tile_coords<T: CoordScalar>(&self, tile_domain: &[T], tile_coords: &mut [T]) {
        advance_coords(self.tile_order(), tile_domain, tile_coords);
    }

    /// Integer position of a tile-local (normalized, non-negative)
    /// coordinate tuple under the schema's cell order.
    pub fn get_cell_pos<T: CoordScalar>(&self, coords: &[T]) -> Result<CellPos> {
        let extents = self.tile_extents().typed::<T>()?;
        let dim_num = self.dim_num();
        let mut pos: u64 = 0;
        let mut mult: u64 = 1;
        match self.cell_order() {
            CellOrder::RowMajor => {
                for i in (0..dim_num).rev() {
                    pos += coords[i].to_pos() * mult;
                    mult *= extents[i].to_pos();
                }
            }
            CellOrder::ColumnMajor => {
                for i in 0..dim_num {
                    pos += coords[i].to_pos() * mult;
                    mult *= extents[i].to_pos();
                }
            }
        }
        Ok(pos)
    }

    /// Tile-index coordinates of the tile containing `coords`.
    pub fn tile_index_of<T: CoordScalar>(&self, coords: &[T]) -> Result<Vec<T>> {
        let domain = self.domain().typed::<T>()?;
        let extents = self.tile_extents().typed::<T>()?;
        Ok((0..self.dim_num())
            .map(|i| (coords[i] - domain[2 * i]) / extents[i])
            .collect())
    }

    /// Global `[lo, hi]` rectangle covered by the tile at `tile` coordinates
    /// in tile-index space.
    pub fn tile_rect<T: CoordScalar>(&self, tile: &[T]) -> Result<Vec<T>> {
        let domain = self.domain().typed::<T>()?;
        let extents = self.tile_extents().typed::<T>()?;
        let mut rect = Vec::with_capacity(2 * self.dim_num());
        for i in 0..self.dim_num() {
            let corner = domain[2 * i] + tile[i] * extents[i];
            rect.push(corner);
            rect.push(corner + extents[i] - T::one());
        }
        Ok(rect)
    }

    /// Inverse of [`ArraySchema::get_cell_pos`]: the tile-local coordinate
    /// tuple at integer position `pos`.
    pub fn get_cell_coords<T: CoordScalar>(&self, pos: CellPos, coords: &mut [T]) -> Result<()> {
        let extents = self.tile_extents().typed::<T>()?;
        let dim_num = self.dim_num();
        let mut rest = pos;
        match self.cell_order() {
            CellOrder::RowMajor => {
                for i in (0..dim_num).rev() {
                    let extent = extents[i].to_pos();
                    coords[i] = T::from_pos(rest % extent);
                    rest /= extent;
                }
            }
            CellOrder::ColumnMajor => {
                for i in 0..dim_num {
                    let extent = extents[i].to_pos();
                    coords[i] = T::from_pos(rest % extent);
                    rest /= extent;
                }
            }
        }
        Ok(())
    }
}
