//! Shared helpers for the read-coordinator integration tests.

use tilestore_fragment::MemFragment;
use tilestore_read::ArrayReadState;
use tilestore_schema::{ArraySchema, AttributeMeta};
use tilestore_types::{CellOrder, CoordArray};

pub const CELL: usize = 8;

/// Dense row-major schema over `[0, width-1]^2` with square tiles and one
/// `i64` attribute filled with `-1`.
pub fn square_schema(width: i64, tile: i64) -> ArraySchema {
    ArraySchema::new(
        true,
        CellOrder::RowMajor,
        CoordArray::from(vec![0i64, width - 1, 0, width - 1]),
        CoordArray::from(vec![tile, tile]),
        vec![AttributeMeta::fixed("a", CELL, (-1i64).to_le_bytes().to_vec())],
    )
    .unwrap()
}

pub fn schema_4x4() -> ArraySchema {
    square_schema(4, 2)
}

/// Rank of cell `(r, c)` in the global cell order: tiles in row-major tile
/// order, cells row-major within each tile.
pub fn global_rank(r: i64, c: i64, width: i64, tile: i64) -> i64 {
    let tiles_per_row = width / tile;
    let tile_idx = (r / tile) * tiles_per_row + (c / tile);
    tile_idx * tile * tile + (r % tile) * tile + (c % tile)
}

/// Value bytes for a full-domain dense fragment whose cell value equals
/// the cell's global-order rank. Laid out row-major over the domain, as
/// `MemFragment::new_dense` expects.
pub fn rank_values(width: i64, tile: i64) -> Vec<u8> {
    let mut out = Vec::with_capacity((width * width) as usize * CELL);
    for r in 0..width {
        for c in 0..width {
            out.extend_from_slice(&global_rank(r, c, width, tile).to_le_bytes());
        }
    }
    out
}

pub fn le(values: &[i64]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

pub fn decode_i64(bytes: &[u8]) -> Vec<i64> {
    bytes
        .chunks_exact(CELL)
        .map(|c| i64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

/// Decode a coordinates buffer into `(dim0, dim1)` pairs.
pub fn decode_coords(bytes: &[u8]) -> Vec<(i64, i64)> {
    decode_i64(bytes)
        .chunks_exact(2)
        .map(|p| (p[0], p[1]))
        .collect::<Vec<_>>()
}

/// Drive `read` until completion with fixed per-slot capacities, returning
/// the concatenated bytes per slot and the byte counts of each call.
pub fn read_all(
    state: &mut ArrayReadState<'_, MemFragment>,
    capacities: &[usize],
) -> (Vec<Vec<u8>>, Vec<Vec<usize>>) {
    let mut collected: Vec<Vec<u8>> = vec![Vec::new(); capacities.len()];
    let mut call_sizes: Vec<Vec<usize>> = Vec::new();
    for round in 0.. {
        assert!(round < 10_000, "read did not converge");
        let mut buffers: Vec<Vec<u8>> = capacities.iter().map(|&c| vec![0u8; c]).collect();
        let mut sizes: Vec<usize> = capacities.to_vec();
        {
            let mut slices: Vec<&mut [u8]> =
                buffers.iter_mut().map(|b| b.as_mut_slice()).collect();
            state.read(&mut slices, &mut sizes).unwrap();
        }
        for (slot, &written) in sizes.iter().enumerate() {
            collected[slot].extend_from_slice(&buffers[slot][..written]);
        }
        call_sizes.push(sizes.clone());
        if state.done() && sizes.iter().all(|&s| s == 0) {
            break;
        }
    }
    (collected, call_sizes)
}
