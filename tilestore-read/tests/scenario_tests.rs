//! End-to-end read scenarios over a 4x4 row-major domain in 2x2 tiles.

mod common;

use common::*;
use tilestore_fragment::MemFragment;
use tilestore_read::{Array, ArrayReadState};
use tilestore_types::CoordArray;

fn full_fragment(schema: &tilestore_schema::ArraySchema) -> MemFragment {
    MemFragment::new_dense(
        schema,
        CoordArray::from(vec![0i64, 3, 0, 3]),
        vec![rank_values(4, 2)],
    )
    .unwrap()
}

#[test]
fn single_dense_fragment_full_read() {
    let schema = schema_4x4();
    let fragment = full_fragment(&schema);
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![0i64, 3, 0, 3]),
        vec![0],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let (out, calls) = read_all(&mut state, &[16 * CELL]);
    assert_eq!(decode_i64(&out[0]), (0..16).collect::<Vec<i64>>());
    // One productive call, one zero-byte call confirming done.
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], vec![16 * CELL]);
    assert!(state.done());
}

#[test]
fn two_dense_fragments_newer_overrides() {
    let schema = schema_4x4();
    let older = full_fragment(&schema);
    let newer = MemFragment::new_dense(
        &schema,
        CoordArray::from(vec![1i64, 2, 1, 2]),
        vec![le(&[100, 100, 100, 100])],
    )
    .unwrap();
    let mut array = Array::new(
        schema,
        vec![older, newer],
        CoordArray::from(vec![0i64, 3, 0, 3]),
        vec![0, 1],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let (out, _) = read_all(&mut state, &[16 * CELL, 16 * 2 * CELL]);
    let values = decode_i64(&out[0]);
    let coords = decode_coords(&out[1]);
    assert_eq!(values.len(), 16);
    assert_eq!(coords.len(), 16);

    for (&value, &(r, c)) in values.iter().zip(coords.iter()) {
        let expected = if (1..=2).contains(&r) && (1..=2).contains(&c) {
            100
        } else {
            global_rank(r, c, 4, 2)
        };
        assert_eq!(value, expected, "cell ({r}, {c})");
    }
}

#[test]
fn overflow_and_resume() {
    let schema = schema_4x4();
    let fragment = full_fragment(&schema);
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![0i64, 3, 0, 3]),
        vec![0],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    // Five cells per call: 5 + 5 + 5 + 1, then the zero-byte done call.
    let (out, calls) = read_all(&mut state, &[5 * CELL]);
    assert_eq!(decode_i64(&out[0]), (0..16).collect::<Vec<i64>>());
    let written: Vec<usize> = calls.iter().map(|c| c[0]).collect();
    assert_eq!(
        written,
        vec![5 * CELL, 5 * CELL, 5 * CELL, CELL, 0]
    );
}

#[test]
fn sparse_fragment_with_holes_fills_empties() {
    let schema = schema_4x4();
    let fragment = MemFragment::new_sparse(
        &schema,
        CoordArray::from(vec![0i64, 0, 2, 3]),
        vec![le(&[7, 9])],
    )
    .unwrap();
    // Coordinates pseudo-attribute only (id == attribute_num == 1).
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![0i64, 3, 0, 3]),
        vec![1],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let (out, _) = read_all(&mut state, &[16 * 2 * CELL]);
    let coords = decode_coords(&out[0]);
    assert_eq!(coords.len(), 16);

    // The two stored cells surface at their global-order slots; every
    // other cell is the (-1, -1) empty fill.
    let stored: Vec<(usize, (i64, i64))> = coords
        .iter()
        .enumerate()
        .filter(|(_, &c)| c != (-1, -1))
        .map(|(i, &c)| (i, c))
        .collect();
    assert_eq!(
        stored,
        vec![
            (global_rank(0, 0, 4, 2) as usize, (0, 0)),
            (global_rank(2, 3, 4, 2) as usize, (2, 3)),
        ]
    );
}

#[test]
fn partial_tile_subarray_middle_columns() {
    let schema = schema_4x4();
    let fragment = full_fragment(&schema);
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![0i64, 3, 1, 2]),
        vec![0],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let (out, _) = read_all(&mut state, &[8 * CELL]);
    // Two middle columns, visited tile by tile in global order.
    let expected: Vec<i64> = [(0, 1), (1, 1), (0, 2), (1, 2), (2, 1), (3, 1), (2, 2), (3, 2)]
        .iter()
        .map(|&(r, c)| global_rank(r, c, 4, 2))
        .collect();
    assert_eq!(decode_i64(&out[0]), expected);
}

#[test]
fn partial_non_contig_center_subarray() {
    let schema = schema_4x4();
    let fragment = full_fragment(&schema);
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![1i64, 2, 1, 2]),
        vec![0],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let (out, _) = read_all(&mut state, &[4 * CELL]);
    // One corner cell from each of the four tiles.
    let expected: Vec<i64> = [(1, 1), (1, 2), (2, 1), (2, 2)]
        .iter()
        .map(|&(r, c)| global_rank(r, c, 4, 2))
        .collect();
    assert_eq!(decode_i64(&out[0]), expected);
}
