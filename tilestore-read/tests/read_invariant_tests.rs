//! Property-style checks over the read coordinator: ordering, coverage,
//! recency, suspension determinism, and the error surface.

mod common;

use common::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tilestore_fragment::MemFragment;
use tilestore_read::{Array, ArrayReadState};
use tilestore_result::Error;
use tilestore_schema::{ArraySchema, AttributeMeta};
use tilestore_types::{CellOrder, CoordArray};

fn full_fragment(schema: &ArraySchema, width: i64, tile: i64) -> MemFragment {
    MemFragment::new_dense(
        schema,
        CoordArray::from(vec![0i64, width - 1, 0, width - 1]),
        vec![rank_values(width, tile)],
    )
    .unwrap()
}

#[test]
fn suspension_determinism_across_capacities() {
    let schedules: &[usize] = &[16 * CELL, 5 * CELL, 3 * CELL, 7 * CELL, CELL];
    let mut outputs = Vec::new();
    for &capacity in schedules {
        let schema = schema_4x4();
        let fragment = full_fragment(&schema, 4, 2);
        let mut array = Array::new(
            schema,
            vec![fragment],
            CoordArray::from(vec![0i64, 3, 0, 3]),
            vec![0],
        )
        .unwrap();
        let mut state = ArrayReadState::new(&mut array);
        let (out, _) = read_all(&mut state, &[capacity]);
        outputs.push(out.into_iter().next().unwrap());
    }
    for out in &outputs[1..] {
        assert_eq!(out, &outputs[0]);
    }
}

#[test]
fn attributes_consume_at_different_rates() {
    let schema = schema_4x4();
    let fragment = full_fragment(&schema, 4, 2);
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![0i64, 3, 0, 3]),
        vec![0, 1],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    // Values trickle three cells per call while coordinates drain in one:
    // the prepared-tile list must retain tiles for the lagging attribute.
    let (out, _) = read_all(&mut state, &[3 * CELL, 16 * 2 * CELL]);
    assert_eq!(decode_i64(&out[0]), (0..16).collect::<Vec<i64>>());
    let coords = decode_coords(&out[1]);
    assert_eq!(coords.len(), 16);
    let ranks: Vec<i64> = coords
        .iter()
        .map(|&(r, c)| global_rank(r, c, 4, 2))
        .collect();
    assert_eq!(ranks, (0..16).collect::<Vec<i64>>());
}

#[test]
fn coords_output_is_strictly_increasing() {
    let schema = square_schema(8, 2);
    let older = full_fragment(&schema, 8, 2);
    let newer = MemFragment::new_dense(
        &schema,
        CoordArray::from(vec![2i64, 5, 1, 6]),
        vec![le(&vec![500; 4 * 6])],
    )
    .unwrap();
    let mut array = Array::new(
        schema,
        vec![older, newer],
        CoordArray::from(vec![1i64, 6, 0, 7]),
        vec![1],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let (out, _) = read_all(&mut state, &[13 * 2 * CELL]);
    let coords = decode_coords(&out[0]);
    // 6 rows x 8 columns.
    assert_eq!(coords.len(), 48);
    let ranks: Vec<i64> = coords
        .iter()
        .map(|&(r, c)| global_rank(r, c, 8, 2))
        .collect();
    assert!(ranks.windows(2).all(|w| w[0] < w[1]), "ranks: {ranks:?}");
}

#[test]
fn randomized_recency_matches_reference_grid() {
    const WIDTH: i64 = 8;
    const TILE: i64 = 2;
    let mut rng = StdRng::seed_from_u64(0x7113_5702);

    for round in 0..8 {
        let schema = square_schema(WIDTH, TILE);
        let mut fragments = vec![full_fragment(&schema, WIDTH, TILE)];
        let mut reference = vec![vec![0i64; WIDTH as usize]; WIDTH as usize];
        for r in 0..WIDTH {
            for c in 0..WIDTH {
                reference[r as usize][c as usize] = global_rank(r, c, WIDTH, TILE);
            }
        }

        for f in 1..=4 {
            let r0 = rng.gen_range(0..WIDTH);
            let r1 = rng.gen_range(r0..WIDTH);
            let c0 = rng.gen_range(0..WIDTH);
            let c1 = rng.gen_range(c0..WIDTH);
            let value = 1_000 * round + f;
            let cells = ((r1 - r0 + 1) * (c1 - c0 + 1)) as usize;
            fragments.push(
                MemFragment::new_dense(
                    &schema,
                    CoordArray::from(vec![r0, r1, c0, c1]),
                    vec![le(&vec![value; cells])],
                )
                .unwrap(),
            );
            for r in r0..=r1 {
                for c in c0..=c1 {
                    reference[r as usize][c as usize] = value;
                }
            }
        }

        let mut array = Array::new(
            schema,
            fragments,
            CoordArray::from(vec![0i64, WIDTH - 1, 0, WIDTH - 1]),
            vec![0, 1],
        )
        .unwrap();
        let mut state = ArrayReadState::new(&mut array);
        let (out, _) = read_all(&mut state, &[11 * CELL, 64 * 2 * CELL]);

        let values = decode_i64(&out[0]);
        let coords = decode_coords(&out[1]);
        assert_eq!(values.len(), 64);
        for (&value, &(r, c)) in values.iter().zip(coords.iter()) {
            assert_eq!(
                value, reference[r as usize][c as usize],
                "round {round}, cell ({r}, {c})"
            );
        }
    }
}

#[test]
fn subarray_outside_domain_reads_nothing() {
    let schema = schema_4x4();
    let fragment = full_fragment(&schema, 4, 2);
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![4i64, 7, 0, 3]),
        vec![0],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let mut buffer = vec![0u8; 8 * CELL];
    let mut sizes = [buffer.len()];
    state.read(&mut [buffer.as_mut_slice()], &mut sizes).unwrap();
    assert_eq!(sizes[0], 0);
    assert!(state.done());
}

#[test]
fn float_coords_are_rejected_for_dense_reads() {
    let schema = ArraySchema::new(
        true,
        CellOrder::RowMajor,
        CoordArray::from(vec![0.0f64, 3.0, 0.0, 3.0]),
        CoordArray::from(vec![2.0f64, 2.0]),
        vec![AttributeMeta::fixed("a", CELL, (-1i64).to_le_bytes().to_vec())],
    )
    .unwrap();
    let fragment = MemFragment::new_dense(
        &schema,
        CoordArray::from(vec![0.0f64, 3.0, 0.0, 3.0]),
        vec![le(&vec![0; 16])],
    )
    .unwrap();
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![0.0f64, 3.0, 0.0, 3.0]),
        vec![0],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let mut buffer = vec![0u8; 8 * CELL];
    let mut sizes = [buffer.len()];
    let err = state.read(&mut [buffer.as_mut_slice()], &mut sizes).unwrap_err();
    assert!(matches!(err, Error::UnsupportedCoordType("f64")));
}

#[test]
fn sparse_array_mode_is_an_extension_point() {
    let schema = ArraySchema::new(
        false,
        CellOrder::RowMajor,
        CoordArray::from(vec![0i64, 3, 0, 3]),
        CoordArray::from(vec![2i64, 2]),
        vec![AttributeMeta::fixed("a", CELL, (-1i64).to_le_bytes().to_vec())],
    )
    .unwrap();
    let fragment = MemFragment::new_sparse(
        &schema,
        CoordArray::from(vec![0i64, 0]),
        vec![le(&[7])],
    )
    .unwrap();
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![0i64, 3, 0, 3]),
        vec![0],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let mut buffer = vec![0u8; 8 * CELL];
    let mut sizes = [buffer.len()];
    let err = state.read(&mut [buffer.as_mut_slice()], &mut sizes).unwrap_err();
    assert!(matches!(err, Error::Unsupported(_)));
}

#[test]
fn buffer_arity_and_capacity_are_validated() {
    let schema = schema_4x4();
    let fragment = full_fragment(&schema, 4, 2);
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![0i64, 3, 0, 3]),
        vec![0, 1],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    // Two attributes need two slots.
    let mut buffer = vec![0u8; 8 * CELL];
    let mut sizes = [buffer.len()];
    let err = state.read(&mut [buffer.as_mut_slice()], &mut sizes).unwrap_err();
    assert!(matches!(err, Error::InvalidArgumentError(_)));

    // Declared size exceeding the buffer is rejected.
    let mut a = vec![0u8; CELL];
    let mut b = vec![0u8; CELL];
    let mut sizes = [2 * CELL, CELL];
    let err = state
        .read(&mut [a.as_mut_slice(), b.as_mut_slice()], &mut sizes)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgumentError(_)));
}

#[test]
fn reading_without_fragments_is_an_error() {
    let schema = schema_4x4();
    let mut array = Array::new(
        schema,
        Vec::<MemFragment>::new(),
        CoordArray::from(vec![0i64, 3, 0, 3]),
        vec![0],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let mut buffer = vec![0u8; 8 * CELL];
    let mut sizes = [buffer.len()];
    let err = state.read(&mut [buffer.as_mut_slice()], &mut sizes).unwrap_err();
    assert!(matches!(err, Error::InvalidArgumentError(_)));
}

#[test]
fn zero_capacity_call_suspends_without_progress() {
    let schema = schema_4x4();
    let fragment = full_fragment(&schema, 4, 2);
    let mut array = Array::new(
        schema,
        vec![fragment],
        CoordArray::from(vec![0i64, 3, 0, 3]),
        vec![0],
    )
    .unwrap();
    let mut state = ArrayReadState::new(&mut array);

    let mut empty: Vec<u8> = Vec::new();
    let mut sizes = [0usize];
    state.read(&mut [empty.as_mut_slice()], &mut sizes).unwrap();
    assert_eq!(sizes[0], 0);
    assert!(!state.done());

    let (out, _) = read_all(&mut state, &[16 * CELL]);
    assert_eq!(decode_i64(&out[0]), (0..16).collect::<Vec<i64>>());
}
