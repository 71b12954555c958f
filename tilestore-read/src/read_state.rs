//! Read-state controller and per-attribute copy engine.
//!
//! One caller drives the state through successive [`ArrayReadState::read`]
//! calls. All suspension state (per-attribute cursors into the prepared
//! tiles, per-fragment in-tile copy cursors, the tile walk itself) lives
//! in named fields, so a call after an overflow resumes deterministically.
//! The state is single-threaded; for parallelism, open one state per
//! thread.

use tracing::{debug, trace};

use tilestore_fragment::Fragment;
use tilestore_result::{Error, Result};
use tilestore_schema::ArraySchema;
use tilestore_types::{
    AttributeId, CellPosRange, CoordType, FragmentCellPosRanges, FragmentCellRange,
};

use crate::array::Array;
use crate::merge::{merge_cell_ranges, to_pos_ranges};
use crate::walk::{DenseCoord, TileWalk, WalkState};

/// Suspendable read over an [`Array`]'s fragments.
pub struct ArrayReadState<'a, F: Fragment> {
    array: &'a mut Array<F>,
    done: bool,
    /// `None` until the first tile preparation; the walk's scalar variant
    /// is fixed then and kept across calls.
    walk: Option<TileWalk>,
    /// Prepared tiles not yet consumed by every requested attribute;
    /// index `v` is the `v`-th prepared range tile still alive.
    pos_ranges: Vec<FragmentCellPosRanges>,
    overflow: Vec<bool>,
    tile_done: Vec<bool>,
    vec_pos: Vec<usize>,
    inner_pos: Vec<usize>,
    /// Cells already written from a suspended empty-fill range; fills have
    /// no fragment cursor to remember intra-range progress.
    fill_copied: Vec<u64>,
}

impl<'a, F: Fragment> ArrayReadState<'a, F> {
    pub fn new(array: &'a mut Array<F>) -> Self {
        let slots = array.schema.attribute_num() + 1;
        Self {
            array,
            done: false,
            walk: None,
            pos_ranges: Vec::new(),
            overflow: vec![false; slots],
            tile_done: vec![true; slots],
            vec_pos: vec![0; slots],
            inner_pos: vec![0; slots],
            fill_copied: vec![0; slots],
        }
    }

    /// Whether the walk has delivered every subarray cell. A `read` call
    /// that writes zero bytes everywhere with `done() == true` means the
    /// read is complete.
    #[inline]
    pub fn done(&self) -> bool {
        self.done
    }

    /// Read the next stretch of cells into the caller's buffers, one slot
    /// per fixed-size attribute, two per variable-size attribute. On input
    /// `buffer_sizes[i]` is the usable capacity of `buffers[i]`; on return
    /// it holds the bytes actually written. Overflow is not an error: the
    /// call returns `Ok` with truncated sizes and the next call resumes
    /// where this one stopped.
    pub fn read(
        &mut self,
        buffers: &mut [&mut [u8]],
        buffer_sizes: &mut [usize],
    ) -> Result<()> {
        if self.array.fragments.is_empty() {
            return Err(Error::InvalidArgumentError(
                "array has no fragments to read".into(),
            ));
        }
        let slots = self.array.buffer_slot_num()?;
        if buffers.len() != slots || buffer_sizes.len() != slots {
            return Err(Error::InvalidArgumentError(format!(
                "read needs {slots} buffer slots, got {} buffers and {} sizes",
                buffers.len(),
                buffer_sizes.len()
            )));
        }
        for (buffer, &size) in buffers.iter().zip(buffer_sizes.iter()) {
            if size > buffer.len() {
                return Err(Error::InvalidArgumentError(format!(
                    "buffer size {size} exceeds buffer capacity {}",
                    buffer.len()
                )));
            }
        }

        if !self.array.schema.dense() {
            // Symmetric sparse dispatch is an extension point.
            return Err(Error::Unsupported("sparse array reads".into()));
        }
        // Fail before any state mutation if the coord type is outside the
        // dense dispatch set.
        let coords_type = self.array.schema.coords_type();
        if !matches!(coords_type, CoordType::I32 | CoordType::I64) {
            return Err(Error::UnsupportedCoordType(coords_type.name()));
        }

        self.overflow.fill(false);
        self.done = false;
        for fragment in &mut self.array.fragments {
            fragment.reset_overflow();
        }

        match coords_type {
            CoordType::I32 => self.read_dense::<i32>(buffers, buffer_sizes),
            CoordType::I64 => self.read_dense::<i64>(buffers, buffer_sizes),
            other => Err(Error::UnsupportedCoordType(other.name())),
        }
    }

    fn read_dense<T: DenseCoord>(
        &mut self,
        buffers: &mut [&mut [u8]],
        buffer_sizes: &mut [usize],
    ) -> Result<()> {
        let attribute_ids = self.array.attribute_ids.clone();
        let mut slot = 0;
        for &attribute_id in &attribute_ids {
            if self.array.schema.var_size(attribute_id)? {
                // Two slots (offsets + values); materialization is an
                // extension point.
                return Err(Error::Unsupported(format!(
                    "variable-size attribute {attribute_id} materialization"
                )));
            }
            let capacity = buffer_sizes[slot];
            let written =
                self.read_dense_attr::<T>(attribute_id, &mut buffers[slot][..capacity])?;
            buffer_sizes[slot] = written;
            slot += 1;
            self.gc();
        }
        Ok(())
    }

    /// Stream one attribute until its buffer fills or the walk completes.
    fn read_dense_attr<T: DenseCoord>(
        &mut self,
        attribute_id: AttributeId,
        buffer: &mut [u8],
    ) -> Result<usize> {
        let mut offset = 0usize;
        loop {
            // Finish a tile a previous call suspended inside.
            if !self.tile_done[attribute_id] {
                self.copy_cell_ranges::<T>(attribute_id, buffer, &mut offset)?;
                if self.overflow[attribute_id] {
                    return Ok(offset);
                }
            }

            // Prepared tiles drained: have the merge engine produce the
            // next one. `done` is only meaningful straight after a
            // prepare, so lagging attributes first drain what exists.
            if self.vec_pos[attribute_id] >= self.pos_ranges.len() {
                self.prepare_next_tile::<T>()?;
                self.gc();
                if self.done {
                    return Ok(offset);
                }
            }

            self.copy_cell_ranges::<T>(attribute_id, buffer, &mut offset)?;
            if self.overflow[attribute_id] {
                return Ok(offset);
            }
        }
    }

    /// Walk the current prepared tile's ranges from this attribute's inner
    /// cursor, copying cells until the tile completes or the buffer fills.
    fn copy_cell_ranges<T: DenseCoord>(
        &mut self,
        attribute_id: AttributeId,
        buffer: &mut [u8],
        offset: &mut usize,
    ) -> Result<()> {
        let Self {
            array,
            walk,
            pos_ranges,
            overflow,
            tile_done,
            vec_pos,
            inner_pos,
            fill_copied,
            ..
        } = self;
        let array = &mut **array;
        let schema = &array.schema;
        let fragments = &mut array.fragments;

        let ranges = pos_ranges
            .get(vec_pos[attribute_id])
            .ok_or_else(|| Error::Internal("copy engine has no prepared tile".into()))?;

        let mut i = inner_pos[attribute_id];
        let mut overflowed = false;
        while i < ranges.len() {
            let entry = ranges[i];
            match entry.fragment {
                None => {
                    if copy_fill(
                        schema,
                        attribute_id,
                        &entry.positions,
                        &mut fill_copied[attribute_id],
                        buffer,
                        offset,
                    )? {
                        overflowed = true;
                        break;
                    }
                }
                Some(fragment_id) => {
                    fragments[fragment_id].copy_cell_range::<T>(
                        schema,
                        attribute_id,
                        &entry.positions,
                        buffer,
                        offset,
                    )?;
                    if fragments[fragment_id].overflow(attribute_id) {
                        overflowed = true;
                        break;
                    }
                }
            }
            i += 1;
        }
        // On overflow the cursor stays on the partially consumed range;
        // the fragment (or the fill counter) remembers where inside it.
        inner_pos[attribute_id] = i;
        overflow[attribute_id] = overflowed;

        if overflowed {
            tile_done[attribute_id] = false;
            trace!(attribute_id, "copy suspended on buffer overflow");
        } else {
            if let Some(state) = walk.as_ref().and_then(|w| T::walk(w)) {
                for fragment_id in 0..fragments.len() {
                    if state.fragment_coincides(fragment_id) {
                        fragments[fragment_id].tile_done(attribute_id);
                    }
                }
            }
            vec_pos[attribute_id] += 1;
            inner_pos[attribute_id] = 0;
            tile_done[attribute_id] = true;
        }
        Ok(())
    }

    /// Advance the walk one range tile and run the merge engine over it.
    fn prepare_next_tile<T: DenseCoord>(&mut self) -> Result<()> {
        let Self {
            array,
            walk,
            pos_ranges,
            done,
            ..
        } = self;
        let array = &mut **array;
        let schema = &array.schema;
        let subarray = array.subarray.typed::<T>()?;
        let fragments = &mut array.fragments;

        let state: &mut WalkState<T> = match walk {
            None => {
                let state = WalkState::init(schema, subarray, fragments)?;
                *walk = Some(T::wrap_walk(state));
                T::walk_mut(walk.as_mut().expect("walk just initialized"))
                    .expect("walk variant matches dispatch")
            }
            Some(existing) => {
                let state = T::walk_mut(existing)
                    .ok_or_else(|| Error::Internal("walk scalar kind changed mid-read".into()))?;
                if state.finished() {
                    *done = true;
                    return Ok(());
                }
                state.advance(schema, subarray, fragments)?;
                state
            }
        };
        if state.finished() {
            *done = true;
            debug!("subarray tile walk complete");
            return Ok(());
        }

        state.align_fragments(schema, subarray, fragments)?;
        state.compute_overlap(schema, subarray)?;
        state.find_max_overlap_fragment(schema, fragments)?;

        let mut unsorted: Vec<FragmentCellRange<T>> = Vec::new();
        state.seed_ranges(schema, &mut unsorted)?;
        let newer = state.max_overlap_frag().map(|f| f + 1).unwrap_or(0);
        for fragment_id in newer..fragments.len() {
            if state.fragment_coincides(fragment_id) {
                fragments[fragment_id].compute_fragment_cell_ranges(
                    schema,
                    subarray,
                    fragment_id,
                    &mut unsorted,
                )?;
            }
        }

        let tile = state
            .tile_coords()
            .expect("walk not finished")
            .to_vec();
        let merged = merge_cell_ranges(schema, fragments, &tile, unsorted)?;
        let converted = to_pos_ranges(schema, fragments, &tile, merged)?;
        debug!(
            tile = ?tile,
            ranges = converted.len(),
            "prepared range tile"
        );
        pos_ranges.push(converted);
        Ok(())
    }

    /// Drop prepared tiles every requested attribute has advanced past.
    fn gc(&mut self) {
        let min_pos = self
            .array
            .attribute_ids
            .iter()
            .map(|&a| self.vec_pos[a])
            .min()
            .unwrap_or(0);
        if min_pos > 0 {
            self.pos_ranges.drain(..min_pos);
            for pos in self.vec_pos.iter_mut() {
                if *pos != 0 {
                    *pos -= min_pos;
                }
            }
            trace!(min_pos, "dropped consumed range tiles");
        }
    }
}

/// Fill a position range with the attribute's empty value. Returns `true`
/// on overflow, with `copied` recording the cells already written so the
/// next call resumes mid-range.
fn copy_fill(
    schema: &ArraySchema,
    attribute_id: AttributeId,
    range: &CellPosRange,
    copied: &mut u64,
    buffer: &mut [u8],
    offset: &mut usize,
) -> Result<bool> {
    let fill = schema.fill_value(attribute_id)?;
    let cell_size = fill.len();
    let mut pos = range.first + *copied;
    while pos <= range.last {
        if buffer.len() - *offset < cell_size {
            *copied = pos - range.first;
            return Ok(true);
        }
        buffer[*offset..*offset + cell_size].copy_from_slice(fill);
        *offset += cell_size;
        pos += 1;
    }
    *copied = 0;
    Ok(false)
}
