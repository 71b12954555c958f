//! Public surface of the tilestore array engine.
//!
//! Re-exports the pieces an embedder needs: the schema vocabulary, the
//! fragment seam with its in-memory implementation, and the multi-fragment
//! read coordinator.
//!
//! ```
//! use tilestore::{
//!     Array, ArrayReadState, ArraySchema, AttributeMeta, CellOrder, CoordArray, MemFragment,
//! };
//!
//! # fn main() -> tilestore::Result<()> {
//! // 4x4 domain in 2x2 tiles, one i64 attribute filled with -1.
//! let schema = ArraySchema::new(
//!     true,
//!     CellOrder::RowMajor,
//!     CoordArray::from(vec![0i64, 3, 0, 3]),
//!     CoordArray::from(vec![2i64, 2]),
//!     vec![AttributeMeta::fixed("a", 8, (-1i64).to_le_bytes().to_vec())],
//! )?;
//!
//! let values: Vec<u8> = (0..16i64).flat_map(|v| v.to_le_bytes()).collect();
//! let fragment = MemFragment::new_dense(&schema, CoordArray::from(vec![0i64, 3, 0, 3]), vec![values])?;
//!
//! let mut array = Array::new(
//!     schema,
//!     vec![fragment],
//!     CoordArray::from(vec![0i64, 3, 0, 3]),
//!     vec![0],
//! )?;
//! let mut state = ArrayReadState::new(&mut array);
//!
//! let mut buffer = vec![0u8; 16 * 8];
//! let mut sizes = [buffer.len()];
//! state.read(&mut [buffer.as_mut_slice()], &mut sizes)?;
//! assert_eq!(sizes[0], 16 * 8);
//! assert!(state.done());
//! # Ok(())
//! # }
//! ```

pub use tilestore_fragment::{Fragment, MemFragment};
pub use tilestore_read::{Array, ArrayReadState};
pub use tilestore_result::{Error, Result};
pub use tilestore_schema::{ArraySchema, AttributeMeta};
pub use tilestore_types::{
    AttributeId, CellOrder, CellPos, CellPosRange, CoordArray, CoordScalar, CoordType,
    FragmentCellPosRange, FragmentCellRange, FragmentId,
};
