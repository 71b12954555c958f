//! Array schema and coordinate arithmetic for tilestore.
//!
//! The schema fixes the logical domain, the tile extents partitioning it,
//! the cell and tile orders, and the attribute metadata (including each
//! attribute's empty-fill value). The coordinate arithmetic in
//! [`cell_math`] is generic over the scalar kind and is the vocabulary the
//! read engine's merge and tile walk are written in.

pub mod cell_math;
pub mod schema;

pub use cell_math::{cell_order_cmp, rect_contains, rect_intersect, rect_slabs};
pub use schema::{ArraySchema, AttributeMeta};
