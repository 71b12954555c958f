//! Core type vocabulary for the tilestore array engine.
//!
//! Coordinates are runtime-typed: an array schema declares one of four scalar
//! kinds ([`CoordType`]) and every coordinate buffer travels as a
//! [`CoordArray`]. Typed code paths downcast once at a dispatch boundary via
//! [`CoordScalar`] and stay monomorphized from there.

pub mod coord;
pub mod ranges;

pub use coord::{CellOrder, CoordArray, CoordScalar, CoordType};
pub use ranges::{
    AttributeId, CellPos, CellPosRange, FragmentCellPosRange, FragmentCellPosRanges,
    FragmentCellRange, FragmentId,
};
