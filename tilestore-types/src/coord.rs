//! Runtime-typed coordinate buffers and the scalar kinds behind them.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use tilestore_result::{Error, Result};

/// Scalar kind of an array's coordinates, declared by the schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CoordType {
    I32,
    I64,
    F32,
    F64,
}

impl CoordType {
    /// Size in bytes of one scalar of this kind.
    #[inline]
    pub fn size(self) -> usize {
        match self {
            CoordType::I32 | CoordType::F32 => 4,
            CoordType::I64 | CoordType::F64 => 8,
        }
    }

    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            CoordType::I32 => "i32",
            CoordType::I64 => "i64",
            CoordType::F32 => "f32",
            CoordType::F64 => "f64",
        }
    }
}

/// Cell (and tile) ordering within the domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellOrder {
    /// Last dimension varies fastest.
    RowMajor,
    /// First dimension varies fastest.
    ColumnMajor,
}

/// Coordinate buffer whose scalar kind is only known at runtime.
///
/// The analogue of a dynamically typed column: construction fixes the
/// variant, readers downcast with [`CoordArray::typed`] once per dispatch and
/// then work on plain slices.
#[derive(Clone, Debug, PartialEq)]
pub enum CoordArray {
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl CoordArray {
    #[inline]
    pub fn coord_type(&self) -> CoordType {
        match self {
            CoordArray::I32(_) => CoordType::I32,
            CoordArray::I64(_) => CoordType::I64,
            CoordArray::F32(_) => CoordType::F32,
            CoordArray::F64(_) => CoordType::F64,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        match self {
            CoordArray::I32(v) => v.len(),
            CoordArray::I64(v) => v.len(),
            CoordArray::F32(v) => v.len(),
            CoordArray::F64(v) => v.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Downcast to a typed slice; errors if the buffer holds another kind.
    #[inline]
    pub fn typed<T: CoordScalar>(&self) -> Result<&[T]> {
        T::coords(self).ok_or(Error::CoordTypeMismatch {
            expected: T::TYPE.name(),
            found: self.coord_type().name(),
        })
    }
}

impl From<Vec<i32>> for CoordArray {
    fn from(v: Vec<i32>) -> Self {
        CoordArray::I32(v)
    }
}

impl From<Vec<i64>> for CoordArray {
    fn from(v: Vec<i64>) -> Self {
        CoordArray::I64(v)
    }
}

impl From<Vec<f32>> for CoordArray {
    fn from(v: Vec<f32>) -> Self {
        CoordArray::F32(v)
    }
}

impl From<Vec<f64>> for CoordArray {
    fn from(v: Vec<f64>) -> Self {
        CoordArray::F64(v)
    }
}

/// Primitive scalar usable as a coordinate.
///
/// Implemented for exactly `i32`, `i64`, `f32`, `f64`. Comparison is total
/// for every kind (`total_cmp` for floats) so merge heaps stay well ordered.
/// `to_pos`/`from_pos` convert between normalized tile-local coordinates and
/// integer cell positions; they are only reached on the dense code paths,
/// which dispatch integer kinds.
pub trait CoordScalar:
    Copy
    + PartialEq
    + PartialOrd
    + fmt::Debug
    + fmt::Display
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
{
    const TYPE: CoordType;

    fn zero() -> Self;
    fn one() -> Self;

    /// Total order over scalars of this kind.
    fn total_cmp(a: Self, b: Self) -> Ordering;

    #[inline]
    fn min_of(a: Self, b: Self) -> Self {
        match Self::total_cmp(a, b) {
            Ordering::Greater => b,
            _ => a,
        }
    }

    #[inline]
    fn max_of(a: Self, b: Self) -> Self {
        match Self::total_cmp(a, b) {
            Ordering::Less => b,
            _ => a,
        }
    }

    /// Number of tiles covering `[lo, hi]` with the given extent,
    /// `ceil((hi - lo + 1) / extent)`.
    fn tile_count(lo: Self, hi: Self, extent: Self) -> u64;

    /// Integer cell position of a normalized (non-negative) coordinate.
    fn to_pos(self) -> u64;

    /// Inverse of [`CoordScalar::to_pos`].
    fn from_pos(pos: u64) -> Self;

    /// Write this scalar's little-endian byte image into `out`
    /// (`CoordType::size()` bytes).
    fn copy_le_bytes(self, out: &mut [u8]);

    /// Downcast hook for [`CoordArray::typed`].
    fn coords(array: &CoordArray) -> Option<&[Self]>;

    /// Wrap a typed vector back into a runtime-typed buffer.
    fn wrap(values: Vec<Self>) -> CoordArray;
}

macro_rules! impl_int_coord_scalar {
    ($t:ty, $kind:ident) => {
        impl CoordScalar for $t {
            const TYPE: CoordType = CoordType::$kind;

            #[inline]
            fn zero() -> Self {
                0
            }

            #[inline]
            fn one() -> Self {
                1
            }

            #[inline]
            fn total_cmp(a: Self, b: Self) -> Ordering {
                a.cmp(&b)
            }

            #[inline]
            fn tile_count(lo: Self, hi: Self, extent: Self) -> u64 {
                let span = (hi - lo + 1) as i128;
                let extent = extent as i128;
                ((span + extent - 1) / extent) as u64
            }

            #[inline]
            fn to_pos(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_pos(pos: u64) -> Self {
                pos as $t
            }

            #[inline]
            fn copy_le_bytes(self, out: &mut [u8]) {
                out[..Self::TYPE.size()].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn coords(array: &CoordArray) -> Option<&[Self]> {
                match array {
                    CoordArray::$kind(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            #[inline]
            fn wrap(values: Vec<Self>) -> CoordArray {
                CoordArray::$kind(values)
            }
        }
    };
}

macro_rules! impl_float_coord_scalar {
    ($t:ty, $kind:ident) => {
        impl CoordScalar for $t {
            const TYPE: CoordType = CoordType::$kind;

            #[inline]
            fn zero() -> Self {
                0.0
            }

            #[inline]
            fn one() -> Self {
                1.0
            }

            #[inline]
            fn total_cmp(a: Self, b: Self) -> Ordering {
                a.total_cmp(&b)
            }

            #[inline]
            fn tile_count(lo: Self, hi: Self, extent: Self) -> u64 {
                ((hi - lo + 1.0) / extent).ceil() as u64
            }

            #[inline]
            fn to_pos(self) -> u64 {
                self as u64
            }

            #[inline]
            fn from_pos(pos: u64) -> Self {
                pos as $t
            }

            #[inline]
            fn copy_le_bytes(self, out: &mut [u8]) {
                out[..Self::TYPE.size()].copy_from_slice(&self.to_le_bytes());
            }

            #[inline]
            fn coords(array: &CoordArray) -> Option<&[Self]> {
                match array {
                    CoordArray::$kind(v) => Some(v.as_slice()),
                    _ => None,
                }
            }

            #[inline]
            fn wrap(values: Vec<Self>) -> CoordArray {
                CoordArray::$kind(values)
            }
        }
    };
}

impl_int_coord_scalar!(i32, I32);
impl_int_coord_scalar!(i64, I64);
impl_float_coord_scalar!(f32, F32);
impl_float_coord_scalar!(f64, F64);
