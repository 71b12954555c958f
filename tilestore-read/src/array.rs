use std::cmp::Ordering;

use rustc_hash::FxHashSet;
use tilestore_fragment::Fragment;
use tilestore_result::{Error, Result};
use tilestore_schema::ArraySchema;
use tilestore_types::{AttributeId, CoordArray, CoordScalar, CoordType};

/// An array opened for reading: schema, recency-ordered fragments, the
/// query subarray and the requested attributes.
///
/// Fragment order encodes recency: the fragment at a higher index was
/// written later and overrides lower-indexed fragments wherever their cells
/// overlap. The coordinates pseudo-attribute is requested with id
/// `attribute_num`.
pub struct Array<F> {
    pub(crate) schema: ArraySchema,
    pub(crate) fragments: Vec<F>,
    pub(crate) subarray: CoordArray,
    pub(crate) attribute_ids: Vec<AttributeId>,
}

impl<F: Fragment> Array<F> {
    pub fn new(
        schema: ArraySchema,
        fragments: Vec<F>,
        subarray: CoordArray,
        attribute_ids: Vec<AttributeId>,
    ) -> Result<Self> {
        if subarray.len() != 2 * schema.dim_num() {
            return Err(Error::InvalidArgumentError(format!(
                "subarray holds {} scalars, expected {}",
                subarray.len(),
                2 * schema.dim_num()
            )));
        }
        if subarray.coord_type() != schema.coords_type() {
            return Err(Error::CoordTypeMismatch {
                expected: schema.coords_type().name(),
                found: subarray.coord_type().name(),
            });
        }
        match schema.coords_type() {
            CoordType::I32 => validate_subarray::<i32>(&schema, &subarray)?,
            CoordType::I64 => validate_subarray::<i64>(&schema, &subarray)?,
            CoordType::F32 => validate_subarray::<f32>(&schema, &subarray)?,
            CoordType::F64 => validate_subarray::<f64>(&schema, &subarray)?,
        }

        let mut seen: FxHashSet<AttributeId> = FxHashSet::default();
        for &a in &attribute_ids {
            if a > schema.attribute_num() {
                return Err(Error::InvalidArgumentError(format!(
                    "attribute id {a} out of range (attribute_num = {})",
                    schema.attribute_num()
                )));
            }
            if !seen.insert(a) {
                return Err(Error::InvalidArgumentError(format!(
                    "attribute id {a} requested twice"
                )));
            }
        }
        if attribute_ids.is_empty() {
            return Err(Error::InvalidArgumentError(
                "no attributes requested".into(),
            ));
        }

        Ok(Self {
            schema,
            fragments,
            subarray,
            attribute_ids,
        })
    }

    #[inline]
    pub fn schema(&self) -> &ArraySchema {
        &self.schema
    }

    #[inline]
    pub fn fragment_num(&self) -> usize {
        self.fragments.len()
    }

    #[inline]
    pub fn subarray(&self) -> &CoordArray {
        &self.subarray
    }

    #[inline]
    pub fn attribute_ids(&self) -> &[AttributeId] {
        &self.attribute_ids
    }

    /// Buffer slots a `read` call must supply: one per fixed-size
    /// attribute, two per variable-size attribute (offsets + values).
    pub fn buffer_slot_num(&self) -> Result<usize> {
        let mut slots = 0;
        for &a in &self.attribute_ids {
            slots += if self.schema.var_size(a)? { 2 } else { 1 };
        }
        Ok(slots)
    }
}

fn validate_subarray<T: CoordScalar>(schema: &ArraySchema, subarray: &CoordArray) -> Result<()> {
    let range = subarray.typed::<T>()?;
    for i in 0..schema.dim_num() {
        if T::total_cmp(range[2 * i], range[2 * i + 1]) == Ordering::Greater {
            return Err(Error::InvalidArgumentError(format!(
                "subarray bounds inverted in dimension {i}"
            )));
        }
    }
    Ok(())
}
