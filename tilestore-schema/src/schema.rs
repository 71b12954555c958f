use rustc_hash::FxHashSet;
use tilestore_result::{Error, Result};
use tilestore_types::{AttributeId, CellOrder, CoordArray, CoordScalar, CoordType};

/// Metadata for one attribute of the array.
#[derive(Clone, Debug)]
pub struct AttributeMeta {
    name: String,
    cell_size: usize,
    var_size: bool,
    fill: Vec<u8>,
}

impl AttributeMeta {
    /// Fixed-size attribute. `fill` is the byte image of one cell and is
    /// what empty-fill ranges of a dense read materialize.
    pub fn fixed(name: impl Into<String>, cell_size: usize, fill: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            cell_size,
            var_size: false,
            fill,
        }
    }

    /// Variable-size attribute. Consumes two buffer slots on reads
    /// (offsets + values); materialization is an extension point.
    pub fn var(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cell_size: std::mem::size_of::<u64>(),
            var_size: true,
            fill: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn cell_size(&self) -> usize {
        self.cell_size
    }

    #[inline]
    pub fn var_size(&self) -> bool {
        self.var_size
    }

    #[inline]
    pub fn fill(&self) -> &[u8] {
        &self.fill
    }
}

/// Schema of a tiled multi-dimensional array.
///
/// The domain is a closed hyper-rectangle stored as `2 * dim` scalars in
/// `[lo, hi]` pairs per dimension; tile extents partition it into fixed-size
/// tiles. The coordinate scalar kind is carried at runtime by the buffers
/// themselves ([`CoordArray`]); typed code paths downcast once at dispatch.
#[derive(Clone, Debug)]
pub struct ArraySchema {
    dim_num: usize,
    dense: bool,
    cell_order: CellOrder,
    tile_order: CellOrder,
    domain: CoordArray,
    tile_extents: CoordArray,
    attributes: Vec<AttributeMeta>,
    coords_fill: Vec<u8>,
}

impl ArraySchema {
    /// Build and validate a schema. The tile order defaults to the cell
    /// order; see [`ArraySchema::with_tile_order`].
    pub fn new(
        dense: bool,
        cell_order: CellOrder,
        domain: CoordArray,
        tile_extents: CoordArray,
        attributes: Vec<AttributeMeta>,
    ) -> Result<Self> {
        let dim_num = tile_extents.len();
        if dim_num == 0 {
            return Err(Error::InvalidArgumentError(
                "schema must have at least one dimension".into(),
            ));
        }
        if domain.len() != 2 * dim_num {
            return Err(Error::InvalidArgumentError(format!(
                "domain holds {} scalars, expected {}",
                domain.len(),
                2 * dim_num
            )));
        }
        if domain.coord_type() != tile_extents.coord_type() {
            return Err(Error::CoordTypeMismatch {
                expected: domain.coord_type().name(),
                found: tile_extents.coord_type().name(),
            });
        }

        let mut names: FxHashSet<&str> = FxHashSet::default();
        for attr in &attributes {
            if !names.insert(attr.name()) {
                return Err(Error::InvalidArgumentError(format!(
                    "duplicate attribute name: {}",
                    attr.name()
                )));
            }
            if !attr.var_size() && attr.cell_size() == 0 {
                return Err(Error::InvalidArgumentError(format!(
                    "attribute {}: cell size must be positive",
                    attr.name()
                )));
            }
            if !attr.var_size() && attr.fill().len() != attr.cell_size() {
                return Err(Error::InvalidArgumentError(format!(
                    "attribute {}: fill value is {} bytes, cell size is {}",
                    attr.name(),
                    attr.fill().len(),
                    attr.cell_size()
                )));
            }
        }

        let coords_fill = coords_fill(&tile_extents, dim_num);
        let schema = Self {
            dim_num,
            dense,
            cell_order,
            tile_order: cell_order,
            domain,
            tile_extents,
            attributes,
            coords_fill,
        };
        schema.validate_bounds()?;
        Ok(schema)
    }

    /// Override the tile order (the order the subarray walk visits tiles in).
    pub fn with_tile_order(mut self, tile_order: CellOrder) -> Self {
        self.tile_order = tile_order;
        self
    }

    fn validate_bounds(&self) -> Result<()> {
        match self.coords_type() {
            CoordType::I32 => self.validate_bounds_typed::<i32>(),
            CoordType::I64 => self.validate_bounds_typed::<i64>(),
            CoordType::F32 => self.validate_bounds_typed::<f32>(),
            CoordType::F64 => self.validate_bounds_typed::<f64>(),
        }
    }

    fn validate_bounds_typed<T: CoordScalar>(&self) -> Result<()> {
        let domain = self.domain.typed::<T>()?;
        let extents = self.tile_extents.typed::<T>()?;
        for i in 0..self.dim_num {
            if T::total_cmp(domain[2 * i], domain[2 * i + 1]) == std::cmp::Ordering::Greater {
                return Err(Error::InvalidArgumentError(format!(
                    "domain bounds inverted in dimension {i}"
                )));
            }
            if T::total_cmp(extents[i], T::zero()) != std::cmp::Ordering::Greater {
                return Err(Error::InvalidArgumentError(format!(
                    "tile extent must be positive in dimension {i}"
                )));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn dim_num(&self) -> usize {
        self.dim_num
    }

    #[inline]
    pub fn dense(&self) -> bool {
        self.dense
    }

    #[inline]
    pub fn attribute_num(&self) -> usize {
        self.attributes.len()
    }

    #[inline]
    pub fn cell_order(&self) -> CellOrder {
        self.cell_order
    }

    #[inline]
    pub fn tile_order(&self) -> CellOrder {
        self.tile_order
    }

    #[inline]
    pub fn coords_type(&self) -> CoordType {
        self.domain.coord_type()
    }

    /// Size in bytes of one coordinate tuple.
    #[inline]
    pub fn coords_size(&self) -> usize {
        self.dim_num * self.coords_type().size()
    }

    #[inline]
    pub fn domain(&self) -> &CoordArray {
        &self.domain
    }

    #[inline]
    pub fn tile_extents(&self) -> &CoordArray {
        &self.tile_extents
    }

    /// Attribute metadata; `attribute_id == attribute_num` addresses the
    /// coordinates pseudo-attribute and has no meta entry.
    pub fn attribute(&self, attribute_id: AttributeId) -> Result<&AttributeMeta> {
        self.attributes.get(attribute_id).ok_or(Error::NotFound)
    }

    /// Whether the attribute is variable-sized. The coordinates
    /// pseudo-attribute is always fixed-size.
    pub fn var_size(&self, attribute_id: AttributeId) -> Result<bool> {
        if attribute_id == self.attribute_num() {
            return Ok(false);
        }
        Ok(self.attribute(attribute_id)?.var_size())
    }

    /// Size in bytes of one cell of the attribute.
    pub fn cell_size(&self, attribute_id: AttributeId) -> Result<usize> {
        if attribute_id == self.attribute_num() {
            return Ok(self.coords_size());
        }
        Ok(self.attribute(attribute_id)?.cell_size())
    }

    /// Byte image of one empty-fill cell for the attribute. The coordinates
    /// pseudo-attribute fills with `-1` in every dimension.
    pub fn fill_value(&self, attribute_id: AttributeId) -> Result<&[u8]> {
        if attribute_id == self.attribute_num() {
            return Ok(&self.coords_fill);
        }
        Ok(self.attribute(attribute_id)?.fill())
    }
}

fn coords_fill(extents: &CoordArray, dim_num: usize) -> Vec<u8> {
    let mut fill = Vec::with_capacity(dim_num * extents.coord_type().size());
    for _ in 0..dim_num {
        match extents.coord_type() {
            CoordType::I32 => fill.extend_from_slice(&(-1i32).to_le_bytes()),
            CoordType::I64 => fill.extend_from_slice(&(-1i64).to_le_bytes()),
            CoordType::F32 => fill.extend_from_slice(&(-1.0f32).to_le_bytes()),
            CoordType::F64 => fill.extend_from_slice(&(-1.0f64).to_le_bytes()),
        }
    }
    fill
}
